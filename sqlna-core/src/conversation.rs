use std::fmt;

use crate::analysis::AnalysisStage;
use crate::error::FrameError;
use crate::frame::{Frame, FrameIndex, TransportKind};

/// Identifier of a conversation, assigned by whoever buckets frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConversationId(pub u64);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Frames of one client/server flow, in capture order.
///
/// Frame directions are already relative to the conversation's client. The
/// conversation owns its frames; frames refer back to it by id and to each
/// other by [`FrameIndex`].
#[derive(Debug, Clone)]
pub struct Conversation {
    id: ConversationId,
    kind: TransportKind,
    frames: Vec<Frame>,
    stage: AnalysisStage,
}

impl Conversation {
    pub fn new(id: ConversationId, kind: TransportKind) -> Self {
        Self {
            id,
            kind,
            frames: Vec::new(),
            stage: AnalysisStage::Raw,
        }
    }

    pub fn tcp(id: u64) -> Self {
        Self::new(ConversationId(id), TransportKind::Tcp)
    }

    pub fn udp(id: u64) -> Self {
        Self::new(ConversationId(id), TransportKind::Udp)
    }

    /// Build a conversation from frames already in capture order.
    pub fn with_frames(
        id: ConversationId,
        kind: TransportKind,
        frames: impl IntoIterator<Item = Frame>,
    ) -> Result<Self, FrameError> {
        let mut conversation = Self::new(id, kind);
        for frame in frames {
            conversation.push(frame)?;
        }
        Ok(conversation)
    }

    /// Append a frame.
    ///
    /// Frame numbers must strictly increase and the transport must match,
    /// which keeps every index-based back-reference pointing backward.
    pub fn push(&mut self, mut frame: Frame) -> Result<FrameIndex, FrameError> {
        if let Some(last) = self.frames.last() {
            if frame.number() <= last.number() {
                return Err(FrameError::OutOfOrder {
                    previous: last.number(),
                    got: frame.number(),
                });
            }
        }
        if frame.transport_kind() != self.kind {
            return Err(FrameError::TransportMismatch {
                frame: frame.number(),
                frame_transport: frame.transport_kind().as_str(),
                conversation_transport: self.kind.as_str(),
            });
        }

        frame.attach(self.id);
        self.frames.push(frame);
        Ok(FrameIndex(self.frames.len() - 1))
    }

    pub fn id(&self) -> ConversationId {
        self.id
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.kind
    }

    pub fn is_udp(&self) -> bool {
        self.kind == TransportKind::Udp
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame(&self, index: FrameIndex) -> Option<&Frame> {
        self.frames.get(index.0)
    }

    pub(crate) fn frame_mut(&mut self, index: FrameIndex) -> Option<&mut Frame> {
        self.frames.get_mut(index.0)
    }

    /// Frames paired with their index.
    pub fn indexed(&self) -> impl Iterator<Item = (FrameIndex, &Frame)> + '_ {
        self.frames
            .iter()
            .enumerate()
            .map(|(i, f)| (FrameIndex(i), f))
    }

    /// Find a frame by its capture-wide number.
    pub fn find_number(&self, number: u32) -> Option<FrameIndex> {
        self.frames
            .binary_search_by_key(&number, |f| f.number())
            .ok()
            .map(FrameIndex)
    }

    /// The frame a retransmit or keep-alive retransmit duplicates.
    pub fn original_of(&self, index: FrameIndex) -> Option<&Frame> {
        self.frame(index)?
            .original_frame()
            .and_then(|orig| self.frame(orig))
    }

    /// Pre-mark a frame as a message continuation.
    ///
    /// The mark is a reassembly input and survives [`reset_analysis`].
    ///
    /// [`reset_analysis`]: Conversation::reset_analysis
    ///
    /// Returns false if the index is out of range.
    pub fn mark_continuation(&mut self, index: FrameIndex) -> bool {
        match self.frames.get_mut(index.0) {
            Some(frame) => {
                frame.mark_continuation();
                true
            }
            None => false,
        }
    }

    /// Last analysis pass applied to this conversation.
    pub fn stage(&self) -> AnalysisStage {
        self.stage
    }

    pub(crate) fn advance(&mut self, stage: AnalysisStage) {
        self.stage = self.stage.max(stage);
    }

    /// Clear all analysis results so a new analysis run can start.
    ///
    /// Continuation hints set with [`Conversation::mark_continuation`] are
    /// kept.
    pub fn reset_analysis(&mut self) {
        for frame in &mut self.frames {
            frame.reset_analysis();
        }
        self.stage = AnalysisStage::Raw;
    }
}
