use std::collections::HashMap;

use tracing::{debug, trace};

use super::keepalive::keep_alive_frames;
use super::{AnalysisStage, StreamKey};
use crate::conversation::Conversation;
use crate::frame::FrameIndex;

/// A keep-alive probe repeating an earlier probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAliveMark {
    pub frame: FrameIndex,
    pub original: FrameIndex,
}

/// Find repeated keep-alive probes without modifying the conversation.
///
/// Each stream remembers its current probe. A later probe with the same
/// sequence number repeats it; a probe with a new sequence number replaces
/// it as the current probe. Only keep-alive frames are examined, and those
/// never take part in payload retransmit detection.
pub fn detect_keep_alive_retransmits(conversation: &Conversation) -> Vec<KeepAliveMark> {
    let mut current: HashMap<StreamKey, (u32, FrameIndex)> = HashMap::new();
    let mut marks = Vec::new();

    for index in keep_alive_frames(conversation) {
        let Some(frame) = conversation.frame(index) else {
            continue;
        };
        let key = StreamKey::of(frame);
        match current.get(&key) {
            Some(&(seq, original)) if seq == frame.seq() => {
                marks.push(KeepAliveMark {
                    frame: index,
                    original,
                });
            }
            _ => {
                current.insert(key, (frame.seq(), index));
            }
        }
    }

    marks
}

/// Write keep-alive retransmit marks and bump the originals' counts.
///
/// A mark is skipped unless it points backward to an existing frame that
/// carries no retransmit mark of either kind yet.
pub fn apply_keep_alive_retransmits(conversation: &mut Conversation, marks: &[KeepAliveMark]) {
    for mark in marks {
        let applicable = mark.original < mark.frame
            && conversation
                .frame(mark.frame)
                .is_some_and(|f| !f.is_keep_alive_retransmit() && !f.is_retransmit());
        if !applicable {
            debug!(
                conversation = %conversation.id(),
                frame = %mark.frame,
                original = %mark.original,
                "skipping keep-alive retransmit mark"
            );
            continue;
        }
        trace!(
            conversation = %conversation.id(),
            frame = %mark.frame,
            original = %mark.original,
            "keep-alive retransmit"
        );
        if let Some(frame) = conversation.frame_mut(mark.frame) {
            frame.mark_keep_alive_retransmit(mark.original);
        }
        if let Some(original) = conversation.frame_mut(mark.original) {
            original.add_keep_alive_retransmit();
        }
    }
    conversation.advance(AnalysisStage::KeepAliveRetransmits);
}
