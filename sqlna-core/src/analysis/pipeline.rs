use std::num::NonZeroUsize;
use std::thread;

use tracing::debug;

use super::keepalive::keep_alive_frames;
use super::keepalive_retransmit::{apply_keep_alive_retransmits, detect_keep_alive_retransmits};
use super::reassembly::{apply_reassembly, plan_reassembly};
use super::retransmit::{apply_retransmits, detect_retransmits};
use super::AnalysisStage;
use crate::conversation::{Conversation, ConversationId};

/// Configuration for conversation analysis.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Worker threads used by [`analyze_conversations`].
    pub workers: usize,
    /// Use the TDS header length to mark continuations and end messages.
    pub trust_declared_length: bool,
    /// Largest message the reassembler will build (bytes).
    pub max_message_bytes: usize,
    /// Run the keep-alive retransmission pass.
    pub detect_keep_alive_retransmits: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            trust_declared_length: true,
            max_message_bytes: 16 * 1024 * 1024, // 16 MB per message
            detect_keep_alive_retransmits: true,
        }
    }
}

impl AnalysisConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_trust_declared_length(mut self, trust: bool) -> Self {
        self.trust_declared_length = trust;
        self
    }

    pub fn with_max_message_bytes(mut self, bytes: usize) -> Self {
        self.max_message_bytes = bytes;
        self
    }

    pub fn with_keep_alive_retransmits(mut self, enabled: bool) -> Self {
        self.detect_keep_alive_retransmits = enabled;
        self
    }
}

/// Counts produced by one conversation's analysis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisSummary {
    pub conversation: ConversationId,
    pub frames: usize,
    pub keep_alives: usize,
    pub retransmits: usize,
    pub keep_alive_retransmits: usize,
    pub messages: usize,
    pub multi_segment_messages: usize,
    pub continuations: usize,
}

/// Run all four passes over one conversation, in order.
///
/// A conversation that was already analyzed is reset first, so each pass
/// writes each frame's results exactly once per run. Continuation hints set
/// by the caller are inputs and survive the reset, so repeated runs produce
/// the same results.
pub fn analyze_conversation(
    conversation: &mut Conversation,
    config: &AnalysisConfig,
) -> AnalysisSummary {
    if conversation.stage() != AnalysisStage::Raw {
        debug!(
            conversation = %conversation.id(),
            stage = conversation.stage().as_str(),
            "conversation already analyzed, starting a new run"
        );
        conversation.reset_analysis();
    }

    // 1. Keep-alive classification
    let keep_alives = keep_alive_frames(conversation).len();

    // 2. Retransmission detection
    let marks = detect_retransmits(conversation);
    apply_retransmits(conversation, &marks);

    // 3. Keep-alive retransmission detection
    let ka_marks = if config.detect_keep_alive_retransmits {
        detect_keep_alive_retransmits(conversation)
    } else {
        Vec::new()
    };
    apply_keep_alive_retransmits(conversation, &ka_marks);

    // 4. Reassembly
    let plan = plan_reassembly(conversation, config);
    apply_reassembly(conversation, &plan);

    let summary = AnalysisSummary {
        conversation: conversation.id(),
        frames: conversation.len(),
        keep_alives,
        retransmits: marks.len(),
        keep_alive_retransmits: ka_marks.len(),
        messages: plan.messages.len(),
        multi_segment_messages: plan.multi_segment_count(),
        continuations: plan.continuations.len(),
    };
    debug!(
        conversation = %summary.conversation,
        frames = summary.frames,
        keep_alives = summary.keep_alives,
        retransmits = summary.retransmits,
        keep_alive_retransmits = summary.keep_alive_retransmits,
        messages = summary.messages,
        "conversation analyzed"
    );
    summary
}

/// Analyze many conversations in parallel.
///
/// Conversations share no mutable state, so each worker takes a contiguous
/// slice and runs every pass on it to completion. Summaries come back in
/// the input order.
pub fn analyze_conversations(
    conversations: &mut [Conversation],
    config: &AnalysisConfig,
) -> Vec<AnalysisSummary> {
    if conversations.is_empty() {
        return Vec::new();
    }
    let workers = config.workers.clamp(1, conversations.len());
    if workers == 1 {
        return conversations
            .iter_mut()
            .map(|c| analyze_conversation(c, config))
            .collect();
    }

    let chunk = conversations.len().div_ceil(workers);
    debug!(
        conversations = conversations.len(),
        workers, chunk, "analyzing conversations"
    );
    thread::scope(|scope| {
        let handles: Vec<_> = conversations
            .chunks_mut(chunk)
            .map(|part| {
                scope.spawn(move || {
                    part.iter_mut()
                        .map(|c| analyze_conversation(c, config))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    })
}
