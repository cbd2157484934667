//! Per-conversation analysis passes.
//!
//! Four passes run over a conversation's frames, in this order:
//!
//! 1. [`keep_alive_frames`] - classify TCP keep-alive probes
//! 2. [`detect_retransmits`] - duplicate segments per direction and session
//! 3. [`detect_keep_alive_retransmits`] - repeated keep-alive probes
//! 4. [`plan_reassembly`] - continuation marking and message reassembly
//!
//! Each pass is split into a pure detection step that returns what it found
//! and an `apply_*` step that writes the results onto the frames. The
//! conversation's [`AnalysisStage`] records which passes have been applied.
//! [`analyze_conversation`] runs the whole pipeline; [`analyze_conversations`]
//! spreads independent conversations over worker threads.
//!
//! ## Example
//!
//! ```rust
//! use sqlna_core::analysis::{analyze_conversation, AnalysisConfig};
//! use sqlna_core::frame::{flags, FrameBuilder, FrameCounter};
//! use sqlna_core::Conversation;
//!
//! let mut counter = FrameCounter::new();
//! let mut conv = Conversation::tcp(1);
//! for _ in 0..2 {
//!     let frame = FrameBuilder::tcp(counter.next_number())
//!         .seq(100)
//!         .flags(flags::ACK | flags::PSH)
//!         .payload(&b"select 1"[..])
//!         .build();
//!     conv.push(frame).unwrap();
//! }
//!
//! let summary = analyze_conversation(&mut conv, &AnalysisConfig::default());
//! assert_eq!(summary.retransmits, 1);
//! assert!(conv.frames()[1].is_retransmit());
//! ```

mod keepalive;
mod keepalive_retransmit;
mod pipeline;
mod reassembly;
mod retransmit;

pub use keepalive::keep_alive_frames;
pub use keepalive_retransmit::{
    apply_keep_alive_retransmits, detect_keep_alive_retransmits, KeepAliveMark,
};
pub use pipeline::{analyze_conversation, analyze_conversations, AnalysisConfig, AnalysisSummary};
pub use reassembly::{
    apply_reassembly, message_headers, plan_reassembly, PayloadReassembler, ReassembledMessage,
    ReassemblyPlan,
};
pub use retransmit::{
    apply_retransmits, detect_retransmits, participates, RetransmitDetector, RetransmitMark,
};

use crate::frame::{Direction, Frame};

/// One direction of one logical session within a conversation.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct StreamKey {
    pub direction: Direction,
    /// SMP session id; `None` when the connection is not multiplexed.
    pub session: Option<u16>,
}

impl StreamKey {
    pub fn of(frame: &Frame) -> Self {
        Self {
            direction: frame.direction(),
            session: frame.smp_session_id(),
        }
    }
}

/// Passes applied to a conversation so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AnalysisStage {
    /// Only transport facts are set.
    Raw,
    Retransmits,
    KeepAliveRetransmits,
    Reassembled,
}

impl AnalysisStage {
    /// Return a string representation of the stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStage::Raw => "raw",
            AnalysisStage::Retransmits => "retransmits",
            AnalysisStage::KeepAliveRetransmits => "keep_alive_retransmits",
            AnalysisStage::Reassembled => "reassembled",
        }
    }
}
