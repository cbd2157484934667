//! Convenient re-exports for common usage.
//!
//! # Example
//!
//! ```rust
//! use sqlna_core::prelude::*;
//!
//! let frame = FrameBuilder::tcp(1).flags(flags::ACK).payload(vec![0u8]).build();
//! assert!(frame.is_keep_alive());
//! ```

// Frame and conversation types
pub use crate::conversation::{Conversation, ConversationId};
pub use crate::frame::{
    flags, Direction, Frame, FrameBuilder, FrameCounter, FrameIndex, SmpType, TransportKind,
};

// TDS
pub use crate::tds::{PacketType, TdsHeader};

// Analysis
pub use crate::analysis::{
    analyze_conversation, analyze_conversations, AnalysisConfig, AnalysisStage, AnalysisSummary,
};

// Rendering
pub use crate::format::FrameListing;

// Error types
pub use crate::error::{Error, Result};
