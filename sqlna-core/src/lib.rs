//! # sqlna-core
//!
//! Frame-level analysis of captured SQL Server (TDS) traffic.
//!
//! Ingestion hands this crate conversations: ordered frames of one TCP or
//! UDP connection with their transport facts already decoded. The crate
//! then classifies keep-alive probes, detects retransmitted segments and
//! repeated keep-alives, reassembles TDS messages that span segments, and
//! renders frames as fixed-width text.
//!
//! ## Quick Start
//!
//! ```rust
//! use sqlna_core::prelude::*;
//!
//! let mut counter = FrameCounter::new();
//! let mut conv = Conversation::tcp(7);
//! let frame = FrameBuilder::tcp(counter.next_number())
//!     .from_client()
//!     .seq(1)
//!     .flags(flags::ACK | flags::PSH)
//!     .payload(vec![0x01, 0x01, 0x00, 0x0A, 0x00, 0x34, 0x01, 0x00, b'h', b'i'])
//!     .build();
//! conv.push(frame)?;
//!
//! analyze_conversation(&mut conv, &AnalysisConfig::default());
//!
//! let header = conv.frames()[0].tds_header().unwrap();
//! assert_eq!(header.packet_type, PacketType::SqlBatch);
//! assert_eq!(conv.frames()[0].reassembled_payload_length(), 10);
//! println!("{}", FrameListing(&conv));
//! # Ok::<(), sqlna_core::Error>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                          sqlna-core                                 |
//! +---------------------------------------------------------------------+
//! |  frame/         - Frame, transport facts, FrameBuilder, FrameCounter |
//! |  conversation   - ordered frames of one connection                  |
//! |  tds/           - 8-byte TDS packet header                          |
//! |  analysis/      - keep-alive, retransmit, reassembly passes         |
//! |  format/        - fixed-width column rendering                      |
//! |  error          - Error types                                       |
//! +---------------------------------------------------------------------+
//! ```

pub mod analysis;
pub mod conversation;
pub mod error;
pub mod format;
pub mod frame;
pub mod prelude;
pub mod tds;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types at crate root for convenience
pub use analysis::{
    analyze_conversation, analyze_conversations, AnalysisConfig, AnalysisStage, AnalysisSummary,
    StreamKey,
};
pub use conversation::{Conversation, ConversationId};
pub use error::{Error, FrameError, ProtocolError, Result};
pub use format::{column_data, column_header, column_rule, FrameListing};
pub use frame::{
    Direction, Frame, FrameAnalysis, FrameBuilder, FrameCounter, FrameIndex, SmpSession, SmpType,
    TcpFlags, TransportKind,
};
pub use tds::{PacketType, Status, TdsHeader, TDS_HEADER_SIZE};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
