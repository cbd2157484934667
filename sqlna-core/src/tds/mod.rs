//! TDS (tabular data stream) protocol support.
//!
//! Only the fixed packet header is decoded; message bodies are left to
//! consumers of the reassembled payload.

mod header;

pub use header::{packet_type, status, PacketType, Status, TdsHeader, TDS_HEADER_SIZE};
