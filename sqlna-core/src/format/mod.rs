//! Fixed-width text rendering of frames.
//!
//! Produces the two-line column header and one row per frame, laid out so
//! that listings from different runs can be diffed byte for byte.

mod columns;

pub use columns::{
    column_data, column_header, column_rule, format_flags, format_payload, format_payload_chars,
    format_time, FrameListing, PAYLOAD_PREVIEW, TIME_WIDTH,
};
