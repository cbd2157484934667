//! Error types for sqlna-core.
//!
//! This module provides structured error types for sqlna-core operations:
//!
//! - [`enum@Error`] - Main error enum that wraps all error types
//! - [`FrameError`] - Errors from building conversations out of frames
//! - [`ProtocolError`] - Errors from TDS header parsing
//!
//! Per-frame decode failures never surface through the analysis passes: a
//! frame whose payload does not carry a valid TDS header simply reports no
//! header. [`ProtocolError`] is only returned by the explicit
//! [`TdsHeader::parse`](crate::tds::TdsHeader::parse) entry point.

use thiserror::Error;

/// Main error type for sqlna-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Error while assembling a conversation
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Error during TDS header parsing
    #[error("Protocol parse error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Errors related to adding frames to a conversation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Frame numbers must strictly increase within a conversation
    #[error("Frame {got} added after frame {previous}: frame numbers must strictly increase")]
    OutOfOrder { previous: u32, got: u32 },

    /// A TCP frame was added to a UDP conversation or vice versa
    #[error("Frame {frame}: {frame_transport} frame in a {conversation_transport} conversation")]
    TransportMismatch {
        frame: u32,
        frame_transport: &'static str,
        conversation_transport: &'static str,
    },
}

/// Errors related to protocol parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer too short for protocol header
    #[error("{protocol}: packet too short (need {needed} bytes, have {have})")]
    PacketTooShort {
        protocol: &'static str,
        needed: usize,
        have: usize,
    },

    /// Invalid header field value
    #[error("{protocol}: invalid {field}: {reason}")]
    InvalidField {
        protocol: &'static str,
        field: &'static str,
        reason: String,
    },
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
