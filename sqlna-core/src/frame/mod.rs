//! Per-frame data model.
//!
//! A [`Frame`] holds the immutable facts recorded when a packet was ingested
//! (identity, transport header values, payload) together with the results
//! written by the analysis passes in [`crate::analysis`]. Transport facts are
//! fixed by [`FrameBuilder`]; analysis fields are set once per analysis run.
//!
//! References between frames are [`FrameIndex`] values, positions in the
//! owning [`Conversation`](crate::Conversation)'s frame list. They are never
//! owning and always point to an earlier frame.

mod builder;
mod transport;

pub use builder::{FrameBuilder, FrameCounter};
pub use transport::{flags, Direction, SmpSession, SmpType, TcpFlags, TransportFacts, TransportKind};

use std::fmt;

use bytes::Bytes;

use crate::conversation::ConversationId;
use crate::tds::TdsHeader;

/// Position of a frame within its conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameIndex(pub usize);

impl FrameIndex {
    pub fn get(&self) -> usize {
        self.0
    }
}

impl fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Results written by the analysis passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameAnalysis {
    /// Duplicate of an earlier segment (same direction, session and seq).
    pub is_retransmit: bool,
    /// Number of later frames that duplicate this one.
    pub retransmit_count: u32,
    /// The first-seen frame this one duplicates (payload or keep-alive).
    pub original_frame: Option<FrameIndex>,
    /// Repeat of an earlier keep-alive probe.
    pub is_keep_alive_retransmit: bool,
    /// Number of later keep-alive probes repeating this one.
    pub ka_retransmit_count: u32,
    /// Payload is a non-initial fragment of a larger message.
    pub is_continuation: bool,
    /// Whole message this frame belongs to, shared by all its fragments.
    pub reassembled_payload: Option<Bytes>,
}

/// One captured packet.
#[derive(Debug, Clone)]
pub struct Frame {
    number: u32,
    timestamp_us: i64,
    frame_length: u32,
    captured_length: u32,
    transport: TransportFacts,
    payload: Bytes,
    conversation: Option<ConversationId>,
    /// Caller's own framing says this frame continues a message. Input to
    /// reassembly, so it survives an analysis reset.
    continuation_hint: bool,
    analysis: FrameAnalysis,
}

impl Frame {
    pub(crate) fn from_parts(
        number: u32,
        timestamp_us: i64,
        frame_length: u32,
        captured_length: u32,
        transport: TransportFacts,
        payload: Bytes,
        continuation_hint: bool,
    ) -> Self {
        Self {
            number,
            timestamp_us,
            frame_length,
            captured_length,
            transport,
            payload,
            conversation: None,
            continuation_hint,
            analysis: FrameAnalysis::default(),
        }
    }

    /// Capture-wide frame number.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Capture timestamp in microseconds since the Unix epoch.
    pub fn timestamp_us(&self) -> i64 {
        self.timestamp_us
    }

    pub fn frame_length(&self) -> u32 {
        self.frame_length
    }

    pub fn captured_length(&self) -> u32 {
        self.captured_length
    }

    /// Owning conversation, once the frame has been added to one.
    pub fn conversation(&self) -> Option<ConversationId> {
        self.conversation
    }

    pub(crate) fn attach(&mut self, conversation: ConversationId) {
        self.conversation = Some(conversation);
    }

    pub fn transport(&self) -> &TransportFacts {
        &self.transport
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind
    }

    pub fn is_udp(&self) -> bool {
        self.transport.kind == TransportKind::Udp
    }

    pub fn direction(&self) -> Direction {
        self.transport.direction
    }

    pub fn is_from_client(&self) -> bool {
        self.transport.direction == Direction::ToServer
    }

    pub fn seq(&self) -> u32 {
        self.transport.seq
    }

    pub fn ack(&self) -> u32 {
        self.transport.ack
    }

    pub fn flags(&self) -> TcpFlags {
        self.transport.flags
    }

    pub fn window(&self) -> u16 {
        self.transport.window
    }

    pub fn smp(&self) -> Option<SmpSession> {
        self.transport.smp
    }

    /// SMP session id, `None` when the connection is not multiplexed.
    pub fn smp_session_id(&self) -> Option<u16> {
        self.transport.smp.map(|s| s.id)
    }

    /// Offset of the last payload byte within the IP portion of the packet.
    pub fn last_byte_offset(&self) -> u16 {
        self.transport.last_byte_offset
    }

    /// IPv4 identification field; `None` for IPv6.
    pub fn packet_id(&self) -> Option<u16> {
        self.transport.packet_id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Shared handle to the payload bytes.
    pub fn payload_bytes(&self) -> &Bytes {
        &self.payload
    }

    pub fn payload_length(&self) -> usize {
        self.payload.len()
    }

    pub fn has_fin_flag(&self) -> bool {
        self.transport.flags.contains(flags::FIN)
    }

    pub fn has_syn_flag(&self) -> bool {
        self.transport.flags.contains(flags::SYN)
    }

    pub fn has_ack_flag(&self) -> bool {
        self.transport.flags.contains(flags::ACK)
    }

    pub fn has_push_flag(&self) -> bool {
        self.transport.flags.contains(flags::PSH)
    }

    pub fn has_reset_flag(&self) -> bool {
        self.transport.flags.contains(flags::RST)
    }

    /// A TCP keep-alive probe: a single zero byte with ACK only.
    pub fn is_keep_alive(&self) -> bool {
        self.payload.len() == 1
            && self.payload[0] == 0
            && self.has_ack_flag()
            && !self
                .transport
                .flags
                .contains(flags::FIN | flags::SYN | flags::RST | flags::PSH)
    }

    pub fn analysis(&self) -> &FrameAnalysis {
        &self.analysis
    }

    pub fn is_retransmit(&self) -> bool {
        self.analysis.is_retransmit
    }

    pub fn retransmit_count(&self) -> u32 {
        self.analysis.retransmit_count
    }

    pub fn original_frame(&self) -> Option<FrameIndex> {
        self.analysis.original_frame
    }

    pub fn is_keep_alive_retransmit(&self) -> bool {
        self.analysis.is_keep_alive_retransmit
    }

    pub fn ka_retransmit_count(&self) -> u32 {
        self.analysis.ka_retransmit_count
    }

    /// Set by reassembly for every non-initial fragment of a message.
    pub fn is_continuation(&self) -> bool {
        self.analysis.is_continuation
    }

    /// Whether the caller pre-marked this frame as a continuation.
    pub fn continuation_hint(&self) -> bool {
        self.continuation_hint
    }

    pub fn reassembled_payload(&self) -> Option<&[u8]> {
        self.analysis.reassembled_payload.as_deref()
    }

    pub fn reassembled_payload_length(&self) -> usize {
        self.analysis
            .reassembled_payload
            .as_ref()
            .map_or(0, |b| b.len())
    }

    /// Decode the TDS header at the start of the raw payload.
    ///
    /// The header never spans segments, so the raw payload is enough.
    pub fn tds_header(&self) -> Option<TdsHeader> {
        TdsHeader::decode(&self.payload, 0)
    }

    /// Decode the TDS header from the reassembled message, falling back to
    /// the raw payload when the frame was not reassembled.
    pub fn reassembled_tds_header(&self) -> Option<TdsHeader> {
        match &self.analysis.reassembled_payload {
            Some(buf) => TdsHeader::decode(buf, 0),
            None => self.tds_header(),
        }
    }

    /// Hint that this frame is a non-initial fragment of a larger message.
    ///
    /// Callers with their own message framing may pre-mark frames; the
    /// reassembler joins a hinted frame to the open message of its stream.
    /// The hint is kept across analysis resets.
    pub fn mark_continuation(&mut self) {
        self.continuation_hint = true;
    }

    pub(crate) fn set_continuation(&mut self) {
        self.analysis.is_continuation = true;
    }

    pub(crate) fn mark_retransmit(&mut self, original: FrameIndex) {
        debug_assert!(!self.analysis.is_retransmit, "frame {} marked twice", self.number);
        self.analysis.is_retransmit = true;
        self.analysis.original_frame = Some(original);
    }

    pub(crate) fn add_retransmit(&mut self) {
        self.analysis.retransmit_count += 1;
    }

    pub(crate) fn mark_keep_alive_retransmit(&mut self, original: FrameIndex) {
        debug_assert!(
            !self.analysis.is_keep_alive_retransmit && !self.analysis.is_retransmit,
            "frame {} marked twice",
            self.number
        );
        self.analysis.is_keep_alive_retransmit = true;
        self.analysis.original_frame = Some(original);
    }

    pub(crate) fn add_keep_alive_retransmit(&mut self) {
        self.analysis.ka_retransmit_count += 1;
    }

    pub(crate) fn set_reassembled_payload(&mut self, buf: Bytes) {
        self.analysis.reassembled_payload = Some(buf);
    }

    pub(crate) fn reset_analysis(&mut self) {
        self.analysis = FrameAnalysis::default();
    }
}
