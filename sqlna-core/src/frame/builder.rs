use bytes::Bytes;

use super::transport::{Direction, SmpSession, SmpType, TcpFlags, TransportFacts, TransportKind};
use super::Frame;

/// Capture-wide frame numbering.
///
/// Owned by the ingestion stage and handed out one number per frame, so
/// numbering is explicit state rather than a global.
#[derive(Debug, Clone)]
pub struct FrameCounter {
    next: u32,
}

impl FrameCounter {
    /// Start numbering at 1, matching capture tools.
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn starting_at(first: u32) -> Self {
        Self { next: first }
    }

    /// Hand out the next frame number.
    pub fn next_number(&mut self) -> u32 {
        let n = self.next;
        self.next = self.next.wrapping_add(1);
        n
    }

    /// Number the next call will return.
    pub fn peek(&self) -> u32 {
        self.next
    }
}

impl Default for FrameCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`Frame`] transport facts.
///
/// A frame is constructed once, fully, at ingestion. For UDP frames the TCP
/// specific setters are ignored and the fields stay zero.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    number: u32,
    timestamp_us: i64,
    frame_length: Option<u32>,
    captured_length: Option<u32>,
    kind: TransportKind,
    direction: Direction,
    seq: u32,
    ack: u32,
    flags: TcpFlags,
    window: u16,
    smp: Option<SmpSession>,
    last_byte_offset: Option<u16>,
    packet_id: Option<u16>,
    payload: Bytes,
    continuation: bool,
}

impl FrameBuilder {
    fn new(number: u32, kind: TransportKind) -> Self {
        Self {
            number,
            timestamp_us: 0,
            frame_length: None,
            captured_length: None,
            kind,
            direction: Direction::ToServer,
            seq: 0,
            ack: 0,
            flags: TcpFlags::default(),
            window: 0,
            smp: None,
            last_byte_offset: None,
            packet_id: None,
            payload: Bytes::new(),
            continuation: false,
        }
    }

    pub fn tcp(number: u32) -> Self {
        Self::new(number, TransportKind::Tcp)
    }

    pub fn udp(number: u32) -> Self {
        Self::new(number, TransportKind::Udp)
    }

    pub fn timestamp_us(mut self, ts: i64) -> Self {
        self.timestamp_us = ts;
        self
    }

    pub fn frame_length(mut self, len: u32) -> Self {
        self.frame_length = Some(len);
        self
    }

    pub fn captured_length(mut self, len: u32) -> Self {
        self.captured_length = Some(len);
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn from_client(self) -> Self {
        self.direction(Direction::ToServer)
    }

    pub fn from_server(self) -> Self {
        self.direction(Direction::ToClient)
    }

    pub fn seq(mut self, seq: u32) -> Self {
        self.seq = seq;
        self
    }

    pub fn ack(mut self, ack: u32) -> Self {
        self.ack = ack;
        self
    }

    pub fn flags(mut self, bits: u8) -> Self {
        self.flags = TcpFlags::from_bits(bits);
        self
    }

    pub fn window(mut self, window: u16) -> Self {
        self.window = window;
        self
    }

    pub fn smp(mut self, id: u16, kind: SmpType) -> Self {
        self.smp = Some(SmpSession::new(id, kind));
        self
    }

    pub fn last_byte_offset(mut self, offset: u16) -> Self {
        self.last_byte_offset = Some(offset);
        self
    }

    pub fn packet_id(mut self, id: u16) -> Self {
        self.packet_id = Some(id);
        self
    }

    pub fn payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Pre-mark the frame as continuing the previous message of its stream.
    pub fn continuation(mut self, hint: bool) -> Self {
        self.continuation = hint;
        self
    }

    pub fn build(self) -> Frame {
        let payload_len = self.payload.len() as u32;
        let (seq, ack, flags, window, smp) = match self.kind {
            TransportKind::Tcp => (self.seq, self.ack, self.flags, self.window, self.smp),
            TransportKind::Udp => (0, 0, TcpFlags::default(), 0, None),
        };
        let frame_length = self.frame_length.unwrap_or(payload_len);
        let transport = TransportFacts {
            kind: self.kind,
            direction: self.direction,
            seq,
            ack,
            flags,
            window,
            smp,
            last_byte_offset: self
                .last_byte_offset
                .unwrap_or_else(|| u16::try_from(payload_len).unwrap_or(u16::MAX)),
            packet_id: self.packet_id,
        };

        Frame::from_parts(
            self.number,
            self.timestamp_us,
            frame_length,
            self.captured_length.unwrap_or(frame_length),
            transport,
            self.payload,
            self.continuation,
        )
    }
}
