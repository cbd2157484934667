//! Transport-level facts recorded for a frame at ingestion time.

/// TCP flag bit positions (low byte of the TCP flags field).
#[allow(dead_code)]
pub mod flags {
    pub const FIN: u8 = 0x01;
    pub const SYN: u8 = 0x02;
    pub const RST: u8 = 0x04;
    pub const PSH: u8 = 0x08;
    pub const ACK: u8 = 0x10;
    pub const URG: u8 = 0x20;
}

/// Transport protocol carrying a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Tcp,
    Udp,
}

impl TransportKind {
    /// Return a string representation of the transport.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Tcp => "tcp",
            TransportKind::Udp => "udp",
        }
    }
}

/// Direction of a frame relative to the conversation's client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Sent by the client.
    ToServer,
    /// Sent by the server.
    ToClient,
}

impl Direction {
    /// Return a string representation of the direction.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::ToServer => "to_server",
            Direction::ToClient => "to_client",
        }
    }

    /// Single-letter sender code used in frame listings: `C` or `S`.
    pub fn sender_code(&self) -> char {
        match self {
            Direction::ToServer => 'C',
            Direction::ToClient => 'S',
        }
    }
}

/// TCP flag byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TcpFlags(u8);

impl TcpFlags {
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub const fn contains(&self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    pub fn set(mut self, bit: u8) -> Self {
        self.0 |= bit;
        self
    }
}

impl From<u8> for TcpFlags {
    fn from(bits: u8) -> Self {
        Self(bits)
    }
}

/// SMP (session multiplexing protocol) packet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SmpType {
    Syn,
    Ack,
    Fin,
    Data,
    Other(u8),
}

impl SmpType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x01 => SmpType::Syn,
            0x02 => SmpType::Ack,
            0x04 => SmpType::Fin,
            0x08 => SmpType::Data,
            other => SmpType::Other(other),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            SmpType::Syn => 0x01,
            SmpType::Ack => 0x02,
            SmpType::Fin => 0x04,
            SmpType::Data => 0x08,
            SmpType::Other(v) => *v,
        }
    }
}

/// Logical session carried over a multiplexed (MARS) TCP connection.
///
/// Frames without an SMP layer carry `None` rather than a zero session id,
/// so session 0 stays distinguishable from "no session".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SmpSession {
    pub id: u16,
    pub kind: SmpType,
}

impl SmpSession {
    pub fn new(id: u16, kind: SmpType) -> Self {
        Self { id, kind }
    }
}

/// Immutable transport facts for one frame.
///
/// For UDP frames the sequence/ack numbers, flags and window are zero and
/// there is never an SMP session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFacts {
    pub(crate) kind: TransportKind,
    pub(crate) direction: Direction,
    pub(crate) seq: u32,
    pub(crate) ack: u32,
    pub(crate) flags: TcpFlags,
    pub(crate) window: u16,
    pub(crate) smp: Option<SmpSession>,
    pub(crate) last_byte_offset: u16,
    pub(crate) packet_id: Option<u16>,
}
