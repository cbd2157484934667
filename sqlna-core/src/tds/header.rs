//! TDS packet header decoder.
//!
//! Every TDS packet starts with an 8-byte header:
//!
//! ```text
//! +------+--------+-------------+-----------+--------+--------+
//! | type | status | length (BE) | spid (BE) | pkt id | window |
//! +------+--------+-------------+-----------+--------+--------+
//!    1       1          2             2          1        1
//! ```
//!
//! The header always lies within the first transport segment of a packet,
//! so raw frame payloads decode without reassembly.

use crate::error::ProtocolError;

/// TDS packet header size.
pub const TDS_HEADER_SIZE: usize = 8;

const PROTOCOL: &str = "TDS";

/// TDS packet types.
#[allow(dead_code)]
pub mod packet_type {
    pub const SQL_BATCH: u8 = 1;
    pub const PRE_TDS7_LOGIN: u8 = 2;
    pub const RPC: u8 = 3;
    pub const TABULAR_RESULT: u8 = 4;
    pub const ATTENTION: u8 = 6;
    pub const BULK_LOAD: u8 = 7;
    pub const FEDAUTH_TOKEN: u8 = 8;
    pub const TRANSACTION_MANAGER: u8 = 14;
    pub const TDS7_LOGIN: u8 = 16;
    pub const SSPI: u8 = 17;
    pub const PRELOGIN: u8 = 18;
}

/// TDS status bits.
#[allow(dead_code)]
pub mod status {
    pub const END_OF_MESSAGE: u8 = 0x01;
    pub const IGNORE: u8 = 0x02;
    pub const RESET_CONNECTION: u8 = 0x08;
    pub const RESET_CONNECTION_SKIP_TRAN: u8 = 0x10;
    /// Bits no TDS version assigns.
    pub const RESERVED: u8 = 0xE0;
}

/// Decoded TDS message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    SqlBatch,
    PreTds7Login,
    Rpc,
    TabularResult,
    Attention,
    BulkLoad,
    FedAuthToken,
    TransactionManager,
    Tds7Login,
    Sspi,
    Prelogin,
}

impl PacketType {
    pub fn from_u8(value: u8) -> Option<Self> {
        use packet_type::*;
        Some(match value {
            SQL_BATCH => PacketType::SqlBatch,
            PRE_TDS7_LOGIN => PacketType::PreTds7Login,
            RPC => PacketType::Rpc,
            TABULAR_RESULT => PacketType::TabularResult,
            ATTENTION => PacketType::Attention,
            BULK_LOAD => PacketType::BulkLoad,
            FEDAUTH_TOKEN => PacketType::FedAuthToken,
            TRANSACTION_MANAGER => PacketType::TransactionManager,
            TDS7_LOGIN => PacketType::Tds7Login,
            SSPI => PacketType::Sspi,
            PRELOGIN => PacketType::Prelogin,
            _ => return None,
        })
    }

    pub fn as_u8(&self) -> u8 {
        use packet_type::*;
        match self {
            PacketType::SqlBatch => SQL_BATCH,
            PacketType::PreTds7Login => PRE_TDS7_LOGIN,
            PacketType::Rpc => RPC,
            PacketType::TabularResult => TABULAR_RESULT,
            PacketType::Attention => ATTENTION,
            PacketType::BulkLoad => BULK_LOAD,
            PacketType::FedAuthToken => FEDAUTH_TOKEN,
            PacketType::TransactionManager => TRANSACTION_MANAGER,
            PacketType::Tds7Login => TDS7_LOGIN,
            PacketType::Sspi => SSPI,
            PacketType::Prelogin => PRELOGIN,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PacketType::SqlBatch => "sql_batch",
            PacketType::PreTds7Login => "pre_tds7_login",
            PacketType::Rpc => "rpc",
            PacketType::TabularResult => "tabular_result",
            PacketType::Attention => "attention",
            PacketType::BulkLoad => "bulk_load",
            PacketType::FedAuthToken => "fedauth_token",
            PacketType::TransactionManager => "transaction_manager",
            PacketType::Tds7Login => "tds7_login",
            PacketType::Sspi => "sspi",
            PacketType::Prelogin => "prelogin",
        }
    }
}

/// Status byte of a TDS header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub u8);

impl Status {
    /// Last packet of the message.
    pub fn is_end_of_message(&self) -> bool {
        self.0 & status::END_OF_MESSAGE != 0
    }

    pub fn is_ignore(&self) -> bool {
        self.0 & status::IGNORE != 0
    }

    pub fn resets_connection(&self) -> bool {
        self.0 & (status::RESET_CONNECTION | status::RESET_CONNECTION_SKIP_TRAN) != 0
    }
}

/// Decoded TDS packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TdsHeader {
    pub packet_type: PacketType,
    pub status: Status,
    /// Total packet length including this header.
    pub length: u16,
    /// Server process id of the session.
    pub spid: u16,
    pub packet_id: u8,
    pub window: u8,
}

impl TdsHeader {
    /// Decode a header at `offset`, returning `None` when there is no valid
    /// header there. Never panics, whatever the input.
    pub fn decode(buf: &[u8], offset: usize) -> Option<Self> {
        let data = buf.get(offset..)?;
        Self::parse(data).ok()
    }

    /// Parse a header from the start of `data`, reporting why it failed.
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < TDS_HEADER_SIZE {
            return Err(ProtocolError::PacketTooShort {
                protocol: PROTOCOL,
                needed: TDS_HEADER_SIZE,
                have: data.len(),
            });
        }

        let packet_type =
            PacketType::from_u8(data[0]).ok_or_else(|| ProtocolError::InvalidField {
                protocol: PROTOCOL,
                field: "type",
                reason: format!("unknown packet type {:#04x}", data[0]),
            })?;

        let status_bits = data[1];
        if status_bits & status::RESERVED != 0 {
            return Err(ProtocolError::InvalidField {
                protocol: PROTOCOL,
                field: "status",
                reason: format!("reserved bits set in {status_bits:#04x}"),
            });
        }

        let length = u16::from_be_bytes([data[2], data[3]]);
        if (length as usize) < TDS_HEADER_SIZE {
            return Err(ProtocolError::InvalidField {
                protocol: PROTOCOL,
                field: "length",
                reason: format!("{length} is shorter than the header"),
            });
        }

        Ok(Self {
            packet_type,
            status: Status(status_bits),
            length,
            spid: u16::from_be_bytes([data[4], data[5]]),
            packet_id: data[6],
            window: data[7],
        })
    }

    /// Bytes following the header, as declared by `length`.
    pub fn payload_bytes(&self) -> usize {
        (self.length as usize).saturating_sub(TDS_HEADER_SIZE)
    }

    /// Encode back to wire form.
    pub fn to_bytes(&self) -> [u8; TDS_HEADER_SIZE] {
        let len = self.length.to_be_bytes();
        let spid = self.spid.to_be_bytes();
        [
            self.packet_type.as_u8(),
            self.status.0,
            len[0],
            len[1],
            spid[0],
            spid[1],
            self.packet_id,
            self.window,
        ]
    }
}
