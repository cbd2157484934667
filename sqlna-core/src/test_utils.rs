//! Test utilities for building conversations.
//!
//! Provides frame builders preset for common segment shapes and a TDS
//! packet generator for reassembly tests.

use crate::conversation::{Conversation, ConversationId};
use crate::frame::{flags, FrameBuilder, TransportKind};
use crate::tds::{status, TDS_HEADER_SIZE};

/// Client data segment: ACK|PSH, from the client, no payload yet.
pub fn seg(number: u32) -> FrameBuilder {
    FrameBuilder::tcp(number)
        .from_client()
        .flags(flags::ACK | flags::PSH)
        .window(8192)
}

pub fn tcp_conversation(segments: Vec<FrameBuilder>) -> Conversation {
    tcp_conversation_with_id(1, segments)
}

pub fn tcp_conversation_with_id(id: u64, segments: Vec<FrameBuilder>) -> Conversation {
    Conversation::with_frames(
        ConversationId(id),
        TransportKind::Tcp,
        segments.into_iter().map(FrameBuilder::build),
    )
    .expect("segments numbered in increasing order")
}

/// UDP conversation of client datagrams numbered from 1.
pub fn udp_conversation(payloads: Vec<Vec<u8>>) -> Conversation {
    Conversation::with_frames(
        ConversationId(1),
        TransportKind::Udp,
        payloads
            .into_iter()
            .enumerate()
            .map(|(i, p)| FrameBuilder::udp(i as u32 + 1).from_client().payload(p).build()),
    )
    .expect("datagrams numbered in increasing order")
}

/// A complete TDS packet of `total_len` bytes (header included), EOM set.
pub fn tds_packet(packet_type: u8, total_len: u16) -> Vec<u8> {
    let mut packet = Vec::with_capacity(total_len as usize);
    packet.push(packet_type);
    packet.push(status::END_OF_MESSAGE);
    packet.extend_from_slice(&total_len.to_be_bytes());
    packet.extend_from_slice(&52u16.to_be_bytes()); // spid
    packet.push(1); // packet id
    packet.push(0); // window
    let body = (total_len as usize).saturating_sub(TDS_HEADER_SIZE);
    packet.extend((0..body).map(|i| (i % 251) as u8));
    packet
}
