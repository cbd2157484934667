//! Fuzz target for the full analysis pipeline.
//!
//! Fuzz input is cut into frame records:
//! - byte 0: TCP flags (low 5 bits), direction (0x80), SMP session (0x40)
//! - bytes 1-2: sequence number (low 16 bits, to force collisions)
//! - byte 3: payload length (mod 64)
//! - payload bytes
//!
//! After analysis every frame must satisfy the pipeline invariants, and
//! rendering must not panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sqlna_core::{
    analyze_conversation, AnalysisConfig, Conversation, FrameBuilder, FrameListing, SmpType,
};

fuzz_target!(|data: &[u8]| {
    let mut conv = Conversation::tcp(1);
    let mut rest = data;
    let mut number = 1u32;

    while rest.len() >= 4 {
        let control = rest[0];
        let seq = u16::from_be_bytes([rest[1], rest[2]]) as u32;
        let len = (rest[3] as usize % 64).min(rest.len() - 4);
        let payload = rest[4..4 + len].to_vec();
        rest = &rest[4 + len..];

        let mut builder = FrameBuilder::tcp(number)
            .seq(seq)
            .flags(control & 0x1F)
            .payload(payload);
        if control & 0x80 != 0 {
            builder = builder.from_server();
        }
        if control & 0x40 != 0 {
            builder = builder.smp(u16::from(control & 0x03), SmpType::Data);
        }
        if conv.push(builder.build()).is_err() {
            return;
        }
        number += 1;
    }

    let config = AnalysisConfig::default()
        .with_workers(1)
        .with_max_message_bytes(4096);
    analyze_conversation(&mut conv, &config);

    for (index, frame) in conv.indexed() {
        assert!(!(frame.is_retransmit() && frame.is_keep_alive_retransmit()));
        assert!(frame.reassembled_payload_length() >= frame.payload_length());
        if let Some(original) = frame.original_frame() {
            assert!(original < index);
        }
    }

    let _ = FrameListing(&conv).to_string();
});
