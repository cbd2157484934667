use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use smallvec::SmallVec;
use tracing::{trace, warn};

use super::{AnalysisConfig, AnalysisStage, StreamKey};
use crate::conversation::Conversation;
use crate::frame::{Frame, FrameIndex};
use crate::tds::TdsHeader;

/// One application message and the frames it was stitched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassembledMessage {
    /// Contributing frames in capture order; the first starts the message.
    pub frames: SmallVec<[FrameIndex; 4]>,
    /// Length declared by the TDS header of the first frame, if any.
    pub declared_length: Option<usize>,
    pub data: Bytes,
}

impl ReassembledMessage {
    /// The frame that starts the message; `None` only for a hand-built
    /// message with no frames.
    pub fn first(&self) -> Option<FrameIndex> {
        self.frames.first().copied()
    }

    pub fn is_multi_segment(&self) -> bool {
        self.frames.len() > 1
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the bytes collected match the declared length.
    pub fn is_complete(&self) -> bool {
        self.declared_length.map_or(true, |d| self.data.len() >= d)
    }
}

/// Continuation flags and messages computed for a conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReassemblyPlan {
    /// Frames that carry a non-initial fragment of a message.
    pub continuations: Vec<FrameIndex>,
    /// Messages ordered by their first frame.
    pub messages: Vec<ReassembledMessage>,
}

impl ReassemblyPlan {
    pub fn multi_segment_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_multi_segment()).count()
    }
}

/// Message being collected on one stream.
#[derive(Debug)]
struct PendingMessage {
    frames: SmallVec<[FrameIndex; 4]>,
    declared_length: Option<usize>,
    collected: usize,
}

impl PendingMessage {
    fn is_satisfied(&self) -> bool {
        self.declared_length.is_some_and(|d| self.collected >= d)
    }
}

/// Per-stream state: the open message, if any.
#[derive(Debug, Default)]
struct StreamMessages {
    open: Option<PendingMessage>,
}

/// Stitches segmented TDS messages back together.
///
/// Frames are walked in capture order per (direction, session) stream.
/// Retransmitted frames, keep-alive probes and empty segments are skipped,
/// so duplicates never contribute bytes. A frame continues the open message
/// when the caller hinted it as a continuation or, when declared lengths are
/// trusted, while the open message's TDS length is not yet covered. Only the
/// hints and transport facts are read, never earlier reassembly results.
/// A frame that starts a message is never listed as a continuation.
pub struct PayloadReassembler<'a> {
    conversation: &'a Conversation,
    config: &'a AnalysisConfig,
    streams: HashMap<StreamKey, StreamMessages>,
    plan: ReassemblyPlan,
}

impl<'a> PayloadReassembler<'a> {
    pub fn new(conversation: &'a Conversation, config: &'a AnalysisConfig) -> Self {
        Self {
            conversation,
            config,
            streams: HashMap::new(),
            plan: ReassemblyPlan::default(),
        }
    }

    /// Compute the plan. Pure: running it twice gives the same result.
    pub fn plan(mut self) -> ReassemblyPlan {
        let conversation = self.conversation;
        for (index, frame) in conversation.indexed() {
            if !contributes(frame) {
                continue;
            }
            if frame.is_udp() {
                self.finish(single(index, frame));
                continue;
            }
            self.add(index, frame);
        }

        let open: Vec<PendingMessage> = self
            .streams
            .drain()
            .filter_map(|(_, stream)| stream.open)
            .collect();
        for pending in open {
            self.close(pending);
        }

        self.plan.messages.sort_by_key(|m| m.first());
        self.plan.continuations.sort();
        self.plan
    }

    fn add(&mut self, index: FrameIndex, frame: &Frame) {
        let key = StreamKey::of(frame);
        let trust = self.config.trust_declared_length;
        let max = self.config.max_message_bytes;
        let len = frame.payload_length();

        let stream = self.streams.entry(key).or_default();
        let continues = match &stream.open {
            Some(open) => {
                frame.continuation_hint()
                    || (trust && open.declared_length.is_some_and(|d| open.collected < d))
            }
            None => false,
        };

        if continues {
            if let Some(open) = stream.open.as_mut() {
                if open.collected + len > max {
                    warn!(
                        conversation = %self.conversation.id(),
                        frame = frame.number(),
                        collected = open.collected,
                        max,
                        "message exceeds reassembly limit, starting a new one"
                    );
                } else {
                    open.frames.push(index);
                    open.collected += len;
                    self.plan.continuations.push(index);
                    if open.is_satisfied() {
                        if let Some(done) = stream.open.take() {
                            self.close(done);
                        }
                    }
                    return;
                }
            }
        }

        // Message start. This includes a hinted frame with nothing open
        // (capture began mid-message) or one pushed out by the size cap.
        if let Some(previous) = stream.open.take() {
            self.close(previous);
        }

        let declared_length = if trust {
            frame.tds_header().map(|h| h.length as usize)
        } else {
            None
        };
        let pending = PendingMessage {
            frames: SmallVec::from_elem(index, 1),
            declared_length,
            collected: len,
        };
        if pending.is_satisfied() {
            self.close(pending);
        } else {
            self.streams.entry(key).or_default().open = Some(pending);
        }
    }

    fn close(&mut self, pending: PendingMessage) {
        let conversation = self.conversation;
        let frames = conversation.frames();
        let data = if pending.frames.len() == 1 {
            frames[pending.frames[0].get()].payload_bytes().clone()
        } else {
            let mut buf = BytesMut::with_capacity(pending.collected);
            for index in &pending.frames {
                buf.extend_from_slice(frames[index.get()].payload());
            }
            trace!(
                conversation = %conversation.id(),
                first = %pending.frames[0],
                segments = pending.frames.len(),
                bytes = buf.len(),
                "reassembled message"
            );
            buf.freeze()
        };

        self.finish(ReassembledMessage {
            frames: pending.frames,
            declared_length: pending.declared_length,
            data,
        });
    }

    fn finish(&mut self, message: ReassembledMessage) {
        self.plan.messages.push(message);
    }
}

fn contributes(frame: &Frame) -> bool {
    frame.payload_length() > 0 && !frame.is_retransmit() && !frame.is_keep_alive()
}

fn single(index: FrameIndex, frame: &Frame) -> ReassembledMessage {
    ReassembledMessage {
        frames: SmallVec::from_elem(index, 1),
        declared_length: None,
        data: frame.payload_bytes().clone(),
    }
}

/// Compute the reassembly plan for a conversation.
pub fn plan_reassembly(conversation: &Conversation, config: &AnalysisConfig) -> ReassemblyPlan {
    PayloadReassembler::new(conversation, config).plan()
}

/// Write continuation flags and reassembled buffers onto the frames.
///
/// Every frame of a message shares the message's buffer. Frames with a
/// payload that belong to no message (retransmits, keep-alives) get their
/// own payload, so the reassembled length is never below the payload length.
pub fn apply_reassembly(conversation: &mut Conversation, plan: &ReassemblyPlan) {
    if conversation.stage() < AnalysisStage::Retransmits && !conversation.is_udp() {
        warn!(
            conversation = %conversation.id(),
            "reassembling before retransmit detection, duplicates may be included"
        );
    }
    for &index in &plan.continuations {
        if let Some(frame) = conversation.frame_mut(index) {
            frame.set_continuation();
        }
    }
    for message in &plan.messages {
        for &index in &message.frames {
            if let Some(frame) = conversation.frame_mut(index) {
                frame.set_reassembled_payload(message.data.clone());
            }
        }
    }
    for i in 0..conversation.len() {
        if let Some(frame) = conversation.frame_mut(FrameIndex(i)) {
            if frame.payload_length() > 0 && frame.reassembled_payload().is_none() {
                let own = frame.payload_bytes().clone();
                frame.set_reassembled_payload(own);
            }
        }
    }
    conversation.advance(AnalysisStage::Reassembled);
}

/// Decode the TDS header of each reassembled message.
pub fn message_headers(plan: &ReassemblyPlan) -> Vec<(FrameIndex, Option<TdsHeader>)> {
    plan.messages
        .iter()
        .filter_map(|m| Some((m.first()?, TdsHeader::decode(&m.data, 0))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::retransmit::{apply_retransmits, detect_retransmits};
    use crate::frame::flags;
    use crate::tds::packet_type;
    use crate::test_utils::{seg, tcp_conversation, tds_packet};

    fn reassemble(conv: &mut Conversation) -> ReassemblyPlan {
        let marks = detect_retransmits(conv);
        apply_retransmits(conv, &marks);
        let plan = plan_reassembly(conv, &AnalysisConfig::default());
        apply_reassembly(conv, &plan);
        plan
    }

    // Test 1: three segments [10, 10, 5] with declared length 25
    #[test]
    fn test_three_segment_round_trip() {
        let message = tds_packet(packet_type::SQL_BATCH, 25);
        let mut conv = tcp_conversation(vec![
            seg(1).seq(1000).payload(message[..10].to_vec()),
            seg(2).seq(1010).payload(message[10..20].to_vec()),
            seg(3).seq(1020).payload(message[20..].to_vec()),
        ]);
        let plan = reassemble(&mut conv);

        assert_eq!(plan.messages.len(), 1);
        assert_eq!(plan.continuations, vec![FrameIndex(1), FrameIndex(2)]);
        let f = conv.frames();
        assert!(!f[0].is_continuation());
        assert!(f[1].is_continuation());
        assert!(f[2].is_continuation());
        for frame in f {
            assert_eq!(frame.reassembled_payload_length(), 25);
            assert_eq!(frame.reassembled_payload(), Some(&message[..]));
        }
        assert_eq!(f[0].reassembled_tds_header().unwrap().length, 25);
    }

    // Test 2: retransmitted duplicates contribute nothing
    #[test]
    fn test_retransmits_excluded() {
        let message = tds_packet(packet_type::RPC, 30);
        let mut conv = tcp_conversation(vec![
            seg(1).seq(1).payload(message[..15].to_vec()),
            seg(2).seq(1).payload(message[..15].to_vec()),
            seg(3).seq(16).payload(message[15..].to_vec()),
        ]);
        let plan = reassemble(&mut conv);

        assert_eq!(plan.messages.len(), 1);
        assert_eq!(
            plan.messages[0].frames.as_slice(),
            &[FrameIndex(0), FrameIndex(2)]
        );
        assert_eq!(conv.frames()[0].reassembled_payload(), Some(&message[..]));
        assert!(!conv.frames()[1].is_continuation());
        // The duplicate keeps its own bytes only.
        assert_eq!(conv.frames()[1].reassembled_payload_length(), 15);
    }

    // Test 3: no header - grouping follows pre-set continuation flags
    #[test]
    fn test_flag_only_grouping() {
        let mut conv = tcp_conversation(vec![
            seg(1).seq(1).payload(b"hello ".to_vec()),
            seg(2).seq(7).payload(b"big ".to_vec()),
            seg(3).seq(11).payload(b"world".to_vec()),
            seg(4).seq(16).payload(b"next".to_vec()),
        ]);
        conv.mark_continuation(FrameIndex(1));
        conv.mark_continuation(FrameIndex(2));
        let plan = reassemble(&mut conv);

        assert_eq!(plan.messages.len(), 2);
        assert_eq!(&plan.messages[0].data[..], b"hello big world");
        assert_eq!(plan.messages[0].declared_length, None);
        assert_eq!(&plan.messages[1].data[..], b"next");
        assert!(!conv.frames()[3].is_continuation());
    }

    // Test 4: interleaved directions reassemble independently
    #[test]
    fn test_interleaved_directions() {
        let request = tds_packet(packet_type::SQL_BATCH, 20);
        let response = tds_packet(packet_type::TABULAR_RESULT, 16);
        let mut conv = tcp_conversation(vec![
            seg(1).seq(1).payload(request[..12].to_vec()),
            seg(2).from_server().seq(900).payload(response[..8].to_vec()),
            seg(3).seq(13).flags(flags::ACK),
            seg(4).seq(13).payload(request[12..].to_vec()),
            seg(5).from_server().seq(908).payload(response[8..].to_vec()),
        ]);
        let plan = reassemble(&mut conv);

        assert_eq!(plan.messages.len(), 2);
        assert_eq!(plan.messages[0].data, Bytes::from(request));
        assert_eq!(plan.messages[1].data, Bytes::from(response));
        assert_eq!(plan.multi_segment_count(), 2);
        assert_eq!(conv.frames()[2].reassembled_payload_length(), 0);
    }

    // Test 5: declared length reached - next frame starts a new message
    #[test]
    fn test_declared_length_ends_message() {
        let first = tds_packet(packet_type::SQL_BATCH, 12);
        let second = tds_packet(packet_type::SQL_BATCH, 10);
        let mut conv = tcp_conversation(vec![
            seg(1).seq(1).payload(first[..8].to_vec()),
            seg(2).seq(9).payload(first[8..].to_vec()),
            seg(3).seq(13).payload(second.clone()),
        ]);
        let plan = reassemble(&mut conv);

        assert_eq!(plan.messages.len(), 2);
        assert!(plan.messages.iter().all(|m| m.is_complete()));
        assert_eq!(conv.frames()[2].reassembled_payload(), Some(&second[..]));
    }

    // Test 6: truncated capture - best effort, shorter than declared
    #[test]
    fn test_missing_tail_is_best_effort() {
        let message = tds_packet(packet_type::SQL_BATCH, 100);
        let mut conv = tcp_conversation(vec![
            seg(1).seq(1).payload(message[..40].to_vec()),
            seg(2).seq(41).payload(message[40..70].to_vec()),
        ]);
        let plan = reassemble(&mut conv);

        assert_eq!(plan.messages.len(), 1);
        assert_eq!(plan.messages[0].len(), 70);
        assert!(!plan.messages[0].is_complete());
    }

    // Test 7: planning twice gives identical buffers
    #[test]
    fn test_idempotent() {
        let message = tds_packet(packet_type::SQL_BATCH, 25);
        let mut conv = tcp_conversation(vec![
            seg(1).seq(1).payload(message[..10].to_vec()),
            seg(2).seq(11).payload(message[10..].to_vec()),
        ]);
        let config = AnalysisConfig::default();
        let first = plan_reassembly(&conv, &config);
        apply_reassembly(&mut conv, &first);
        let second = plan_reassembly(&conv, &config);

        assert_eq!(first, second);
    }

    // Test 8: size limit starts a new message instead of growing forever
    #[test]
    fn test_max_message_bytes() {
        let mut conv = tcp_conversation(vec![
            seg(1).seq(1).payload(vec![0xAAu8; 8]),
            seg(2).seq(9).payload(vec![0xBBu8; 8]),
            seg(3).seq(17).payload(vec![0xCCu8; 8]),
        ]);
        conv.mark_continuation(FrameIndex(1));
        conv.mark_continuation(FrameIndex(2));
        let config = AnalysisConfig::default().with_max_message_bytes(16);
        let plan = plan_reassembly(&conv, &config);

        assert_eq!(plan.messages.len(), 2);
        assert_eq!(plan.messages[0].len(), 16);
        assert_eq!(plan.messages[1].len(), 8);
        // Frame 3 starts the second message, so it is not a continuation.
        assert_eq!(plan.continuations, vec![FrameIndex(1)]);

        apply_reassembly(&mut conv, &plan);
        assert!(conv.frames()[1].is_continuation());
        assert!(!conv.frames()[2].is_continuation());
        assert!(conv.frames()[2].continuation_hint());
    }

    #[test]
    fn test_untrusted_length_ignores_header() {
        let message = tds_packet(packet_type::SQL_BATCH, 20);
        let conv = tcp_conversation(vec![
            seg(1).seq(1).payload(message[..10].to_vec()),
            seg(2).seq(11).payload(message[10..].to_vec()),
        ]);
        let config = AnalysisConfig::default().with_trust_declared_length(false);
        let plan = plan_reassembly(&conv, &config);

        assert_eq!(plan.messages.len(), 2);
        assert!(plan.continuations.is_empty());
    }

    #[test]
    fn test_message_headers() {
        let message = tds_packet(packet_type::PRELOGIN, 9);
        let conv = tcp_conversation(vec![
            seg(1).seq(1).payload(message),
            seg(2).seq(10).payload(b"junk".to_vec()),
        ]);
        let plan = plan_reassembly(&conv, &AnalysisConfig::default());
        let headers = message_headers(&plan);

        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].1.map(|h| h.length), Some(9));
        assert_eq!(headers[1].1, None);
    }

    // Test 9: hinted grouping plans the same before and after it is applied
    #[test]
    fn test_hinted_plan_idempotent() {
        let mut conv = tcp_conversation(vec![
            seg(1).seq(1).payload(b"hello ".to_vec()),
            seg(2).seq(7).payload(b"big ".to_vec()).continuation(true),
            seg(3).seq(11).payload(b"world".to_vec()).continuation(true),
        ]);
        let config = AnalysisConfig::default();
        let first = plan_reassembly(&conv, &config);
        apply_reassembly(&mut conv, &first);
        conv.reset_analysis();
        let second = plan_reassembly(&conv, &config);

        assert_eq!(first, second);
        assert_eq!(&second.messages[0].data[..], b"hello big world");
    }

    // Test 10: a hint with no open message starts a message of its own
    #[test]
    fn test_hint_without_open_message() {
        let mut conv = tcp_conversation(vec![
            seg(1).seq(1).payload(b"tail".to_vec()).continuation(true),
            seg(2).seq(5).payload(b"more".to_vec()).continuation(true),
        ]);
        let plan = reassemble(&mut conv);

        assert_eq!(plan.messages.len(), 1);
        assert_eq!(plan.continuations, vec![FrameIndex(1)]);
        assert!(!conv.frames()[0].is_continuation());
        assert_eq!(conv.frames()[0].reassembled_payload(), Some(&b"tailmore"[..]));
    }

    // Test 11: hand-built plans with empty or out-of-range frames are ignored
    #[test]
    fn test_apply_hand_built_plan() {
        let mut conv = tcp_conversation(vec![seg(1).seq(1).payload(b"abc".to_vec())]);
        let empty = ReassembledMessage {
            frames: SmallVec::new(),
            declared_length: None,
            data: Bytes::new(),
        };
        assert_eq!(empty.first(), None);

        let plan = ReassemblyPlan {
            continuations: vec![FrameIndex(7)],
            messages: vec![
                empty,
                ReassembledMessage {
                    frames: SmallVec::from_elem(FrameIndex(3), 1),
                    declared_length: None,
                    data: Bytes::from_static(b"zzz"),
                },
            ],
        };
        apply_reassembly(&mut conv, &plan);

        assert_eq!(message_headers(&plan).len(), 1);
        assert!(!conv.frames()[0].is_continuation());
        assert_eq!(conv.frames()[0].reassembled_payload(), Some(&b"abc"[..]));
    }
}
