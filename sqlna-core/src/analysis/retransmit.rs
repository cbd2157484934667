use std::collections::HashMap;

use tracing::{debug, trace};

use super::{AnalysisStage, StreamKey};
use crate::conversation::Conversation;
use crate::frame::{Frame, FrameIndex};

/// A frame found to duplicate an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetransmitMark {
    pub frame: FrameIndex,
    pub original: FrameIndex,
}

/// Whether a frame takes part in sequence-number duplicate detection.
///
/// Only frames occupying sequence space count: data segments, and SYN/FIN
/// which consume one sequence number each. Keep-alive probes are left to
/// the keep-alive detector so the two detectors never see the same frame.
pub fn participates(frame: &Frame) -> bool {
    if frame.is_udp() || frame.is_keep_alive() {
        return false;
    }
    frame.payload_length() > 0 || frame.has_syn_flag() || frame.has_fin_flag()
}

/// Tracks the first frame seen at each sequence number, per stream.
#[derive(Debug, Default)]
pub struct RetransmitDetector {
    originals: HashMap<(StreamKey, u32), FrameIndex>,
}

impl RetransmitDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next frame in capture order.
    ///
    /// Returns the original frame when this one repeats a sequence number
    /// already seen on the same stream; the first frame seen always wins.
    pub fn observe(&mut self, index: FrameIndex, frame: &Frame) -> Option<FrameIndex> {
        if !participates(frame) {
            return None;
        }
        let key = (StreamKey::of(frame), frame.seq());
        match self.originals.get(&key) {
            Some(&original) => Some(original),
            None => {
                self.originals.insert(key, index);
                None
            }
        }
    }

    /// Number of distinct (stream, sequence number) originals recorded.
    pub fn tracked(&self) -> usize {
        self.originals.len()
    }
}

/// Find every retransmitted frame in a conversation without modifying it.
pub fn detect_retransmits(conversation: &Conversation) -> Vec<RetransmitMark> {
    let mut detector = RetransmitDetector::new();
    conversation
        .indexed()
        .filter_map(|(index, frame)| {
            detector
                .observe(index, frame)
                .map(|original| RetransmitMark {
                    frame: index,
                    original,
                })
        })
        .collect()
}

/// Write retransmit marks onto the frames and bump the originals' counts.
///
/// A mark is skipped unless it points backward to an existing frame that is
/// not already a retransmit, so applying the same marks twice changes nothing.
pub fn apply_retransmits(conversation: &mut Conversation, marks: &[RetransmitMark]) {
    for mark in marks {
        let applicable = mark.original < mark.frame
            && conversation
                .frame(mark.frame)
                .is_some_and(|f| !f.is_retransmit());
        if !applicable {
            debug!(
                conversation = %conversation.id(),
                frame = %mark.frame,
                original = %mark.original,
                "skipping retransmit mark"
            );
            continue;
        }
        trace!(
            conversation = %conversation.id(),
            frame = %mark.frame,
            original = %mark.original,
            "retransmit"
        );
        if let Some(frame) = conversation.frame_mut(mark.frame) {
            frame.mark_retransmit(mark.original);
        }
        if let Some(original) = conversation.frame_mut(mark.original) {
            original.add_retransmit();
        }
    }
    conversation.advance(AnalysisStage::Retransmits);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{flags, SmpType};
    use crate::test_utils::{seg, tcp_conversation};

    fn run(conv: &mut Conversation) -> Vec<RetransmitMark> {
        let marks = detect_retransmits(conv);
        apply_retransmits(conv, &marks);
        marks
    }

    // Test 1: seq [100, 100, 150, 100] -> frames 2 and 4 duplicate frame 1
    #[test]
    fn test_duplicate_sequence_numbers() {
        let mut conv = tcp_conversation(vec![
            seg(1).seq(100).payload(vec![b'a'; 50]),
            seg(2).seq(100).payload(vec![b'a'; 50]),
            seg(3).seq(150).payload(vec![b'b'; 20]),
            seg(4).seq(100).payload(vec![b'a'; 50]),
        ]);
        run(&mut conv);

        let f = conv.frames();
        assert!(!f[0].is_retransmit());
        assert_eq!(f[0].retransmit_count(), 2);
        assert!(f[1].is_retransmit());
        assert_eq!(f[1].original_frame(), Some(FrameIndex(0)));
        assert!(!f[2].is_retransmit());
        assert_eq!(f[2].retransmit_count(), 0);
        assert!(f[3].is_retransmit());
        assert_eq!(f[3].original_frame(), Some(FrameIndex(0)));
    }

    // Test 2: directions are tracked separately
    #[test]
    fn test_direction_separates_streams() {
        let mut conv = tcp_conversation(vec![
            seg(1).seq(100).payload(b"abc".to_vec()),
            seg(2).from_server().seq(100).payload(b"abc".to_vec()),
        ]);
        assert!(run(&mut conv).is_empty());
    }

    // Test 3: SMP sessions are tracked separately, and "no session" differs
    // from session 0
    #[test]
    fn test_smp_session_separates_streams() {
        let mut conv = tcp_conversation(vec![
            seg(1).seq(100).smp(0, SmpType::Data).payload(b"abc".to_vec()),
            seg(2).seq(100).smp(1, SmpType::Data).payload(b"abc".to_vec()),
            seg(3).seq(100).payload(b"abc".to_vec()),
            seg(4).seq(100).smp(1, SmpType::Data).payload(b"abc".to_vec()),
        ]);
        let marks = run(&mut conv);

        assert_eq!(
            marks,
            vec![RetransmitMark {
                frame: FrameIndex(3),
                original: FrameIndex(1)
            }]
        );
    }

    // Test 4: pure ACKs and keep-alives do not participate
    #[test]
    fn test_pure_ack_and_keep_alive_skipped() {
        let mut conv = tcp_conversation(vec![
            seg(1).seq(100).flags(flags::ACK),
            seg(2).seq(100).flags(flags::ACK),
            seg(3).seq(99).flags(flags::ACK).payload(vec![0u8]),
            seg(4).seq(99).flags(flags::ACK).payload(vec![0u8]),
        ]);
        assert!(run(&mut conv).is_empty());
        assert!(conv.frames().iter().all(|f| f.original_frame().is_none()));
    }

    // Test 5: repeated SYN and FIN are retransmits
    #[test]
    fn test_syn_fin_participate() {
        let mut conv = tcp_conversation(vec![
            seg(1).seq(5000).flags(flags::SYN),
            seg(2).seq(5000).flags(flags::SYN),
            seg(3).seq(5001).flags(flags::ACK | flags::FIN),
            seg(4).seq(5001).flags(flags::ACK | flags::FIN),
        ]);
        let marks = run(&mut conv);

        assert_eq!(marks.len(), 2);
        assert_eq!(conv.frames()[0].retransmit_count(), 1);
        assert_eq!(conv.frames()[2].retransmit_count(), 1);
    }

    // Test 6: partial overlap is not an exact sequence match
    #[test]
    fn test_partial_overlap_not_flagged() {
        let mut conv = tcp_conversation(vec![
            seg(1).seq(100).payload(vec![1u8; 10]),
            seg(2).seq(105).payload(vec![1u8; 10]),
        ]);
        assert!(run(&mut conv).is_empty());
    }

    // Test 7: out-of-order arrival - first seen wins even with a higher seq
    #[test]
    fn test_first_seen_wins() {
        let mut conv = tcp_conversation(vec![
            seg(1).seq(200).payload(vec![2u8; 10]),
            seg(2).seq(100).payload(vec![1u8; 100]),
            seg(3).seq(200).payload(vec![9u8; 10]),
        ]);
        let marks = run(&mut conv);
        assert_eq!(
            marks,
            vec![RetransmitMark {
                frame: FrameIndex(2),
                original: FrameIndex(0)
            }]
        );
    }

    #[test]
    fn test_udp_never_participates() {
        let conv = crate::test_utils::udp_conversation(vec![b"a".to_vec(), b"a".to_vec()]);
        assert!(detect_retransmits(&conv).is_empty());
    }

    // Test 8: re-applying marks, or applying bogus ones, is a no-op
    #[test]
    fn test_apply_skips_stale_marks() {
        let mut conv = tcp_conversation(vec![
            seg(1).seq(100).payload(b"abc".to_vec()),
            seg(2).seq(100).payload(b"abc".to_vec()),
        ]);
        let marks = run(&mut conv);
        apply_retransmits(&mut conv, &marks);
        apply_retransmits(
            &mut conv,
            &[
                RetransmitMark {
                    frame: FrameIndex(0),
                    original: FrameIndex(1),
                },
                RetransmitMark {
                    frame: FrameIndex(9),
                    original: FrameIndex(0),
                },
            ],
        );

        assert_eq!(conv.frames()[0].retransmit_count(), 1);
        assert!(!conv.frames()[0].is_retransmit());
        assert_eq!(conv.frames()[1].original_frame(), Some(FrameIndex(0)));
    }

    #[test]
    fn test_detector_tracks_originals() {
        let conv = tcp_conversation(vec![
            seg(1).seq(1).payload(b"x".to_vec()),
            seg(2).seq(2).payload(b"y".to_vec()),
            seg(3).seq(1).payload(b"x".to_vec()),
        ]);
        let mut detector = RetransmitDetector::new();
        let found: Vec<_> = conv
            .indexed()
            .map(|(i, f)| detector.observe(i, f))
            .collect();
        assert_eq!(found, vec![None, None, Some(FrameIndex(0))]);
        assert_eq!(detector.tracked(), 2);
    }
}
