use crate::conversation::Conversation;
use crate::frame::FrameIndex;

/// Frames of a conversation that are TCP keep-alive probes.
///
/// Depends only on transport facts, so it can run before or alongside any
/// other pass. UDP frames never qualify (no ACK flag).
pub fn keep_alive_frames(conversation: &Conversation) -> Vec<FrameIndex> {
    conversation
        .indexed()
        .filter(|(_, frame)| frame.is_keep_alive())
        .map(|(index, _)| index)
        .collect()
}
