use std::fmt::{self, Write};

use chrono::DateTime;

use crate::conversation::Conversation;
use crate::frame::{flags, Frame, TcpFlags};

/// Payload bytes shown per row.
pub const PAYLOAD_PREVIEW: usize = 20;

/// Width of the time-of-day column.
pub const TIME_WIDTH: usize = 22;

/// `Jan 05 12:30:01.250000`
const TIME_FORMAT: &str = "%b %d %H:%M:%S%.6f";

const TCP_HEADER: &str = "Frame     D FrLen  CapLen Time of Day            Seq Number Ack Number Flags R C SMP   PLen  Payload Bytes - first 20                                    Payload Text";
const TCP_RULE: &str = "--------- - ------ ------ ---------------------- ---------- ---------- ----- - - ----- ----- ----------------------------------------------------------- --------------------";
const UDP_HEADER: &str = "Frame     D FrLen  CapLen Time of Day            PLen  Payload Bytes - first 20                                    Payload Text";
const UDP_RULE: &str = "--------- - ------ ------ ---------------------- ----- ----------------------------------------------------------- --------------------";

/// First header line: column titles.
pub fn column_header(is_udp: bool) -> &'static str {
    if is_udp {
        UDP_HEADER
    } else {
        TCP_HEADER
    }
}

/// Second header line: dashes under each column.
pub fn column_rule(is_udp: bool) -> &'static str {
    if is_udp {
        UDP_RULE
    } else {
        TCP_RULE
    }
}

/// Render one frame as a fixed-width row matching [`column_header`].
///
/// `is_udp` selects the layout and normally comes from the owning
/// conversation; the UDP layout drops the sequence, flag, and SMP columns.
pub fn column_data(frame: &Frame, is_udp: bool) -> String {
    let mut row = String::with_capacity(TCP_RULE.len());
    // Writing to a String cannot fail.
    let _ = write!(
        row,
        "{:>9} {}{:>7}{:>7} {}",
        frame.number(),
        frame.direction().sender_code(),
        frame.frame_length(),
        frame.captured_length(),
        format_time(frame.timestamp_us()),
    );

    if !is_udp {
        let smp = match frame.smp_session_id() {
            Some(id) => format!("{id:>6}"),
            None => " ".repeat(6),
        };
        let _ = write!(
            row,
            "{:>11}{:>11} {} {} {}{}",
            frame.seq(),
            frame.ack(),
            format_flags(frame.flags()),
            if frame.is_retransmit() { 'R' } else { ' ' },
            if frame.is_continuation() { 'C' } else { ' ' },
            smp,
        );
    }

    let _ = write!(
        row,
        "{:>6}{} {}",
        frame.payload_length(),
        format_payload(frame.payload(), PAYLOAD_PREVIEW),
        format_payload_chars(frame.payload(), PAYLOAD_PREVIEW),
    );
    row
}

/// `APRSF`, with `.` in place of each clear flag.
pub fn format_flags(bits: TcpFlags) -> String {
    [
        (flags::ACK, 'A'),
        (flags::PSH, 'P'),
        (flags::RST, 'R'),
        (flags::SYN, 'S'),
        (flags::FIN, 'F'),
    ]
    .iter()
    .map(|&(bit, c)| if bits.contains(bit) { c } else { '.' })
    .collect()
}

/// Capture time in UTC, always [`TIME_WIDTH`] characters wide.
pub fn format_time(timestamp_us: i64) -> String {
    match DateTime::from_timestamp_micros(timestamp_us) {
        Some(ts) => ts.format(TIME_FORMAT).to_string(),
        None => format!("{:<width$}", "?", width = TIME_WIDTH),
    }
}

/// The first `n` bytes as ` XX` hex, padded with spaces to `3 * n`.
pub fn format_payload(payload: &[u8], n: usize) -> String {
    let mut s = String::with_capacity(n * 3);
    for b in payload.iter().take(n) {
        let _ = write!(s, " {b:02X}");
    }
    format!("{:<width$}", s, width = n * 3)
}

/// The first `n` bytes as text; bytes outside printable ASCII become `.`.
pub fn format_payload_chars(payload: &[u8], n: usize) -> String {
    payload
        .iter()
        .take(n)
        .map(|&b| if (32..=126).contains(&b) { b as char } else { '.' })
        .collect()
}

/// Displays a whole conversation: both header lines, then one row per frame.
pub struct FrameListing<'a>(pub &'a Conversation);

impl fmt::Display for FrameListing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let is_udp = self.0.is_udp();
        writeln!(f, "{}", column_header(is_udp))?;
        writeln!(f, "{}", column_rule(is_udp))?;
        for frame in self.0.frames() {
            writeln!(f, "{}", column_data(frame, is_udp))?;
        }
        Ok(())
    }
}
