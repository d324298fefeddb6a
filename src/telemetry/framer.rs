//! Stream reassembler for the pod link.
//!
//! The transport delivers text in small chunks (historically ~20 characters)
//! at arbitrary boundaries. Two framings coexist on the same stream:
//!
//! * ASCII packets (`L`, `T`, `S` leader) cut at their terminator, found by
//!   the automaton in [`super::terminator`] right after the fixed-width body;
//! * JSON objects cut at the matching closing brace;
//!
//! and a newline always ends whatever message precedes it. Text left on a
//! line after a framed message is dropped when the newline arrives.
//!
//! The reassembler owns its buffer; [`StreamReassembler::feed`] is the only
//! way to mutate it. Junk in front of a recognizable leader is dropped, and a
//! leader whose tail turns out malformed is skipped up to the next leader.
//! Characters dropped that way count toward the buffer cap until the next
//! message is framed, so a stream that never frames anything is cleared in
//! one go once the cap is exceeded.

use log::{debug, trace, warn};

use super::crc8;
use super::packet::{body_len, PacketKind};
use super::terminator::{scan_tail, TailScan};
use crate::logutil::escape_log;

/// Hard cap of the decode buffer, in characters.
pub const DEFAULT_BUFFER_CAP: usize = 10_000;

/// Size of the retransmission guard window.
pub const DEFAULT_DUPLICATE_WINDOW: usize = 20;

const LEADERS: [u8; 4] = [b'L', b'T', b'S', b'{'];

fn is_leader(c: char) -> bool {
    c.is_ascii() && LEADERS.contains(&(c as u8))
}

/// One framed message, ready for the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompleteMessage {
    Packet(String),
    Json(String),
}

impl CompleteMessage {
    pub fn as_str(&self) -> &str {
        match self {
            CompleteMessage::Packet(text) | CompleteMessage::Json(text) => text,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            CompleteMessage::Packet(text) | CompleteMessage::Json(text) => text,
        }
    }
}

/// Outcome of one [`StreamReassembler::feed`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedResult {
    /// Messages in the order their boundaries appeared in the stream.
    pub messages: Vec<CompleteMessage>,
    /// Set when the buffer was cleared for exceeding its cap; holds the number
    /// of characters that went through without framing a message.
    pub overflowed: Option<usize>,
    /// A retransmitted chunk was detected and dropped.
    pub duplicate_trimmed: bool,
    /// Characters thrown away by this call: junk, broken packets, a repeated
    /// chunk, or the buffer cleared on overflow.
    pub skipped: usize,
}

enum Step {
    Message(CompleteMessage),
    BlankLine,
    Skipped(usize),
    Wait,
}

#[derive(Debug)]
pub struct StreamReassembler {
    buf: String,
    cap: usize,
    window: usize,
    /// Characters dropped since the last framed message.
    stale: usize,
    /// The current line already produced a framed message.
    mid_line: bool,
}

impl Default for StreamReassembler {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAP, DEFAULT_DUPLICATE_WINDOW)
    }
}

impl StreamReassembler {
    pub fn new(cap: usize, duplicate_window: usize) -> Self {
        Self {
            buf: String::with_capacity(cap.min(4096)),
            cap: cap.max(1),
            window: duplicate_window,
            stale: 0,
            mid_line: false,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drop any partial message. Used on disconnect.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.stale = 0;
        self.mid_line = false;
    }

    /// Append `fragment` and extract every message that is now complete.
    pub fn feed(&mut self, fragment: &str) -> FeedResult {
        trace!("feed {} chars: {}", fragment.len(), escape_log(fragment));
        self.buf.push_str(fragment);

        let mut result = FeedResult::default();
        if let Some(dropped) = self.trim_duplicate() {
            result.duplicate_trimmed = true;
            result.skipped += dropped;
            self.stale += dropped;
        }

        let mut scan = Scan::new(&self.buf, self.mid_line);
        loop {
            match scan.step() {
                Step::Message(message) => {
                    debug!("framed message: {}", escape_log(message.as_str()));
                    self.stale = 0;
                    result.messages.push(message);
                }
                Step::BlankLine => {}
                Step::Skipped(count) => {
                    result.skipped += count;
                    self.stale += count;
                }
                Step::Wait => break,
            }
        }
        let (consumed, mid_line) = (scan.pos, scan.mid_line);
        self.buf.drain(..consumed);
        self.mid_line = mid_line;

        let run = self.buf.len() + self.stale;
        if run > self.cap {
            warn!(
                "decode buffer exceeded {} chars without a message; discarding {} chars",
                self.cap, run
            );
            result.skipped += self.buf.len();
            result.overflowed = Some(run);
            self.clear();
        }
        result
    }

    /// A misbehaving sender may repeat its last chunk: if the first `window`
    /// characters show up again right after themselves, keep one copy.
    /// Returns the number of characters dropped.
    fn trim_duplicate(&mut self) -> Option<usize> {
        let window = self.window;
        let end = window.checked_mul(2).filter(|_| window > 0)?;
        let first = self.buf.get(..window)?;
        if self.buf.get(window..end)? != first {
            return None;
        }
        debug!("dropping repeated chunk: {}", escape_log(first));
        self.buf.drain(window..end);
        Some(window)
    }
}

/// One pass over the buffer. Positions only move forward, and the buffer is
/// drained once at the end of [`StreamReassembler::feed`].
struct Scan<'a> {
    text: &'a str,
    pos: usize,
    newline: Option<usize>,
    mid_line: bool,
}

impl<'a> Scan<'a> {
    fn new(text: &'a str, mid_line: bool) -> Self {
        Self {
            text,
            pos: 0,
            newline: text.find('\n'),
            mid_line,
        }
    }

    fn next_newline(&mut self) -> Option<usize> {
        if let Some(nl) = self.newline.filter(|&nl| nl < self.pos) {
            trace!("newline at {} consumed", nl);
            self.newline = self.text[self.pos..].find('\n').map(|i| self.pos + i);
        }
        self.newline
    }

    fn step(&mut self) -> Step {
        let text = self.text;
        let newline = self.next_newline();
        let rest = &text[self.pos..];
        let line = &rest[..newline.map_or(rest.len(), |nl| nl - self.pos)];

        if line.trim().is_empty() {
            return match newline {
                Some(nl) => {
                    self.end_line(nl);
                    Step::BlankLine
                }
                None => Step::Wait,
            };
        }

        let leader = line.as_bytes()[0];
        if !LEADERS.contains(&leader) {
            return match line.find(is_leader) {
                Some(start) => {
                    trace!("skipping {} chars before leader", start);
                    self.skip(start)
                }
                None => match newline {
                    Some(nl) if self.mid_line => {
                        let count = nl + 1 - self.pos;
                        trace!("dropping {} chars after framed message", count);
                        self.end_line(nl);
                        Step::Skipped(count)
                    }
                    Some(nl) => self.hand_over(nl),
                    None => Step::Wait,
                },
            };
        }

        match PacketKind::from_leader(leader as char) {
            Some(kind) => match packet_end(kind, line, newline.is_some()) {
                Framing::Complete(end) => self.frame(end, false),
                Framing::Invalid => match line[1..].find(is_leader) {
                    Some(next) => self.skip(next + 1),
                    None => self.hand_over_or_wait(newline),
                },
                Framing::Pending => self.hand_over_or_wait(newline),
            },
            None => match json_object_end(line) {
                Some(end) => self.frame(end, true),
                None => self.hand_over_or_wait(newline),
            },
        }
    }

    fn frame(&mut self, end: usize, json: bool) -> Step {
        let text = self.text[self.pos..self.pos + end].to_string();
        self.pos += end;
        self.mid_line = true;
        Step::Message(if json {
            CompleteMessage::Json(text)
        } else {
            CompleteMessage::Packet(text)
        })
    }

    /// The newline hands the line over as it is; the decoder reports what is wrong with it.
    fn hand_over(&mut self, newline: usize) -> Step {
        let line = self.text[self.pos..newline].trim_end_matches('\r').to_string();
        self.end_line(newline);
        Step::Message(if line.starts_with('{') {
            CompleteMessage::Json(line)
        } else {
            CompleteMessage::Packet(line)
        })
    }

    fn hand_over_or_wait(&mut self, newline: Option<usize>) -> Step {
        match newline {
            Some(nl) => self.hand_over(nl),
            None => Step::Wait,
        }
    }

    fn skip(&mut self, count: usize) -> Step {
        self.pos += count;
        Step::Skipped(count)
    }

    fn end_line(&mut self, newline: usize) {
        self.pos = newline + 1;
        self.mid_line = false;
    }
}

enum Framing {
    Complete(usize),
    Pending,
    Invalid,
}

/// End of the ASCII packet at the start of `line`.
fn packet_end(kind: PacketKind, line: &str, at_end: bool) -> Framing {
    let Some(body) = body_len(kind, line) else {
        return Framing::Pending;
    };
    let (Some(body_text), Some(tail)) = (line.get(..body), line.get(body..)) else {
        return if line.len() < body {
            Framing::Pending
        } else {
            Framing::Invalid
        };
    };
    match scan_tail(tail, at_end) {
        TailScan::Complete { end, .. } => Framing::Complete(body + end),
        TailScan::Pending => match short_checksum_end(body_text, tail) {
            Some(end) => Framing::Complete(body + end),
            None => Framing::Pending,
        },
        TailScan::Invalid => Framing::Invalid,
    }
}

/// A one-digit checksum plus terminator (`9D`) at the end of the input reads
/// the same as the start of a two-digit checksum, so it is only accepted when
/// the digit matches the CRC of the body.
fn short_checksum_end(body: &str, tail: &str) -> Option<usize> {
    let digit = tail.strip_suffix('D')?;
    let verifies =
        digit.len() == 1 && crc8::parse_hex(digit) == Some(crc8::checksum(body.as_bytes()));
    verifies.then_some(tail.len())
}

/// End (exclusive) of the JSON object opening at the start of `text`, counting
/// braces outside string literals.
fn json_object_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, byte) in text.bytes().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}
