//! Terminator automaton for ASCII packets.
//!
//! Every packet ends `<body><checksum hex>D` (Live may also end `DD`). Because
//! `D` is itself a hex digit, the tail right after the fixed-width body is
//! walked with a small state machine instead of ad hoc string searches:
//!
//! ```text
//!            hex           D             D
//!   Scanning ----> Scanning ---> SeenOne ---> SeenTwo --D--> SeenTwo
//!      ^                            |            |
//!      +------------ hex -----------+------------+
//! ```
//!
//! The walk covers the run of hex characters after the body (at most
//! [`MAX_TAIL`]) and stops at the first non-hex character, which is where the
//! next packet leader or a newline sits. The state at that point decides:
//! `SeenOne` is a single terminator, `SeenTwo` a run of `D`s whose split
//! between checksum and terminator is settled by the decoder, and `Scanning`
//! means the run did not end in `D`.
//!
//! Framer and decoder both run this walk, so a message is always cut exactly
//! where the decoder will later look for its terminator.

/// Longest tail accepted after the body: two checksum digits plus `DD`.
pub const MAX_TAIL: usize = 4;

const MAX_CHECKSUM_DIGITS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Scanning,
    SeenOne,
    SeenTwo,
}

impl State {
    fn step(self, byte: u8) -> Self {
        match (self, byte) {
            (State::Scanning, b'D') => State::SeenOne,
            (State::SeenOne | State::SeenTwo, b'D') => State::SeenTwo,
            _ => State::Scanning,
        }
    }
}

/// Where the tail ends, relative to the checksum start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailScan {
    /// Terminator found; `end` is the index one past the last `D`.
    /// `doubled` is set when the tail ends in `DD`.
    Complete { end: usize, doubled: bool },
    /// Tail is well formed so far but the terminator has not arrived yet.
    Pending,
    /// The hex run does not end in `D`, or is longer than [`MAX_TAIL`].
    Invalid,
}

/// Walk `tail` (text starting at the checksum field).
///
/// `at_end` says whether `tail` is known to be complete (a framed message or a
/// segment cut at a newline). With `at_end == false` a tail that ends the input
/// is accepted once it holds a full two-digit checksum plus a `D`, which is how
/// a packet is released as soon as its terminator fragment arrives; shorter
/// tails (`3D`) wait, since that `D` is more likely a checksum digit.
pub fn scan_tail(tail: &str, at_end: bool) -> TailScan {
    let mut state = State::Scanning;
    let mut end = 0;
    for byte in tail.bytes() {
        if !byte.is_ascii_hexdigit() {
            break;
        }
        if end == MAX_TAIL {
            return TailScan::Invalid;
        }
        state = state.step(byte);
        end += 1;
    }

    let open = end == tail.len() && !at_end;
    if open && end <= MAX_CHECKSUM_DIGITS {
        return TailScan::Pending;
    }
    match state {
        State::SeenOne => TailScan::Complete {
            end,
            doubled: false,
        },
        State::SeenTwo => TailScan::Complete { end, doubled: true },
        State::Scanning if open && end < MAX_TAIL => TailScan::Pending,
        State::Scanning => TailScan::Invalid,
    }
}
