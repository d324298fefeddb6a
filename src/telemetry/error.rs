use thiserror::Error;

use super::packet::PacketKind;

/// Errors raised while turning inbound wire text into packets or readings.
///
/// None of these are fatal: the offending message (or buffer contents, for
/// [`TelemetryError::BufferOverflow`]) is dropped and the stream continues.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TelemetryError {
    /// Message is shorter than the fixed-width body of its packet kind.
    #[error("{kind} packet truncated: {len} chars, need at least {min}")]
    Truncated {
        kind: PacketKind,
        len: usize,
        min: usize,
    },

    /// No `D`/`DD` terminator within the bounded lookahead after the body.
    #[error("{kind} packet has no terminator after its checksum field")]
    MissingTerminator { kind: PacketKind },

    /// JSON text does not parse or carries no patient identifier.
    #[error("malformed JSON reading: {0}")]
    MalformedJson(String),

    /// The decode buffer hit its hard cap without yielding a message and was reset.
    #[error("decode buffer overflow: discarded {discarded} chars (cap {cap})")]
    BufferOverflow { discarded: usize, cap: usize },

    /// Blank message after trimming.
    #[error("empty message")]
    Empty,

    /// Leading character is not a known packet leader or `{`.
    #[error("unknown message leader {0:?}")]
    UnknownKind(char),

    /// A fixed-width field did not hold what its layout requires.
    #[error("invalid {field} field: {value:?}")]
    InvalidField { field: &'static str, value: String },

    /// Checksum did not verify and the session runs with the reject policy.
    #[error("checksum mismatch: received {received:?}, computed {computed:02X}")]
    ChecksumMismatch { received: Option<u8>, computed: u8 },
}

impl TelemetryError {
    /// Short stable label, used for metrics and structured log fields.
    pub fn label(&self) -> &'static str {
        match self {
            TelemetryError::Truncated { .. } => "truncated",
            TelemetryError::MissingTerminator { .. } => "missing_terminator",
            TelemetryError::MalformedJson(_) => "malformed_json",
            TelemetryError::BufferOverflow { .. } => "buffer_overflow",
            TelemetryError::Empty => "empty",
            TelemetryError::UnknownKind(_) => "unknown_kind",
            TelemetryError::InvalidField { .. } => "invalid_field",
            TelemetryError::ChecksumMismatch { .. } => "checksum_mismatch",
        }
    }

    pub(crate) fn invalid(field: &'static str, value: &str) -> Self {
        TelemetryError::InvalidField {
            field,
            value: value.to_string(),
        }
    }
}

/// Lifecycle errors of a [`TelemetrySession`](super::TelemetrySession).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no telemetry transport available on this host")]
    TransportUnavailable,

    #[error("fragment received while no transport connection is open")]
    NotConnected,
}
