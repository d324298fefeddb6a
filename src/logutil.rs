//! Logging helpers for raw wire text, so a log line stays a single line.

/// Escape a string for single-line logging:
/// - `\n` => `\\n`
/// - `\r` => `\\r`
/// - `\t` => `\\t`
/// - backslash => `\\\\`
/// - other control characters => `\\xNN`
///
/// Anything past [`MAX_PREVIEW`] characters is cut and marked with an
/// ellipsis; a runaway decode buffer would otherwise flood the log.
pub fn escape_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Longest preview kept by [`escape_log`]; a full Live packet plus change.
pub const MAX_PREVIEW: usize = 120;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_line_breaks_in_wire_text() {
        assert_eq!(escape_log("L01\r\nT02\t"), "L01\\r\\nT02\\t");
        assert_eq!(escape_log("a\u{0}b"), "a\\x00b");
    }

    #[test]
    fn long_buffers_are_truncated() {
        let junk = "x".repeat(10_000);
        let escaped = escape_log(&junk);
        assert_eq!(escaped.chars().count(), MAX_PREVIEW + 1);
        assert!(escaped.ends_with('…'));
    }
}
