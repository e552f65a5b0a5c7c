//! Script text normalization.
//!
//! Replaces typographic punctuation with plain ASCII equivalents so the
//! downstream speech path never receives characters it renders as garbled
//! phonemes. Normalization is pure, deterministic and idempotent.

/// Normalize a raw ad script.
///
/// - Curly quotes, em/en dashes, ellipsis and non-breaking spaces become
///   their ASCII equivalents.
/// - Runs of spaces and tabs collapse to a single space.
/// - Leading/trailing whitespace is trimmed.
///
/// `normalize_script(normalize_script(x)) == normalize_script(x)` holds for
/// every input.
pub fn normalize_script(script: &str) -> String {
    let mut out = String::with_capacity(script.len());

    for ch in script.chars() {
        match ch {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => out.push('"'),
            '\u{2013}' | '\u{2014}' | '\u{2015}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{00A0}' | '\u{2009}' | '\u{200A}' | '\u{202F}' => out.push(' '),
            '\u{200B}' | '\u{FEFF}' => {} // zero-width, drop entirely
            _ => out.push(ch),
        }
    }

    // Collapse horizontal whitespace runs; newlines are preserved so the
    // planner still sees paragraph structure.
    let mut collapsed = String::with_capacity(out.len());
    let mut prev_space = false;
    for ch in out.chars() {
        if ch == ' ' || ch == '\t' {
            if !prev_space {
                collapsed.push(' ');
            }
            prev_space = true;
        } else {
            collapsed.push(ch);
            prev_space = false;
        }
    }

    collapsed.trim().to_string()
}
