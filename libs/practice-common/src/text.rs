/// Text Normalizer - Whitespace-Tolerant Canonical Form
///
/// **Core Responsibility:**
/// Canonicalize test-case inputs and outputs before they are sent for grading,
/// so that stray carriage returns and padding never decide a verdict.
///
/// **Normalization Rules:**
/// - Carriage returns: removed everywhere
/// - Inputs: every line trimmed on both sides
/// - Outputs: every line right-trimmed only (leading indentation is content)
/// - Line structure: preserved, lines are rejoined with `\n`
///
/// Total and idempotent: `normalize(normalize(t, m), m) == normalize(t, m)`.

use serde_json::Value;

/// Which side of each line gets trimmed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTrim {
    /// Trim both ends of every line (used for inputs)
    Full,
    /// Right-trim only, preserving indentation (used for outputs)
    Trailing,
}

/// Normalize a piece of text line by line
pub fn normalize(text: &str, trim: LineTrim) -> String {
    text.replace('\r', "")
        .split('\n')
        .map(|line| match trim {
            LineTrim::Full => line.trim(),
            LineTrim::Trailing => line.trim_end(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Coerce a loosely-typed JSON value to its text form
///
/// `null` becomes the empty string, strings are taken as-is, and every other
/// value uses its JSON rendering (`42`, `true`, ...).
pub fn coerce_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Coerce and normalize in one step
pub fn normalize_value(value: &Value, trim: LineTrim) -> String {
    normalize(&coerce_text(value), trim)
}

/// Decode the `\n` / `\s` escape sequences some graders emit in outputs
///
/// Only applied when the text actually contains one of the escapes; plain
/// text is returned unchanged.
pub fn decode_display_escapes(text: &str) -> String {
    if text.contains("\\n") || text.contains("\\s") {
        text.replace("\\s", " ").replace("\\n", "\n")
    } else {
        text.to_string()
    }
}
