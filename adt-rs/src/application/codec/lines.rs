//! Line-ending canonicalization for surgical edits: both the caller-supplied
//! needle and the server-stored source are reduced to `\n` before matching,
//! and the stored convention is restored on write.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
}

/// Detect the stored convention and return the `\n`-canonical text.
pub fn canonicalize(source: &str) -> (String, LineEnding) {
    if source.contains("\r\n") {
        (source.replace("\r\n", "\n"), LineEnding::CrLf)
    } else {
        (source.to_string(), LineEnding::Lf)
    }
}

/// Re-apply the stored convention to canonical text.
pub fn restore(source: &str, ending: LineEnding) -> String {
    match ending {
        LineEnding::Lf => source.to_string(),
        LineEnding::CrLf => source.replace('\n', "\r\n"),
    }
}
