//! Reads one logical line at a time from an input stream.
//!
//! Mirrors `original_source/getLine.c`: a line includes its trailing
//! newline when one was read, and a trailing partial line (no newline
//! because the stream ended) is still returned rather than dropped.

use std::io::BufRead;

/// Reads the next line from `input`, including the terminating newline
/// if one was present. Returns `None` only when zero bytes were
/// available before the stream ended (true end-of-input).
pub fn read_line<R: BufRead>(input: &mut R) -> std::io::Result<Option<String>> {
    let mut buf = Vec::new();
    let n = input.read_until(b'\n', &mut buf)?;
    if n == 0 {
        return Ok(None);
    }
    // The underlying stream may contain non-UTF8 bytes; eggshell's
    // grammar only cares about ASCII metacharacters, so lossily
    // recovering keeps a single malformed line from killing the REPL.
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}
