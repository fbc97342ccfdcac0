//! Serializes a command tree back to shell syntax.
//!
//! Used to support the subshell/mid-pipeline-builtin re-exec strategy:
//! the executor re-invokes the current binary with `-c <text>` rather
//! than forking into its own tree-walking logic in place (see
//! `executor.rs`). Grounded in the teacher's own `serializer.rs`, which
//! serves the identical purpose for its `compiler.rs`-driven subshell
//! support, generalized from its two-variant `parser::Command` to the
//! full `command::Command` tree.

use crate::command::{Command, FromKind, Redirect, ToKind};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};

static TEMP_FILE_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Serializes `cmd` to a string that, when tokenized and parsed again,
/// yields an equivalent tree. Here-document bodies are already fully
/// expanded by the time a tree exists, so re-emitting `<<TERM` would
/// make the re-exec'd process try to read a here-document from its own
/// (differently wired) stdin. Instead a resolved here-document body is
/// written to a private temporary file and rewritten as a plain input
/// redirection, which is read back verbatim with no re-expansion.
pub fn serialize(cmd: &Command) -> std::io::Result<String> {
    let mut out = String::new();
    write_command(cmd, &mut out)?;
    Ok(out)
}

/// Serializes a single pipeline stage without its own outer redirect.
///
/// Used when the executor has already wired the stage's `from_kind`/
/// `to_kind` onto real pipe plumbing before re-exec'ing it; emitting the
/// redirect here too would apply it twice in the child.
pub fn serialize_stage(stage: &Command) -> std::io::Result<String> {
    let mut out = String::new();
    match stage {
        Command::Simple { argv, .. } => {
            for (i, word) in argv.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                push_word(&mut out, word);
            }
        }
        Command::Subcmd { inner, .. } => {
            out.push('(');
            write_command(inner, &mut out)?;
            out.push(')');
        }
        other => write_command(other, &mut out)?,
    }
    Ok(out)
}

fn write_command(cmd: &Command, out: &mut String) -> std::io::Result<()> {
    match cmd {
        Command::Simple { argv, redirect } => {
            for (i, word) in argv.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                push_word(out, word);
            }
            write_redirect(redirect, out)?;
        }
        Command::Subcmd { inner, redirect } => {
            out.push('(');
            write_command(inner, out)?;
            out.push(')');
            write_redirect(redirect, out)?;
        }
        Command::Pipe { left, right } => {
            write_command(left, out)?;
            out.push('|');
            write_command(right, out)?;
        }
        Command::PipeErr { left, right } => {
            write_command(left, out)?;
            out.push_str("|&");
            write_command(right, out)?;
        }
        Command::SepAnd { left, right } => {
            write_command(left, out)?;
            out.push_str("&&");
            write_command(right, out)?;
        }
        Command::SepOr { left, right } => {
            write_command(left, out)?;
            out.push_str("||");
            write_command(right, out)?;
        }
        Command::SepEnd { left, right } => {
            write_command(left, out)?;
            out.push(';');
            if let Some(right) = right {
                write_command(right, out)?;
            }
        }
        Command::SepBg { left, right } => {
            write_command(left, out)?;
            out.push('&');
            if let Some(right) = right {
                write_command(right, out)?;
            }
        }
    }
    Ok(())
}

fn write_redirect(redirect: &Redirect, out: &mut String) -> std::io::Result<()> {
    if let Some(from) = &redirect.from_kind {
        match from.kind {
            FromKind::RedIn => {
                out.push('<');
                push_word(out, &from.data);
            }
            FromKind::RedHere => {
                let path = materialize_temp_file(&from.data)?;
                out.push('<');
                push_word(out, &path);
            }
            FromKind::None => {}
        }
    }
    if let Some(to) = &redirect.to_kind {
        out.push_str(output_operator(to.kind));
        push_word(out, &to.file);
    }
    Ok(())
}

fn output_operator(kind: ToKind) -> &'static str {
    match kind {
        ToKind::RedOut => ">",
        ToKind::RedOutC => ">!",
        ToKind::RedOutApp => ">>",
        ToKind::RedOutAppC => ">>!",
        ToKind::RedErr => ">&",
        ToKind::RedErrC => ">&!",
        ToKind::RedErrApp => ">>&",
        ToKind::RedErrAppC => ">>&!",
        ToKind::None => "",
    }
}

/// Quotes `word` in single quotes, escaping embedded single quotes with
/// the standard `'\''` break-out sequence.
fn push_word(out: &mut String, word: &str) {
    out.push('\'');
    for c in word.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
}

fn materialize_temp_file(body: &str) -> std::io::Result<String> {
    let n = TEMP_FILE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!("eggshell-heredoc-{}-{}", std::process::id(), n));
    let mut file = std::fs::File::create(&path)?;
    file.write_all(body.as_bytes())?;
    Ok(path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;
    use std::io::Cursor;

    fn roundtrip(line: &str) -> Command {
        let tokens = tokenize(line).unwrap();
        let mut empty = Cursor::new(Vec::new());
        let tree = parse(tokens, &mut empty).unwrap();
        let text = serialize(&tree).unwrap();
        let tokens2 = tokenize(&text).unwrap();
        let mut empty2 = Cursor::new(Vec::new());
        parse(tokens2, &mut empty2).unwrap()
    }

    #[test]
    fn simple_command_roundtrips() {
        let cmd = roundtrip("echo hello world");
        match cmd {
            Command::Simple { argv, .. } => assert_eq!(argv, vec!["echo", "hello", "world"]),
            other => panic!("expected Simple, got {:?}", other),
        }
    }

    #[test]
    fn subshell_roundtrips() {
        let cmd = roundtrip("(echo a; echo b)");
        assert!(matches!(cmd, Command::Subcmd { .. }));
    }

    #[test]
    fn argument_with_spaces_is_quoted() {
        let text = serialize(&Command::Simple {
            argv: vec!["echo".to_string(), "a b".to_string()],
            redirect: Redirect::new(),
        })
        .unwrap();
        let tokens = tokenize(&text).unwrap();
        let mut empty = Cursor::new(Vec::new());
        let cmd = parse(tokens, &mut empty).unwrap();
        match cmd {
            Command::Simple { argv, .. } => assert_eq!(argv, vec!["echo", "a b"]),
            other => panic!("expected Simple, got {:?}", other),
        }
    }
}
