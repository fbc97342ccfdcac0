//! Recursive-descent parser.
//!
//! Consumes a token sequence and produces a `Command` tree, re-entering
//! the line reader inline to collect here-document bodies. Grounded in
//! `original_source/parse.c`'s `parseSimple`/`parseStage`/`parsePipeline`/
//! `parseAndOr`/`parseCommand`/`parse` family (mirrored one function per
//! grammar production) and its `readHereDocLine`/`readHereDocument`
//! here-doc handling, adapted to a `Result`-returning recursive-descent
//! style matching the teacher's own token-stream parser in this crate's
//! predecessor (its read/unread-with-trace-logging approach is dropped
//! since it served debugging, not the grammar).

use std::collections::VecDeque;
use std::io::BufRead;

use crate::command::{Command, FromKind, FromKindData, Redirect, ToKind, ToKindData};
use crate::lexer::{Kind, Token};
use crate::lineread;
use crate::model::{Error, Result};

fn perr() -> Error {
    Error::new("Error in parsing tokens.")
}

fn kind_to_from(kind: Kind) -> Option<FromKind> {
    match kind {
        Kind::RedIn => Some(FromKind::RedIn),
        Kind::RedHere => Some(FromKind::RedHere),
        _ => None,
    }
}

fn kind_to_to(kind: Kind) -> Option<ToKind> {
    match kind {
        Kind::RedOut => Some(ToKind::RedOut),
        Kind::RedOutC => Some(ToKind::RedOutC),
        Kind::RedOutApp => Some(ToKind::RedOutApp),
        Kind::RedOutAppC => Some(ToKind::RedOutAppC),
        Kind::RedErr => Some(ToKind::RedErr),
        Kind::RedErrC => Some(ToKind::RedErrC),
        Kind::RedErrApp => Some(ToKind::RedErrApp),
        Kind::RedErrAppC => Some(ToKind::RedErrAppC),
        _ => None,
    }
}

fn is_redir_kind(kind: Kind) -> bool {
    kind_to_from(kind).is_some() || kind_to_to(kind).is_some()
}

/// Parses `tokens` into a command tree, reading further lines from
/// `input` if a here-document is encountered. Any grammar violation
/// collapses to the single diagnostic `Error in parsing tokens.`,
/// matching the source's top-level `parse()`.
pub fn parse<R: BufRead>(tokens: VecDeque<Token>, input: &mut R) -> Result<Command> {
    if tokens.is_empty() {
        return Err(perr());
    }
    let mut parser = Parser { tokens, input };
    let tree = parser.parse_command()?;
    if !parser.tokens.is_empty() {
        return Err(perr());
    }
    validate(&tree)?;
    Ok(tree)
}

struct Parser<'a, R: BufRead> {
    tokens: VecDeque<Token>,
    input: &'a mut R,
}

impl<'a, R: BufRead> Parser<'a, R> {
    fn peek_kind(&self) -> Option<Kind> {
        self.tokens.front().map(|t| t.kind)
    }

    fn parse_command(&mut self) -> Result<Command> {
        let left = Box::new(self.parse_and_or()?);
        match self.peek_kind() {
            Some(Kind::SepEnd) | Some(Kind::SepBg) => {
                let kind = self.tokens.pop_front().unwrap().kind;
                let right = match self.peek_kind() {
                    None | Some(Kind::ParRight) => None,
                    _ => Some(Box::new(self.parse_command()?)),
                };
                Ok(if kind == Kind::SepEnd {
                    Command::SepEnd { left, right }
                } else {
                    Command::SepBg { left, right }
                })
            }
            _ => Ok(*left),
        }
    }

    fn parse_and_or(&mut self) -> Result<Command> {
        let left = Box::new(self.parse_pipeline()?);
        match self.peek_kind() {
            Some(Kind::SepAnd) | Some(Kind::SepOr) => {
                let kind = self.tokens.pop_front().unwrap().kind;
                let right = Box::new(self.parse_and_or()?);
                Ok(if kind == Kind::SepAnd {
                    Command::SepAnd { left, right }
                } else {
                    Command::SepOr { left, right }
                })
            }
            _ => Ok(*left),
        }
    }

    fn parse_pipeline(&mut self) -> Result<Command> {
        let left = Box::new(self.parse_stage()?);
        match self.peek_kind() {
            Some(Kind::Pipe) | Some(Kind::PipeErr) => {
                let kind = self.tokens.pop_front().unwrap().kind;
                let right = Box::new(self.parse_pipeline()?);
                Ok(if kind == Kind::Pipe {
                    Command::Pipe { left, right }
                } else {
                    Command::PipeErr { left, right }
                })
            }
            _ => Ok(*left),
        }
    }

    fn parse_stage(&mut self) -> Result<Command> {
        if self.tokens.is_empty() {
            return Err(perr());
        }
        let mut redirect = Redirect::new();
        self.check_redirection(&mut redirect)?;

        if self.peek_kind() == Some(Kind::ParLeft) {
            self.tokens.pop_front();
            let inner = Box::new(self.parse_command()?);
            match self.tokens.pop_front() {
                Some(t) if t.kind == Kind::ParRight => {}
                _ => return Err(perr()),
            }
            self.check_redirection(&mut redirect)?;
            Ok(Command::Subcmd { inner, redirect })
        } else {
            let argv = self.parse_simple(&mut redirect)?;
            Ok(Command::Simple { argv, redirect })
        }
    }

    fn parse_simple(&mut self, redirect: &mut Redirect) -> Result<Vec<String>> {
        let mut argv = Vec::new();
        loop {
            match self.peek_kind() {
                Some(Kind::Simple) => {
                    argv.push(self.tokens.pop_front().unwrap().value);
                }
                Some(k) if is_redir_kind(k) => {
                    self.check_redirection(redirect)?;
                }
                _ => break,
            }
        }
        if argv.is_empty() {
            return Err(perr());
        }
        Ok(argv)
    }

    /// Consumes a run of redirection operators at the front of the
    /// stream, applying each to `redirect`. Stops at the first token
    /// that is neither an input nor output redirection operator.
    fn check_redirection(&mut self, redirect: &mut Redirect) -> Result<()> {
        while let Some(kind) = self.peek_kind() {
            if let Some(from) = kind_to_from(kind) {
                if redirect.has_from() {
                    return Err(perr());
                }
                self.tokens.pop_front();
                let word = match self.tokens.pop_front() {
                    Some(t) if t.kind == Kind::Simple => t.value,
                    _ => return Err(perr()),
                };
                let data = if from == FromKind::RedHere {
                    self.read_heredoc(&word)?
                } else {
                    word
                };
                redirect.from_kind = Some(FromKindData { kind: from, data });
            } else if let Some(to) = kind_to_to(kind) {
                if redirect.has_to() {
                    return Err(perr());
                }
                self.tokens.pop_front();
                let file = match self.tokens.pop_front() {
                    Some(t) if t.kind == Kind::Simple => t.value,
                    _ => return Err(perr()),
                };
                redirect.to_kind = Some(ToKindData { kind: to, file });
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Reads lines from `input` until one equals `terminator` exactly,
    /// expanding variables/backslashes into the growing body. End of
    /// input before the terminator line ends collection silently.
    fn read_heredoc(&mut self, terminator: &str) -> Result<String> {
        let mut doc = String::new();
        loop {
            let line = match lineread::read_line(self.input) {
                Ok(Some(l)) => l,
                Ok(None) => break,
                Err(_) => break,
            };
            if !line.ends_with('\n') {
                break;
            }
            if line == format!("{}\n", terminator) {
                break;
            }
            expand_heredoc_line(&line, &mut doc);
        }
        Ok(doc)
    }
}

/// Expands `$VAR` references and backslash escapes in one here-document
/// line, appending the result to `doc`. Mirrors
/// `original_source/parse.c::readHereDocLine` byte for byte.
fn expand_heredoc_line(line: &str, doc: &mut String) {
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0usize;
    while i < chars.len() {
        match chars[i] {
            '$' => {
                i += 1;
                if i < chars.len() && (chars[i] == '_' || chars[i].is_alphabetic()) {
                    let mut name = String::new();
                    while i < chars.len() && (chars[i] == '_' || chars[i].is_alphanumeric()) {
                        name.push(chars[i]);
                        i += 1;
                    }
                    if let Ok(value) = std::env::var(&name) {
                        doc.push_str(&value);
                    }
                    if i < chars.len() {
                        doc.push(chars[i]);
                        i += 1;
                    }
                } else {
                    doc.push('$');
                    if i < chars.len() {
                        doc.push(chars[i]);
                        i += 1;
                    }
                }
            }
            '\\' => {
                i += 1;
                if i < chars.len() {
                    let next = chars[i];
                    if next != '$' && next != '\\' {
                        doc.push('\\');
                    }
                    doc.push(next);
                    i += 1;
                }
            }
            c => {
                doc.push(c);
                i += 1;
            }
        }
    }
}

/// Post-parse validation: no stage but the last in a pipeline may carry
/// output redirection, and no stage but the first may carry input
/// redirection. Mirrors `original_source/parse.c::checkMultipleRedirection`.
fn validate(cmd: &Command) -> Result<()> {
    match cmd {
        Command::Pipe { left, right } | Command::PipeErr { left, right } => {
            if left.redirect().map_or(false, Redirect::has_to) {
                return Err(perr());
            }
            let offender = match right.as_ref() {
                Command::Pipe { left: rl, .. } | Command::PipeErr { left: rl, .. } => rl.as_ref(),
                other => other,
            };
            if offender.redirect().map_or(false, Redirect::has_from) {
                return Err(perr());
            }
            validate(left)?;
            validate(right)?;
        }
        Command::SepAnd { left, right } | Command::SepOr { left, right } => {
            validate(left)?;
            validate(right)?;
        }
        Command::SepEnd { left, right } | Command::SepBg { left, right } => {
            validate(left)?;
            if let Some(right) = right {
                validate(right)?;
            }
        }
        Command::Subcmd { inner, .. } => validate(inner)?,
        Command::Simple { .. } => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use std::io::Cursor;

    fn parse_line(line: &str) -> Result<Command> {
        let tokens = tokenize(line).unwrap();
        let mut empty = Cursor::new(Vec::new());
        parse(tokens, &mut empty)
    }

    #[test]
    fn simple_command() {
        let cmd = parse_line("echo hello").unwrap();
        match cmd {
            Command::Simple { argv, redirect } => {
                assert_eq!(argv, vec!["echo", "hello"]);
                assert!(!redirect.has_from());
                assert!(!redirect.has_to());
            }
            other => panic!("expected Simple, got {:?}", other),
        }
    }

    #[test]
    fn semicolon_is_right_associative() {
        let cmd = parse_line("a;b;c").unwrap();
        match cmd {
            Command::SepEnd { left, right } => {
                assert!(matches!(*left, Command::Simple { .. }));
                match right.unwrap().as_ref() {
                    Command::SepEnd { .. } => {}
                    other => panic!("expected nested SepEnd, got {:?}", other),
                }
            }
            other => panic!("expected SepEnd, got {:?}", other),
        }
    }

    #[test]
    fn trailing_semicolon_leaves_right_empty() {
        let cmd = parse_line("a;").unwrap();
        match cmd {
            Command::SepEnd { right, .. } => assert!(right.is_none()),
            other => panic!("expected SepEnd, got {:?}", other),
        }
    }

    #[test]
    fn and_or_precedence_nests_on_the_right() {
        let cmd = parse_line("a&&b||c").unwrap();
        match cmd {
            Command::SepAnd { right, .. } => {
                assert!(matches!(right.as_ref(), Command::SepOr { .. }));
            }
            other => panic!("expected SepAnd, got {:?}", other),
        }
    }

    #[test]
    fn pipe_chain_nests_on_the_right() {
        let cmd = parse_line("a|b|c").unwrap();
        match cmd {
            Command::Pipe { right, .. } => {
                assert!(matches!(right.as_ref(), Command::Pipe { .. }));
            }
            other => panic!("expected Pipe, got {:?}", other),
        }
    }

    #[test]
    fn redirection_around_pipe_is_rejected() {
        assert!(parse_line("a > out | b").is_err());
        assert!(parse_line("a | b < in").is_err());
    }

    #[test]
    fn redirection_on_last_stage_is_accepted() {
        assert!(parse_line("a | b > out").is_ok());
    }

    #[test]
    fn subshell_parses_inner_command() {
        let cmd = parse_line("(a; b)").unwrap();
        match cmd {
            Command::Subcmd { inner, .. } => {
                assert!(matches!(*inner, Command::SepEnd { .. }));
            }
            other => panic!("expected Subcmd, got {:?}", other),
        }
    }

    #[test]
    fn unbalanced_subshell_is_an_error() {
        assert!(parse_line("(a; b").is_err());
    }

    #[test]
    fn duplicate_input_redirection_is_an_error() {
        assert!(parse_line("a < one < two").is_err());
    }

    #[test]
    fn heredoc_expands_variables_and_stops_at_terminator() {
        std::env::set_var("EGGSHELL_TEST_VAR", "alice");
        let tokens = tokenize("cat <<END").unwrap();
        let mut input = Cursor::new(b"hi $EGGSHELL_TEST_VAR\nEND\n".to_vec());
        let cmd = parse(tokens, &mut input).unwrap();
        match cmd {
            Command::Simple { redirect, .. } => {
                let from = redirect.from_kind.unwrap();
                assert_eq!(from.kind, FromKind::RedHere);
                assert_eq!(from.data, "hi alice\n");
            }
            other => panic!("expected Simple, got {:?}", other),
        }
    }

    #[test]
    fn heredoc_without_terminator_collects_to_end_of_input() {
        let tokens = tokenize("cat <<END").unwrap();
        let mut input = Cursor::new(b"line one\nline two\n".to_vec());
        let cmd = parse(tokens, &mut input).unwrap();
        match cmd {
            Command::Simple { redirect, .. } => {
                let from = redirect.from_kind.unwrap();
                assert_eq!(from.data, "line one\nline two\n");
            }
            other => panic!("expected Simple, got {:?}", other),
        }
    }
}
