//! Scanner implementation.
//!
//! Splits one input line into a sequence of typed tokens, honoring the
//! longest-match table of special strings, quoting, and backslash escapes
//! described in the grammar. Grounded in `original_source/tokenize.c`
//! (the longest-match special-token table and per-character quote/escape
//! state machine) and in the teacher's own char-by-char scanning style.

use std::collections::VecDeque;

use crate::model::{Error, Result};

/// Kind of a scanned token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Simple,
    RedIn,
    RedHere,
    RedOut,
    RedOutC,
    RedOutApp,
    RedOutAppC,
    RedErr,
    RedErrC,
    RedErrApp,
    RedErrAppC,
    SepEnd,
    SepAnd,
    SepOr,
    SepBg,
    Pipe,
    PipeErr,
    ParLeft,
    ParRight,
}

/// Scanned token.
#[derive(Debug, Clone)]
pub struct Token {
    /// The kind of the token.
    pub kind: Kind,

    /// The token's value. Only meaningful for `Kind::Simple`; every
    /// other kind carries its own fixed spelling and an empty value.
    pub value: String,
}

/// Special-token table. Entries are tried in order, so any string that
/// is a prefix of a longer one must appear *after* it for longest-match
/// to win (`>>&!` before `>>&` before `>>!`/`>>` before `>&...` before
/// `>...`, etc).
const SPECIAL_TOKENS: &[(&str, Kind)] = &[
    ("<<", Kind::RedHere),
    ("<", Kind::RedIn),
    (">>&!", Kind::RedErrAppC),
    (">>&", Kind::RedErrApp),
    (">>!", Kind::RedOutAppC),
    (">>", Kind::RedOutApp),
    (">&!", Kind::RedErrC),
    (">&", Kind::RedErr),
    (">!", Kind::RedOutC),
    (">", Kind::RedOut),
    (";", Kind::SepEnd),
    ("&&", Kind::SepAnd),
    ("&", Kind::SepBg),
    ("||", Kind::SepOr),
    ("|&", Kind::PipeErr),
    ("|", Kind::Pipe),
    ("(", Kind::ParLeft),
    (")", Kind::ParRight),
];

/// Returns true if `c` can ever start a special token, i.e. is a
/// metacharacter that must end a SIMPLE token when encountered outside
/// of quotes/escapes.
fn is_metachar(c: char) -> bool {
    SPECIAL_TOKENS.iter().any(|(text, _)| text.starts_with(c))
}

/// Tokenizes one input line. Returns an error with the diagnostic that
/// must be printed to standard error (`Unterminated string`) on failure.
pub fn tokenize(line: &str) -> Result<VecDeque<Token>> {
    let chars: Vec<char> = line.chars().collect();
    let mut out = VecDeque::new();
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if c == ' ' || c == '\t' {
            i += 1;
            continue;
        }
        if c == '#' {
            break; // rest of the line is a comment
        }
        if let Some((text, kind)) = match_special(&chars, i) {
            out.push_back(Token {
                kind,
                value: String::new(),
            });
            i += text.chars().count();
            continue;
        }

        // SIMPLE token: scan until whitespace or an unescaped/unquoted
        // metacharacter, honoring quotes and backslash escapes.
        let mut value = String::new();
        let mut in_quote: Option<char> = None;
        loop {
            if i >= chars.len() {
                break;
            }
            let c = chars[i];
            if let Some(q) = in_quote {
                if c == q {
                    in_quote = None;
                    i += 1;
                } else {
                    value.push(c);
                    i += 1;
                }
                continue;
            }
            if c == '\'' || c == '"' {
                in_quote = Some(c);
                i += 1;
                continue;
            }
            if c == '\\' && i + 1 < chars.len() {
                let next = chars[i + 1];
                if next == '\n' {
                    value.push('\\');
                    i += 1;
                } else {
                    value.push(next);
                    i += 2;
                }
                continue;
            }
            if c == ' ' || c == '\t' || is_metachar(c) {
                break;
            }
            value.push(c);
            i += 1;
        }

        if in_quote.is_some() {
            return Err(Error::new("Unterminated string"));
        }

        out.push_back(Token {
            kind: Kind::Simple,
            value,
        });
    }

    Ok(out)
}

/// Tries every entry of the special-token table against `chars[at..]`
/// and returns the longest-matching entry, if any.
fn match_special(chars: &[char], at: usize) -> Option<(&'static str, Kind)> {
    for (text, kind) in SPECIAL_TOKENS {
        let tc: Vec<char> = text.chars().collect();
        if at + tc.len() <= chars.len() && chars[at..at + tc.len()] == tc[..] {
            return Some((text, *kind));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(line: &str) -> Vec<Kind> {
        tokenize(line)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn simple_words() {
        let toks = tokenize("echo hello").unwrap();
        assert_eq!(toks.len(), 2);
        assert_eq!(toks[0].kind, Kind::Simple);
        assert_eq!(toks[0].value, "echo");
        assert_eq!(toks[1].value, "hello");
    }

    #[test]
    fn longest_match_wins() {
        assert_eq!(kinds(">>&!"), vec![Kind::RedErrAppC]);
        assert_eq!(kinds(">>&"), vec![Kind::RedErrApp]);
        assert_eq!(kinds(">>"), vec![Kind::RedOutApp]);
        assert_eq!(kinds(">"), vec![Kind::RedOut]);
        assert_eq!(kinds("|&"), vec![Kind::PipeErr]);
        assert_eq!(kinds("|"), vec![Kind::Pipe]);
    }

    #[test]
    fn comment_ends_line() {
        let toks = tokenize("echo hi # rest is ignored").unwrap();
        assert_eq!(toks.len(), 2);
    }

    #[test]
    fn quotes_suppress_metachars() {
        let toks = tokenize("echo 'a|b'").unwrap();
        assert_eq!(toks.len(), 2);
        assert_eq!(toks[1].value, "a|b");
    }

    #[test]
    fn double_and_single_quotes_are_equivalent() {
        let toks = tokenize("echo \"a;b\"").unwrap();
        assert_eq!(toks[1].value, "a;b");
    }

    #[test]
    fn backslash_escapes_next_byte() {
        let toks = tokenize("echo a\\|b").unwrap();
        assert_eq!(toks.len(), 2);
        assert_eq!(toks[1].value, "a|b");
    }

    #[test]
    fn backslash_before_newline_is_preserved() {
        let toks = tokenize("echo a\\\n").unwrap();
        assert_eq!(toks[1].value, "a\\");
    }

    #[test]
    fn unterminated_quote_is_error() {
        assert!(tokenize("echo 'unterminated").is_err());
    }

    #[test]
    fn redirection_tokens() {
        assert_eq!(kinds("a<b"), vec![Kind::Simple, Kind::RedIn, Kind::Simple]);
        assert_eq!(
            kinds("a<<b"),
            vec![Kind::Simple, Kind::RedHere, Kind::Simple]
        );
    }
}
