//! Command tree data model.
//!
//! A tagged node per the grammar: `Command` is a discriminated union
//! (sum type) rather than one struct carrying every possible field, per
//! DESIGN NOTES §9 ("prefer a discriminated union... since the
//! invariants are otherwise only runtime-enforced"). Grounded in
//! `original_source/parse.h`'s `CMD` struct and in `xv6sh::parser`'s own
//! `Command` enum, generalized to carry redirection on every stage kind.

/// How a stage's standard input is sourced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FromKind {
    None,
    RedIn,
    RedHere,
}

/// How a stage's standard output (and possibly standard error) is sunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToKind {
    None,
    RedOut,
    RedOutC,
    RedOutApp,
    RedOutAppC,
    RedErr,
    RedErrC,
    RedErrApp,
    RedErrAppC,
}

impl ToKind {
    /// Whether this redirection kind appends rather than truncates.
    pub fn is_append(self) -> bool {
        matches!(
            self,
            ToKind::RedOutApp | ToKind::RedOutAppC | ToKind::RedErrApp | ToKind::RedErrAppC
        )
    }

    /// Whether this redirection kind is a `!`-suffixed clobber override.
    pub fn is_clobber(self) -> bool {
        matches!(
            self,
            ToKind::RedOutC | ToKind::RedOutAppC | ToKind::RedErrC | ToKind::RedErrAppC
        )
    }

    /// Whether this redirection kind also duplicates onto stderr.
    pub fn is_err(self) -> bool {
        matches!(
            self,
            ToKind::RedErr | ToKind::RedErrC | ToKind::RedErrApp | ToKind::RedErrAppC
        )
    }
}

/// Redirection carried by a SIMPLE or SUBCMD node.
#[derive(Debug, Clone, Default)]
pub struct Redirect {
    pub from_kind: Option<FromKindData>,
    pub to_kind: Option<ToKindData>,
}

#[derive(Debug, Clone)]
pub struct FromKindData {
    pub kind: FromKind,
    /// Filename for `RedIn`, here-document body for `RedHere`.
    pub data: String,
}

#[derive(Debug, Clone)]
pub struct ToKindData {
    pub kind: ToKind,
    pub file: String,
}

impl Redirect {
    pub fn new() -> Redirect {
        Redirect {
            from_kind: None,
            to_kind: None,
        }
    }

    pub fn has_from(&self) -> bool {
        self.from_kind.is_some()
    }

    pub fn has_to(&self) -> bool {
        self.to_kind.is_some()
    }
}

/// A node of the command tree.
#[derive(Debug)]
pub enum Command {
    /// `argv` is always non-empty for a Simple node.
    Simple {
        argv: Vec<String>,
        redirect: Redirect,
    },
    /// A parenthesized subshell; `redirect` applies to the subshell as
    /// a whole, not to anything inside `inner`.
    Subcmd {
        inner: Box<Command>,
        redirect: Redirect,
    },
    Pipe {
        left: Box<Command>,
        right: Box<Command>,
    },
    PipeErr {
        left: Box<Command>,
        right: Box<Command>,
    },
    SepAnd {
        left: Box<Command>,
        right: Box<Command>,
    },
    SepOr {
        left: Box<Command>,
        right: Box<Command>,
    },
    SepEnd {
        left: Box<Command>,
        right: Option<Box<Command>>,
    },
    SepBg {
        left: Box<Command>,
        right: Option<Box<Command>>,
    },
}

impl Command {
    /// Returns the node's redirection info, if it can carry one
    /// (SIMPLE and SUBCMD only).
    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            Command::Simple { redirect, .. } => Some(redirect),
            Command::Subcmd { redirect, .. } => Some(redirect),
            _ => None,
        }
    }

    pub fn is_pipe(&self) -> bool {
        matches!(self, Command::Pipe { .. } | Command::PipeErr { .. })
    }
}
