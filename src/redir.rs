//! Resolves a `Redirect` into concrete file descriptors.
//!
//! Grounded in `original_source/process.c::redirect` for the open-flag
//! arithmetic (append vs. truncate, `noclobber`/`!`-clobber) and in
//! `xv6sh::interp.rs`'s `maybe_redirect_input`/`maybe_redirect_output`
//! for doing it ahead of `spawn()` via `std::fs::File` + `Stdio` rather
//! than raw `open`/`dup2` in a forked child.

use crate::command::{Redirect, ToKind};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::process::ChildStdin;

/// What a stage's stdin should be wired to.
pub enum FromPlan {
    Inherit,
    File(File),
    /// A here-document body, already fully expanded. The caller must
    /// spawn with a piped stdin and hand the child's stdin end to
    /// `spawn_heredoc_writer`.
    HereDoc(String),
}

/// What a stage's stdout (and, for `ERR` kinds, stderr too) should be
/// wired to.
pub struct ToPlan {
    pub file: File,
    pub also_stderr: bool,
}

/// Resolves the `from_kind` half of a redirect.
pub fn resolve_from(redirect: &Redirect) -> std::io::Result<FromPlan> {
    match &redirect.from_kind {
        None => Ok(FromPlan::Inherit),
        Some(from) => match from.kind {
            crate::command::FromKind::RedIn => Ok(FromPlan::File(File::open(&from.data)?)),
            crate::command::FromKind::RedHere => Ok(FromPlan::HereDoc(from.data.clone())),
            crate::command::FromKind::None => Ok(FromPlan::Inherit),
        },
    }
}

/// Resolves the `to_kind` half of a redirect.
pub fn resolve_to(redirect: &Redirect) -> std::io::Result<Option<ToPlan>> {
    match &redirect.to_kind {
        None => Ok(None),
        Some(to) => {
            let file = open_output(&to.file, to.kind)?;
            Ok(Some(ToPlan {
                file,
                also_stderr: to.kind.is_err(),
            }))
        }
    }
}

fn open_output(path: &str, kind: ToKind) -> std::io::Result<File> {
    let noclobber = std::env::var_os("noclobber").is_some();
    let clobber = kind.is_clobber();

    let mut opts = OpenOptions::new();
    opts.write(true).mode(0o666);

    if kind.is_append() {
        opts.append(true);
        if !noclobber || clobber {
            opts.create(true);
        }
    } else if noclobber && !clobber {
        opts.create_new(true);
    } else {
        opts.create(true).truncate(true);
    }

    opts.open(path)
}

/// Writes a here-document body to a child's stdin on a separate thread,
/// then drops it to signal end-of-input. A thread (rather than writing
/// inline before the child is even polled) avoids a deadlock when the
/// body is larger than the pipe buffer and the child starts producing
/// output of its own before it has consumed all of its input.
pub fn spawn_heredoc_writer(mut stdin: ChildStdin, body: String) {
    std::thread::spawn(move || {
        let _ = stdin.write_all(body.as_bytes());
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{FromKind, FromKindData, ToKindData};
    use std::sync::Mutex;

    // `noclobber` is process-wide environment state; serialize the two
    // tests that touch it so they don't observe each other's value.
    static NOCLOBBER_TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn resolve_from_opens_existing_file() {
        let path = std::env::temp_dir().join("eggshell_redir_test_from");
        std::fs::write(&path, b"hi").unwrap();
        let mut redirect = Redirect::new();
        redirect.from_kind = Some(FromKindData {
            kind: FromKind::RedIn,
            data: path.to_string_lossy().into_owned(),
        });
        assert!(matches!(resolve_from(&redirect).unwrap(), FromPlan::File(_)));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn resolve_from_heredoc_carries_body_untouched() {
        let mut redirect = Redirect::new();
        redirect.from_kind = Some(FromKindData {
            kind: FromKind::RedHere,
            data: "hi there\n".to_string(),
        });
        match resolve_from(&redirect).unwrap() {
            FromPlan::HereDoc(body) => assert_eq!(body, "hi there\n"),
            _ => panic!("expected HereDoc"),
        }
    }

    #[test]
    fn resolve_to_truncates_by_default() {
        let path = std::env::temp_dir().join("eggshell_redir_test_to");
        std::fs::write(&path, b"old content").unwrap();
        let mut redirect = Redirect::new();
        redirect.to_kind = Some(ToKindData {
            kind: ToKind::RedOut,
            file: path.to_string_lossy().into_owned(),
        });
        let plan = resolve_to(&redirect).unwrap().unwrap();
        assert!(!plan.also_stderr);
        drop(plan.file);
        assert_eq!(std::fs::read(&path).unwrap(), b"");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn resolve_to_err_variant_flags_also_stderr() {
        let path = std::env::temp_dir().join("eggshell_redir_test_err");
        let mut redirect = Redirect::new();
        redirect.to_kind = Some(ToKindData {
            kind: ToKind::RedErr,
            file: path.to_string_lossy().into_owned(),
        });
        let plan = resolve_to(&redirect).unwrap().unwrap();
        assert!(plan.also_stderr);
        drop(plan.file);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn noclobber_rejects_existing_file_for_truncating_form() {
        let _guard = NOCLOBBER_TEST_LOCK.lock().unwrap();
        let path = std::env::temp_dir().join("eggshell_redir_test_noclobber");
        std::fs::write(&path, b"existing").unwrap();
        std::env::set_var("noclobber", "1");
        let mut redirect = Redirect::new();
        redirect.to_kind = Some(ToKindData {
            kind: ToKind::RedOut,
            file: path.to_string_lossy().into_owned(),
        });
        assert!(resolve_to(&redirect).is_err());
        std::env::remove_var("noclobber");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn clobber_variant_overrides_noclobber() {
        let _guard = NOCLOBBER_TEST_LOCK.lock().unwrap();
        let path = std::env::temp_dir().join("eggshell_redir_test_clobber_bang");
        std::fs::write(&path, b"existing").unwrap();
        std::env::set_var("noclobber", "1");
        let mut redirect = Redirect::new();
        redirect.to_kind = Some(ToKindData {
            kind: ToKind::RedOutC,
            file: path.to_string_lossy().into_owned(),
        });
        assert!(resolve_to(&redirect).is_ok());
        std::env::remove_var("noclobber");
        std::fs::remove_file(&path).ok();
    }
}
