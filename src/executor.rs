//! Tree-walking executor.
//!
//! Grounded in `original_source/process.c`'s `process`/`processAndOr`/
//! `processPipeline`/`execPipe`/`processStage`/`processSimple`/
//! `processSubcommand` family, reimplemented around
//! `std::process::Command` instead of raw `fork`/`dup2`/`execvp` (the
//! teacher's own `interp.rs` does the same substitution for its much
//! smaller grammar). Subshells, and any non-`SIMPLE` left-hand side of
//! `&`, are realized by re-exec'ing the current binary with `-c <text>`
//! (see `serializer.rs`) rather than a literal `fork`, since `fork()`
//! alone has no idiomatic safe wrapper in `std`.

use crate::background;
use crate::builtins;
use crate::command::{Command, Redirect};
use crate::redir;
use crate::serializer;
use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Enables `-x`-style tracing: each external exec prints `+ <argv>` to
/// stderr first. Carried from the teacher's own `interp::set_verbose`.
pub fn set_verbose() {
    VERBOSE.store(true, Ordering::SeqCst);
}

fn trace_exec(argv: &[String]) {
    if VERBOSE.load(Ordering::Acquire) {
        eprintln!("+ {}", argv.join(" "));
    }
}

/// Runs a full command tree and returns its exit status, updating `$?`
/// along the way the same way `original_source/process.c::process`
/// does.
pub fn process(cmd: &Command) -> i32 {
    process_opt(Some(cmd))
}

fn process_opt(cmd: Option<&Command>) -> i32 {
    background::collect();
    match cmd {
        None => 0,
        Some(Command::SepBg { left, right }) => {
            match left.as_ref() {
                Command::Simple { argv, redirect } => {
                    run_simple(argv, redirect, true);
                }
                other => {
                    if let Ok(text) = serializer::serialize(other) {
                        run_reexec(text, &Redirect::new(), true);
                    }
                }
            }
            process_opt(right.as_deref())
        }
        Some(Command::SepEnd { left, right }) => {
            let status = and_or(left);
            if right.is_some() {
                process_opt(right.as_deref())
            } else {
                status
            }
        }
        Some(other) => and_or(other),
    }
}

fn and_or(cmd: &Command) -> i32 {
    match cmd {
        Command::SepAnd { left, right } => {
            let status = pipeline(left);
            if status == 0 {
                and_or(right)
            } else {
                status
            }
        }
        Command::SepOr { left, right } => {
            let status = pipeline(left);
            if status != 0 {
                and_or(right)
            } else {
                status
            }
        }
        other => pipeline(other),
    }
}

fn pipeline(cmd: &Command) -> i32 {
    if cmd.is_pipe() {
        exec_pipe(cmd)
    } else {
        stage(cmd, false)
    }
}

fn stage(cmd: &Command, background: bool) -> i32 {
    match cmd {
        Command::Simple { argv, redirect } => run_simple(argv, redirect, background),
        Command::Subcmd { inner, redirect } => run_subcmd(inner, redirect, background),
        other => unreachable!("stage() called on non-stage node {:?}", other),
    }
}

fn run_simple(argv: &[String], redirect: &Redirect, background: bool) -> i32 {
    if builtins::is_builtin(&argv[0]) {
        // A built-in always runs synchronously in the shell itself, even
        // as the left-hand side of `&`: `original_source/process.c`'s
        // `processSimple` dispatches built-ins before it even looks at
        // its `background` argument.
        let status = run_builtin_stage(argv, redirect);
        set_status_var(status);
        status
    } else {
        run_external(argv, redirect, background)
    }
}

fn run_builtin_stage(argv: &[String], redirect: &Redirect) -> i32 {
    let to_plan = match redir::resolve_to(redirect) {
        Ok(plan) => plan,
        Err(err) => {
            eprintln!("eggshell: {}", err);
            return err.raw_os_error().unwrap_or(1);
        }
    };
    with_redirected_stderr(to_plan.as_ref(), || builtins::run(argv))
}

/// Temporarily dup2's fd 2 onto an `ERR`-variant redirection target for
/// the duration of `f`, mirroring `execBuiltin`'s save/restore dance.
/// Stdout redirection on a built-in is never applied; only the `ERR`
/// variants are, since a built-in writes its own output straight to the
/// shell's stdout/stderr rather than through any stage machinery.
fn with_redirected_stderr(to_plan: Option<&redir::ToPlan>, f: impl FnOnce() -> i32) -> i32 {
    let plan = match to_plan {
        Some(plan) if plan.also_stderr => plan,
        _ => return f(),
    };
    use std::os::unix::io::AsRawFd;
    let target_fd = plan.file.as_raw_fd();
    let saved = unsafe { libc::dup(2) };
    unsafe {
        libc::dup2(target_fd, 2);
    }
    let result = f();
    unsafe {
        libc::dup2(saved, 2);
        libc::close(saved);
    }
    result
}

fn run_external(argv: &[String], redirect: &Redirect, background: bool) -> i32 {
    trace_exec(argv);
    let mut command = std::process::Command::new(&argv[0]);
    command.args(&argv[1..]);
    spawn_and_run(command, redirect, background)
}

fn run_subcmd(inner: &Command, redirect: &Redirect, background: bool) -> i32 {
    match serializer::serialize(inner) {
        Ok(text) => run_reexec(text, redirect, background),
        Err(err) => {
            eprintln!("eggshell: {}", err);
            let code = err.raw_os_error().unwrap_or(1);
            if !background {
                set_status_var(code);
            }
            code
        }
    }
}

fn run_reexec(serialized: String, redirect: &Redirect, background: bool) -> i32 {
    match std::env::current_exe() {
        Ok(exe) => {
            let mut command = std::process::Command::new(exe);
            command.arg("-c").arg(serialized);
            spawn_and_run(command, redirect, background)
        }
        Err(err) => {
            eprintln!("eggshell: {}", err);
            let code = err.raw_os_error().unwrap_or(1);
            if !background {
                set_status_var(code);
            }
            code
        }
    }
}

fn spawn_and_run(mut command: std::process::Command, redirect: &Redirect, background: bool) -> i32 {
    let heredoc = match wire_redirect(&mut command, redirect) {
        Ok(body) => body,
        Err(code) => return code,
    };
    match command.spawn() {
        Ok(mut child) => {
            if let Some(body) = heredoc {
                if let Some(stdin) = child.stdin.take() {
                    redir::spawn_heredoc_writer(stdin, body);
                }
            }
            if background {
                background::add(child);
                0
            } else {
                let status = wait_one(child);
                set_status_var(status);
                status
            }
        }
        Err(err) => {
            eprintln!("eggshell: {}: {}", command_name(&command), err);
            let code = err.raw_os_error().unwrap_or(1);
            if !background {
                set_status_var(code);
            }
            code
        }
    }
}

fn command_name(command: &std::process::Command) -> String {
    command.get_program().to_string_lossy().into_owned()
}

/// Name to report in a diagnostic for a pipeline stage that failed to
/// spawn: the program name for a `Simple` stage, or a generic label for
/// a `Subcmd` (which spawns as a re-exec of this binary, not a program
/// named by the user).
fn stage_name(stage: &Command) -> &str {
    match stage {
        Command::Simple { argv, .. } => argv[0].as_str(),
        _ => "(subshell)",
    }
}

/// Wires a stage's `from_kind`/`to_kind` onto a not-yet-spawned
/// `Command`. Returns the here-document body (if any) so the caller can
/// hand it to `redir::spawn_heredoc_writer` once the child exists, or
/// an already-reported exit code on failure.
fn wire_redirect(command: &mut std::process::Command, redirect: &Redirect) -> Result<Option<String>, i32> {
    let heredoc = match redir::resolve_from(redirect) {
        Ok(redir::FromPlan::Inherit) => None,
        Ok(redir::FromPlan::File(file)) => {
            command.stdin(Stdio::from(file));
            None
        }
        Ok(redir::FromPlan::HereDoc(body)) => {
            command.stdin(Stdio::piped());
            Some(body)
        }
        Err(err) => return Err(open_error(&err)),
    };
    match redir::resolve_to(redirect) {
        Ok(None) => {}
        Ok(Some(plan)) => {
            let stdout_file = plan.file.try_clone().map_err(|err| open_error(&err))?;
            command.stdout(Stdio::from(stdout_file));
            if plan.also_stderr {
                command.stderr(Stdio::from(plan.file));
            }
        }
        Err(err) => return Err(open_error(&err)),
    }
    Ok(heredoc)
}

fn open_error(err: &std::io::Error) -> i32 {
    eprintln!("eggshell: {}", err);
    err.raw_os_error().unwrap_or(1)
}

/// Ignores `SIGINT` for the duration of a foreground wait, matching
/// `processSimple`'s `signal(SIGINT, SIG_IGN)` / `SIG_DFL` bracket so a
/// `Ctrl-C` meant for the child doesn't also kill the shell.
fn wait_one(mut child: std::process::Child) -> i32 {
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_IGN);
    }
    let result = child.wait();
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_DFL);
    }
    match result {
        Ok(status) => exit_code(status),
        Err(_) => 1,
    }
}

fn exit_code(status: std::process::ExitStatus) -> i32 {
    match status.code() {
        Some(code) => code,
        None => 128 + status.signal().unwrap_or(0),
    }
}

fn set_status_var(status: i32) {
    std::env::set_var("?", status.to_string());
}

/// Flattens a right-leaning `PIPE`/`PIPE_ERR` chain and runs every
/// stage, wiring each one's stdout to the next one's stdin with a real
/// OS pipe. Ported from `execPipe`, including its one deliberate
/// quirk: a built-in landing on the *last* stage runs in the shell
/// itself without ever being connected to the previous stage's output
/// (see DESIGN NOTES in the spec this crate implements).
fn exec_pipe(root: &Command) -> i32 {
    let mut stages: Vec<&Command> = Vec::new();
    let mut stage_sends_stderr: Vec<bool> = Vec::new();
    let mut cur = root;
    loop {
        match cur {
            Command::Pipe { left, right } => {
                stages.push(left);
                stage_sends_stderr.push(false);
                cur = right;
            }
            Command::PipeErr { left, right } => {
                stages.push(left);
                stage_sends_stderr.push(true);
                cur = right;
            }
            other => {
                stages.push(other);
                break;
            }
        }
    }

    let n = stages.len();
    let empty_redirect = Redirect::new();
    let mut statuses = vec![0i32; n];
    let mut children: Vec<(usize, std::process::Child)> = Vec::new();
    let mut prev_read: Option<os_pipe::PipeReader> = None;

    for i in 0..n {
        let is_last = i == n - 1;
        let stage_cmd = stages[i];
        let redirect = stage_cmd.redirect().unwrap_or(&empty_redirect);

        if is_last {
            if let Command::Simple { argv, .. } = stage_cmd {
                if builtins::is_builtin(&argv[0]) {
                    drop(prev_read.take());
                    let status = run_builtin_stage(argv, redirect);
                    set_status_var(status);
                    statuses[i] = status;
                    continue;
                }
            }
        }

        let mut heredoc_body: Option<String> = None;
        let stdin_stdio = if i == 0 {
            match redir::resolve_from(redirect) {
                Ok(redir::FromPlan::Inherit) => Stdio::inherit(),
                Ok(redir::FromPlan::File(file)) => Stdio::from(file),
                Ok(redir::FromPlan::HereDoc(body)) => {
                    heredoc_body = Some(body);
                    Stdio::piped()
                }
                Err(err) => return open_error(&err),
            }
        } else {
            Stdio::from(prev_read.take().expect("non-first stage always has a pipe read end"))
        };

        let mut stderr_stdio: Option<Stdio> = None;
        let stdout_stdio = if is_last {
            match redir::resolve_to(redirect) {
                Ok(None) => Stdio::inherit(),
                Ok(Some(plan)) => {
                    let clone = match plan.file.try_clone() {
                        Ok(f) => f,
                        Err(err) => return open_error(&err),
                    };
                    if plan.also_stderr {
                        stderr_stdio = Some(Stdio::from(plan.file));
                    }
                    Stdio::from(clone)
                }
                Err(err) => return open_error(&err),
            }
        } else {
            let (read_end, write_end) = match os_pipe::pipe() {
                Ok(ends) => ends,
                Err(err) => return open_error(&err),
            };
            if stage_sends_stderr[i] {
                let clone = match write_end.try_clone() {
                    Ok(w) => w,
                    Err(err) => return open_error(&err),
                };
                stderr_stdio = Some(Stdio::from(clone));
            }
            prev_read = Some(read_end);
            Stdio::from(write_end)
        };

        match spawn_stage_process(stage_cmd, stdin_stdio, stdout_stdio, stderr_stdio) {
            Ok(mut child) => {
                if let Some(body) = heredoc_body {
                    if let Some(stdin) = child.stdin.take() {
                        redir::spawn_heredoc_writer(stdin, body);
                    }
                }
                children.push((i, child));
            }
            Err(err) => {
                // A stage's own exec failure happens inside its own
                // already-forked child in `execPipe`/`processStage`, so
                // every other stage still runs regardless. Record this
                // stage's status and keep spawning the rest of the
                // pipeline instead of aborting it outright.
                eprintln!("eggshell: {}: {}", stage_name(stage_cmd), err);
                statuses[i] = err.raw_os_error().unwrap_or(1);
            }
        }
    }

    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_IGN);
    }
    for (i, mut child) in children {
        let status = match child.wait() {
            Ok(status) => exit_code(status),
            Err(_) => 1,
        };
        statuses[i] = status;
    }
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_DFL);
    }

    let status = statuses.into_iter().find(|&s| s != 0).unwrap_or(0);
    set_status_var(status);
    status
}

/// Spawns one non-terminal (or terminal-but-not-a-built-in) pipeline
/// stage. A plain external command is spawned directly; a built-in or a
/// subshell is isolated by re-exec'ing the current binary, since
/// neither can simply share this process's address space mid-pipeline.
fn spawn_stage_process(
    stage: &Command,
    stdin: Stdio,
    stdout: Stdio,
    stderr: Option<Stdio>,
) -> std::io::Result<std::process::Child> {
    let mut command = match stage {
        Command::Simple { argv, .. } if !builtins::is_builtin(&argv[0]) => {
            trace_exec(argv);
            let mut c = std::process::Command::new(&argv[0]);
            c.args(&argv[1..]);
            c
        }
        Command::Simple { .. } | Command::Subcmd { .. } => {
            let serialized = serializer::serialize_stage(stage)?;
            let exe = std::env::current_exe()?;
            let mut c = std::process::Command::new(exe);
            c.arg("-c").arg(serialized);
            c
        }
        other => unreachable!("pipeline stage must be Simple or Subcmd, got {:?}", other),
    };
    command.stdin(stdin).stdout(stdout);
    if let Some(err) = stderr {
        command.stderr(err);
    }
    command.spawn()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn exit_code_reports_normal_exit_code() {
        let status = std::process::ExitStatus::from_raw(0);
        assert_eq!(exit_code(status), 0);
        let status = std::process::ExitStatus::from_raw(42 << 8);
        assert_eq!(exit_code(status), 42);
    }

    #[test]
    fn exit_code_reports_128_plus_signal_on_signal_death() {
        // low byte nonzero and not 0x7f means WIFSIGNALED; no high bits set
        // means no exit code, per POSIX wait-status encoding.
        let status = std::process::ExitStatus::from_raw(9); // SIGKILL
        assert_eq!(exit_code(status), 128 + 9);
    }

    #[test]
    fn stage_name_uses_argv0_for_simple_stages() {
        let stage = Command::Simple {
            argv: vec!["badcmd".to_string(), "arg".to_string()],
            redirect: Redirect::new(),
        };
        assert_eq!(stage_name(&stage), "badcmd");
    }

    #[test]
    fn stage_name_is_generic_for_subshells() {
        let inner = Command::Simple {
            argv: vec!["echo".to_string()],
            redirect: Redirect::new(),
        };
        let stage = Command::Subcmd {
            inner: Box::new(inner),
            redirect: Redirect::new(),
        };
        assert_eq!(stage_name(&stage), "(subshell)");
    }

    #[test]
    fn command_name_reads_back_the_program() {
        let command = std::process::Command::new("echo");
        assert_eq!(command_name(&command), "echo");
    }
}
