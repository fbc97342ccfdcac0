//! Entry point: prompts for commands, parses them, and executes them.
//!
//! Mirrors `original_source/main.c`'s loop (read line, tokenize, parse,
//! process, bump the prompt counter only on a successful parse) with an
//! ambient `getopts`-driven CLI carried from the teacher's own
//! `main.rs`/`Cargo.toml`: `-c` to run one command line non-interactively
//! (the subshell/background re-exec path depends on this), `-x` for
//! verbose tracing, `-h`/`--help` for usage.

mod background;
mod builtins;
mod command;
mod executor;
mod lexer;
mod lineread;
mod model;
mod parser;
mod redir;
mod serializer;

use std::io::{BufReader, Write};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let mut opts = getopts::Options::new();
    opts.optopt("c", "", "run COMMAND and exit", "COMMAND");
    opts.optflag("x", "", "trace external commands to stderr");
    opts.optflag("h", "help", "print usage and exit");

    let matches = match opts.parse(&args[1..]) {
        Ok(matches) => matches,
        Err(err) => {
            eprintln!("eggshell: {}", err);
            std::process::exit(1);
        }
    };

    if matches.opt_present("h") {
        print_usage(&args[0], &opts);
        return;
    }
    if matches.opt_present("x") {
        executor::set_verbose();
    }

    if let Some(command_line) = matches.opt_str("c") {
        std::process::exit(run_one_line(&command_line));
    }

    run_repl();
}

fn print_usage(program: &str, opts: &getopts::Options) {
    let brief = format!("Usage: {} [-x] [-c COMMAND]", program);
    print!("{}", opts.usage(&brief));
}

/// Runs a single command line non-interactively. Used both for `-c` and
/// as the re-exec target for subshells and backgrounded compound
/// commands (see `serializer.rs`/`executor.rs`).
fn run_one_line(line: &str) -> i32 {
    let tokens = match lexer::tokenize(line) {
        Ok(tokens) if !tokens.is_empty() => tokens,
        Ok(_) => return 0,
        Err(err) => {
            eprintln!("eggshell: {}", err);
            return 1;
        }
    };
    let mut empty = std::io::Cursor::new(Vec::new());
    match parser::parse(tokens, &mut empty) {
        Ok(tree) => executor::process(&tree),
        Err(err) => {
            eprintln!("eggshell: {}", err);
            1
        }
    }
}

fn run_repl() {
    let stdin = std::io::stdin();
    let mut reader = BufReader::new(stdin.lock());
    let mut cmd_number = 1;

    loop {
        print!("({})$ ", cmd_number);
        let _ = std::io::stdout().flush();

        let line = match lineread::read_line(&mut reader) {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                eprintln!("eggshell: {}", err);
                break;
            }
        };

        let tokens = match lexer::tokenize(&line) {
            Ok(tokens) if !tokens.is_empty() => tokens,
            Ok(_) => continue,
            Err(err) => {
                eprintln!("eggshell: {}", err);
                continue;
            }
        };

        match parser::parse(tokens, &mut reader) {
            Ok(tree) => {
                executor::process(&tree);
                cmd_number += 1;
            }
            Err(err) => {
                eprintln!("eggshell: {}", err);
            }
        }
    }
}
