//! dbvault entry point
//!
//! Parses nothing and loads nothing itself: everything is delegated to
//! [`dbvault::cli::run`]. Failures are reported as a JSON error line and a
//! non-zero exit status.

use dbvault::cli;

fn main() {
    if let Err(e) = cli::run() {
        if cli::write_error(&e).is_err() {
            eprintln!("{}: {}", e.code(), e);
        }
        std::process::exit(1);
    }
}
