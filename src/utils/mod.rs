pub mod styles;

pub use styles::*;

use crate::error::DumpError;
use std::io::Write;

/// Like writeln! but for output where there is nothing useful to do with an error,
/// e.g. a closed stderr.
macro_rules! uwriteln {
    ($out:expr) => {
        let _ = writeln!($out);
    };
    ($out:expr, $($arg:tt)*) => {
        let _ = writeln!($out, $($arg)*);
    };
}
pub(crate) use uwriteln;

pub fn require(predicate: bool, err: impl FnOnce() -> DumpError) -> Result<(), DumpError> {
    if predicate { Ok(()) } else { Err(err()) }
}

pub fn warn(mesg: &str) {
    eprintln!("{}", mesg.warn());
}

pub fn progress(mut out: impl Write, mesg: &str) {
    uwriteln!(
        out,
        "{}: {}",
        env!("CARGO_PKG_NAME").progress_name(),
        mesg.progress_text()
    );
}

pub fn explain(mut out: impl Write, title: &str, text: &str) {
    uwriteln!(out, "{}: {}", title.explain_title(), text.explain_text());
}

/// Notes pad both their name and their descriptor to a 4-byte boundary.
pub fn align_to_word(n: u32) -> u64 {
    (n as u64 + 3) & !3
}

/// Remove escape sequences from the string (e.g. for colors).
#[cfg(test)]
pub fn strip_escapes(s: &str) -> String {
    // Styles come from the user's style sheet so tests can't know which escape
    // sequences (if any) were added.
    let mut result = String::with_capacity(s.len());
    let mut escaping = false;

    // See https://gist.github.com/fnky/458719343aabd01cfb17a3a4f7296797
    for c in s.chars() {
        if c == '\x1b' {
            escaping = true;
        } else if escaping {
            if c == 'm' {
                escaping = false;
            }
        } else {
            result.push(c);
        }
    }
    result
}
