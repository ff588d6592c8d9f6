//! Used to color and otherwise style the diagnostics written to stderr using a
//! ~/.crashdmesg/styles.tcss file.
use std::fs::OpenOptions;
use std::io::{self, IsTerminal, prelude::*};
use std::path::Path;
use std::sync::LazyLock;
use std::{fs, path::PathBuf};
use termio::prelude::*;

const STYLE_DIR: &str = ".crashdmesg";
const STYLE_FILE: &str = "styles.tcss";

/// Create the style file if it is missing.
pub fn generate_style_file() {
    if let Some(mut path) = dirs::home_dir() {
        path.push(STYLE_DIR);
        if make_dir(&path) {
            path.push(STYLE_FILE);
            default_styles(path);
        }
    } else {
        eprintln!("couldn't find home directory"); // don't use warn() here
    }
}

/// Each method names an element in the style sheet. Output that isn't going to a
/// terminal is left unstyled so redirected stderr has no escape sequences.
pub trait Styling {
    fn paint(&self, element: &str) -> String;

    fn explain_title(&self) -> String {
        self.paint("explain title")
    }

    fn explain_text(&self) -> String {
        self.paint("explain text")
    }

    fn progress_name(&self) -> String {
        self.paint("progress name")
    }

    fn progress_text(&self) -> String {
        self.paint("progress text")
    }

    fn table_header(&self) -> String {
        self.paint("table header")
    }

    fn table_sep(&self) -> String {
        self.paint("table separator")
    }

    fn table_field(&self) -> String {
        self.paint("table field")
    }

    fn warn(&self) -> String {
        self.paint("warn")
    }
}

impl<S: AsRef<str> + ?Sized> Styling for S {
    fn paint(&self, element: &str) -> String {
        paint(self.as_ref(), element, *PLAIN)
    }
}

fn paint(text: &str, element: &str, plain: bool) -> String {
    if plain {
        text.to_string()
    } else {
        text.style(element, &TCSS).to_string()
    }
}

// Everything styled is written to stderr.
static PLAIN: LazyLock<bool> = LazyLock::new(|| !io::stderr().is_terminal());

static TCSS: LazyLock<Termio> = LazyLock::new(|| {
    let Some(mut path) = dirs::home_dir() else {
        return Termio::new(); // we'll have warned about this already
    };
    path.push(STYLE_DIR);
    path.push(STYLE_FILE);
    if !path.exists() {
        return Termio::new(); // e.g. unit tests
    }
    match path.into_os_string().into_string() {
        Ok(os_path) => match Termio::from_file(&os_path) {
            Ok(tcss) => tcss,
            Err(err) => {
                eprintln!("couldn't parse file at {os_path}: {err}"); // don't use warn() here
                Termio::new()
            }
        },
        Err(path) => {
            eprintln!("style path isn't unicode: {}", path.to_string_lossy());
            Termio::new()
        }
    }
});

fn make_dir(path: &Path) -> bool {
    match fs::create_dir(path) {
        Ok(_) => true,
        Err(err) => match err.kind() {
            io::ErrorKind::AlreadyExists => true,
            _ => {
                eprintln!("couldn't create path for {}: {err}", path.display()); // don't use warn() here
                false
            }
        },
    }
}

fn default_styles(path: PathBuf) {
    match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path.clone())
    {
        Ok(mut file) => {
            let defaults = include_str!("default.tcss");
            if let Err(err) = file.write_all(defaults.as_bytes()) {
                eprintln!("error writing defaults to {}: {err}", path.display());
            }
        }
        Err(err) => match err.kind() {
            io::ErrorKind::AlreadyExists => (), // user already has a styles file
            _ => eprintln!("error creating {}: {err}", path.display()), // don't use warn() here
        },
    }
}
