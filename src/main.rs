mod elf;
mod error;
mod report;
mod ringbuf;
mod session;
mod utils;
mod vmcoreinfo;

use clap::Parser;
use clap::error::ErrorKind;
use elf::{FileImage, Image, MappedImage};
use error::DumpError;
use report::Progress;
use session::{Failure, InStep, Reporter, Session, Step};
use std::io;
use std::path::PathBuf;
use std::process;

use crate::utils::warn;

/// Dump the kernel ring buffer (the dmesg text) from a vmcore.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// path to the vmcore
    #[arg(default_value = "/proc/vmcore")]
    vmcore: PathBuf,

    /// memory map the vmcore instead of using positioned reads
    #[arg(long)]
    mmap: bool,

    /// explain the fields in the progress tables
    #[arg(short, long)]
    explain: bool,

    /// only print warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn run<I: Image>(image: I, progress: &mut Progress<io::Stderr>) -> Result<(), Failure> {
    let mut session = Session::open(image, progress)?;
    let ring = session.dump(progress)?;

    progress.step(Step::Dump);
    report::write_dump(io::stdout().lock(), &ring.text)
        .map_err(|err| DumpError::io("stdout", "couldn't write the ring buffer to", err))
        .in_step(Step::Dump)?;
    progress.done();
    Ok(())
}

/// Usage errors exit with 1 like every other failure. Asking for help or the
/// version isn't a failure.
fn usage_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

fn main() {
    utils::generate_style_file();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = usage_exit_code(err.kind());
            if code == 0 {
                err.exit();
            }
            let _ = err.print();
            process::exit(code);
        }
    };
    let mut progress = Progress::new(io::stderr(), cli.explain, cli.quiet);

    // The image is dropped (and the file closed) before exiting either way.
    let result = if cli.mmap {
        MappedImage::open(&cli.vmcore)
            .in_step(Step::Open)
            .and_then(|image| run(image, &mut progress))
    } else {
        FileImage::open(&cli.vmcore)
            .in_step(Step::Open)
            .and_then(|image| run(image, &mut progress))
    };

    if let Err(failure) = result {
        warn(&failure.to_string());
        process::exit(1);
    }
}
