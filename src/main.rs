//! `polyfsck` is a read-only checker and extractor for PolyFS images.

use polyfsck::error::{self, PolyfsError};
use polyfsck::{check, diag, sink, source::ImageSource};
use std::env;
use std::fs::File;
use std::path::PathBuf;
use std::process::exit;

/// Structure storing command line arguments.
struct Args {
    /// The name of the current program used in command line.
    prog: String,
    /// Verbosity level: 0 = quiet, 1 = `-v`, 2+ = `-vv`.
    verbose: u8,
    /// If true, print command line help.
    help: bool,
    /// Extraction directory, if `-x` was given.
    extract_dir: Option<PathBuf>,
    /// The image file to check.
    file: Option<PathBuf>,
}

fn parse_args() -> Result<Args, PolyfsError> {
    let mut iter = env::args();
    let prog = iter.next().unwrap_or_else(|| "polyfsck".to_owned());
    let mut args = Args {
        prog,
        verbose: 0,
        help: false,
        extract_dir: None,
        file: None,
    };

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" => args.help = true,
            "-v" => args.verbose += 1,
            "-x" => {
                let dir = iter
                    .next()
                    .ok_or_else(|| PolyfsError::usage("-x requires a directory argument"))?;
                args.extract_dir = Some(PathBuf::from(dir));
            }
            _ if args.file.is_none() => args.file = Some(PathBuf::from(arg)),
            _ => return Err(PolyfsError::usage("too many arguments")),
        }
    }

    if !args.help && args.file.is_none() {
        return Err(PolyfsError::usage("missing file operand"));
    }

    Ok(args)
}

fn print_usage(prog: &str) {
    eprintln!(
        "usage: {prog} [-hv] [-x dir] file\n \
         -h         print this help\n \
         -x dir     extract into dir\n \
         -v         be more verbose\n \
         file       file to test"
    );
}

fn run(args: &Args) -> Result<(), PolyfsError> {
    let path = args.file.as_ref().expect("checked in parse_args");
    let mut file = File::open(path)
        .map_err(|e| PolyfsError::operational(format!("open failed: {}: {e}", path.display())))?;
    let file_length = sink::file_length(&file).map_err(|e| {
        PolyfsError::operational(format!(
            "ioctl failed: unable to determine device size: {}: {e}",
            path.display()
        ))
    })?;

    let mut source = ImageSource::new(&mut file);
    let outcome = check(
        &mut source,
        file_length,
        args.verbose,
        args.extract_dir.as_deref(),
    )?;

    if outcome.trailing_bytes {
        diag::warn(&args.prog, "file length too long, padded?");
    }
    if args.verbose >= 1 {
        println!("{}: OK", path.display());
    }
    Ok(())
}

fn main() {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            print_usage("polyfsck");
            eprintln!("polyfsck: {e}");
            exit(error::FSCK_USAGE);
        }
    };

    if args.help {
        print_usage(&args.prog);
        exit(error::FSCK_OK);
    }

    if let Err(e) = run(&args) {
        eprintln!("{}", diag::fatal_line(&args.prog, &e.to_string()));
        exit(e.exit_code());
    }

    exit(error::FSCK_OK);
}
