//! `opfs img_file <command> [args...]` — inspect and edit the contents
//! of an xv6 file system image.

use clap::{Parser, Subcommand};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use xv6img::commands;

#[derive(Parser, Debug)]
#[command(name = "opfs", about = "Operate on an xv6 file system image")]
struct Args {
    img_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a layout summary of the image
    Diskinfo,
    /// Print metadata for a single file or directory
    Info { path: String },
    /// List a directory's contents, or a single file's metadata
    Ls { path: String },
    /// Print a file's content to stdout
    Get { path: String },
    /// Write stdin to a file, creating it if necessary
    Put { path: String },
    /// Remove a file (not a directory)
    Rm { path: String },
    /// Copy a file
    Cp { spath: String, dpath: String },
    /// Move or rename a file or directory
    Mv { spath: String, dpath: String },
    /// Create a second name for an existing file
    Ln { spath: String, dpath: String },
    /// Create a directory
    Mkdir { path: String },
    /// Remove an empty directory
    Rmdir { path: String },
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let mut img = match xv6img::host::load(&args.img_file) {
        Ok(img) => img,
        Err(e) => {
            eprintln!("{}: {e}", args.img_file.display());
            return ExitCode::FAILURE;
        }
    };
    let sb = img.superblock();

    // Like the original's shared mmap, any mutation already applied to
    // `img` is written back regardless of whether the command went on to
    // fail — there is no rollback (see SPEC_FULL.md §5).
    let result = run(&args.command, &mut img, &sb);
    if let Err(e) = xv6img::host::store(&args.img_file, img) {
        eprintln!("{}: {e}", args.img_file.display());
        return ExitCode::FAILURE;
    }
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cmd: &Command, img: &mut xv6img::Image, sb: &xv6img::SuperBlock) -> xv6img::Result<()> {
    match cmd {
        Command::Diskinfo => {
            for line in commands::diskinfo(img, sb) {
                println!("{line}");
            }
            Ok(())
        }
        Command::Info { path } => {
            for line in commands::info(img, sb, path.as_bytes())? {
                println!("{line}");
            }
            Ok(())
        }
        Command::Ls { path } => {
            for line in commands::ls(img, sb, path.as_bytes())? {
                println!("{line}");
            }
            Ok(())
        }
        Command::Get { path } => {
            let data = commands::get(img, sb, path.as_bytes())?;
            std::io::stdout()
                .write_all(&data)
                .map_err(xv6img::Error::from)?;
            Ok(())
        }
        Command::Put { path } => {
            let mut data = Vec::new();
            std::io::stdin()
                .read_to_end(&mut data)
                .map_err(xv6img::Error::from)?;
            commands::put(img, sb, path.as_bytes(), &data)?;
            Ok(())
        }
        Command::Rm { path } => {
            commands::rm(img, sb, path.as_bytes())?;
            Ok(())
        }
        Command::Cp { spath, dpath } => {
            commands::cp(img, sb, spath.as_bytes(), dpath.as_bytes())?;
            Ok(())
        }
        Command::Mv { spath, dpath } => {
            commands::mv(img, sb, spath.as_bytes(), dpath.as_bytes())?;
            Ok(())
        }
        Command::Ln { spath, dpath } => {
            commands::ln(img, sb, spath.as_bytes(), dpath.as_bytes())?;
            Ok(())
        }
        Command::Mkdir { path } => {
            commands::mkdir(img, sb, path.as_bytes())?;
            Ok(())
        }
        Command::Rmdir { path } => {
            commands::rmdir(img, sb, path.as_bytes())?;
            Ok(())
        }
    }
}
