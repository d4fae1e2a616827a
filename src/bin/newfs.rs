//! `newfs img_file size ninodes nlog` — create an empty xv6 image.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "newfs", about = "Create an empty xv6 file system image")]
struct Args {
    /// Image file to create (truncated if it already exists)
    img_file: PathBuf,

    /// Total number of blocks
    size: u32,

    /// Number of inodes
    ninodes: u32,

    /// Number of log blocks
    nlog: u32,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let (img, layout) = match xv6img::newfs::setupfs(args.size, args.ninodes, args.nlog) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("newfs: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("# of blocks: {}", layout.size);
    println!("# of inodes: {}", layout.ninodes);
    println!("# of log blocks: {}", layout.nlog);
    println!("# of inode blocks: {}", layout.niblocks);
    println!("# of bitmap blocks: {}", layout.nmblocks);
    println!("# of data blocks: {}", layout.nblocks);

    let result = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&args.img_file)
        .and_then(|mut f| {
            use std::io::Write;
            f.write_all(&img.into_bytes())
        });
    if let Err(e) = result {
        eprintln!("{}: {e}", args.img_file.display());
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
