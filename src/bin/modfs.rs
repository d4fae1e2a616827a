//! `modfs img_file <command> [args...]` — poke directly at an xv6 image's
//! on-disk structures, including into states `opfs`/`newfs` would never
//! produce. Used to build the corrupt images that exercise `opfs`'s own
//! error handling.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use xv6img::edit::{self, DirentEdit};

#[derive(Parser, Debug)]
#[command(name = "modfs", about = "Edit the raw structures of an xv6 file system image")]
struct Args {
    img_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// superblock.size [val]
    #[command(name = "superblock.size")]
    SbSize { val: Option<u32> },
    #[command(name = "superblock.nblocks")]
    SbNblocks { val: Option<u32> },
    #[command(name = "superblock.ninodes")]
    SbNinodes { val: Option<u32> },
    #[command(name = "superblock.nlog")]
    SbNlog { val: Option<u32> },
    #[command(name = "superblock.logstart")]
    SbLogstart { val: Option<u32> },
    #[command(name = "superblock.inodestart")]
    SbInodestart { val: Option<u32> },
    #[command(name = "superblock.bmapstart")]
    SbBmapstart { val: Option<u32> },

    /// bitmap bnum [val]
    Bitmap { bnum: u32, val: Option<u8> },

    #[command(name = "inode.type")]
    InodeType { inum: u32, val: Option<u32> },
    #[command(name = "inode.nlink")]
    InodeNlink { inum: u32, val: Option<u32> },
    #[command(name = "inode.size")]
    InodeSize { inum: u32, val: Option<u32> },
    #[command(name = "inode.indirect")]
    InodeIndirect { inum: u32, val: Option<u32> },
    #[command(name = "inode.addrs")]
    InodeAddrs { inum: u32, n: u32, val: Option<u32> },

    /// dirent path name [val|delete]
    Dirent { path: String, name: String, val: Option<String> },
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

    // Like the original's shared mmap, any mutation already applied to
    // `img` is written back regardless of whether the command went on to
    // fail — there is no rollback (see SPEC_FULL.md §5).
    let result = run(&args.command, &mut img);
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

fn run(cmd: &Command, img: &mut xv6img::Image) -> xv6img::Result<()> {
    match cmd {
        Command::SbSize { val } => print_if_get(edit::superblock_field(img, "size", *val)?, val.is_none()),
        Command::SbNblocks { val } => print_if_get(edit::superblock_field(img, "nblocks", *val)?, val.is_none()),
        Command::SbNinodes { val } => print_if_get(edit::superblock_field(img, "ninodes", *val)?, val.is_none()),
        Command::SbNlog { val } => print_if_get(edit::superblock_field(img, "nlog", *val)?, val.is_none()),
        Command::SbLogstart { val } => {
            print_if_get(edit::superblock_field(img, "logstart", *val)?, val.is_none())
        }
        Command::SbInodestart { val } => {
            print_if_get(edit::superblock_field(img, "inodestart", *val)?, val.is_none())
        }
        Command::SbBmapstart { val } => {
            print_if_get(edit::superblock_field(img, "bmapstart", *val)?, val.is_none())
        }

        Command::Bitmap { bnum, val } => {
            let sb = img.superblock();
            let current = edit::bitmap(img, &sb, *bnum, *val)?;
            print_if_get(current as u32, val.is_none());
        }

        Command::InodeType { inum, val } => {
            let sb = img.superblock();
            print_if_get(edit::inode_field(img, &sb, *inum, "type", *val)?, val.is_none());
        }
        Command::InodeNlink { inum, val } => {
            let sb = img.superblock();
            print_if_get(edit::inode_field(img, &sb, *inum, "nlink", *val)?, val.is_none());
        }
        Command::InodeSize { inum, val } => {
            let sb = img.superblock();
            print_if_get(edit::inode_field(img, &sb, *inum, "size", *val)?, val.is_none());
        }
        Command::InodeIndirect { inum, val } => {
            let sb = img.superblock();
            print_if_get(edit::inode_field(img, &sb, *inum, "indirect", *val)?, val.is_none());
        }
        Command::InodeAddrs { inum, n, val } => {
            let sb = img.superblock();
            print_if_get(edit::inode_addrs(img, &sb, *inum, *n, *val)?, val.is_none());
        }

        Command::Dirent { path, name, val } => {
            let sb = img.superblock();
            let op = match val.as_deref() {
                None => DirentEdit::Get,
                Some("delete") => DirentEdit::Delete,
                Some(v) => DirentEdit::SetInum(v.parse().map_err(|_| {
                    xv6img::Error::user(format!("dirent: {v}: not a valid inode number"))
                })?),
            };
            if let Some(inum) = edit::dirent(img, &sb, path.as_bytes(), name.as_bytes(), op)? {
                println!("{inum}");
            }
        }
    }
    Ok(())
}

fn print_if_get(val: u32, is_get: bool) {
    if is_get {
        println!("{val}");
    }
}
