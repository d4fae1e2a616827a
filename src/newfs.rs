//! L6: `newfs` — lays out a brand-new image and its root directory.
//!
//! Mirrors the original's `setupfs`: compute the five region
//! boundaries, zero the whole image, write the superblock, mark every
//! metadata block `[0, dstart)` used in the bitmap, then allocate the
//! root directory as inode `ROOTINO` with `.` and `..` both pointing at
//! itself.

use crate::dir;
use crate::error::{Error, Result};
use crate::image::{Image, SuperBlock};
use crate::inode;
use crate::layout::{FileType, BPB, BSIZE, FSMAGIC, IPB, ROOTINO};

/// The computed region layout, returned alongside the image so callers
/// (the `newfs` binary) can print the same summary the original did.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub size: u32,
    pub ninodes: u32,
    pub nlog: u32,
    pub niblocks: u32,
    pub nmblocks: u32,
    pub nblocks: u32,
    pub logstart: u32,
    pub inodestart: u32,
    pub bmapstart: u32,
    pub dstart: u32,
}

fn layout(size: u32, ninodes: u32, nlog: u32) -> Result<Layout> {
    let niblocks = ninodes / IPB + 1;
    let nmblocks = size / (BSIZE as u32 * 8) + 1;
    let logstart = 2;
    let inodestart = logstart + nlog;
    let bmapstart = inodestart + niblocks;
    let dstart = bmapstart + nmblocks;
    let nblocks = size.checked_sub(2 + nlog + niblocks + nmblocks).ok_or_else(|| {
        Error::user(format!(
            "newfs: {size}: too small for {ninodes} inodes and {nlog} log blocks"
        ))
    })?;
    Ok(Layout {
        size,
        ninodes,
        nlog,
        niblocks,
        nmblocks,
        nblocks,
        logstart,
        inodestart,
        bmapstart,
        dstart,
    })
}

/// Builds a fresh image of `size` blocks with `ninodes` inodes and
/// `nlog` log blocks. Returns the populated image and the layout
/// summary (for the binary to print, same six lines the original
/// prints before formatting).
pub fn setupfs(size: u32, ninodes: u32, nlog: u32) -> Result<(Image, Layout)> {
    let layout = layout(size, ninodes, nlog)?;

    let mut img = Image::new(vec![0u8; size as usize * BSIZE]);
    let sb = SuperBlock {
        magic: FSMAGIC,
        size: layout.size,
        nblocks: layout.nblocks,
        ninodes: layout.ninodes,
        nlog: layout.nlog,
        logstart: layout.logstart,
        inodestart: layout.inodestart,
        bmapstart: layout.bmapstart,
    };
    img.set_superblock(&sb);

    let mut b = 0u32;
    while b < layout.dstart {
        let mut bi = 0u32;
        while bi < BPB && b + bi < layout.dstart {
            crate::bitmap::set_bit(&mut img, &sb, b + bi, true);
            bi += 1;
        }
        b += BPB;
    }

    let root = inode::ialloc(&mut img, &sb, FileType::Dir as u16)?;
    if root != ROOTINO {
        return Err(Error::user(format!(
            "newfs: root directory got inode #{root}, expected #{ROOTINO}"
        )));
    }
    dir::dinit(&mut img, &sb, root, root)?;

    Ok((img, layout))
}
