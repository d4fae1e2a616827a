//! L5: the `modfs` structural editors.
//!
//! Unlike `commands.rs`, these operate below the filesystem's own
//! invariants — `inode.type`, `bitmap`, and `inode.addrs` can be poked
//! into values `newfs`/`opfs` would never produce. That's the point:
//! `modfs` exists to construct the corrupt images used to test `opfs`'s
//! own error handling, so every setter here writes through without
//! validating anything beyond "does this field/index exist".

use crate::dir;
use crate::error::{Error, Result};
use crate::image::{DInode, Dirent, Image, SuperBlock};
use crate::layout::{DIRENT_SIZE, NDIRECT, NINDIRECT, ROOTINO};
use crate::path;

fn path_str(p: &[u8]) -> String {
    String::from_utf8_lossy(p).into_owned()
}

/// Gets (`val.is_none()`) or sets a named superblock field, returning
/// the prior/current value for the caller to print.
pub fn superblock_field(img: &mut Image, field: &str, val: Option<u32>) -> Result<u32> {
    let mut sb = img.superblock();
    let slot = match field {
        "size" => &mut sb.size,
        "nblocks" => &mut sb.nblocks,
        "ninodes" => &mut sb.ninodes,
        "nlog" => &mut sb.nlog,
        "logstart" => &mut sb.logstart,
        "inodestart" => &mut sb.inodestart,
        "bmapstart" => &mut sb.bmapstart,
        _ => return Err(Error::user(format!("no such field in superblock: {field}"))),
    };
    let current = *slot;
    if let Some(v) = val {
        *slot = v;
        img.set_superblock(&sb);
        Ok(v)
    } else {
        Ok(current)
    }
}

/// Gets or sets bit `bnum` of the free-block bitmap directly, with no
/// range check against `sb.nblocks`/`sb.data_start` — only against the
/// image's total block count, matching the original's `bnum >=
/// SBLK(img)->size` guard.
pub fn bitmap(img: &mut Image, sb: &SuperBlock, bnum: u32, val: Option<u8>) -> Result<u8> {
    if bnum >= sb.size {
        return Err(Error::user(format!("bitmap: {bnum}: invalid block number")));
    }
    match val {
        None => Ok(crate::bitmap::get_bit(img, sb, bnum) as u8),
        Some(0) => {
            crate::bitmap::set_bit(img, sb, bnum, false);
            Ok(0)
        }
        Some(1) => {
            crate::bitmap::set_bit(img, sb, bnum, true);
            Ok(1)
        }
        Some(_) => Err(Error::user("bitmap: val must be 0 or 1")),
    }
}

fn load_inode(img: &Image, sb: &SuperBlock, inum: u32) -> Result<DInode> {
    if inum < 1 || inum >= sb.ninodes {
        return Err(Error::user(format!("inode: {inum}: invalid inode number")));
    }
    Ok(img.read_inode(sb, inum))
}

/// `inode.type`/`inode.nlink`/`inode.size`/`inode.indirect`.
pub fn inode_field(img: &mut Image, sb: &SuperBlock, inum: u32, field: &str, val: Option<u32>) -> Result<u32> {
    let mut dino = load_inode(img, sb, inum)?;
    let current;
    match field {
        "type" => {
            current = dino.file_type as u32;
            if let Some(v) = val {
                dino.file_type = v as u16;
            }
        }
        "nlink" => {
            current = dino.nlink as u32;
            if let Some(v) = val {
                dino.nlink = v as u16;
            }
        }
        "size" => {
            current = dino.size;
            if let Some(v) = val {
                dino.size = v;
            }
        }
        "indirect" => {
            current = dino.addrs[NDIRECT];
            if let Some(v) = val {
                dino.addrs[NDIRECT] = v;
            }
        }
        _ => return Err(Error::user(format!("no such inode field: {field}"))),
    }
    if val.is_some() {
        img.write_inode(sb, inum, &dino);
    }
    Ok(current)
}

/// `inode.addrs inum n [val]`: direct entries for `n < NDIRECT`,
/// indirect-block entries for `NDIRECT <= n < NDIRECT + NINDIRECT`
/// (which requires the inode's indirect pointer to already be a valid
/// data block).
pub fn inode_addrs(img: &mut Image, sb: &SuperBlock, inum: u32, n: u32, val: Option<u32>) -> Result<u32> {
    let mut dino = load_inode(img, sb, inum)?;
    if (n as usize) < NDIRECT {
        let current = dino.addrs[n as usize];
        if let Some(v) = val {
            dino.addrs[n as usize] = v;
            img.write_inode(sb, inum, &dino);
        }
        return Ok(current);
    }
    if (n as usize) >= NDIRECT + NINDIRECT {
        return Err(Error::user(format!("inode: {n}: invalid index number")));
    }
    let b = dino.addrs[NDIRECT];
    if !sb.valid_data_block(b) {
        return Err(Error::user(format!("inode: {b}: not a valid data block")));
    }
    let k = n as usize - NDIRECT;
    let current = u32::from_le_bytes(img.block(b)[k * 4..k * 4 + 4].try_into().unwrap());
    if let Some(v) = val {
        img.block_mut(b)[k * 4..k * 4 + 4].copy_from_slice(&v.to_le_bytes());
    }
    Ok(current)
}

pub enum DirentEdit {
    Get,
    SetInum(u32),
    Delete,
}

/// `dirent path name [val|delete]`. Returns the current inode number on
/// a `Get`; `Delete`/`SetInum` return `None` (a set is silent, like the
/// original's `do_dirent`).
pub fn dirent(img: &mut Image, sb: &SuperBlock, path: &[u8], name: &[u8], edit: DirentEdit) -> Result<Option<u32>> {
    let dp = path::ilookup(img, sb, ROOTINO, path)?
        .ok_or_else(|| Error::user(format!("dirent: {}: no such directory", path_str(path))))?;
    let dino = img.read_inode(sb, dp);
    if !dino.is_dir() {
        return Err(Error::user(format!("dirent: {}: not a directory", path_str(path))));
    }

    let found = dir::dlookup(img, sb, dp, name)?;
    match edit {
        DirentEdit::Get => {
            let (inum, _) = found
                .ok_or_else(|| Error::user(format!("dirent: {}: no such file or directory", path_str(name))))?;
            Ok(Some(inum))
        }
        DirentEdit::Delete => {
            let (_, off) = found
                .ok_or_else(|| Error::user(format!("dirent: {}: no such file or directory", path_str(name))))?;
            let buf = [0u8; DIRENT_SIZE];
            crate::inode::iwrite(img, sb, dp, &buf, off)?;
            Ok(None)
        }
        DirentEdit::SetInum(new_inum) => {
            let (_, off) = found
                .ok_or_else(|| Error::user(format!("dirent: {}: no such file or directory", path_str(name))))?;
            let mut buf = [0u8; DIRENT_SIZE];
            let n = crate::inode::iread(img, sb, dp, &mut buf, off)?;
            if n != DIRENT_SIZE {
                return Err(Error::user(format!("dirent: {}: read error", path_str(name))));
            }
            let mut de = Dirent::read_le(&buf);
            de.inum = new_inum as u16;
            de.write_le(&mut buf);
            let n = crate::inode::iwrite(img, sb, dp, &buf, off)?;
            if n != DIRENT_SIZE {
                return Err(Error::user(format!("dirent: {}: write error", path_str(name))));
            }
            Ok(None)
        }
    }
}
