//! L4: path walking over raw byte strings.
//!
//! Paths are plain byte slices (no `OsStr`/UTF-8 requirement, matching
//! the original's `char *`), split on `/` and truncated to `DIRSIZ` per
//! component just like an xv6 path lookup.

use crate::dir;
use crate::error::{Error, Result};
use crate::image::Image;
use crate::layout::{DIRSIZ, FileType};

fn is_sep(b: u8) -> bool {
    b == b'/'
}

/// Splits off the next path component, truncated to `DIRSIZ` bytes, and
/// returns it along with the remainder of the path (leading separators
/// before the *next* component are left for the next call to skip).
fn skipelem(path: &[u8]) -> (Vec<u8>, &[u8]) {
    let mut p = path;
    while let Some(&c) = p.first() {
        if is_sep(c) {
            p = &p[1..];
        } else {
            break;
        }
    }
    let s = p;
    let mut i = 0;
    while i < p.len() && !is_sep(p[i]) {
        i += 1;
    }
    let name = s[..i.min(DIRSIZ)].to_vec();
    (name, &p[i..])
}

/// Splits `path` into its directory part and final element, xv6
/// `dirname`/`basename` style. The directory part keeps whatever
/// separators originally preceded the final element.
pub fn splitpath(path: &[u8]) -> (Vec<u8>, &[u8]) {
    let mut p = path;
    let mut s: &[u8] = path;
    while !p.is_empty() {
        while let Some(&c) = p.first() {
            if is_sep(c) {
                p = &p[1..];
            } else {
                break;
            }
        }
        s = p;
        let mut i = 0;
        while i < p.len() && !is_sep(p[i]) {
            i += 1;
        }
        p = &p[i..];
    }
    let dirlen = path.len() - s.len();
    (path[..dirlen].to_vec(), s)
}

fn name_str(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

/// Resolves `path` relative to directory inode `rp`. `Ok(None)` if any
/// component is missing; an empty or all-separator path resolves to
/// `rp` itself.
pub fn ilookup(img: &mut Image, sb: &crate::image::SuperBlock, rp: u32, path: &[u8]) -> Result<Option<u32>> {
    let mut rp = rp;
    let mut path = path;
    loop {
        let (name, rest) = skipelem(path);
        path = rest;
        if name.is_empty() {
            return Ok(Some(rp));
        }
        let found = dir::dlookup(img, sb, rp, &name)?;
        let inum = match found {
            Some((inum, _)) => inum,
            None => return Ok(None),
        };
        if path.is_empty() || path.iter().all(|&b| is_sep(b)) {
            return Ok(Some(inum));
        }
        let dino = img.read_inode(sb, inum);
        if !dino.is_dir() {
            return Err(Error::user(format!("ilookup: {}: not a directory", name_str(&name))));
        }
        rp = inum;
    }
}

/// Creates a file or directory of the given type at `path`, relative to
/// `rp`. Returns `(new_inum, parent_inum)`. Fails if the final
/// component already exists, if an intermediate component is missing,
/// or if an intermediate component isn't a directory.
pub fn icreat(
    img: &mut Image,
    sb: &crate::image::SuperBlock,
    rp: u32,
    path: &[u8],
    file_type: u16,
) -> Result<(u32, u32)> {
    let mut rp = rp;
    let mut path = path;
    loop {
        let (name, rest) = skipelem(path);
        path = rest;
        if name.is_empty() {
            return Err(Error::user("icreat: empty file name"));
        }
        let existing = dir::dlookup(img, sb, rp, &name)?;
        if path.is_empty() || path.iter().all(|&b| is_sep(b)) {
            if existing.is_some() {
                return Err(Error::user(format!("icreat: {}: file exists", name_str(&name))));
            }
            let ip = crate::inode::ialloc(img, sb, file_type)?;
            dir::daddent(img, sb, rp, &name, ip)?;
            if file_type == FileType::Dir as u16 {
                dir::dinit(img, sb, ip, rp)?;
            }
            return Ok((ip, rp));
        }
        match existing {
            Some((inum, _)) => {
                let dino = img.read_inode(sb, inum);
                if !dino.is_dir() {
                    return Err(Error::user(format!("icreat: {}: no such directory", name_str(&name))));
                }
                rp = inum;
            }
            None => return Err(Error::user(format!("icreat: {}: no such directory", name_str(&name)))),
        }
    }
}

/// Removes the entry named by the final component of `path`. Fails on
/// an empty final name, an attempt to unlink `.`/`..`, or a missing
/// intermediate directory. Drops the target's `nlink`, freeing it (and
/// truncating its content) once the count reaches zero.
pub fn iunlink(img: &mut Image, sb: &crate::image::SuperBlock, rp: u32, path: &[u8]) -> Result<()> {
    let mut rp = rp;
    let mut path = path;
    loop {
        let (name, rest) = skipelem(path);
        path = rest;
        if name.is_empty() {
            return Err(Error::user("iunlink: empty file name"));
        }
        let found = dir::dlookup(img, sb, rp, &name)?;
        let (inum, off) = match found {
            Some(x) => x,
            None => return Err(Error::user(format!("iunlink: {}: no such directory", name_str(&name)))),
        };
        if path.is_empty() || path.iter().all(|&b| is_sep(b)) {
            if name == b"." || name == b".." {
                return Err(Error::user("iunlink: cannot unlink \".\" or \"..\""));
            }
            dir::ddelent(img, sb, rp, off)?;

            let dino = img.read_inode(sb, inum);
            if dino.is_dir() {
                if let Some((dotdot, _)) = dir::dlookup(img, sb, inum, b"..")? {
                    if dotdot == rp {
                        dir::bump_nlink(img, sb, rp, -1)?;
                    }
                }
            }
            dir::bump_nlink(img, sb, inum, -1)?;
            let dino = img.read_inode(sb, inum);
            if dino.nlink == 0 {
                if !dino.is_device() {
                    crate::inode::itruncate(img, sb, inum, 0)?;
                }
                crate::inode::ifree(img, sb, inum);
            }
            return Ok(());
        }
        let dino = img.read_inode(sb, inum);
        if !dino.is_dir() {
            return Err(Error::user(format!("iunlink: {}: no such directory", name_str(&name))));
        }
        rp = inum;
    }
}
