//! L3: directories as sequences of fixed-size `dirent` records.
//!
//! A directory is just a regular file whose bytes are `dirent` records;
//! everything here is built on top of `inode::iread`/`inode::iwrite`.
//! Deleted entries are tombstoned (`inum == 0`) and reused by later
//! inserts, but a directory's `size` only ever grows — there is no
//! compaction, matching the original.

use crate::error::{Error, Result};
use crate::image::{DInode, Dirent, Image, SuperBlock};
use crate::layout::DIRENT_SIZE;

/// Compares a path component against a directory entry's name, both
/// truncated to `DIRSIZ`.
fn name_eq(a: &[u8], b: &[u8]) -> bool {
    a == b
}

fn read_entry(img: &mut Image, sb: &SuperBlock, inum: u32, off: u32) -> Result<Option<Dirent>> {
    let mut buf = [0u8; DIRENT_SIZE];
    let n = crate::inode::iread(img, sb, inum, &mut buf, off)?;
    if n == DIRENT_SIZE {
        Ok(Some(Dirent::read_le(&buf)))
    } else {
        Ok(None)
    }
}

fn write_entry(img: &mut Image, sb: &SuperBlock, inum: u32, off: u32, de: &Dirent) -> Result<()> {
    let mut buf = [0u8; DIRENT_SIZE];
    de.write_le(&mut buf);
    crate::inode::iwrite(img, sb, inum, &buf, off)?;
    Ok(())
}

/// Looks up `name` in directory inode `dp`. Returns the matching
/// entry's inode number and its byte offset within the directory (the
/// offset is handy for in-place edits such as `rm`/`unlink`).
pub fn dlookup(img: &mut Image, sb: &SuperBlock, dp: u32, name: &[u8]) -> Result<Option<(u32, u32)>> {
    let dino = img.read_inode(sb, dp);
    let mut off = 0u32;
    while off < dino.size {
        if let Some(de) = read_entry(img, sb, dp, off)? {
            if de.inum != 0 && name_eq(de.name_bytes(), name) {
                return Ok(Some((de.inum as u32, off)));
            }
        }
        off += DIRENT_SIZE as u32;
    }
    Ok(None)
}

/// Adds a `(name, inum)` entry to directory `dp`, reusing the first
/// tombstoned slot if one exists, else appending. Fails if `name`
/// already appears in `dp`. Bumps the target inode's `nlink` unless
/// `name` is `.` (a self-reference that doesn't count as an extra
/// link).
pub fn daddent(img: &mut Image, sb: &SuperBlock, dp: u32, name: &[u8], inum: u32) -> Result<()> {
    let dino = img.read_inode(sb, dp);
    let mut off = 0u32;
    let mut free_off = None;
    while off < dino.size {
        if let Some(de) = read_entry(img, sb, dp, off)? {
            if de.inum == 0 {
                if free_off.is_none() {
                    free_off = Some(off);
                }
            } else if name_eq(de.name_bytes(), name) {
                return Err(Error::user(format!(
                    "daddent: {}: exists",
                    String::from_utf8_lossy(name)
                )));
            }
        }
        off += DIRENT_SIZE as u32;
    }
    let off = free_off.unwrap_or(dino.size);

    let mut de = Dirent::empty();
    de.inum = inum as u16;
    de.set_name(name);
    write_entry(img, sb, dp, off, &de)?;

    if name != b"." {
        bump_nlink(img, sb, inum, 1)?;
    }
    Ok(())
}

/// Deletes the entry at byte offset `off` within directory `dp` by
/// tombstoning it in place. The slot is left for `daddent` to reuse;
/// the directory's `size` is never shrunk.
pub fn ddelent(img: &mut Image, sb: &SuperBlock, dp: u32, off: u32) -> Result<()> {
    write_entry(img, sb, dp, off, &Dirent::empty())
}

/// Repoints directory `cip`'s `..` entry at `pip`, for reparenting a
/// moved directory, and bumps `pip`'s `nlink` to account for the new
/// child. Does not touch the old parent's `nlink`; the caller unlinks
/// the old `(name, cip)` entry itself.
pub fn dmkparlink(img: &mut Image, sb: &SuperBlock, pip: u32, cip: u32) -> Result<()> {
    let dino_p = img.read_inode(sb, pip);
    let dino_c = img.read_inode(sb, cip);
    if !dino_p.is_dir() {
        return Err(Error::user(format!("dmkparlink: #{pip}: not a directory")));
    }
    if !dino_c.is_dir() {
        return Err(Error::user(format!("dmkparlink: #{cip}: not a directory")));
    }
    let (_, off) = dlookup(img, sb, cip, b"..")?
        .ok_or_else(|| Error::user(format!("dmkparlink: #{cip}: missing \"..\" entry")))?;
    let mut de = Dirent::empty();
    de.inum = pip as u16;
    de.set_name(b"..");
    write_entry(img, sb, cip, off, &de)?;
    bump_nlink(img, sb, pip, 1)
}

/// Adjusts `inum`'s link count by `delta` and writes it back.
pub(crate) fn bump_nlink(img: &mut Image, sb: &SuperBlock, inum: u32, delta: i32) -> Result<()> {
    let mut dino = img.read_inode(sb, inum);
    dino.nlink = (dino.nlink as i32 + delta) as u16;
    img.write_inode(sb, inum, &dino);
    Ok(())
}

/// True iff directory `dp` contains exactly two live entries (`.` and
/// `..`, which is all `icreat` ever puts at offsets `0` and
/// `DIRENT_SIZE`, and which `iunlink` refuses to remove).
pub fn emptydir(img: &mut Image, sb: &SuperBlock, dp: u32) -> Result<bool> {
    let dino = img.read_inode(sb, dp);
    let mut nent = 0u32;
    let mut off = 0u32;
    while off < dino.size {
        if let Some(de) = read_entry(img, sb, dp, off)? {
            if de.inum != 0 {
                nent += 1;
            }
        }
        off += DIRENT_SIZE as u32;
    }
    Ok(nent == 2)
}

/// Iterates live `(name, inum, dinode)` entries of directory `dp`, in
/// on-disk order, for `ls`-style listing. Tombstoned slots are skipped.
pub fn diter(img: &mut Image, sb: &SuperBlock, dp: u32) -> Result<Vec<(Vec<u8>, u32, DInode)>> {
    let dino = img.read_inode(sb, dp);
    let mut out = Vec::new();
    let mut off = 0u32;
    while off < dino.size {
        if let Some(de) = read_entry(img, sb, dp, off)? {
            if de.inum != 0 {
                let child = img.read_inode(sb, de.inum as u32);
                out.push((de.name_bytes().to_vec(), de.inum as u32, child));
            }
        }
        off += DIRENT_SIZE as u32;
    }
    Ok(out)
}

/// Creates the `.` and `..` entries of a freshly allocated, otherwise
/// empty directory inode `dp` whose parent is `parent` (equal to `dp`
/// itself for the root directory). Used by `icreat` and by `newfs`.
pub fn dinit(img: &mut Image, sb: &SuperBlock, dp: u32, parent: u32) -> Result<()> {
    daddent(img, sb, dp, b".", dp)?;
    daddent(img, sb, dp, b"..", parent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{FileType, BSIZE, FSMAGIC};

    fn fresh_image() -> (Image, SuperBlock) {
        let sb = SuperBlock {
            magic: FSMAGIC,
            size: 200,
            nblocks: 200 - 5,
            ninodes: 32,
            nlog: 0,
            logstart: 2,
            inodestart: 2,
            bmapstart: 6,
        };
        let mut img = Image::new(vec![0u8; sb.size as usize * BSIZE]);
        img.set_superblock(&sb);
        for b in 0..sb.data_start() {
            crate::bitmap::set_bit(&mut img, &sb, b, true);
        }
        (img, sb)
    }

    #[test]
    fn add_lookup_and_delete_round_trip() {
        let (mut img, sb) = fresh_image();
        let dp = crate::inode::ialloc(&mut img, &sb, FileType::Dir as u16).unwrap();
        dinit(&mut img, &sb, dp, dp).unwrap();

        let child = crate::inode::ialloc(&mut img, &sb, FileType::File as u16).unwrap();
        daddent(&mut img, &sb, dp, b"foo.txt", child).unwrap();

        let (inum, off) = dlookup(&mut img, &sb, dp, b"foo.txt").unwrap().unwrap();
        assert_eq!(inum, child);
        assert_eq!(img.read_inode(&sb, child).nlink, 1);

        ddelent(&mut img, &sb, dp, off).unwrap();
        assert!(dlookup(&mut img, &sb, dp, b"foo.txt").unwrap().is_none());
    }

    #[test]
    fn daddent_rejects_duplicate_name() {
        let (mut img, sb) = fresh_image();
        let dp = crate::inode::ialloc(&mut img, &sb, FileType::Dir as u16).unwrap();
        dinit(&mut img, &sb, dp, dp).unwrap();
        let a = crate::inode::ialloc(&mut img, &sb, FileType::File as u16).unwrap();
        daddent(&mut img, &sb, dp, b"dup", a).unwrap();
        let b = crate::inode::ialloc(&mut img, &sb, FileType::File as u16).unwrap();
        assert!(daddent(&mut img, &sb, dp, b"dup", b).is_err());
    }

    #[test]
    fn tombstoned_slot_is_reused_by_next_add() {
        let (mut img, sb) = fresh_image();
        let dp = crate::inode::ialloc(&mut img, &sb, FileType::Dir as u16).unwrap();
        dinit(&mut img, &sb, dp, dp).unwrap();

        let a = crate::inode::ialloc(&mut img, &sb, FileType::File as u16).unwrap();
        daddent(&mut img, &sb, dp, b"a", a).unwrap();
        let (_, off_a) = dlookup(&mut img, &sb, dp, b"a").unwrap().unwrap();
        ddelent(&mut img, &sb, dp, off_a).unwrap();

        let size_before = img.read_inode(&sb, dp).size;
        let b = crate::inode::ialloc(&mut img, &sb, FileType::File as u16).unwrap();
        daddent(&mut img, &sb, dp, b"b", b).unwrap();
        let size_after = img.read_inode(&sb, dp).size;
        assert_eq!(size_before, size_after, "reused tombstone must not grow the directory");
    }

    #[test]
    fn emptydir_true_only_for_dot_and_dotdot() {
        let (mut img, sb) = fresh_image();
        let dp = crate::inode::ialloc(&mut img, &sb, FileType::Dir as u16).unwrap();
        dinit(&mut img, &sb, dp, dp).unwrap();
        assert!(emptydir(&mut img, &sb, dp).unwrap());

        let child = crate::inode::ialloc(&mut img, &sb, FileType::File as u16).unwrap();
        daddent(&mut img, &sb, dp, b"x", child).unwrap();
        assert!(!emptydir(&mut img, &sb, dp).unwrap());
    }

    #[test]
    fn dmkparlink_repoints_dotdot_and_bumps_new_parent_nlink() {
        let (mut img, sb) = fresh_image();
        let old_parent = crate::inode::ialloc(&mut img, &sb, FileType::Dir as u16).unwrap();
        dinit(&mut img, &sb, old_parent, old_parent).unwrap();
        let new_parent = crate::inode::ialloc(&mut img, &sb, FileType::Dir as u16).unwrap();
        dinit(&mut img, &sb, new_parent, old_parent).unwrap();
        let child = crate::inode::ialloc(&mut img, &sb, FileType::Dir as u16).unwrap();
        dinit(&mut img, &sb, child, old_parent).unwrap();

        let before = img.read_inode(&sb, new_parent).nlink;
        dmkparlink(&mut img, &sb, new_parent, child).unwrap();
        let (inum, _) = dlookup(&mut img, &sb, child, b"..").unwrap().unwrap();
        assert_eq!(inum, new_parent);
        assert_eq!(img.read_inode(&sb, new_parent).nlink, before + 1);
    }
}
