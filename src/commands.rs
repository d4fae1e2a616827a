//! L5: the `opfs` subcommands — faithful translations of the original
//! `do_*` functions onto the engine built up in `inode`/`dir`/`path`.
//!
//! Every function here operates relative to the root directory
//! (`ROOTINO`) and returns either the lines it would print (the binary
//! decides how those get written) or raw bytes for `get`. Errors are
//! one-line messages naming the failing path, matching the original's
//! `error()` calls.

use crate::dir;
use crate::error::{Error, Result};
use crate::image::{Image, SuperBlock};
use crate::inode;
use crate::layout::{popcount_bytes, FileType, BSIZE, MAXFILESIZE, NDIRECT, ROOTINO};
use crate::path;

fn path_str(path: &[u8]) -> String {
    String::from_utf8_lossy(path).into_owned()
}

fn lookup_or_fail(img: &mut Image, sb: &SuperBlock, path: &[u8], ctx: &str) -> Result<u32> {
    path::ilookup(img, sb, ROOTINO, path)?
        .ok_or_else(|| Error::user(format!("{ctx}: {}: no such file or directory", path_str(path))))
}

/// `diskinfo`: layout summary plus used-block/used-inode tallies. Takes
/// no path argument, so it can't fail.
pub fn diskinfo(img: &Image, sb: &SuperBlock) -> Vec<String> {
    let n = sb.size;
    let ni = sb.inode_blocks();
    let nm = sb.bitmap_blocks();
    let nd = sb.nblocks;
    let nl = sb.nlog;

    let mut out = vec![
        format!("total blocks: {n} ({} bytes)", n as u64 * BSIZE as u64),
        format!("inode blocks: #2-#{} ({ni} blocks, {} inodes)", ni + 1, sb.ninodes),
        format!("bitmap blocks: #{}-#{} ({nm} blocks)", ni + 2, ni + nm + 1),
        format!("data blocks: #{}-#{} ({nd} blocks)", ni + nm + 2, ni + nm + nd + 1),
        format!(
            "log blocks: #{}-#{} ({nl} blocks)",
            ni + nm + nd + 2,
            ni + nm + nd + nl + 1
        ),
        format!("maximum file size (bytes): {MAXFILESIZE}"),
    ];

    let mut used_blocks = 0u32;
    for b in sb.bmapstart..sb.bmapstart + nm {
        used_blocks += popcount_bytes(img.block(b));
    }
    out.push(format!("# of used blocks: {used_blocks}"));

    let (mut n_dirs, mut n_files, mut n_devs) = (0u32, 0u32, 0u32);
    for inum in 1..sb.ninodes {
        let dino = img.read_inode(sb, inum);
        match FileType::from_raw(dino.file_type) {
            Some(FileType::Dir) => n_dirs += 1,
            Some(FileType::File) => n_files += 1,
            Some(FileType::Dev) => n_devs += 1,
            _ => {}
        }
    }
    out.push(format!(
        "# of used inodes: {} (dirs: {n_dirs}, files: {n_files}, devs: {n_devs})",
        n_dirs + n_files + n_devs
    ));
    out
}

/// `info path`: one inode's metadata and its data-block list.
pub fn info(img: &mut Image, sb: &SuperBlock, path: &[u8]) -> Result<Vec<String>> {
    let inum = lookup_or_fail(img, sb, path, "info")?;
    let dino = img.read_inode(sb, inum);

    let mut out = vec![
        format!("inode: {inum}"),
        format!("type: {} ({})", dino.file_type, FileType::name(dino.file_type)),
        format!("nlink: {}", dino.nlink),
        format!("size: {}", dino.size),
    ];
    if dino.size > 0 {
        let mut blocks = Vec::new();
        for &a in dino.addrs[..NDIRECT].iter() {
            if a == 0 {
                break;
            }
            blocks.push(a);
        }
        let iaddr = dino.addrs[NDIRECT];
        if iaddr != 0 {
            blocks.push(iaddr);
            let block = img.block(iaddr);
            for chunk in block.chunks_exact(4) {
                let a = u32::from_le_bytes(chunk.try_into().unwrap());
                if a == 0 {
                    break;
                }
                blocks.push(a);
            }
        }
        let rendered: Vec<String> = blocks.iter().map(|b| b.to_string()).collect();
        out.push(format!("data blocks: {}", rendered.join(" ")));
        out.push(format!("# of data blocks: {}", blocks.len()));
    }
    Ok(out)
}

/// `ls path`: one line per directory entry, or a single line if `path`
/// names a non-directory.
pub fn ls(img: &mut Image, sb: &SuperBlock, path: &[u8]) -> Result<Vec<String>> {
    let inum = lookup_or_fail(img, sb, path, "ls")?;
    let dino = img.read_inode(sb, inum);
    if dino.is_dir() {
        let entries = dir::diter(img, sb, inum)?;
        Ok(entries
            .into_iter()
            .map(|(name, child_inum, child)| {
                format!(
                    "{} {} {} {}",
                    String::from_utf8_lossy(&name),
                    child.file_type,
                    child_inum,
                    child.size
                )
            })
            .collect())
    } else {
        Ok(vec![format!(
            "{} {} {} {}",
            path_str(path),
            dino.file_type,
            inum,
            dino.size
        )])
    }
}

/// `get path`: the whole content of a file, read out in `BUFSIZE`
/// chunks (a detail invisible to the caller, who just gets the bytes).
pub fn get(img: &mut Image, sb: &SuperBlock, path: &[u8]) -> Result<Vec<u8>> {
    const BUFSIZE: usize = 1024;
    let inum = lookup_or_fail(img, sb, path, "get")?;
    let dino = img.read_inode(sb, inum);
    let mut out = Vec::with_capacity(dino.size as usize);
    let mut off = 0u32;
    let mut buf = [0u8; BUFSIZE];
    while off < dino.size {
        let n = inode::iread(img, sb, inum, &mut buf, off)?;
        out.extend_from_slice(&buf[..n]);
        if n == 0 {
            break;
        }
        off += n as u32;
    }
    Ok(out)
}

/// `put path`: (over)write a file's whole content from `data`, creating
/// it if it doesn't exist. Silently drops bytes past `MAXFILESIZE`,
/// matching the original's fixed write loop bound.
pub fn put(img: &mut Image, sb: &SuperBlock, path: &[u8], data: &[u8]) -> Result<()> {
    let existing = path::ilookup(img, sb, ROOTINO, path)?;
    let inum = match existing {
        Some(inum) => {
            let dino = img.read_inode(sb, inum);
            if !matches!(FileType::from_raw(dino.file_type), Some(FileType::File)) {
                return Err(Error::user(format!("put: {}: directory or device", path_str(path))));
            }
            inode::itruncate(img, sb, inum, 0)?;
            inum
        }
        None => {
            let (inum, _) = path::icreat(img, sb, ROOTINO, path, FileType::File as u16)
                .map_err(|_| Error::user(format!("put: {}: cannot create", path_str(path))))?;
            inum
        }
    };

    let data = if data.len() as u64 > MAXFILESIZE {
        log::debug!("put: {}: truncated to MAXFILESIZE", path_str(path));
        &data[..MAXFILESIZE as usize]
    } else {
        data
    };
    let n = inode::iwrite(img, sb, inum, data, 0)?;
    if n != data.len() {
        return Err(Error::user(format!("put: {}: write error", path_str(path))));
    }
    Ok(())
}

/// `rm path`: unlink a non-directory.
pub fn rm(img: &mut Image, sb: &SuperBlock, path: &[u8]) -> Result<()> {
    let inum = lookup_or_fail(img, sb, path, "rm")?;
    let dino = img.read_inode(sb, inum);
    if dino.is_dir() {
        return Err(Error::user(format!("rm: {}: a directory", path_str(path))));
    }
    path::iunlink(img, sb, ROOTINO, path)
        .map_err(|_| Error::user(format!("rm: {}: cannot unlink", path_str(path))))
}

/// `cp spath dpath`: copy a file's bytes to a new or existing path.
/// `dpath` may name an existing directory, in which case the copy is
/// placed inside it under `spath`'s base name.
pub fn cp(img: &mut Image, sb: &SuperBlock, spath: &[u8], dpath: &[u8]) -> Result<()> {
    let sip = lookup_or_fail(img, sb, spath, "cp")?;
    let sdino = img.read_inode(sb, sip);
    if !matches!(FileType::from_raw(sdino.file_type), Some(FileType::File)) {
        return Err(Error::user(format!("cp: {}: directory or device file", path_str(spath))));
    }

    let existing = path::ilookup(img, sb, ROOTINO, dpath)?;
    let (ddir, dname) = path::splitpath(dpath);
    let dip = match existing {
        None => {
            if dname.is_empty() {
                return Err(Error::user(format!("cp: {}: no such directory", path_str(dpath))));
            }
            let ddip = path::ilookup(img, sb, ROOTINO, &ddir)?
                .ok_or_else(|| Error::user(format!("cp: {}: no such directory", path_str(&ddir))))?;
            let ddino = img.read_inode(sb, ddip);
            if !ddino.is_dir() {
                return Err(Error::user(format!("cp: {}: not a directory", path_str(&ddir))));
            }
            let (inum, _) = path::icreat(img, sb, ddip, dname, FileType::File as u16).map_err(|_| {
                Error::user(format!(
                    "cp: {}/{}: cannot create",
                    path_str(&ddir),
                    path_str(dname)
                ))
            })?;
            inum
        }
        Some(inum) => {
            let dino = img.read_inode(sb, inum);
            if dino.is_dir() {
                let (_, sname) = path::splitpath(spath);
                let (fp, _) = path::icreat(img, sb, inum, sname, FileType::File as u16).map_err(|_| {
                    Error::user(format!(
                        "cp: {}/{}: cannot create",
                        path_str(dpath),
                        path_str(sname)
                    ))
                })?;
                fp
            } else if matches!(FileType::from_raw(dino.file_type), Some(FileType::File)) {
                inode::itruncate(img, sb, inum, 0)?;
                inum
            } else {
                return Err(Error::user(format!("cp: {}: device file", path_str(dpath))));
            }
        }
    };

    const BUFSIZE: usize = 1024;
    let mut buf = [0u8; BUFSIZE];
    let mut off = 0u32;
    let size = img.read_inode(sb, sip).size;
    while off < size {
        let n = inode::iread(img, sb, sip, &mut buf, off)?;
        let written = inode::iwrite(img, sb, dip, &buf[..n], off)?;
        if written != n {
            return Err(Error::user(format!("cp: {}: write error", path_str(dpath))));
        }
        if n == 0 {
            break;
        }
        off += n as u32;
    }
    Ok(())
}

/// `mv spath dpath`: rename/move, overwriting an existing empty
/// directory or file at the destination, and fixing up `..` when a
/// directory changes parent.
pub fn mv(img: &mut Image, sb: &SuperBlock, spath: &[u8], dpath: &[u8]) -> Result<()> {
    let sip = lookup_or_fail(img, sb, spath, "mv")?;
    if sip == ROOTINO {
        return Err(Error::user(format!("mv: {}: root directory", path_str(spath))));
    }
    let sdino = img.read_inode(sb, sip);

    let existing_dip = path::ilookup(img, sb, ROOTINO, dpath)?;
    let (ddir, dname) = path::splitpath(dpath);

    match existing_dip {
        Some(dip) => {
            let ddino = img.read_inode(sb, dip);
            if ddino.is_dir() {
                let (_, sname) = path::splitpath(spath);
                let target = dir::dlookup(img, sb, dip, sname)?;
                match target {
                    Some((tinum, _)) => {
                        let tdino = img.read_inode(sb, tinum);
                        if tdino.is_dir() {
                            if !sdino.is_dir() {
                                return Err(Error::user(format!("mv: {}: not a directory", path_str(spath))));
                            }
                            if !dir::emptydir(img, sb, tinum)? {
                                return Err(Error::user(format!(
                                    "mv: {}/{}: not empty",
                                    path_str(&ddir),
                                    path_str(sname)
                                )));
                            }
                            path::iunlink(img, sb, dip, sname)?;
                            dir::daddent(img, sb, dip, sname, sip)?;
                            path::iunlink(img, sb, ROOTINO, spath)?;
                            dir::dmkparlink(img, sb, dip, sip)?;
                        } else if matches!(FileType::from_raw(tdino.file_type), Some(FileType::File)) {
                            if !matches!(FileType::from_raw(sdino.file_type), Some(FileType::File)) {
                                return Err(Error::user(format!("mv: {}: directory or device", path_str(spath))));
                            }
                            path::iunlink(img, sb, dip, sname)?;
                            dir::daddent(img, sb, dip, sname, sip)?;
                            path::iunlink(img, sb, ROOTINO, spath)?;
                        } else {
                            return Err(Error::user(format!("mv: {}: device", path_str(dpath))));
                        }
                    }
                    None => {
                        dir::daddent(img, sb, dip, sname, sip)?;
                        path::iunlink(img, sb, ROOTINO, spath)?;
                        if sdino.is_dir() {
                            dir::dmkparlink(img, sb, dip, sip)?;
                        }
                    }
                }
            } else if matches!(FileType::from_raw(ddino.file_type), Some(FileType::File)) {
                if !matches!(FileType::from_raw(sdino.file_type), Some(FileType::File)) {
                    return Err(Error::user(format!("mv: {}: not a file", path_str(spath))));
                }
                path::iunlink(img, sb, ROOTINO, dpath)?;
                let ip = path::ilookup(img, sb, ROOTINO, &ddir)?
                    .filter(|&i| img.read_inode(sb, i).is_dir())
                    .ok_or_else(|| Error::user(format!("mv: {}: no such directory", path_str(&ddir))))?;
                dir::daddent(img, sb, ip, dname, sip)?;
                path::iunlink(img, sb, ROOTINO, spath)?;
            } else {
                return Err(Error::user(format!("mv: {}: device", path_str(dpath))));
            }
        }
        None => {
            if dname.is_empty() {
                return Err(Error::user(format!("mv: {}: no such directory", path_str(dpath))));
            }
            let ip = path::ilookup(img, sb, ROOTINO, &ddir)?
                .ok_or_else(|| Error::user(format!("mv: {}: no such directory", path_str(&ddir))))?;
            let ipdino = img.read_inode(sb, ip);
            if !ipdino.is_dir() {
                return Err(Error::user(format!("mv: {}: not a directory", path_str(&ddir))));
            }
            dir::daddent(img, sb, ip, dname, sip)?;
            path::iunlink(img, sb, ROOTINO, spath)?;
            if sdino.is_dir() {
                dir::dmkparlink(img, sb, ip, sip)?;
            }
        }
    }
    Ok(())
}

/// `ln spath dpath`: a second directory entry for an existing file
/// (hard link — `spath` must name a plain file, never a directory).
pub fn ln(img: &mut Image, sb: &SuperBlock, spath: &[u8], dpath: &[u8]) -> Result<()> {
    let sip = lookup_or_fail(img, sb, spath, "ln")?;
    let sdino = img.read_inode(sb, sip);
    if !matches!(FileType::from_raw(sdino.file_type), Some(FileType::File)) {
        return Err(Error::user(format!("ln: {}: is a directory or a device", path_str(spath))));
    }

    let (ddir, dname) = path::splitpath(dpath);
    let dip = path::ilookup(img, sb, ROOTINO, &ddir)?
        .ok_or_else(|| Error::user(format!("ln: {}: no such directory", path_str(&ddir))))?;
    let ddino = img.read_inode(sb, dip);
    if !ddino.is_dir() {
        return Err(Error::user(format!("ln: {}: not a directory", path_str(&ddir))));
    }

    let (dip, dname) = if dname.is_empty() {
        let (_, sname) = path::splitpath(spath);
        if dir::dlookup(img, sb, dip, sname)?.is_some() {
            return Err(Error::user(format!(
                "ln: {}/{}: file exists",
                path_str(&ddir),
                path_str(sname)
            )));
        }
        (dip, sname.to_vec())
    } else {
        match dir::dlookup(img, sb, dip, dname)? {
            Some((inum, _)) => {
                let dino = img.read_inode(sb, inum);
                if !dino.is_dir() {
                    return Err(Error::user(format!(
                        "ln: {}/{}: file exists",
                        path_str(&ddir),
                        path_str(dname)
                    )));
                }
                let (_, sname) = path::splitpath(spath);
                (inum, sname.to_vec())
            }
            None => (dip, dname.to_vec()),
        }
    };

    dir::daddent(img, sb, dip, &dname, sip)
        .map_err(|_| Error::user(format!("ln: {}/{}: cannot create a link", path_str(&ddir), path_str(&dname))))
}

/// `mkdir path`.
pub fn mkdir(img: &mut Image, sb: &SuperBlock, path: &[u8]) -> Result<()> {
    if path::ilookup(img, sb, ROOTINO, path)?.is_some() {
        return Err(Error::user(format!("mkdir: {}: file exists", path_str(path))));
    }
    path::icreat(img, sb, ROOTINO, path, FileType::Dir as u16)
        .map_err(|_| Error::user(format!("mkdir: {}: cannot create", path_str(path))))?;
    Ok(())
}

/// `rmdir path`: fails unless `path` is an empty directory.
pub fn rmdir(img: &mut Image, sb: &SuperBlock, path: &[u8]) -> Result<()> {
    let inum = lookup_or_fail(img, sb, path, "rmdir")?;
    let dino = img.read_inode(sb, inum);
    if !dino.is_dir() {
        return Err(Error::user(format!("rmdir: {}: not a directory", path_str(path))));
    }
    if !dir::emptydir(img, sb, inum)? {
        return Err(Error::user(format!("rmdir: {}: non-empty directory", path_str(path))));
    }
    path::iunlink(img, sb, ROOTINO, path)
        .map_err(|_| Error::user(format!("rmdir: {}: cannot unlink", path_str(path))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::FSMAGIC;

    fn fresh_image() -> (Image, SuperBlock) {
        let sb = SuperBlock {
            magic: FSMAGIC,
            size: 400,
            nblocks: 400 - 8,
            ninodes: 64,
            nlog: 0,
            logstart: 2,
            inodestart: 2,
            bmapstart: 10,
        };
        let mut img = Image::new(vec![0u8; sb.size as usize * BSIZE]);
        img.set_superblock(&sb);
        for b in 0..sb.data_start() {
            crate::bitmap::set_bit(&mut img, &sb, b, true);
        }
        let root = inode::ialloc(&mut img, &sb, FileType::Dir as u16).unwrap();
        assert_eq!(root, ROOTINO);
        dir::dinit(&mut img, &sb, root, root).unwrap();
        (img, sb)
    }

    #[test]
    fn put_then_get_round_trips() {
        let (mut img, sb) = fresh_image();
        put(&mut img, &sb, b"hello.txt", b"hello world").unwrap();
        let data = get(&mut img, &sb, b"hello.txt").unwrap();
        assert_eq!(data, b"hello world");
    }

    #[test]
    fn mkdir_then_ls_shows_new_entry() {
        let (mut img, sb) = fresh_image();
        mkdir(&mut img, &sb, b"sub").unwrap();
        let lines = ls(&mut img, &sb, b"").unwrap();
        assert!(lines.iter().any(|l| l.starts_with("sub ")));
    }

    #[test]
    fn rm_rejects_directory() {
        let (mut img, sb) = fresh_image();
        mkdir(&mut img, &sb, b"sub").unwrap();
        assert!(rm(&mut img, &sb, b"sub").is_err());
    }

    #[test]
    fn rmdir_rejects_nonempty() {
        let (mut img, sb) = fresh_image();
        mkdir(&mut img, &sb, b"sub").unwrap();
        put(&mut img, &sb, b"sub/f", b"x").unwrap();
        assert!(rmdir(&mut img, &sb, b"sub").is_err());
        rm(&mut img, &sb, b"sub/f").unwrap();
        rmdir(&mut img, &sb, b"sub").unwrap();
    }

    #[test]
    fn cp_into_existing_directory_uses_source_basename() {
        let (mut img, sb) = fresh_image();
        put(&mut img, &sb, b"a.txt", b"payload").unwrap();
        mkdir(&mut img, &sb, b"dir").unwrap();
        cp(&mut img, &sb, b"a.txt", b"dir").unwrap();
        let data = get(&mut img, &sb, b"dir/a.txt").unwrap();
        assert_eq!(data, b"payload");
    }

    #[test]
    fn mv_renames_file() {
        let (mut img, sb) = fresh_image();
        put(&mut img, &sb, b"a.txt", b"payload").unwrap();
        mv(&mut img, &sb, b"a.txt", b"b.txt").unwrap();
        assert!(path::ilookup(&mut img, &sb, ROOTINO, b"a.txt").unwrap().is_none());
        assert_eq!(get(&mut img, &sb, b"b.txt").unwrap(), b"payload");
    }

    #[test]
    fn ln_adds_second_name_for_same_inode() {
        let (mut img, sb) = fresh_image();
        put(&mut img, &sb, b"a.txt", b"payload").unwrap();
        ln(&mut img, &sb, b"a.txt", b"b.txt").unwrap();
        let a = path::ilookup(&mut img, &sb, ROOTINO, b"a.txt").unwrap().unwrap();
        let b = path::ilookup(&mut img, &sb, ROOTINO, b"b.txt").unwrap().unwrap();
        assert_eq!(a, b);
        assert_eq!(img.read_inode(&sb, a).nlink, 2);
    }
}
