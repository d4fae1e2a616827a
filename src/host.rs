//! Host-side I/O harness shared by the three binaries: read the whole
//! image file into memory, hand callers an [`Image`], write the bytes
//! back on success. No `mmap` — a full read/modify/write round trip is
//! simple, and these images are small enough (a few MiB at most) that
//! buffering the whole thing costs nothing worth avoiding it for.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use crate::image::Image;

pub fn load(path: &Path) -> std::io::Result<Image> {
    let mut file = File::open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    Ok(Image::new(data))
}

pub fn store(path: &Path, img: Image) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    file.write_all(&img.into_bytes())?;
    Ok(())
}
