//! Error types for the engine and the commands built on it.
//!
//! Three categories, matching the original tool's behavior: fatal
//! conditions unwind to the harness (`NoFreeBlocks`, `NoFreeInodes`,
//! `CorruptSuperblock`, all `is_fatal()`), user errors carry a one-line
//! message naming the failing operand (`Error::User`), and host I/O
//! failures wrap `std::io::Error`. Debug diagnostics (an
//! invalid inode number, a double free, a short directory read) are not
//! part of this type at all — they are `log::debug!`/`log::warn!` calls
//! at the call site, with the function still returning its sentinel.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no free blocks")]
    NoFreeBlocks,

    #[error("no free inodes")]
    NoFreeInodes,

    #[error("{0}: invalid data block number (corrupt superblock?)")]
    CorruptSuperblock(u32),

    #[error("{0}")]
    User(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn user(msg: impl Into<String>) -> Self {
        Error::User(msg.into())
    }

    /// True for the conditions that abort the whole command (the Rust
    /// replacement for the original's `longjmp` to `fatal_exception_buf`).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::NoFreeBlocks | Error::NoFreeInodes | Error::CorruptSuperblock(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
