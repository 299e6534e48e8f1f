//! Exclusive lock on a snapshot store directory.
//!
//! One observer per process and one process per store: a second open of the
//! same directory fails fast with `StorageError::Locked` instead of racing on
//! the journal. The OS releases the lock when the file handle closes.

use std::fs::{File, OpenOptions};
use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use std::path::{Path, PathBuf};

use crate::storage::traits::StorageError;

/// File name of the lock inside the store directory.
pub const LOCK_FILE: &str = ".lock";

/// Held for the lifetime of a `FileSnapshotStore`.
#[derive(Debug)]
pub struct FileLock {
    _file: File,
    path: PathBuf,
}

impl FileLock {
    /// Non-blocking exclusive acquire of `dir/.lock`.
    ///
    /// # Errors
    /// - `StorageError::Locked` if another handle holds the lock
    /// - `StorageError::Io` if the lock file cannot be opened
    pub fn acquire(dir: &Path) -> Result<Self, StorageError> {
        let path = dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        match try_lock(&file) {
            Ok(()) => Ok(Self { _file: file, path }),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Err(StorageError::Locked {
                path: dir.display().to_string(),
            }),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn try_lock(file: &File) -> IoResult<()> {
    use std::os::unix::io::AsRawFd;

    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        return Ok(());
    }

    let err = IoError::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        return Err(IoError::new(ErrorKind::WouldBlock, "snapshot store is locked"));
    }
    Err(err)
}

#[cfg(windows)]
fn try_lock(file: &File) -> IoResult<()> {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::HANDLE;
    use windows_sys::Win32::Storage::FileSystem::{LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY};

    let handle = file.as_raw_handle() as HANDLE;
    let result = unsafe {
        let mut overlapped = std::mem::zeroed::<windows_sys::Win32::System::IO::OVERLAPPED>();
        LockFileEx(
            handle,
            LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
            0,
            1,
            0,
            &mut overlapped,
        )
    };

    if result == 0 {
        let err = IoError::last_os_error();
        return Err(IoError::new(ErrorKind::WouldBlock, format!("snapshot store is locked: {err}")));
    }
    Ok(())
}

#[cfg(not(any(unix, windows)))]
fn try_lock(_file: &File) -> IoResult<()> {
    tracing::warn!("file locking not supported on this platform; proceeding without lock");
    Ok(())
}
