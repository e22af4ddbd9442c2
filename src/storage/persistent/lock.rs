//! Single-process guard for a store directory.
//!
//! The lock sits next to the journal as `wordbank.wal.lock` and is held for
//! as long as the [`PersistentWordStore`](super::PersistentWordStore) is
//! open. Closing the handle releases it, including on crash.

use std::fs::{File, OpenOptions};
use std::io::Result as IoResult;
use std::path::Path;

use crate::storage::traits::StorageError;

use super::stores::WAL_FILE;

/// Exclusive OS lock on a store directory.
#[derive(Debug)]
pub(super) struct StoreLock {
    _file: File,
}

impl StoreLock {
    /// Take the lock without waiting.
    ///
    /// Fails with [`StorageError::Locked`] if another handle, in this process
    /// or another, has the directory open.
    pub(super) fn acquire(dir: &Path) -> Result<Self, StorageError> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(format!("{WAL_FILE}.lock")))?;

        if try_lock_exclusive(&file)? {
            Ok(Self { _file: file })
        } else {
            Err(StorageError::Locked(dir.to_path_buf()))
        }
    }
}

/// `Ok(false)` means the lock is held elsewhere.
#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> IoResult<bool> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor stays owned by `file` across the call.
    if unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) } == 0 {
        return Ok(true);
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(windows)]
fn try_lock_exclusive(file: &File) -> IoResult<bool> {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::{ERROR_LOCK_VIOLATION, HANDLE};
    use windows_sys::Win32::Storage::FileSystem::{
        LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
    };
    use windows_sys::Win32::System::IO::OVERLAPPED;

    // SAFETY: the handle stays owned by `file`; `overlapped` outlives the call.
    let locked = unsafe {
        let mut overlapped = std::mem::zeroed::<OVERLAPPED>();
        LockFileEx(
            file.as_raw_handle() as HANDLE,
            LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
            0,
            1,
            0,
            &mut overlapped,
        )
    };
    if locked != 0 {
        return Ok(true);
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32) {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(not(any(unix, windows)))]
fn try_lock_exclusive(_file: &File) -> IoResult<bool> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "store locking is not supported on this platform",
    ))
}
