use crate::error::{Result, StoreError};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const TAKEOVER_ATTEMPTS: usize = 3;

/// Cross-process write token for one store file.
///
/// Held for as long as the store is in write mode; released on drop. A lock whose timestamp is
/// older than `stale_after` is assumed to belong to a crashed writer and is reclaimed.
#[derive(Debug)]
pub struct WriteLock {
    lock_path: PathBuf,
}

impl WriteLock {
    pub fn acquire(lock_path: &Path, stale_after: Duration) -> Result<Self> {
        for _ in 0..TAKEOVER_ATTEMPTS {
            match Self::create(lock_path) {
                Ok(lock) => return Ok(lock),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
                Err(err) => return Err(err.into()),
            }
            if !Self::is_stale(lock_path, stale_after) || !Self::reclaim(lock_path, stale_after)? {
                break;
            }
        }
        Err(StoreError::WriteLocked {
            path: lock_path.to_path_buf(),
        })
    }

    fn create(lock_path: &Path) -> std::io::Result<Self> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(lock_path)?;
        writeln!(file, "{} {}", std::process::id(), unix_now_secs())?;
        Ok(Self {
            lock_path: lock_path.to_path_buf(),
        })
    }

    /// Move a lock that looked stale out of the way and check it again under its new name.
    ///
    /// The rename is atomic, so of several processes racing for the same stale lock only one
    /// ends up holding that file. If what was moved turns out to be fresh, another process
    /// took the lock over in the meantime and it is linked back into place.
    fn reclaim(lock_path: &Path, stale_after: Duration) -> Result<bool> {
        let aside = lock_path.with_extension(format!(
            "lock.stale-{}-{}",
            std::process::id(),
            unix_now_nanos()
        ));
        match fs::rename(lock_path, &aside) {
            Ok(()) => {}
            // Somebody else moved it first; retry the create.
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(true),
            Err(err) => return Err(err.into()),
        }

        if Self::is_stale(&aside, stale_after) {
            log::warn!("Reclaiming stale store lock {}", lock_path.display());
            fs::remove_file(&aside)?;
            return Ok(true);
        }

        if let Err(err) = fs::hard_link(&aside, lock_path) {
            log::warn!(
                "Failed to restore store lock {} taken over by another process: {err}",
                lock_path.display()
            );
        }
        fs::remove_file(&aside)?;
        Ok(false)
    }

    /// Refresh the timestamp so long writes are not mistaken for a crashed writer.
    pub fn touch(&self) -> Result<()> {
        let tmp = self.lock_path.with_extension("lock.tmp");
        fs::write(&tmp, format!("{} {}\n", std::process::id(), unix_now_secs()))?;
        fs::rename(&tmp, &self.lock_path)?;
        Ok(())
    }

    #[must_use]
    pub fn is_stale(lock_path: &Path, stale_after: Duration) -> bool {
        let Ok(content) = fs::read_to_string(lock_path) else {
            return true;
        };
        // A lock caught before its owner wrote the stamp is dated by its mtime.
        let Some(stamp) = content
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse::<u64>().ok())
            .or_else(|| modified_secs(lock_path))
        else {
            return true;
        };
        unix_now_secs().saturating_sub(stamp) > stale_after.as_secs()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.lock_path) {
            if err.kind() != ErrorKind::NotFound {
                log::warn!(
                    "Failed to release store lock {}: {err}",
                    self.lock_path.display()
                );
            }
        }
    }
}

fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn modified_secs(path: &Path) -> Option<u64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    modified.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

fn unix_now_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}
