//! Per-destination serialisation of in-flight uploads.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, MutexGuard};

use tracing::{debug, error};

/// Table of destinations currently being written.
#[derive(Debug, Default)]
pub struct DestinationLocks {
    busy: Mutex<HashSet<PathBuf>>,
    released: Condvar,
}

impl DestinationLocks {
    /// Construct an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until no other caller holds `destination`, then claim it.
    pub fn acquire(&self, destination: &Path) -> DestinationGuard<'_> {
        let mut busy = self.lock_busy();
        let mut waited = false;
        while busy.contains(destination) {
            if !waited {
                debug!(
                    destination = %destination.display(),
                    "waiting for in-flight upload to the same destination"
                );
                waited = true;
            }
            busy = match self.released.wait(busy) {
                Ok(guard) => guard,
                Err(poisoned) => {
                    error!("upload lock table poisoned; continuing with recovered guard");
                    poisoned.into_inner()
                }
            };
        }
        busy.insert(destination.to_path_buf());
        DestinationGuard {
            locks: self,
            destination: destination.to_path_buf(),
        }
    }

    /// Number of destinations currently claimed.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.lock_busy().len()
    }

    fn release(&self, destination: &Path) {
        let mut busy = self.lock_busy();
        busy.remove(destination);
        drop(busy);
        self.released.notify_all();
    }

    fn lock_busy(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        match self.busy.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("upload lock table poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }
}

/// Claim on a destination; released when dropped.
#[derive(Debug)]
pub struct DestinationGuard<'a> {
    locks: &'a DestinationLocks,
    destination: PathBuf,
}

impl Drop for DestinationGuard<'_> {
    fn drop(&mut self) {
        self.locks.release(&self.destination);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn guard_releases_on_drop() {
        let locks = DestinationLocks::new();
        let guard = locks.acquire(Path::new("/srv/a"));
        assert_eq!(locks.in_flight(), 1);
        drop(guard);
        assert_eq!(locks.in_flight(), 0);
    }

    #[test]
    fn distinct_destinations_do_not_block() {
        let locks = DestinationLocks::new();
        let _a = locks.acquire(Path::new("/srv/a"));
        let _b = locks.acquire(Path::new("/srv/b"));
        assert_eq!(locks.in_flight(), 2);
    }

    #[test]
    fn same_destination_is_serialised() {
        let locks = Arc::new(DestinationLocks::new());
        let active = Arc::new(AtomicUsize::new(0));
        let overlap = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let active = Arc::clone(&active);
                let overlap = Arc::clone(&overlap);
                thread::spawn(move || {
                    let _guard = locks.acquire(Path::new("/srv/shared"));
                    if active.fetch_add(1, Ordering::SeqCst) > 0 {
                        overlap.fetch_add(1, Ordering::SeqCst);
                    }
                    thread::sleep(Duration::from_millis(10));
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for worker in workers {
            assert!(worker.join().is_ok());
        }

        assert_eq!(overlap.load(Ordering::SeqCst), 0);
        assert_eq!(locks.in_flight(), 0);
    }
}
