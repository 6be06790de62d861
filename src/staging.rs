//! Reassembly of chunked file transfers.
//!
//! Incoming chunks are appended to numerically named files in one staging
//! directory. A transfer is identified by the connection it arrived on and
//! the sender's transfer id, so interleaved transfers never share a file.
//! Completed transfers wait in arrival order until `popfs` claims them.

use std::{
    collections::{HashMap, VecDeque},
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use parking_lot::Mutex;

use crate::{TransferId, error::Error, package::Package};

/// Connection a transfer arrived on: a session id on the hub, `0` upstream.
pub type Origin = u32;

pub const UPSTREAM_ORIGIN: Origin = 0;

#[derive(Debug)]
pub struct Staging {
    dir: PathBuf,
    state: Mutex<StagingState>,
}

#[derive(Debug)]
struct StagingState {
    next_name: u64,
    in_flight: HashMap<(Origin, TransferId), InFlight>,
    completed: VecDeque<PathBuf>,
}

#[derive(Debug)]
struct InFlight {
    path: PathBuf,
    file: File,
}

impl Staging {
    /// Opens (creating if needed) the staging directory.
    ///
    /// Numbering continues past the largest numeric name already present so
    /// leftovers from an earlier run are never overwritten.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let mut next_name = 0;
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if let Some(n) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<u64>().ok())
                .and_then(|n| n.checked_add(1))
            {
                next_name = next_name.max(n);
            }
        }

        Ok(Self {
            dir,
            state: Mutex::new(StagingState {
                next_name,
                in_flight: HashMap::new(),
                completed: VecDeque::new(),
            }),
        })
    }

    /// Appends one chunk. Returns the staged path when the chunk completes
    /// its transfer.
    pub fn accept(&self, origin: Origin, chunk: &Package) -> Result<Option<PathBuf>, Error> {
        let key = (origin, chunk.transfer_id());
        let mut state = self.state.lock();

        if !state.in_flight.contains_key(&key) {
            let path = self.dir.join(state.next_name.to_string());
            state.next_name = state.next_name.wrapping_add(1);
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path)?;
            log::debug!("staging transfer {key:?} into {}", path.display());
            state.in_flight.insert(key, InFlight { path, file });
        }

        let Some(staged) = state.in_flight.get_mut(&key) else {
            return Ok(None);
        };
        if let Err(e) = staged.file.write_all(chunk.body()) {
            if let Some(broken) = state.in_flight.remove(&key) {
                let _ = fs::remove_file(&broken.path);
            }
            return Err(e.into());
        }

        if !chunk.is_last() {
            return Ok(None);
        }

        let Some(done) = state.in_flight.remove(&key) else {
            return Ok(None);
        };
        done.file.sync_all()?;
        state.completed.push_back(done.path.clone());
        Ok(Some(done.path))
    }

    /// Drops every unfinished transfer from `origin` and deletes its partial
    /// file. Completed transfers stay claimable. Returns how many were dropped.
    pub fn abandon(&self, origin: Origin) -> usize {
        let mut state = self.state.lock();
        let keys: Vec<_> = state
            .in_flight
            .keys()
            .filter(|(from, _)| *from == origin)
            .copied()
            .collect();

        for key in &keys {
            if let Some(partial) = state.in_flight.remove(key) {
                drop(partial.file);
                if let Err(e) = fs::remove_file(&partial.path) {
                    log::warn!("failed to remove {}: {e}", partial.path.display());
                }
            }
        }
        keys.len()
    }

    /// Moves the oldest completed transfer to `dest`, creating missing parent
    /// directories. Returns `None` when nothing has completed.
    pub fn claim(&self, dest: &Path) -> Result<Option<PathBuf>, Error> {
        let mut state = self.state.lock();
        let Some(staged) = state.completed.front().cloned() else {
            return Ok(None);
        };

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        // rename fails across filesystems
        if fs::rename(&staged, dest).is_err() {
            fs::copy(&staged, dest)?;
            fs::remove_file(&staged)?;
        }

        state.completed.pop_front();
        Ok(Some(dest.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: TransferId, data: &[u8], last: bool) -> Package {
        Package::chunk(id, data, last).unwrap()
    }

    #[test]
    fn reassembles_and_moves_into_a_new_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = Staging::open(tmp.path().join("staging")).unwrap();

        assert!(staging.accept(1, &chunk(9, b"hello ", false)).unwrap().is_none());
        let staged = staging.accept(1, &chunk(9, b"world", true)).unwrap().unwrap();
        assert_eq!(staged.file_name().unwrap(), "0");

        let dest = tmp.path().join("out/nested/greeting.txt");
        assert_eq!(staging.claim(&dest).unwrap(), Some(dest.clone()));
        assert_eq!(fs::read(&dest).unwrap(), b"hello world");
        assert!(!staged.exists());
        assert_eq!(staging.claim(&tmp.path().join("again")).unwrap(), None);
    }

    #[test]
    fn interleaved_transfers_stay_separate() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = Staging::open(tmp.path()).unwrap();

        staging.accept(1, &chunk(1, b"aa", false)).unwrap();
        staging.accept(2, &chunk(1, b"bb", false)).unwrap();
        staging.accept(2, &chunk(1, b"BB", true)).unwrap();
        staging.accept(1, &chunk(1, b"AA", true)).unwrap();

        let first = tmp.path().join("first");
        let second = tmp.path().join("second");
        staging.claim(&first).unwrap();
        staging.claim(&second).unwrap();

        // claimed in completion order
        assert_eq!(fs::read(&first).unwrap(), b"bbBB");
        assert_eq!(fs::read(&second).unwrap(), b"aaAA");
    }

    #[test]
    fn claim_without_completed_transfer() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = Staging::open(tmp.path()).unwrap();
        staging.accept(1, &chunk(1, b"partial", false)).unwrap();

        assert_eq!(staging.claim(&tmp.path().join("dest")).unwrap(), None);
    }

    #[test]
    fn abandon_removes_only_that_origins_partial_files() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = Staging::open(tmp.path()).unwrap();

        staging.accept(1, &chunk(1, b"aa", false)).unwrap();
        staging.accept(1, &chunk(2, b"bb", false)).unwrap();
        staging.accept(1, &chunk(3, b"done", true)).unwrap();
        staging.accept(2, &chunk(1, b"cc", false)).unwrap();

        assert_eq!(staging.abandon(1), 2);
        assert!(!tmp.path().join("0").exists());
        assert!(!tmp.path().join("1").exists());
        assert!(tmp.path().join("2").exists());
        assert!(tmp.path().join("3").exists());
        assert_eq!(staging.abandon(1), 0);

        // the completed transfer and the other origin are untouched
        let dest = tmp.path().join("dest");
        assert_eq!(staging.claim(&dest).unwrap(), Some(dest.clone()));
        assert_eq!(fs::read(&dest).unwrap(), b"done");
        staging.accept(2, &chunk(1, b"CC", true)).unwrap();
        assert_eq!(staging.claim(&dest).unwrap(), Some(dest.clone()));
        assert_eq!(fs::read(&dest).unwrap(), b"ccCC");
    }

    #[test]
    fn largest_possible_leftover_name_is_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(u64::MAX.to_string()), b"old").unwrap();
        fs::write(tmp.path().join("2"), b"old").unwrap();
        let staging = Staging::open(tmp.path()).unwrap();

        let staged = staging.accept(1, &chunk(1, b"new", true)).unwrap().unwrap();
        assert_eq!(staged.file_name().unwrap(), "3");
    }

    #[test]
    fn numbering_skips_existing_files() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("4"), b"old").unwrap();
        let staging = Staging::open(tmp.path()).unwrap();

        let staged = staging.accept(1, &chunk(1, b"new", true)).unwrap().unwrap();
        assert_eq!(staged.file_name().unwrap(), "5");
        assert_eq!(fs::read(tmp.path().join("4")).unwrap(), b"old");
    }
}
