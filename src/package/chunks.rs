use std::{fs::File, io::Read, path::Path};

use crate::{TransferId, consts::MAX_BODY_LENGTH, error::Error, package::Package};

/// Splits a local file into chunk packages of at most `MAX_BODY_LENGTH` bytes.
///
/// The length is fixed when the file is opened. Every chunk carries the same
/// transfer id and the final one is flagged `LAST`; an empty file yields a
/// single empty `LAST` chunk.
#[derive(Debug)]
pub struct FileChunks {
    file: File,
    transfer_id: TransferId,
    remaining: u64,
    done: bool,
}

impl FileChunks {
    pub fn open(path: impl AsRef<Path>, transfer_id: TransferId) -> Result<Self, Error> {
        let file = File::open(path.as_ref())?;
        let remaining = file.metadata()?.len();
        Ok(Self {
            file,
            transfer_id,
            remaining,
            done: false,
        })
    }
}

impl Iterator for FileChunks {
    type Item = Result<Package, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let window = self.remaining.min(MAX_BODY_LENGTH as u64) as usize;
        let mut buf = vec![0u8; window];
        if let Err(e) = self.file.read_exact(&mut buf) {
            self.done = true;
            return Some(Err(e.into()));
        }
        self.remaining -= window as u64;

        let last = self.remaining == 0;
        self.done = last;
        Some(Package::chunk(self.transfer_id, &buf, last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn chunks_of(contents: &[u8]) -> Vec<Package> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        FileChunks::open(file.path(), 3)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn splits_into_full_windows_and_a_short_tail() {
        let contents: Vec<u8> = (0..1200u32).map(|i| (i % 251) as u8).collect();
        let chunks = chunks_of(&contents);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].body_length(), MAX_BODY_LENGTH);
        assert_eq!(chunks[1].body_length(), MAX_BODY_LENGTH);
        assert_eq!(chunks[2].body_length(), 1200 - 2 * MAX_BODY_LENGTH);
        assert!(!chunks[0].is_last());
        assert!(!chunks[1].is_last());
        assert!(chunks[2].is_last());
        assert!(chunks.iter().all(|c| c.transfer_id() == 3));

        let joined: Vec<u8> = chunks.iter().flat_map(|c| c.body().to_vec()).collect();
        assert_eq!(joined, contents);
    }

    #[test]
    fn exact_multiple_ends_on_a_full_last_window() {
        let chunks = chunks_of(&[7u8; MAX_BODY_LENGTH * 2]);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].is_last());
        assert_eq!(chunks[1].body_length(), MAX_BODY_LENGTH);
    }

    #[test]
    fn empty_file_is_one_empty_last_chunk() {
        let chunks = chunks_of(&[]);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_last());
        assert!(chunks[0].body().is_empty());
    }
}
