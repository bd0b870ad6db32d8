use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::instrument;

/// Random access reader over a file that may start with a binary
/// preamble. All offsets are relative to the end of that preamble, the
/// reader can be used as if it did not exist.
#[derive(Debug)]
pub(crate) struct ByteReader {
    handle: File,
    data_offset: u64,
    len: u64,
}

impl ByteReader {
    #[instrument(level = "debug")]
    pub(crate) fn open(path: &Path) -> io::Result<Self> {
        Self::open_with_offset(path, 0)
    }

    #[instrument(level = "debug")]
    pub(crate) fn open_with_offset(path: &Path, data_offset: u64) -> io::Result<Self> {
        let handle = File::open(path)?;
        let len = handle.metadata()?.len();
        Ok(Self {
            handle,
            data_offset,
            len,
        })
    }

    /// length of the file without the preamble
    pub(crate) fn data_len(&self) -> u64 {
        self.len.saturating_sub(self.data_offset)
    }

    /// Reads up to `len` bytes starting at `offset`. Returns fewer bytes if
    /// the file ends before that.
    pub(crate) fn read_at(&mut self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let available = self.data_len().saturating_sub(offset);
        let len = usize::try_from(available).map_or(len, |available| available.min(len));
        let mut buf = vec![0u8; len];
        if len == 0 {
            return Ok(buf);
        }

        self.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < len {
            match self.handle.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }
}

impl Seek for ByteReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let offset_pos = match pos {
            SeekFrom::Start(p) => SeekFrom::Start(p + self.data_offset),
            SeekFrom::End(p) => SeekFrom::End(p),
            SeekFrom::Current(p) => SeekFrom::Current(p),
        };
        self.handle
            .seek(offset_pos)
            .map(|p| p.saturating_sub(self.data_offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use temp_dir::TempDir;

    fn file_with(bytes: &[u8]) -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.child("data.bin");
        let mut f = File::create(&path).unwrap();
        f.write_all(bytes).unwrap();
        (dir, path)
    }

    #[test]
    fn preamble_is_hidden() {
        let bytes: Vec<u8> = (0..50).collect();
        let (_dir, path) = file_with(&bytes);
        let mut reader = ByteReader::open_with_offset(&path, 40).unwrap();
        assert_eq!(reader.data_len(), 10);
        assert_eq!(reader.read_at(2, 3).unwrap(), vec![42, 43, 44]);
    }

    #[test]
    fn short_read_at_end_of_file() {
        let bytes: Vec<u8> = (0..16).collect();
        let (_dir, path) = file_with(&bytes);
        let mut reader = ByteReader::open(&path).unwrap();
        assert_eq!(reader.read_at(12, 100).unwrap(), vec![12, 13, 14, 15]);
        assert!(reader.read_at(200, 8).unwrap().is_empty());
    }
}
