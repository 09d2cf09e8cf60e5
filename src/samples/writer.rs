//! Buffered sample log writer

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::record::SampleRecord;

/// Appends records to a sample log, one line each
pub struct SampleLogWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    records_written: u64,
}

impl SampleLogWriter {
    /// Creates (or truncates) the log at `path`.
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            records_written: 0,
        })
    }

    pub fn append(&mut self, record: SampleRecord) -> std::io::Result<()> {
        writeln!(self.writer, "{}", record)?;
        self.records_written += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Flushes buffered lines to disk and closes the file.
    pub fn finish(mut self) -> std::io::Result<PathBuf> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        log::debug!(
            "Closed sample log {} ({} records)",
            self.path.display(),
            self.records_written
        );
        Ok(self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");

        let mut writer = SampleLogWriter::create(&path).unwrap();
        writer.append(SampleRecord::new(0, 100)).unwrap();
        writer.append(SampleRecord::new(625, -200)).unwrap();
        assert_eq!(writer.records_written(), 2);
        let written = writer.finish().unwrap();

        assert_eq!(written, path);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0|100\n625|-200\n");
    }

    #[test]
    fn create_fails_in_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("log.txt");
        assert!(SampleLogWriter::create(path).is_err());
    }
}
