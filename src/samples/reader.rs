//! Sample log reader
//!
//! Loads a persisted log back into presentation order. Logs written by older
//! tools carry no ordering guarantee, so records are always sorted by
//! timestamp after parsing. A single unparsable line fails the whole read.

use std::path::Path;

use super::record::{self, SampleRecord};
use crate::error::PipelineError;
use crate::timebase::TimeBase;

/// Ordered contents of one sample log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleSeries {
    pub records: Vec<SampleRecord>,
    /// Largest timestamp in the log; the display range of the series.
    pub max_timestamp: u64,
}

impl SampleSeries {
    /// Builds a series from records in any order.
    ///
    /// Records are stably sorted by timestamp; a record repeating an earlier
    /// timestamp is dropped so every point has a unique X position.
    pub fn from_records(mut records: Vec<SampleRecord>) -> Self {
        records.sort_by_key(|r| r.timestamp);
        records.dedup_by_key(|r| r.timestamp);
        let max_timestamp = records.last().map(|r| r.timestamp).unwrap_or(0);
        Self {
            records,
            max_timestamp,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = u64> + '_ {
        self.records.iter().map(|r| r.timestamp)
    }

    pub fn amplitudes(&self) -> impl Iterator<Item = i16> + '_ {
        self.records.iter().map(|r| r.amplitude)
    }

    /// Recovers the stream's sample rate from the spacing of its first two
    /// records. Needs at least two records.
    pub fn inferred_sample_rate(&self, time_base: &TimeBase) -> Option<u32> {
        match self.records.as_slice() {
            [first, second, ..] => second
                .timestamp
                .checked_sub(first.timestamp)
                .and_then(|period| time_base.sample_rate_for_period(period)),
            _ => None,
        }
    }

    /// Human-readable stream parameters, e.g. `16000 Hz, 16 bit, mono`.
    pub fn describe(&self, time_base: &TimeBase) -> String {
        match self.inferred_sample_rate(time_base) {
            Some(rate) => format!("{} Hz, 16 bit, mono", rate),
            None => "unknown rate, 16 bit, mono".to_string(),
        }
    }
}

/// Parses log text. Fails on the first malformed line.
///
/// Blank lines are skipped; any other unparsable line fails the whole parse.
pub fn parse(contents: &str) -> Result<SampleSeries, PipelineError> {
    parse_bytes(contents.as_bytes())
}

/// Like [`parse`], for raw file contents. A line that is not valid UTF-8 is
/// reported as [`MalformedRecord::InvalidUtf8`] with its line number.
///
/// [`MalformedRecord::InvalidUtf8`]: record::MalformedRecord::InvalidUtf8
pub fn parse_bytes(contents: &[u8]) -> Result<SampleSeries, PipelineError> {
    let records = contents
        .split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .enumerate()
        .filter(|(_, line)| !line.is_empty())
        .map(|(i, line)| {
            let malformed = |source| PipelineError::MalformedRecord {
                line: i + 1,
                source,
            };
            let text = std::str::from_utf8(line).map_err(|_| {
                malformed(record::MalformedRecord::InvalidUtf8(
                    String::from_utf8_lossy(line).into_owned(),
                ))
            })?;
            record::decode(text).map_err(malformed)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SampleSeries::from_records(records))
}

/// Reads and parses the log at `path`.
pub fn read(path: impl AsRef<Path>) -> Result<SampleSeries, PipelineError> {
    let path = path.as_ref();
    let contents = std::fs::read(path)?;
    let series = parse_bytes(&contents)?;
    log::info!(
        "Read {} records from {} (max timestamp {})",
        series.len(),
        path.display(),
        series.max_timestamp
    );
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::MalformedRecord;

    #[test]
    fn sorts_and_reports_max() {
        for text in [
            "0|100\n625|-200\n1250|50\n",
            "1250|50\n0|100\n625|-200\n",
            "625|-200\r\n1250|50\r\n0|100",
        ] {
            let series = parse(text).unwrap();
            assert_eq!(
                series.records,
                vec![
                    SampleRecord::new(0, 100),
                    SampleRecord::new(625, -200),
                    SampleRecord::new(1250, 50),
                ]
            );
            assert_eq!(series.max_timestamp, 1250);
        }
    }

    #[test]
    fn malformed_line_fails_whole_read() {
        let err = parse("0|100\nabc|100\n1250|50\n").unwrap_err();
        match err {
            PipelineError::MalformedRecord { line, source } => {
                assert_eq!(line, 2);
                assert_eq!(source, MalformedRecord::BadTimestamp("abc".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn invalid_utf8_is_a_malformed_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, b"0|100\n\xff\xfe|1\n").unwrap();

        let err = read(&path).unwrap_err();
        assert!(!err.is_io_failure());
        match err {
            PipelineError::MalformedRecord { line, source } => {
                assert_eq!(line, 2);
                assert!(matches!(source, MalformedRecord::InvalidUtf8(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn blank_lines_are_skipped_but_counted() {
        let series = parse("\n0|1\n\r\n625|2\n\n").unwrap();
        assert_eq!(series.len(), 2);

        let err = parse("0|1\n\nx|2\n").unwrap_err();
        assert!(matches!(err, PipelineError::MalformedRecord { line: 3, .. }));
    }

    #[test]
    fn duplicate_timestamps_keep_first() {
        let series = parse("625|1\n0|7\n625|2\n").unwrap();
        assert_eq!(
            series.records,
            vec![SampleRecord::new(0, 7), SampleRecord::new(625, 1)]
        );
    }

    #[test]
    fn empty_log() {
        let series = parse("").unwrap();
        assert!(series.is_empty());
        assert_eq!(series.max_timestamp, 0);
        assert_eq!(series.inferred_sample_rate(&TimeBase::default()), None);
    }

    #[test]
    fn infers_rate_from_spacing() {
        let tb = TimeBase::default();
        let series = parse("625|0\n1250|0\n1875|0\n").unwrap();
        assert_eq!(series.inferred_sample_rate(&tb), Some(16_000));
        assert_eq!(series.describe(&tb), "16000 Hz, 16 bit, mono");
    }

    #[test]
    fn reads_file_and_rereads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, "1250|50\n0|100\n625|-200\n").unwrap();

        let first = read(&path).unwrap();
        let second = read(&path).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn missing_file_is_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = read(dir.path().join("nope.txt")).unwrap_err();
        assert!(err.is_io_failure());
    }
}
