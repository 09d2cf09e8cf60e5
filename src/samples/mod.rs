//! Sample logs - the persisted, time-stamped amplitude streams
//!
//! This module provides:
//! - The record type and its `<ticks>|<amplitude>` line codec
//! - A buffered log writer used by capture and decode
//! - A reader that loads a log back in presentation order

pub mod reader;
pub mod record;
mod writer;

pub use reader::SampleSeries;
pub use record::{decode, encode, MalformedRecord, SampleRecord};
pub use writer::SampleLogWriter;
