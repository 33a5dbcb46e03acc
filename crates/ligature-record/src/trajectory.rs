//! In-memory trajectory: named streams that grow by one value per tick.
//!
//! Dense streams hold exactly one value for every sealed tick. Sparse streams
//! (such as `terminal_observation`) hold at most one value per tick and are
//! exempt from the length check.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::RecordError;
use crate::types::StreamValue;

// ---------------------------------------------------------------------------
// Stream
// ---------------------------------------------------------------------------

/// One named sequence of values, each tagged with the tick it was produced in.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    dense: bool,
    entries: Vec<(u32, StreamValue)>,
}

impl Stream {
    const fn new(dense: bool) -> Self {
        Self {
            dense,
            entries: Vec::new(),
        }
    }

    pub const fn is_dense(&self) -> bool {
        self.dense
    }

    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(u32, StreamValue)] {
        &self.entries
    }

    pub fn values(&self) -> impl Iterator<Item = &StreamValue> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn last(&self) -> Option<&StreamValue> {
        self.entries.last().map(|(_, v)| v)
    }
}

// ---------------------------------------------------------------------------
// Trajectory
// ---------------------------------------------------------------------------

/// Streams captured over one episode.
///
/// Values are appended between [`begin_tick`](Self::begin_tick) and
/// [`end_tick`](Self::end_tick). Sealing a tick checks that every dense
/// stream holds exactly one value per sealed tick.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    streams: BTreeMap<String, Stream>,
    ticks: u32,
    open: bool,
    touched: BTreeSet<String>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sealed ticks.
    pub const fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn is_empty(&self) -> bool {
        self.ticks == 0 && self.streams.is_empty()
    }

    pub const fn is_tick_open(&self) -> bool {
        self.open
    }

    pub fn get(&self, name: &str) -> Option<&Stream> {
        self.streams.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.streams.contains_key(name)
    }

    pub fn streams(&self) -> impl Iterator<Item = (&str, &Stream)> {
        self.streams.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Drop all streams and start over at tick 0.
    pub fn clear(&mut self) {
        self.streams.clear();
        self.touched.clear();
        self.ticks = 0;
        self.open = false;
    }

    /// Open the next tick and return its index.
    pub fn begin_tick(&mut self) -> u32 {
        self.touched.clear();
        self.open = true;
        self.ticks
    }

    /// Whether `name` already received a value in the open tick.
    pub fn touched(&self, name: &str) -> bool {
        self.touched.contains(name)
    }

    /// Append one value to a dense stream in the open tick.
    pub fn append(&mut self, name: &str, value: StreamValue) -> Result<(), RecordError> {
        self.push(name, value, true)
    }

    /// Append one value to a sparse stream in the open tick.
    pub fn append_sparse(&mut self, name: &str, value: StreamValue) -> Result<(), RecordError> {
        self.push(name, value, false)
    }

    fn push(&mut self, name: &str, value: StreamValue, dense: bool) -> Result<(), RecordError> {
        if !self.open {
            return Err(RecordError::NoOpenTick(name.to_string()));
        }
        if !self.touched.insert(name.to_string()) {
            return Err(RecordError::DuplicateAppend {
                stream: name.to_string(),
                tick: self.ticks,
            });
        }
        let tick = self.ticks;
        self.streams
            .entry(name.to_string())
            .or_insert_with(|| Stream::new(dense))
            .entries
            .push((tick, value));
        Ok(())
    }

    /// Seal the open tick, checking every dense stream's length.
    pub fn end_tick(&mut self) -> Result<(), RecordError> {
        let tick = self.ticks;
        let expected = tick as usize + 1;
        for (name, stream) in &self.streams {
            if stream.dense && stream.len() != expected {
                return Err(RecordError::StreamMisaligned {
                    stream: name.clone(),
                    tick,
                    expected,
                    actual: stream.len(),
                });
            }
        }
        self.open = false;
        self.touched.clear();
        self.ticks += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
