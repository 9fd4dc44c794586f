//! Transition traces and deterministic hashing.
//!
//! A [`TraceRecorder`] collects every committed `(time, cell, state)`
//! observation of a run. Two runs of the same scenario must produce equal
//! traces, and so equal [`Trace::trace_hash`] values.

use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::cell::{CellId, Coord};
use crate::lattice::Cell;
use crate::observer::Observer;
use crate::time::VirtualTime;

// ── Hash utility ──────────────────────────────────────────────────────

/// Combine two u64 hashes deterministically.
pub fn hash_combine(a: u64, b: u64) -> u64 {
    let mut h = a;
    h = h.wrapping_mul(0x517cc1b727220a95);
    h = h.wrapping_add(b);
    h ^= h >> 32;
    h
}

/// Hash a byte slice deterministically (FNV-1a).
pub fn hash_bytes(data: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for &b in data {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

// ── Trace ─────────────────────────────────────────────────────────────

/// One committed state change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry<S> {
    pub time: VirtualTime,
    pub cell: CellId,
    pub coord: Coord,
    pub state: S,
}

/// Ordered transition trace with a running hash.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace<S> {
    entries: Vec<TraceEntry<S>>,
    hash: u64,
}

impl<S: Serialize> Trace<S> {
    pub fn new() -> Self {
        Trace {
            entries: Vec::new(),
            hash: 0,
        }
    }

    /// Append an entry. Fails only if the state cannot be serialized.
    pub fn record(&mut self, entry: TraceEntry<S>) -> io::Result<()> {
        let bytes = serde_json::to_vec(&entry.state)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.hash = hash_combine(self.hash, entry.time.ticks());
        self.hash = hash_combine(self.hash, u64::from(entry.cell.raw()));
        self.hash = hash_combine(self.hash, hash_bytes(&bytes));
        self.entries.push(entry);
        Ok(())
    }

    pub fn entries(&self) -> &[TraceEntry<S>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hash over the time, cell id and JSON encoding of every entry.
    pub fn trace_hash(&self) -> u64 {
        self.hash
    }

    /// Entries committed at `time`.
    pub fn at(&self, time: VirtualTime) -> impl Iterator<Item = &TraceEntry<S>> + '_ {
        self.entries.iter().filter(move |e| e.time == time)
    }

    /// `(time, cell)` pairs in commit order.
    pub fn keys(&self) -> Vec<(u64, CellId)> {
        self.entries.iter().map(|e| (e.time.ticks(), e.cell)).collect()
    }

    // ── Export ────────────────────────────────────────────────────

    /// Write the trace in a deterministic text format.
    pub fn export<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "# CELLDEVS TRACE v1")?;
        writeln!(w, "# entries: {}", self.entries.len())?;
        writeln!(w, "# hash: {:016x}", self.hash)?;
        for e in &self.entries {
            let state = serde_json::to_string(&e.state)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
            writeln!(w, "T {} {} {} {}", e.time.ticks(), e.cell.raw(), e.coord, state)?;
        }
        Ok(())
    }

    /// Export to a file path.
    pub fn export_to_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut f = std::fs::File::create(path)?;
        self.export(&mut f)
    }
}

impl<S: Serialize> Default for Trace<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Compare two traces entry by entry.
pub fn traces_match<S: PartialEq>(a: &Trace<S>, b: &Trace<S>) -> bool {
    a.hash == b.hash && a.entries == b.entries
}

// ── Recorder ──────────────────────────────────────────────────────────

/// Observer that records a [`Trace`].
#[derive(Debug, Clone)]
pub struct TraceRecorder<S> {
    trace: Trace<S>,
}

impl<S: Serialize> TraceRecorder<S> {
    pub fn new() -> Self {
        TraceRecorder {
            trace: Trace::new(),
        }
    }

    pub fn trace(&self) -> &Trace<S> {
        &self.trace
    }

    pub fn into_trace(self) -> Trace<S> {
        self.trace
    }
}

impl<S: Serialize> Default for TraceRecorder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Serialize + Clone> Observer<S> for TraceRecorder<S> {
    fn on_transition(&mut self, time: VirtualTime, cell: &Cell<S>) -> io::Result<()> {
        self.trace.record(TraceEntry {
            time,
            cell: cell.id(),
            coord: cell.coord().clone(),
            state: cell.state().clone(),
        })
    }
}
