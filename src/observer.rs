//! Run observers.
//!
//! The engine streams what happens during a run to an [`Observer`] passed
//! into [`Engine::run_until`](crate::engine::Engine::run_until). Sinks are
//! opened by the caller before the run and flushed in `on_finish`; the
//! kernel holds no global logging state.

use std::io::{self, Write};

use serde::Serialize;

use crate::cell::Coord;
use crate::engine::RunReport;
use crate::lattice::{Cell, Lattice, Link};
use crate::time::VirtualTime;

/// Receives run notifications. Every method but `on_transition` defaults to
/// doing nothing. An error aborts the run.
pub trait Observer<S> {
    /// Once, before the first instant the engine ever processes.
    fn on_start(&mut self, _lattice: &Lattice<S>) -> io::Result<()> {
        Ok(())
    }

    /// An instant begins.
    fn on_instant(&mut self, _time: VirtualTime) -> io::Result<()> {
        Ok(())
    }

    /// `cell` committed a new state at `time`. Unchanged states are not
    /// reported.
    fn on_transition(&mut self, time: VirtualTime, cell: &Cell<S>) -> io::Result<()>;

    /// A message was delivered on `link`.
    fn on_delivery(&mut self, _time: VirtualTime, _link: &Link, _value: &S) -> io::Result<()> {
        Ok(())
    }

    /// A `run_until` call is returning.
    fn on_finish(&mut self, _report: &RunReport) -> io::Result<()> {
        Ok(())
    }
}

impl<S, O: Observer<S> + ?Sized> Observer<S> for &mut O {
    fn on_start(&mut self, lattice: &Lattice<S>) -> io::Result<()> {
        (**self).on_start(lattice)
    }

    fn on_instant(&mut self, time: VirtualTime) -> io::Result<()> {
        (**self).on_instant(time)
    }

    fn on_transition(&mut self, time: VirtualTime, cell: &Cell<S>) -> io::Result<()> {
        (**self).on_transition(time, cell)
    }

    fn on_delivery(&mut self, time: VirtualTime, link: &Link, value: &S) -> io::Result<()> {
        (**self).on_delivery(time, link, value)
    }

    fn on_finish(&mut self, report: &RunReport) -> io::Result<()> {
        (**self).on_finish(report)
    }
}

/// Ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl<S> Observer<S> for NullObserver {
    fn on_transition(&mut self, _time: VirtualTime, _cell: &Cell<S>) -> io::Result<()> {
        Ok(())
    }
}

/// Fans every notification out to two observers, `A` first.
#[derive(Debug, Default)]
pub struct Tee<A, B>(pub A, pub B);

impl<S, A: Observer<S>, B: Observer<S>> Observer<S> for Tee<A, B> {
    fn on_start(&mut self, lattice: &Lattice<S>) -> io::Result<()> {
        self.0.on_start(lattice)?;
        self.1.on_start(lattice)
    }

    fn on_instant(&mut self, time: VirtualTime) -> io::Result<()> {
        self.0.on_instant(time)?;
        self.1.on_instant(time)
    }

    fn on_transition(&mut self, time: VirtualTime, cell: &Cell<S>) -> io::Result<()> {
        self.0.on_transition(time, cell)?;
        self.1.on_transition(time, cell)
    }

    fn on_delivery(&mut self, time: VirtualTime, link: &Link, value: &S) -> io::Result<()> {
        self.0.on_delivery(time, link, value)?;
        self.1.on_delivery(time, link, value)
    }

    fn on_finish(&mut self, report: &RunReport) -> io::Result<()> {
        self.0.on_finish(report)?;
        self.1.on_finish(report)
    }
}

fn to_json<S: Serialize>(value: &S) -> io::Result<String> {
    serde_json::to_string(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

// ── State log ─────────────────────────────────────────────────────────

/// Plain-text state log.
///
/// ```text
/// 0
/// (0,0) 0.0
/// (0,1) 1.0
/// 1
/// (0,0) 1.0
/// ```
///
/// A time line opens every instant that changed something, followed by one
/// `<coord> <json state>` line per changed cell. The initial states are
/// written under time 0.
pub struct StateLog<W: Write> {
    out: W,
    last_time: Option<VirtualTime>,
}

impl<W: Write> StateLog<W> {
    pub fn new(out: W) -> Self {
        StateLog {
            out,
            last_time: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line<S: Serialize>(&mut self, time: VirtualTime, coord: &Coord, state: &S) -> io::Result<()> {
        if self.last_time != Some(time) {
            writeln!(self.out, "{}", time.ticks())?;
            self.last_time = Some(time);
        }
        writeln!(self.out, "{} {}", coord, to_json(state)?)
    }
}

impl<S: Serialize, W: Write> Observer<S> for StateLog<W> {
    fn on_start(&mut self, lattice: &Lattice<S>) -> io::Result<()> {
        for cell in lattice.cells() {
            self.line(VirtualTime::ZERO, cell.coord(), cell.state())?;
        }
        Ok(())
    }

    fn on_transition(&mut self, time: VirtualTime, cell: &Cell<S>) -> io::Result<()> {
        self.line(time, cell.coord(), cell.state())
    }

    fn on_finish(&mut self, _report: &RunReport) -> io::Result<()> {
        self.out.flush()
    }
}

// ── Message log ───────────────────────────────────────────────────────

/// Plain-text delivery log: `<time> <src> -> <dst> <json value>` per line.
pub struct MessageLog<W: Write> {
    out: W,
    coords: Vec<Coord>,
}

impl<W: Write> MessageLog<W> {
    pub fn new(out: W) -> Self {
        MessageLog {
            out,
            coords: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<S: Serialize, W: Write> Observer<S> for MessageLog<W> {
    fn on_start(&mut self, lattice: &Lattice<S>) -> io::Result<()> {
        self.coords = lattice.cells().iter().map(|c| c.coord().clone()).collect();
        Ok(())
    }

    fn on_transition(&mut self, _time: VirtualTime, _cell: &Cell<S>) -> io::Result<()> {
        Ok(())
    }

    fn on_delivery(&mut self, time: VirtualTime, link: &Link, value: &S) -> io::Result<()> {
        let src = self.coords.get(link.source.index());
        let dst = self.coords.get(link.dest.index());
        match (src, dst) {
            (Some(src), Some(dst)) => writeln!(
                self.out,
                "{} {} -> {} {}",
                time.ticks(),
                src,
                dst,
                to_json(value)?
            ),
            _ => writeln!(
                self.out,
                "{} {} -> {} {}",
                time.ticks(),
                link.source,
                link.dest,
                to_json(value)?
            ),
        }
    }

    fn on_finish(&mut self, _report: &RunReport) -> io::Result<()> {
        self.out.flush()
    }
}
