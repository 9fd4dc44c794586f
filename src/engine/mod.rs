//! Simulation engine.
//!
//! Drives a [`Lattice`] through virtual time. One *instant* is every event
//! sharing a timestamp; it runs in *rounds*:
//!
//! ```text
//!  pop events due at t ─▶ deliveries update views, mark dest imminent
//!                        transitions mark their cell imminent
//!          │
//!          ▼
//!  compute all imminent transitions against pre-commit state
//!  (ascending CellId; optionally in parallel)
//!          │
//!          ▼
//!  commit in ascending CellId, notify observer of changed states
//!          │
//!          ▼
//!  release new states on outbound links ─▶ DelayTransport ─▶ Delivery events
//!          │
//!          └── more events at t (zero-delay links)? run another round
//! ```
//!
//! The engine is single-threaded and never reads the wall clock; two
//! engines built from equal lattices produce equal traces.

pub mod snapshot;


use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use crate::cell::{CellId, CellState, Coord, LinkId, Neighbor, NeighborView};
use crate::error::{CellDevsError, CellDevsResult, CellError};
use crate::event::EventKind;
use crate::lattice::Lattice;
use crate::observer::Observer;
use crate::scheduler::Scheduler;
use crate::time::VirtualTime;
use crate::transport::DelayTransport;

pub use snapshot::{CellSnapshot, EngineSnapshot};

/// Rounds allowed inside one instant before the run is declared a
/// zero-delay loop.
pub const DEFAULT_MAX_ROUNDS_PER_INSTANT: usize = 1024;

// ── Configuration ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Compute same-instant transitions on the rayon pool. Needs the
    /// `parallel` feature; ignored otherwise.
    pub parallel: bool,
    pub max_rounds_per_instant: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            parallel: false,
            max_rounds_per_instant: DEFAULT_MAX_ROUNDS_PER_INSTANT,
        }
    }
}

// ── State machine ─────────────────────────────────────────────────────

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    /// The next event lies beyond the horizon.
    Horizon,
    /// No event is left.
    Quiescent,
    /// The stop handle fired.
    Stopped,
    /// A transition or observer failed.
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum EngineState {
    /// Built, never run.
    Idle,
    Running,
    Halted(HaltReason),
}

/// Cooperative cancellation, checked before every instant.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Allow a stopped engine to resume.
    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Summary of one `run_until` call. Counters cover that call only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub reason: HaltReason,
    /// Last processed instant.
    pub clock: VirtualTime,
    pub instants: u64,
    /// Transitions computed, changed or not.
    pub transitions: u64,
    /// Transitions that changed a state.
    pub changes: u64,
    pub messages_sent: u64,
    pub messages_delivered: u64,
    pub messages_superseded: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    instants: u64,
    transitions: u64,
    changes: u64,
    sent: u64,
    delivered: u64,
    superseded: u64,
}

// ── Engine ────────────────────────────────────────────────────────────

/// Discrete-event engine over a lattice of `S`-state cells.
pub struct Engine<S: CellState> {
    lattice: Lattice<S>,
    /// Last value delivered on each link, indexed by `LinkId`.
    views: Vec<S>,
    scheduler: Scheduler,
    transport: DelayTransport<S>,
    clock: VirtualTime,
    state: EngineState,
    config: EngineConfig,
    stop: StopHandle,
    started: bool,
    totals: Totals,
}

impl<S: CellState> Engine<S> {
    pub fn new(lattice: Lattice<S>) -> Self {
        Self::with_config(lattice, EngineConfig::default())
    }

    /// Seed every view with its source's initial state and schedule one
    /// transition per cell at time zero, ascending id.
    pub fn with_config(lattice: Lattice<S>, mut config: EngineConfig) -> Self {
        if config.parallel && !cfg!(feature = "parallel") {
            warn!("parallel transitions requested without the `parallel` feature; running sequentially");
        }
        config.max_rounds_per_instant = config.max_rounds_per_instant.max(1);

        let views = lattice
            .links
            .iter()
            .map(|l| lattice.cells[l.source.index()].state.clone())
            .collect();
        let transport = DelayTransport::new(lattice.links.iter().map(|l| l.policy));

        let mut scheduler = Scheduler::new();
        for cell in &lattice.cells {
            scheduler.schedule(VirtualTime::ZERO, EventKind::Transition { cell: cell.id });
        }

        Engine {
            lattice,
            views,
            scheduler,
            transport,
            clock: VirtualTime::ZERO,
            state: EngineState::Idle,
            config,
            stop: StopHandle::new(),
            started: false,
            totals: Totals::default(),
        }
    }

    // ── Accessors ─────────────────────────────────────────────────

    /// Last processed instant.
    pub fn clock(&self) -> VirtualTime {
        self.clock
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    pub fn lattice(&self) -> &Lattice<S> {
        &self.lattice
    }

    pub fn cell_state(&self, id: CellId) -> Option<&S> {
        self.lattice.cell(id).map(|c| &c.state)
    }

    pub fn state_at(&self, coord: &Coord) -> Option<&S> {
        self.lattice.cell_at(coord).map(|c| &c.state)
    }

    /// What the destination of `link` currently observes.
    pub fn view(&self, link: LinkId) -> Option<&S> {
        self.views.get(link.index())
    }

    /// Queued events, including deliveries that went stale.
    pub fn pending_events(&self) -> usize {
        self.scheduler.len()
    }

    pub fn transport(&self) -> &DelayTransport<S> {
        &self.transport
    }

    /// A handle sharing this engine's stop flag.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    // ── Running ───────────────────────────────────────────────────

    /// Process every instant with time `<= horizon`.
    ///
    /// Calling it again with the same horizon processes nothing. After a
    /// failure the engine is aborted and every later call returns
    /// [`CellDevsError::RunAborted`].
    pub fn run_until<O>(&mut self, horizon: VirtualTime, observer: &mut O) -> CellDevsResult<RunReport>
    where
        O: Observer<S> + ?Sized,
    {
        self.ensure_not_aborted()?;
        let before = self.snapshot_totals();
        self.begin(observer)?;
        info!(
            horizon = horizon.ticks(),
            cells = self.lattice.len(),
            pending = self.scheduler.len(),
            "run started"
        );

        let reason = loop {
            if self.stop.is_stopped() {
                break HaltReason::Stopped;
            }
            match self.next_live_time() {
                None => break HaltReason::Quiescent,
                Some(t) if t > horizon => break HaltReason::Horizon,
                Some(_) => {
                    if let Err(e) = self.process_instant(observer) {
                        return Err(self.abort(e));
                    }
                }
            }
        };

        self.state = EngineState::Halted(reason);
        let report = self.report(reason, before);
        if let Err(e) = observer.on_finish(&report) {
            return Err(self.abort(e.into()));
        }
        info!(
            reason = ?report.reason,
            clock = report.clock.ticks(),
            instants = report.instants,
            changes = report.changes,
            "run finished"
        );
        Ok(report)
    }

    /// Process exactly the next instant, ignoring any horizon.
    ///
    /// Returns the instant processed, or `None` when the queue is empty.
    pub fn step_instant<O>(&mut self, observer: &mut O) -> CellDevsResult<Option<VirtualTime>>
    where
        O: Observer<S> + ?Sized,
    {
        self.ensure_not_aborted()?;
        self.begin(observer)?;
        match self.process_instant(observer) {
            Ok(None) => {
                self.state = EngineState::Halted(HaltReason::Quiescent);
                Ok(None)
            }
            Ok(Some(t)) => Ok(Some(t)),
            Err(e) => Err(self.abort(e)),
        }
    }

    fn ensure_not_aborted(&self) -> CellDevsResult<()> {
        if self.state == EngineState::Halted(HaltReason::Aborted) {
            return Err(CellDevsError::RunAborted);
        }
        Ok(())
    }

    fn begin<O>(&mut self, observer: &mut O) -> CellDevsResult<()>
    where
        O: Observer<S> + ?Sized,
    {
        if !self.started {
            if let Err(e) = observer.on_start(&self.lattice) {
                return Err(self.abort(e.into()));
            }
            self.started = true;
        }
        self.state = EngineState::Running;
        Ok(())
    }

    fn abort(&mut self, e: CellDevsError) -> CellDevsError {
        error!(clock = self.clock.ticks(), error = %e, "run aborted");
        self.state = EngineState::Halted(HaltReason::Aborted);
        e
    }

    // ── Instants ──────────────────────────────────────────────────

    /// Drop superseded deliveries at the head of the queue and return the
    /// time of the next event that will do something.
    fn next_live_time(&mut self) -> Option<VirtualTime> {
        while let Some(event) = self.scheduler.peek_next() {
            let (kind, at) = (event.kind, event.scheduled_at);
            match kind {
                EventKind::Delivery { link, seq } if !self.transport.is_live(link, seq) => {
                    trace!(%link, seq, "stale delivery dropped");
                    self.scheduler.pop_next();
                }
                _ => return Some(at),
            }
        }
        None
    }

    fn process_instant<O>(&mut self, observer: &mut O) -> CellDevsResult<Option<VirtualTime>>
    where
        O: Observer<S> + ?Sized,
    {
        let Some(t) = self.next_live_time() else {
            return Ok(None);
        };
        debug_assert!(t >= self.clock, "time went backward: {} -> {}", self.clock, t);
        self.clock = t;
        self.totals.instants += 1;
        observer.on_instant(t)?;

        let mut rounds = 0usize;
        while self.next_live_time() == Some(t) {
            if rounds == self.config.max_rounds_per_instant {
                return Err(CellDevsError::ZeroDelayLoop { time: t, rounds });
            }
            rounds += 1;
            self.process_round(t, observer)?;
        }
        debug!(time = t.ticks(), rounds, "instant processed");
        Ok(Some(t))
    }

    /// One round at `t`.
    ///
    /// Staged first: deliveries are read without being consumed and every
    /// transition is computed against them. If any transition fails, or a
    /// delivery time would overflow, the popped events are put back and the
    /// engine is left as it was before the round. Otherwise deliveries,
    /// states and sends are applied, then the observer is notified.
    fn process_round<O>(&mut self, t: VirtualTime, observer: &mut O) -> CellDevsResult<()>
    where
        O: Observer<S> + ?Sized,
    {
        let due = self.scheduler.pop_due(t);

        let mut imminent = BTreeSet::new();
        let mut deliveries = Vec::new();
        let mut staged: BTreeMap<LinkId, &S> = BTreeMap::new();
        for event in &due {
            match event.kind {
                EventKind::Transition { cell } => {
                    imminent.insert(cell);
                }
                EventKind::Delivery { link, seq } => match self.transport.pending(link, seq) {
                    Some(message) => {
                        // Same-instant messages on one link: the last one is observed.
                        staged.insert(link, &message.value);
                        imminent.insert(self.lattice.links[link.index()].dest);
                        deliveries.push((link, seq));
                    }
                    None => trace!(%link, seq, "stale delivery skipped"),
                },
            }
        }

        let imminent: Vec<CellId> = imminent.into_iter().collect();
        let results = self.compute(&imminent, &staged);

        let mut next_states = Vec::with_capacity(results.len());
        let mut failure = None;
        for (&id, result) in imminent.iter().zip(results) {
            match result {
                Ok(next) => next_states.push((id, next)),
                Err(source) => {
                    failure = Some((id, source));
                    break;
                }
            }
        }
        if let Some((id, source)) = failure {
            let coord = self.lattice.cells[id.index()].coord.clone();
            self.scheduler.restore(due);
            return Err(CellDevsError::Transition {
                time: t,
                cell: id,
                coord,
                source,
            });
        }
        let transitions = next_states.len() as u64;

        let changed: Vec<(CellId, S)> = next_states
            .into_iter()
            .filter(|(id, next)| self.lattice.cells[id.index()].state != *next)
            .collect();

        // Every changed cell publishes on each outbound link.
        let mut sends = Vec::new();
        for (id, next) in &changed {
            let cell = &self.lattice.cells[id.index()];
            for &link_id in &cell.outbound {
                let configured = self.lattice.links[link_id.index()].delay;
                sends.push((link_id, cell.model.output_delay(next, configured)));
            }
        }
        if let Some(&(_, delay)) = sends.iter().find(|(_, d)| t.plus(*d).is_none()) {
            self.scheduler.restore(due);
            return Err(CellDevsError::TimeOverflow {
                at: t,
                delay: delay.ticks(),
            });
        }

        // ── Apply ──────────────────────────────────────────────
        let mut delivered = Vec::with_capacity(deliveries.len());
        for (link, seq) in deliveries {
            if let Some(message) = self.transport.take(link, seq) {
                self.views[link.index()] = message.value.clone();
                delivered.push((link, message.value));
            }
        }

        self.totals.transitions += transitions;
        self.totals.changes += changed.len() as u64;
        let changed: Vec<CellId> = changed
            .into_iter()
            .map(|(id, next)| {
                self.lattice.set_state(id, next);
                id
            })
            .collect();

        for (link_id, delay) in sends {
            let source = self.lattice.links[link_id.index()].source;
            let value = self.lattice.cells[source.index()].state.clone();
            let receipt = self
                .transport
                .send(link_id, t, delay, value)
                .ok_or(CellDevsError::TimeOverflow {
                    at: t,
                    delay: delay.ticks(),
                })?;
            self.scheduler.schedule(
                receipt.deliver_at,
                EventKind::Delivery {
                    link: link_id,
                    seq: receipt.seq,
                },
            );
        }

        // ── Notify ─────────────────────────────────────────────
        for (link, value) in &delivered {
            observer.on_delivery(t, &self.lattice.links[link.index()], value)?;
        }
        for id in changed {
            observer.on_transition(t, &self.lattice.cells[id.index()])?;
        }
        Ok(())
    }

    fn compute(&self, imminent: &[CellId], staged: &BTreeMap<LinkId, &S>) -> Vec<Result<S, CellError>> {
        let lattice = &self.lattice;
        let views = View {
            committed: self.views.as_slice(),
            staged,
        };

        #[cfg(feature = "parallel")]
        {
            if self.config.parallel {
                use rayon::prelude::*;
                return imminent
                    .par_iter()
                    .map(|&id| transition_of(lattice, &views, id))
                    .collect();
            }
        }

        imminent
            .iter()
            .map(|&id| transition_of(lattice, &views, id))
            .collect()
    }

    // ── Reporting ─────────────────────────────────────────────────

    fn snapshot_totals(&self) -> Totals {
        Totals {
            sent: self.transport.sent_count(),
            delivered: self.transport.delivered_count(),
            superseded: self.transport.superseded_count(),
            ..self.totals
        }
    }

    fn report(&self, reason: HaltReason, before: Totals) -> RunReport {
        let now = self.snapshot_totals();
        RunReport {
            reason,
            clock: self.clock,
            instants: now.instants - before.instants,
            transitions: now.transitions - before.transitions,
            changes: now.changes - before.changes,
            messages_sent: now.sent - before.sent,
            messages_delivered: now.delivered - before.delivered,
            messages_superseded: now.superseded - before.superseded,
        }
    }
}

/// Link views as a round sees them: this round's deliveries over the
/// committed values.
struct View<'a, S> {
    committed: &'a [S],
    staged: &'a BTreeMap<LinkId, &'a S>,
}

impl<'a, S> View<'a, S> {
    fn get(&self, link: LinkId) -> &'a S {
        match self.staged.get(&link) {
            Some(&value) => value,
            None => &self.committed[link.index()],
        }
    }
}

/// Run the model of `id` against its current state and inbound views.
fn transition_of<S: CellState>(lattice: &Lattice<S>, views: &View<'_, S>, id: CellId) -> Result<S, CellError> {
    let cell = &lattice.cells[id.index()];
    let neighbors = NeighborView::new(
        cell.inbound
            .iter()
            .map(|l| {
                let link = &lattice.links[l.index()];
                Neighbor {
                    cell: link.source,
                    coord: &lattice.cells[link.source.index()].coord,
                    weight: link.weight,
                    state: views.get(*l),
                }
            })
            .collect(),
    );
    cell.model.transition(&cell.state, &neighbors)
}

impl<S: CellState> std::fmt::Debug for Engine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("clock", &self.clock)
            .field("state", &self.state)
            .field("cells", &self.lattice.len())
            .field("pending_events", &self.scheduler.len())
            .field("pending_messages", &self.transport.pending_count())
            .finish()
    }
}
