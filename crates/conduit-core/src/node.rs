//! The per-node flow controller.
//!
//! A [`PipeNode`] owns the seven sections of one pipe segment and advances
//! them through the fixed tick pipeline:
//!
//! 1. **Ring advance** -- rotate every section's delay cursor and note
//!    whether any section may output this tick.
//! 2. **Push out** -- faces locked (or free) to output offer fluid to their
//!    adjacent external containers.
//! 3. **Distribute** -- the center reservoir shares fluid across eligible
//!    output faces, in shuffled order, proportionally to demand.
//! 4. **Collect** -- input-capable faces feed the center, fairly split
//!    against its headroom.
//! 5. **Lock decay** -- every direction lock steps toward neutral.
//! 6. **Emptiness** -- a fully drained node clears its species.
//! 7. **Sync check** -- changed amounts or directions mark the node for a
//!    rate-limited differential update.
//!
//! All cross-node interaction goes through the [`PipeWorld`] collaborator;
//! the node never reaches into another node's sections.

use crate::config::{FlowRateConfig, NETWORK_UPDATE_INTERVAL};
use crate::direction::{DirSet, Direction, SectionKey};
use crate::event::PipeEvent;
use crate::fixed::{Fixed64, Ticks};
use crate::fluid::{FluidKey, FluidStack};
use crate::rng::SimRng;
use crate::section::{FlowDir, Section};
use crate::sync::SendTimer;

// ---------------------------------------------------------------------------
// External collaborator
// ---------------------------------------------------------------------------

/// The world as seen from one node: adjacent containers and connectivity.
///
/// Implementations are responsible for their own serialization when many
/// nodes tick concurrently; a node only makes point-in-time calls and never
/// holds references across phases.
pub trait PipeWorld {
    /// Is there a fluid-capable neighbor on this face?
    fn connectivity_allows(&self, dir: Direction) -> bool;

    /// Offer `stack` to the container on `dir`. Returns the accepted amount;
    /// committed only when `commit` is true.
    fn fill_external(&mut self, dir: Direction, stack: &FluidStack, commit: bool) -> u32;

    /// Pull up to `max` from the container on `dir`, optionally restricted
    /// to one species. Returns what the container gave up.
    fn drain_external(
        &mut self,
        dir: Direction,
        filter: Option<&FluidKey>,
        max: u32,
        commit: bool,
    ) -> Option<FluidStack>;

    /// Restrict a distribution round to a subset of candidate faces. Must be
    /// a pure function of the species and candidates. Default: allow all.
    fn filter_sides(&self, _fluid: &FluidKey, candidates: DirSet) -> DirSet {
        candidates
    }
}

/// What sits on the other side of a face, for connection checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborKind {
    /// Another fluid-carrying pipe node.
    FluidNode,
    /// A tank or machine that can hold fluid.
    FluidContainer,
    /// Anything else.
    Other,
}

// ---------------------------------------------------------------------------
// Tick outcome
// ---------------------------------------------------------------------------

/// Result of one [`PipeNode::tick`].
#[derive(Debug, Default)]
pub struct TickOutcome {
    /// Diagnostic events recorded since the last tick, in order.
    pub events: Vec<PipeEvent>,
    /// True when observers should receive a differential update now
    /// (something changed and the rate limiter allowed it).
    pub send: bool,
}

// ---------------------------------------------------------------------------
// PipeNode
// ---------------------------------------------------------------------------

const CENTER: usize = 0;

fn face_index(dir: Direction) -> usize {
    SectionKey::Face(dir).index()
}

/// One pipe segment's fluid state machine: seven sections, a single optional
/// species, and the flow controller that moves fluid between them and the
/// outside world.
#[derive(Debug)]
pub struct PipeNode {
    config: FlowRateConfig,
    sections: [Section; 7],
    fluid: Option<FluidKey>,
    rng: SimRng,
    send_timer: SendTimer,
    pending_events: Vec<PipeEvent>,
}

impl PipeNode {
    /// Create an empty node. The RNG seed pins the distribution order, so
    /// callers (and tests) control determinism.
    pub fn new(config: FlowRateConfig, seed: u64) -> Self {
        Self {
            config,
            sections: std::array::from_fn(|_| Section::new(&config)),
            fluid: None,
            rng: SimRng::new(seed),
            send_timer: SendTimer::new(NETWORK_UPDATE_INTERVAL),
            pending_events: Vec::new(),
        }
    }

    /// Same, with a custom sync interval.
    pub fn with_update_interval(config: FlowRateConfig, seed: u64, interval: Ticks) -> Self {
        let mut node = Self::new(config, seed);
        node.send_timer = SendTimer::new(interval);
        node
    }

    pub fn config(&self) -> &FlowRateConfig {
        &self.config
    }

    /// Capacity of every section.
    pub fn capacity(&self) -> u32 {
        self.config.capacity()
    }

    /// The species this node currently holds, if any.
    pub fn fluid(&self) -> Option<&FluidKey> {
        self.fluid.as_ref()
    }

    pub fn section(&self, key: SectionKey) -> &Section {
        &self.sections[key.index()]
    }

    pub fn section_mut(&mut self, key: SectionKey) -> &mut Section {
        &mut self.sections[key.index()]
    }

    pub(crate) fn sections_mut(&mut self) -> &mut [Section; 7] {
        &mut self.sections
    }

    /// Sum of all sections' amounts.
    pub fn total_amount(&self) -> u32 {
        self.sections.iter().map(Section::amount).sum()
    }

    /// The single entry point for species changes. Resets every section's
    /// buffer, cursor, and lock; section state never survives a species
    /// change. Passing the currently held species still resets.
    pub fn set_fluid(&mut self, fluid: Option<FluidKey>) {
        self.fluid = fluid;
        let delay = self.config.delay();
        for section in &mut self.sections {
            section.reset(delay);
        }
    }

    /// True only when the far side can carry fluid.
    pub fn can_connect(&self, _dir: Direction, neighbor: NeighborKind) -> bool {
        matches!(
            neighbor,
            NeighborKind::FluidNode | NeighborKind::FluidContainer
        )
    }

    /// A fill/drain capability for one face, restricted by that face's
    /// direction lock. Hand this to the container on the other side; only
    /// expose handlers for connected faces.
    pub fn section_handler(&mut self, dir: Direction) -> SectionHandler<'_> {
        SectionHandler { node: self, dir }
    }

    /// True when any section's amount or direction differs from the last
    /// values sent to observers.
    pub fn needs_sync(&self) -> bool {
        self.sections.iter().any(|s| {
            s.amount() != s.last_sent_amount() || s.current_direction() != s.last_sent_direction()
        })
    }

    // -- tick ---------------------------------------------------------------

    /// Advance one simulation tick. Runs to completion; never errors.
    pub fn tick(&mut self, world: &mut impl PipeWorld, now: Ticks) -> TickOutcome {
        let mut events = std::mem::take(&mut self.pending_events);

        if self.fluid.is_some() {
            // Phase 1: rotate delay cursors, note whether any output is
            // possible this tick. Locks set by later phases are read live.
            let mut can_output = false;
            for section in &mut self.sections {
                section.advance_ring_cursor();
                if section.current_direction().can_output() {
                    can_output = true;
                }
            }

            // Phases 2-4: movement.
            if can_output {
                self.move_from_pipe(world);
            }
            self.move_from_center(world);
            self.move_to_center();

            // Phase 5: lock decay.
            for section in &mut self.sections {
                section.decay_lock();
            }

            // Phase 6: a fully drained node forgets its species.
            if self.total_amount() == 0 {
                self.set_fluid(None);
                events.push(PipeEvent::FluidCleared { tick: now });
            }
        }

        // Phase 7: change detection, rate limited. Runs on empty nodes too,
        // so a clear still propagates.
        let send = self.needs_sync() && self.send_timer.mark_if_elapsed(now);

        TickOutcome { events, send }
    }

    /// Phase 2: each output-capable face offers up to one tick's throughput
    /// to its adjacent container, if the side filter leaves exactly that
    /// face standing. Only what the container accepts is committed.
    fn move_from_pipe(&mut self, world: &mut impl PipeWorld) {
        let Some(fluid) = self.fluid.clone() else {
            return;
        };
        let flow = self.config.transfer_per_tick;

        for dir in Direction::ALL {
            let idx = face_index(dir);
            if !self.sections[idx].current_direction().can_output() {
                continue;
            }
            let allowed = world.filter_sides(&fluid, DirSet::only(dir));
            if !(allowed.len() == 1 && allowed.contains(dir)) {
                continue;
            }
            if !world.connectivity_allows(dir) {
                continue;
            }

            let to_push = self.sections[idx].drain(flow, false);
            if to_push == 0 {
                continue;
            }
            let accepted =
                world.fill_external(dir, &FluidStack::new(fluid.clone(), to_push), true);
            if accepted > 0 {
                self.sections[idx].drain(accepted, true);
                self.sections[idx].lock_direction(FlowDir::Out);
            }
        }
    }

    /// Phase 3: split the center's drainable fluid across eligible output
    /// faces. Eligibility is decided against all connected output-capable
    /// faces; the side filter then picks the visited subset, and the
    /// injected RNG the visiting order, so no face is systematically
    /// preferred. Shares are proportional to each face's own headroom and
    /// round up to 1 whenever a nonzero share is due.
    fn move_from_center(&mut self, world: &mut impl PipeWorld) {
        let Some(fluid) = self.fluid.clone() else {
            return;
        };
        let total_available = self.sections[CENTER].max_drainable();
        if total_available < 1 {
            return;
        }
        let flow = self.config.transfer_per_tick;

        let mut real_directions = DirSet::EMPTY;
        for dir in Direction::ALL {
            if self.sections[face_index(dir)]
                .current_direction()
                .can_output()
                && world.connectivity_allows(dir)
            {
                real_directions.insert(dir);
            }
        }
        if real_directions.is_empty() {
            return;
        }

        let mut order: Vec<Direction> =
            world.filter_sides(&fluid, real_directions).iter().collect();
        self.rng.shuffle(&mut order);

        // The divisor counts every connected output face, filtered or not.
        let n = real_directions.len() as u32;
        let ratio = Fixed64::from_num((flow * n).min(total_available))
            / Fixed64::from_num(flow)
            / Fixed64::from_num(n);

        for dir in order {
            let idx = face_index(dir);
            let available = self.sections[idx].fill(flow, false);
            let mut to_push: u32 = (Fixed64::from_num(available) * ratio).to_num();
            if to_push < 1 {
                to_push += 1;
            }

            let to_push = self.sections[CENTER].drain(to_push, false);
            if to_push > 0 {
                let filled = self.sections[idx].fill(to_push, true);
                if filled > 0 {
                    self.sections[CENTER].drain(filled, true);
                    self.sections[idx].lock_direction(FlowDir::Out);
                }
            }
        }
    }

    /// Phase 4: input-capable faces feed the center. Availability is
    /// measured uncommitted first, then each contributing face gets a fair
    /// share of the center's headroom, rounded up to 1 when positive.
    fn move_to_center(&mut self) {
        let flow = self.config.transfer_per_tick;
        let space_available = self.capacity() - self.sections[CENTER].amount();

        let mut input_per_tick = [0u32; 6];
        let mut contributing = 0u32;
        for dir in Direction::ALL {
            let section = &mut self.sections[face_index(dir)];
            if section.current_direction().can_input() {
                input_per_tick[dir.index()] = section.drain(flow, false);
                if input_per_tick[dir.index()] > 0 {
                    contributing += 1;
                }
            }
        }
        if contributing == 0 {
            return;
        }

        let ratio = Fixed64::from_num((flow * contributing).min(space_available))
            / Fixed64::from_num(flow)
            / Fixed64::from_num(contributing);

        for dir in Direction::ALL {
            if input_per_tick[dir.index()] == 0 {
                continue;
            }
            let idx = face_index(dir);
            let mut to_drain: u32 =
                (Fixed64::from_num(input_per_tick[dir.index()]) * ratio).to_num();
            if to_drain < 1 {
                to_drain += 1;
            }

            let to_push = self.sections[idx].drain(to_drain, false);
            if to_push > 0 {
                let filled = self.sections[CENTER].fill(to_push, true);
                self.sections[idx].drain(filled, true);
                if filled > 0 {
                    self.sections[idx].lock_direction(FlowDir::In);
                }
            }
        }
    }

    // -- extraction ---------------------------------------------------------

    /// Actively pull up to `max` from the container on `from` into that
    /// face's section. Used by extraction drivers; not part of the tick.
    ///
    /// `filter` restricts the species; `None` means "whatever this node
    /// already holds" (or anything, on an empty node). Returns the stack the
    /// container gave up, which is ground truth even if the section could
    /// not hold all of it (that divergence is reported as a
    /// [`PipeEvent::TransferMismatch`]).
    pub fn try_extract(
        &mut self,
        world: &mut impl PipeWorld,
        from: Direction,
        max: u32,
        filter: Option<&FluidKey>,
        now: Ticks,
    ) -> Option<FluidStack> {
        if !world.connectivity_allows(from) {
            return None;
        }
        let filter = match (filter, &self.fluid) {
            (Some(f), Some(held)) if f != held => return None,
            (Some(f), _) => Some(f.clone()),
            (None, held) => held.clone(),
        };

        let idx = face_index(from);
        let max = max.min(self.sections[idx].max_fillable());
        if max == 0 {
            return None;
        }

        let drained = world.drain_external(from, filter.as_ref(), max, true)?;
        if drained.amount == 0 {
            return None;
        }

        if self.fluid.is_none() {
            self.set_fluid(Some(drained.key.clone()));
            self.pending_events.push(PipeEvent::FluidSet {
                fluid: drained.key.clone(),
                tick: now,
            });
        }

        let committed = self.sections[idx].fill(drained.amount, true);
        self.sections[idx].lock_direction(FlowDir::In);
        if committed != drained.amount {
            self.pending_events.push(PipeEvent::TransferMismatch {
                direction: from,
                attempted: drained.amount,
                committed,
                tick: now,
            });
        }
        Some(drained)
    }

    // -- diagnostics --------------------------------------------------------

    /// Full state breakdown for inspection.
    pub fn diagnostics(&self) -> crate::diagnostics::NodeDiagnostics {
        crate::diagnostics::NodeDiagnostics {
            fluid: self.fluid.clone(),
            total_amount: self.total_amount(),
            sections: SectionKey::ALL
                .into_iter()
                .map(|key| {
                    let s = self.section(key);
                    crate::diagnostics::SectionDiagnostics {
                        key,
                        amount: s.amount(),
                        direction: s.current_direction(),
                        cooldown: s.ticks_in_direction(),
                        incoming: crate::diagnostics::run_length(s.incoming()),
                    }
                })
                .collect(),
        }
    }

    /// Directly install fluid in a section. Test setup only.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn prime_section(&mut self, key: SectionKey, amount: u32) {
        assert!(
            self.fluid.is_some(),
            "set a fluid before priming sections"
        );
        self.sections[key.index()].prime(amount);
    }
}

// ---------------------------------------------------------------------------
// SectionHandler
// ---------------------------------------------------------------------------

/// Fill/drain capability for one face, as exposed to the container on the
/// other side. Every operation is gated by the face's direction lock: an
/// OUT-locked face rejects fills, an IN-locked face rejects drains.
#[derive(Debug)]
pub struct SectionHandler<'a> {
    node: &'a mut PipeNode,
    dir: Direction,
}

impl SectionHandler<'_> {
    /// Offer fluid to this face. Establishes the node's species when empty;
    /// a different species than held is rejected (returns 0).
    pub fn fill(&mut self, stack: &FluidStack, commit: bool) -> u32 {
        let idx = face_index(self.dir);
        if !self.node.sections[idx].current_direction().can_input() {
            return 0;
        }
        if let Some(held) = &self.node.fluid {
            if *held != stack.key {
                return 0;
            }
        }
        if commit && self.node.fluid.is_none() {
            self.node.set_fluid(Some(stack.key.clone()));
        }
        let filled = self.node.sections[idx].fill(stack.amount, commit);
        if filled > 0 && commit {
            self.node.sections[idx].lock_direction(FlowDir::In);
        }
        filled
    }

    /// Pull fluid from this face. A species filter that does not match the
    /// held fluid yields nothing.
    pub fn drain(&mut self, max: u32, filter: Option<&FluidKey>, commit: bool) -> Option<FluidStack> {
        let idx = face_index(self.dir);
        if !self.node.sections[idx].current_direction().can_output() {
            return None;
        }
        let held = self.node.fluid.clone()?;
        if let Some(f) = filter {
            if *f != held {
                return None;
            }
        }
        let drained = self.node.sections[idx].drain(max, commit);
        if drained == 0 {
            return None;
        }
        if commit {
            self.node.sections[idx].lock_direction(FlowDir::Out);
        }
        Some(FluidStack::new(held, drained))
    }
}
