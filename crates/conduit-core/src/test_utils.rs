//! Shared helpers for tests and benches.
//!
//! [`TankWorld`] is a self-contained [`PipeWorld`] with up to one tank per
//! face and an optional side filter, enough to exercise every flow phase
//! without a real world behind it.

use crate::config::FlowRateConfig;
use crate::direction::{DirSet, Direction};
use crate::fluid::{FluidKey, FluidStack, FluidTypeId};
use crate::node::PipeWorld;

/// Test species 0.
pub fn water() -> FluidKey {
    FluidKey::new(FluidTypeId(0))
}

/// Test species 1.
pub fn oil() -> FluidKey {
    FluidKey::new(FluidTypeId(1))
}

/// 10 mB/tick, 2-tick delay: small numbers, short waits.
pub fn std_config() -> FlowRateConfig {
    FlowRateConfig::new(10, 2)
}

// ---------------------------------------------------------------------------
// Tank
// ---------------------------------------------------------------------------

/// A single-species container with a capacity.
#[derive(Debug, Clone)]
pub struct Tank {
    pub fluid: Option<FluidStack>,
    pub capacity: u32,
}

impl Tank {
    /// Accepts everything, forever.
    pub fn unlimited() -> Self {
        Tank {
            fluid: None,
            capacity: u32::MAX,
        }
    }

    /// Empty, with a hard capacity.
    pub fn with_capacity(capacity: u32) -> Self {
        Tank {
            fluid: None,
            capacity,
        }
    }

    /// Pre-filled.
    pub fn holding(stack: FluidStack, capacity: u32) -> Self {
        Tank {
            fluid: Some(stack),
            capacity,
        }
    }

    pub fn amount(&self) -> u32 {
        self.fluid.as_ref().map_or(0, |s| s.amount)
    }

    fn fill(&mut self, stack: &FluidStack, commit: bool) -> u32 {
        if let Some(held) = &self.fluid {
            if held.key != stack.key {
                return 0;
            }
        }
        let accepted = (self.capacity - self.amount()).min(stack.amount);
        if accepted > 0 && commit {
            match &mut self.fluid {
                Some(held) => held.amount += accepted,
                None => self.fluid = Some(FluidStack::new(stack.key.clone(), accepted)),
            }
        }
        accepted
    }

    fn drain(&mut self, filter: Option<&FluidKey>, max: u32, commit: bool) -> Option<FluidStack> {
        let held = self.fluid.as_mut()?;
        if let Some(f) = filter {
            if *f != held.key {
                return None;
            }
        }
        let drained = held.amount.min(max);
        if drained == 0 {
            return None;
        }
        let key = held.key.clone();
        if commit {
            held.amount -= drained;
            if held.amount == 0 {
                self.fluid = None;
            }
        }
        Some(FluidStack::new(key, drained))
    }
}

// ---------------------------------------------------------------------------
// TankWorld
// ---------------------------------------------------------------------------

type SideFilter = Box<dyn Fn(&FluidKey, DirSet) -> DirSet>;

/// A world of up to six tanks, one per face. Faces without a tank report no
/// connectivity.
pub struct TankWorld {
    tanks: [Option<Tank>; 6],
    filter: Option<SideFilter>,
}

impl TankWorld {
    /// Nothing connected anywhere.
    pub fn empty() -> Self {
        TankWorld {
            tanks: std::array::from_fn(|_| None),
            filter: None,
        }
    }

    /// Attach a tank to one face.
    pub fn tank(mut self, dir: Direction, tank: Tank) -> Self {
        self.tanks[dir.index()] = Some(tank);
        self
    }

    /// Install a side filter for distribution rounds.
    pub fn side_filter(
        mut self,
        filter: impl Fn(&FluidKey, DirSet) -> DirSet + 'static,
    ) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Amount currently held by the tank on `dir` (0 if none).
    pub fn tank_amount(&self, dir: Direction) -> u32 {
        self.tanks[dir.index()].as_ref().map_or(0, Tank::amount)
    }

    /// Sum over all tanks, for conservation checks.
    pub fn total_amount(&self) -> u32 {
        self.tanks.iter().flatten().map(Tank::amount).sum()
    }
}

impl PipeWorld for TankWorld {
    fn connectivity_allows(&self, dir: Direction) -> bool {
        self.tanks[dir.index()].is_some()
    }

    fn fill_external(&mut self, dir: Direction, stack: &FluidStack, commit: bool) -> u32 {
        match &mut self.tanks[dir.index()] {
            Some(tank) => tank.fill(stack, commit),
            None => 0,
        }
    }

    fn drain_external(
        &mut self,
        dir: Direction,
        filter: Option<&FluidKey>,
        max: u32,
        commit: bool,
    ) -> Option<FluidStack> {
        self.tanks[dir.index()].as_mut()?.drain(filter, max, commit)
    }

    fn filter_sides(&self, fluid: &FluidKey, candidates: DirSet) -> DirSet {
        match &self.filter {
            Some(filter) => filter(fluid, candidates),
            None => candidates,
        }
    }
}
