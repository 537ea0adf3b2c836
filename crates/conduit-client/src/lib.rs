//! Conduit Client -- render-side interpolation of synced pipe state.
//!
//! A [`RenderPipe`] consumes decoded [`NodeStateUpdate`]s and turns the
//! sparse network cadence into smooth visuals:
//!
//! - displayed amounts catch up to the last received target at a rate
//!   proportional to the observed message cadence, so faster or slower
//!   update rates are absorbed without overshoot;
//! - each section carries a positional offset that creeps along the flow
//!   direction and snaps back a full unit at the half-cell boundary,
//!   producing an endless "fluid moving through the pipe" loop with no
//!   drift.
//!
//! Nothing here feeds back into the simulation; this is a pure consumer.

use glam::DVec3;

use conduit_core::direction::{Direction, SectionKey};
use conduit_core::fixed::Ticks;
use conduit_core::fluid::FluidKey;
use conduit_core::section::FlowDir;
use conduit_net::codec::{NodeStateUpdate, PayloadKind};

/// Distance the flow offset creeps per client step.
pub const FLOW_MULTIPLIER: f64 = 0.016;

/// Message-cadence clamp: catch-up is spread over at most this many steps.
const MAX_CATCH_UP_STEPS: u64 = 60;

fn unit(dir: Direction) -> DVec3 {
    let (x, y, z) = dir.unit_vector();
    DVec3::new(x as f64, y as f64, z as f64)
}

/// Component-wise sign with a true zero (unlike `f64::signum`, which maps
/// 0.0 to 1.0).
fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// RenderSection
// ---------------------------------------------------------------------------

/// Client-side view of one section.
#[derive(Debug, Clone, Default)]
pub struct RenderSection {
    /// Amount last received from the network.
    pub target: u32,
    /// Interpolated display amount after the latest step.
    pub client_amount_this: i32,
    /// Display amount one step ago, for sub-tick blending.
    pub client_amount_last: i32,
    /// Flow direction last received from the network.
    pub direction: FlowDir,
    offset_this: DVec3,
    offset_last: DVec3,
}

impl RenderSection {
    fn step_amount(&mut self, msg_delta: i32) {
        self.client_amount_last = self.client_amount_this;
        let delta = self.target as i32 - self.client_amount_this;
        if delta != 0 {
            if delta.abs() < msg_delta {
                self.client_amount_this += delta;
            } else {
                self.client_amount_this += delta / msg_delta;
            }
        }
    }

    fn step_offset(&mut self, flow: DVec3) {
        if self.client_amount_this == 0 && self.client_amount_last == 0 {
            self.offset_this = DVec3::ZERO;
        }
        self.offset_last = self.offset_this;
        self.offset_this += flow * -FLOW_MULTIPLIER;

        // Snap back a full unit once a component crosses the half-cell
        // boundary; both offsets shift so the blend stays continuous.
        let wrap = DVec3::new(
            wrap_component(self.offset_this.x),
            wrap_component(self.offset_this.y),
            wrap_component(self.offset_this.z),
        );
        if wrap != DVec3::ZERO {
            self.offset_this += wrap;
            self.offset_last += wrap;
        }
    }
}

fn wrap_component(v: f64) -> f64 {
    if v >= 0.5 {
        -1.0
    } else if v <= -0.5 {
        1.0
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// RenderPipe
// ---------------------------------------------------------------------------

/// Client-side state of one pipe node: seven render sections plus the
/// message-cadence bookkeeping that paces the catch-up.
#[derive(Debug, Clone, Default)]
pub struct RenderPipe {
    fluid: Option<FluidKey>,
    sections: [RenderSection; SectionKey::COUNT],
    last_message: Ticks,
    last_message_minus_1: Ticks,
}

impl RenderPipe {
    pub fn new() -> Self {
        Self::default()
    }

    /// The species to render, if any.
    pub fn fluid(&self) -> Option<&FluidKey> {
        self.fluid.as_ref()
    }

    pub fn section(&self, key: SectionKey) -> &RenderSection {
        &self.sections[key.index()]
    }

    /// Apply a decoded update. Full payloads reset the interpolation
    /// baseline to the snapshot (no catch-up on first sight); deltas only
    /// move the target. Also records the receive time for cadence pacing.
    pub fn apply_update(&mut self, update: &NodeStateUpdate, now: Ticks) {
        self.fluid = update.fluid.clone();
        for (section, su) in self.sections.iter_mut().zip(&update.sections) {
            if let Some(amount) = su.amount {
                section.target = u32::from(amount);
                if update.kind == PayloadKind::Full {
                    section.client_amount_this = amount as i32;
                    section.client_amount_last = amount as i32;
                }
            }
            section.direction = su.direction;
        }
        self.last_message_minus_1 = self.last_message;
        self.last_message = now;
    }

    /// Advance one client animation step. Returns true while any section
    /// still displays fluid.
    pub fn tick_client(&mut self) -> bool {
        let msg_delta = (self.last_message - self.last_message_minus_1)
            .clamp(1, MAX_CATCH_UP_STEPS) as i32;

        for section in &mut self.sections {
            section.step_amount(msg_delta);
        }

        // The center flows along the combined direction of its faces:
        // outgoing faces pull, incoming faces push.
        let mut combined = DVec3::ZERO;
        for dir in Direction::ALL {
            match self.sections[SectionKey::Face(dir).index()].direction {
                FlowDir::Out => combined += unit(dir),
                FlowDir::In => combined -= unit(dir),
                FlowDir::None => {}
            }
        }
        let center_flow = DVec3::new(sign(combined.x), sign(combined.y), sign(combined.z));

        for key in SectionKey::ALL {
            let flow = match key.face() {
                None => center_flow,
                Some(dir) => {
                    let section = &self.sections[key.index()];
                    match section.direction {
                        FlowDir::Out => unit(dir),
                        FlowDir::In => -unit(dir),
                        FlowDir::None => DVec3::ZERO,
                    }
                }
            };
            self.sections[key.index()].step_offset(flow);
        }

        self.sections
            .iter()
            .any(|s| s.client_amount_this > 0 || s.client_amount_last > 0)
    }

    /// Displayed amount per section, blended between the last two steps.
    /// Indexed in wire order (center first).
    pub fn amounts_for_render(&self, partial: f64) -> [f64; SectionKey::COUNT] {
        std::array::from_fn(|i| {
            let s = &self.sections[i];
            f64::from(s.client_amount_last) * (1.0 - partial)
                + f64::from(s.client_amount_this) * partial
        })
    }

    /// Flow offset per section, blended between the last two steps.
    pub fn offsets_for_render(&self, partial: f64) -> [DVec3; SectionKey::COUNT] {
        std::array::from_fn(|i| {
            let s = &self.sections[i];
            s.offset_last * (1.0 - partial) + s.offset_this * partial
        })
    }
}
