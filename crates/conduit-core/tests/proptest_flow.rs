//! Property-based tests: structural invariants under arbitrary operation
//! sequences and random tick schedules.

use conduit_core::config::FlowRateConfig;
use conduit_core::direction::{Direction, SectionKey};
use conduit_core::fluid::FluidStack;
use conduit_core::node::PipeNode;
use conduit_core::section::{FlowDir, Section};
use conduit_core::test_utils::{water, Tank, TankWorld};
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

/// One operation against a bare section.
#[derive(Debug, Clone)]
enum SectionOp {
    Fill(u32, bool),
    Drain(u32, bool),
    Advance,
    Lock(FlowDir),
    Decay,
}

fn arb_section_op() -> impl Strategy<Value = SectionOp> {
    prop_oneof![
        (0..50u32, any::<bool>()).prop_map(|(n, c)| SectionOp::Fill(n, c)),
        (0..50u32, any::<bool>()).prop_map(|(n, c)| SectionOp::Drain(n, c)),
        Just(SectionOp::Advance),
        prop_oneof![
            Just(FlowDir::In),
            Just(FlowDir::None),
            Just(FlowDir::Out)
        ]
        .prop_map(SectionOp::Lock),
        Just(SectionOp::Decay),
    ]
}

/// A tank setup per face: None = disconnected, Some(capacity) = tank.
fn arb_tanks() -> impl Strategy<Value = [Option<u32>; 6]> {
    proptest::array::uniform6(proptest::option::of(10..200u32))
}

// ===========================================================================
// Section invariants
// ===========================================================================

proptest! {
    #[test]
    fn section_invariants_hold_under_any_op_sequence(
        ops in proptest::collection::vec(arb_section_op(), 0..300),
        delay in 1..6u32,
    ) {
        let config = FlowRateConfig::new(10, delay);
        let mut section = Section::new(&config);

        for op in ops {
            let lock_before = section.ticks_in_direction();
            match op {
                SectionOp::Fill(n, commit) => {
                    let filled = section.fill(n, commit);
                    prop_assert!(filled <= n);
                }
                SectionOp::Drain(n, commit) => {
                    let drained = section.drain(n, commit);
                    prop_assert!(drained <= n);
                }
                SectionOp::Advance => section.advance_ring_cursor(),
                SectionOp::Lock(dir) => section.lock_direction(dir),
                SectionOp::Decay => {
                    section.decay_lock();
                    // Exactly one step toward zero, never past it.
                    let after = section.ticks_in_direction();
                    prop_assert!(after.abs() <= lock_before.abs());
                    prop_assert!((after - lock_before).abs() <= 1);
                    prop_assert!(after.signum() * lock_before.signum() != -1);
                }
            }

            prop_assert!(section.amount() <= section.capacity());
            prop_assert!(section.incoming_total() <= section.amount());
        }
    }

    #[test]
    fn drain_never_touches_in_flight_fluid(
        fills in proptest::collection::vec(1..20u32, 1..10),
    ) {
        let config = FlowRateConfig::new(10, 4);
        let mut section = Section::new(&config);

        for n in fills {
            section.fill(n, true);
            // Everything inserted so far this cycle is in flight; only the
            // settled remainder may leave.
            let settled = section.amount() - section.incoming_total();
            prop_assert!(section.max_drainable() <= settled);
        }
    }
}

// ===========================================================================
// Node tick invariants
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn ticking_conserves_fluid_and_bounds(
        seed in any::<u64>(),
        tanks in arb_tanks(),
        start in 1..400u32,
        ticks in 1..80u64,
    ) {
        let config = FlowRateConfig::new(10, 2);
        let mut node = PipeNode::with_update_interval(config, seed, 0);
        node.set_fluid(Some(water()));
        node.prime_section(SectionKey::Center, start);

        let mut world = TankWorld::empty();
        for (dir, capacity) in Direction::ALL.into_iter().zip(tanks) {
            if let Some(capacity) = capacity {
                world = world.tank(dir, Tank::with_capacity(capacity));
            }
        }

        for now in 0..ticks {
            node.tick(&mut world, now);

            for key in SectionKey::ALL {
                let s = node.section(key);
                prop_assert!(s.amount() <= s.capacity());
                prop_assert!(s.incoming_total() <= s.amount());
            }
            prop_assert_eq!(
                node.total_amount() + world.total_amount(),
                start,
                "fluid was created or destroyed"
            );
        }
    }

    #[test]
    fn extraction_pipeline_conserves_fluid(
        seed in any::<u64>(),
        source in 50..500u32,
        ticks in 1..60u64,
    ) {
        let config = FlowRateConfig::new(10, 2);
        let mut node = PipeNode::with_update_interval(config, seed, 0);
        let mut world = TankWorld::empty()
            .tank(
                Direction::West,
                Tank::holding(FluidStack::new(water(), source), source),
            )
            .tank(Direction::East, Tank::unlimited());

        for now in 0..ticks {
            node.try_extract(&mut world, Direction::West, 10, None, now);
            node.tick(&mut world, now);
        }

        prop_assert_eq!(
            node.total_amount()
                + world.tank_amount(Direction::West)
                + world.tank_amount(Direction::East),
            source
        );
    }

    #[test]
    fn cleared_node_is_fully_reset(
        seed in any::<u64>(),
        amount in 1..40u32,
    ) {
        let config = FlowRateConfig::new(10, 2);
        let mut node = PipeNode::with_update_interval(config, seed, 0);
        node.set_fluid(Some(water()));
        node.prime_section(SectionKey::Face(Direction::Up), amount);
        node.section_mut(SectionKey::Face(Direction::Up))
            .lock_direction(FlowDir::Out);
        let mut world = TankWorld::empty().tank(Direction::Up, Tank::unlimited());

        // Enough ticks to push everything out.
        for now in 0..(u64::from(amount) + 10) {
            node.tick(&mut world, now);
        }

        prop_assert_eq!(node.fluid(), None);
        for key in SectionKey::ALL {
            let s = node.section(key);
            prop_assert_eq!(s.amount(), 0);
            prop_assert_eq!(s.incoming_total(), 0);
            prop_assert_eq!(s.ticks_in_direction(), 0);
        }
        prop_assert_eq!(world.tank_amount(Direction::Up), amount);
    }
}
