//! Server-to-client pipeline: tick the simulation, encode payloads, decode
//! them through the species cache, and drive the render interpolation.

use conduit_client::RenderPipe;
use conduit_core::direction::{Direction, SectionKey};
use conduit_core::fluid::FluidStack;
use conduit_core::node::PipeNode;
use conduit_core::section::FlowDir;
use conduit_core::test_utils::{std_config, water, Tank, TankWorld};
use conduit_net::cache::FluidCache;
use conduit_net::codec::{decode, encode, PayloadKind};

/// Simulates the cache-sync side channel: everything the server cache knows,
/// the client cache learns.
fn sync_caches(server: &FluidCache, client: &mut FluidCache) {
    let mut handle = 0;
    while let Some(key) = server.resolve(handle) {
        client.insert(handle, key.clone());
        handle += 1;
    }
}

#[test]
fn client_converges_on_server_state() {
    let mut node = PipeNode::with_update_interval(std_config(), 5, 0);
    let mut world = TankWorld::empty()
        .tank(
            Direction::West,
            Tank::holding(FluidStack::new(water(), 1000), 1000),
        )
        .tank(Direction::East, Tank::unlimited());

    let mut server_cache = FluidCache::new();
    let mut client_cache = FluidCache::new();
    let mut pipe = RenderPipe::new();

    // A newly observing client starts from a full snapshot.
    node.try_extract(&mut world, Direction::West, 10, None, 0);
    node.tick(&mut world, 0);
    let payload = encode(&mut node, PayloadKind::Full, &mut server_cache);
    sync_caches(&server_cache, &mut client_cache);
    let update = decode(PayloadKind::Full, &payload, &client_cache).unwrap();
    pipe.apply_update(&update, 0);

    assert_eq!(pipe.fluid(), Some(&water()));

    // Afterwards the server streams deltas whenever the tick says so.
    for now in 1..40u64 {
        node.try_extract(&mut world, Direction::West, 10, None, now);
        let outcome = node.tick(&mut world, now);
        if outcome.send {
            let payload = encode(&mut node, PayloadKind::Delta, &mut server_cache);
            let update = decode(PayloadKind::Delta, &payload, &client_cache).unwrap();
            pipe.apply_update(&update, now);
        }
        pipe.tick_client();
    }

    // After the last delta every target matches the server exactly, and the
    // directions mirror the simulation.
    for key in SectionKey::ALL {
        assert_eq!(
            pipe.section(key).target,
            node.section(key).last_sent_amount(),
            "{key:?} target out of sync"
        );
        assert_eq!(
            pipe.section(key).direction,
            node.section(key).last_sent_direction(),
            "{key:?} direction out of sync"
        );
    }
    assert_eq!(
        pipe.section(SectionKey::Face(Direction::West)).direction,
        FlowDir::In
    );
    assert_eq!(
        pipe.section(SectionKey::Face(Direction::East)).direction,
        FlowDir::Out
    );

    // Interpolation has had time to catch up to a steady flow.
    let displayed = pipe.amounts_for_render(1.0);
    let total_displayed: f64 = displayed.iter().sum();
    assert!(total_displayed > 0.0, "client shows an empty pipe");
}

#[test]
fn species_clear_propagates_to_the_client() {
    let mut node = PipeNode::with_update_interval(std_config(), 5, 0);
    node.set_fluid(Some(water()));
    node.prime_section(SectionKey::Face(Direction::Up), 20);
    node.section_mut(SectionKey::Face(Direction::Up))
        .lock_direction(FlowDir::Out);
    let mut world = TankWorld::empty().tank(Direction::Up, Tank::unlimited());

    let mut server_cache = FluidCache::new();
    let mut client_cache = FluidCache::new();
    let mut pipe = RenderPipe::new();

    let payload = encode(&mut node, PayloadKind::Full, &mut server_cache);
    sync_caches(&server_cache, &mut client_cache);
    pipe.apply_update(
        &decode(PayloadKind::Full, &payload, &client_cache).unwrap(),
        0,
    );
    assert_eq!(pipe.fluid(), Some(&water()));

    // Drain the node dry, streaming every update to the client.
    for now in 1..6u64 {
        let outcome = node.tick(&mut world, now);
        if outcome.send {
            let payload = encode(&mut node, PayloadKind::Delta, &mut server_cache);
            pipe.apply_update(
                &decode(PayloadKind::Delta, &payload, &client_cache).unwrap(),
                now,
            );
        }
    }
    assert_eq!(node.fluid(), None);
    assert_eq!(pipe.fluid(), None, "clear did not reach the client");
    assert_eq!(pipe.section(SectionKey::Face(Direction::Up)).target, 0);
}

#[test]
fn unsynced_cache_rejects_the_update_atomically() {
    let mut node = PipeNode::with_update_interval(std_config(), 5, 0);
    node.set_fluid(Some(water()));
    node.prime_section(SectionKey::Center, 50);

    let mut server_cache = FluidCache::new();
    let payload = encode(&mut node, PayloadKind::Full, &mut server_cache);

    // The client never received the cache entry.
    let client_cache = FluidCache::new();
    assert!(decode(PayloadKind::Full, &payload, &client_cache).is_err());

    // The client pipe was never touched, so it still renders as empty.
    let pipe = RenderPipe::new();
    assert_eq!(pipe.fluid(), None);
    assert_eq!(pipe.amounts_for_render(1.0), [0.0; 7]);
}

#[test]
fn rate_limiter_batches_deltas() {
    // Default interval (10 ticks): a continuously changing node produces at
    // most one send per window.
    let mut node = PipeNode::new(std_config(), 5);
    node.set_fluid(Some(water()));
    node.prime_section(SectionKey::Center, 300);
    let mut world = TankWorld::empty().tank(Direction::Down, Tank::unlimited());

    let mut sends = 0;
    for now in 0..50u64 {
        if node.tick(&mut world, now).send {
            sends += 1;
        }
    }
    assert!(sends > 0);
    assert!(sends <= 5, "rate limiter allowed {sends} sends in 50 ticks");
}
