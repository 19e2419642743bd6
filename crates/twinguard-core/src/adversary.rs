//! Guest AP spawning and removal.
//!
//! Each batch places guests around randomly chosen trusted APs. Every guest
//! gets fresh keys, its own detector at the common prior, and a ground truth
//! drawn from the current evil probability. The detector never sees that
//! ground truth.

use std::f64::consts::TAU;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use twinguard_identity::ApId;

use crate::events::{GuestDespawn, GuestSpawn};
use crate::registry::AccessPoint;
use crate::world::WorldState;

/// Spawn one batch of guests. Returns what was created.
pub fn spawn_batch(world: &mut WorldState, now_ms: u64) -> Vec<GuestSpawn> {
    let targets = world.registry.trusted_ids();
    if targets.is_empty() {
        debug!("no trusted APs to impersonate");
        return Vec::new();
    }

    world.guest_batches += 1;
    let batch = world.guest_batches;
    let adversary = world.config.adversary.clone();
    let mut spawned = Vec::with_capacity(adversary.guests_per_spawn);

    for index in 0..adversary.guests_per_spawn {
        if !world.rng.gen_bool(adversary.spawn_probability) {
            continue;
        }
        let Some(target) = targets.choose(&mut world.rng).cloned() else {
            break;
        };
        let Some(origin) = world.registry.get(&target).map(AccessPoint::position) else {
            continue;
        };

        let angle = world.rng.gen::<f64>() * TAU;
        let distance = adversary.offset_distance + world.rng.gen::<f64>() * adversary.offset_jitter;
        let position = origin.offset(angle, distance);
        let malicious = world.rng.gen_bool(world.evil_probability);

        let id = ApId::guest(&target, batch, index);
        if world.registry.contains(&id) {
            continue;
        }

        let replay = world.new_replay_window();
        world.add_ap(
            AccessPoint::guest(id.clone(), position, target.clone(), malicious, replay, now_ms),
            now_ms,
        );
        world.counters.guest_aps_spawned += 1;
        if malicious {
            world.counters.evil_guest_aps_spawned += 1;
        }
        info!(
            ap = %id,
            mimicking = %target,
            malicious,
            x = position.x,
            y = position.y,
            "guest AP spawned"
        );

        spawned.push(GuestSpawn {
            id,
            position,
            mimicking: target,
            is_evil: malicious,
            spawned_at_ms: now_ms,
        });
    }
    spawned
}

/// Remove a guest. `None` if it is already gone.
pub fn despawn(world: &mut WorldState, id: &ApId) -> Option<GuestDespawn> {
    let ap = world.despawn_guest(id)?;
    let was_evil = !ap.is_legitimate();
    info!(ap = %id, was_evil, "guest AP despawned");
    Some(GuestDespawn {
        id: id.clone(),
        was_evil,
    })
}
