//! Snake physics: head steering, chain relaxation and the boost timer.
//!
//! Everything here works on a single [`Player`] and the arena bounds, so the
//! tick can run it over each player without touching the rest of the world.

use crate::world::Player;
use shared::{GameConfig, Point};

/// Drops non-finite targets and clamps the rest into the arena.
pub fn sanitize_target(target: Option<Point>, width: f32, height: f32) -> Option<Point> {
    target
        .filter(Point::is_finite)
        .map(|point| point.clamp(0.0, width, 0.0, height))
}

/// Applies a client boost request.
///
/// Starting a boost costs one tail segment and is refused for snakes at or
/// below `min_segments`. Repeating the request while boosting only pushes the
/// expiry further out.
pub fn set_boost(player: &mut Player, active: bool, now_ms: u64, config: &GameConfig) {
    if !active {
        player.boosting = false;
        player.boost_until_ms = 0;
        return;
    }

    if !player.boosting {
        if player.segments.len() <= config.min_segments {
            return;
        }
        player.segments.pop();
    }

    player.boosting = true;
    player.boost_until_ms = now_ms.saturating_add(config.boost_duration_ms);
}

/// Clears a lapsed boost and charges the per-tick radius cost of an active one.
pub fn update_boost(player: &mut Player, now_ms: u64, config: &GameConfig) {
    if player.boosting && now_ms >= player.boost_until_ms {
        player.boosting = false;
    }
    if player.boosting {
        player.radius = (player.radius - config.boost_radius_cost).max(config.min_radius);
    }
}

/// Advances one player by `dt_ms`. Returns true if the head moved.
pub fn advance(player: &mut Player, width: f32, height: f32, config: &GameConfig, dt_ms: f32) -> bool {
    let head = player.position();
    let mut next = head;

    if let Some(target) = player.target {
        let distance = head.distance(&target);
        if distance >= config.min_move_distance {
            let speed = if player.boosting {
                config.boost_speed
            } else {
                config.base_speed
            };
            let step = (speed * dt_ms / config.reference_frame_ms).min(distance);
            next.move_toward(&target, step);
        }
    }

    let r = player.radius;
    let next = next.clamp(r, width - r, r, height - r);
    player.x = next.x;
    player.y = next.y;

    relax_chain(player, config, width, height);
    next != head
}

/// Pulls every segment back within `link_distance` of the one ahead of it,
/// tail first, then re-clamps the body into the arena.
pub fn relax_chain(player: &mut Player, config: &GameConfig, width: f32, height: f32) {
    let head = player.position();
    let link = config.link_distance;
    let damping = config.chain_damping;
    let segments = &mut player.segments;

    for i in (1..segments.len()).rev() {
        let target = segments[i - 1];
        pull(&mut segments[i], &target, link, damping);
    }
    if let Some(first) = segments.first_mut() {
        pull(first, &head, link, damping);
    }

    for segment in segments.iter_mut() {
        *segment = segment.clamp(0.0, width, 0.0, height);
    }
}

fn pull(current: &mut Point, target: &Point, link: f32, damping: f32) {
    let distance = current.distance(target);
    if distance > link {
        current.move_toward(target, (distance - link) * damping);
    }
}
