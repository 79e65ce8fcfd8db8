//! Collision/Consumption Resolver.
//!
//! Runs once per tick after physics. Food first: each player eats at most one
//! food per tick, the first (lowest id) in reach. Then every unordered pair of
//! players is tested head-against-body in both directions; on contact the
//! side that is larger by the size-advantage margin eats the other. A player
//! removed earlier in the pass is simply skipped by every later lookup.

use crate::food::FoodSpawner;
use crate::game::GameEvent;
use crate::world::{Player, World};
use log::info;
use shared::{Food, GameConfig, PlayerId};

pub fn resolve(world: &mut World, spawner: &mut FoodSpawner, config: &GameConfig) -> Vec<GameEvent> {
    let mut events = Vec::new();
    resolve_food(world, config, &mut events);
    resolve_players(world, spawner, config, &mut events);
    events
}

pub fn resolve_food(world: &mut World, config: &GameConfig, events: &mut Vec<GameEvent>) {
    for id in world.player_ids() {
        let Some(player) = world.player(id) else {
            continue;
        };
        let head = player.position();
        let radius = player.radius;
        let hit = world
            .foods()
            .find(|food| head.distance(&food.position()) < radius + food.radius)
            .map(|food| food.id);

        let Some(food) = hit.and_then(|food_id| world.remove_food(food_id)) else {
            continue;
        };
        if let Some(player) = world.player_mut(id) {
            consume_food(player, &food, config);
            events.push(GameEvent::FoodCollected {
                food_id: food.id,
                player_id: id,
            });
        }
    }
}

/// Growth from one food: radius, score and one tail segment.
pub fn consume_food(player: &mut Player, food: &Food, config: &GameConfig) {
    player.radius += food.value as f32 * config.food_growth_factor;
    player.score += u64::from(food.value);
    player.grow(1);
}

pub fn resolve_players(
    world: &mut World,
    spawner: &mut FoodSpawner,
    config: &GameConfig,
    events: &mut Vec<GameEvent>,
) {
    let ids = world.player_ids();
    for (i, &a) in ids.iter().enumerate() {
        for &b in &ids[i + 1..] {
            let outcome = match (world.player(a), world.player(b)) {
                (Some(pa), Some(pb)) => judge(pa, pb, config),
                _ => None,
            };
            if let Some((eater, victim)) = outcome {
                eat_player(world, spawner, config, eater, victim, events);
            }
        }
    }
}

/// Decides a pair: `Some((eater, victim))` when either head touches the
/// other's body and one side clears the size advantage.
pub fn judge(a: &Player, b: &Player, config: &GameConfig) -> Option<(PlayerId, PlayerId)> {
    if !(bites(a, b, config) || bites(b, a, config)) {
        return None;
    }
    if a.radius > b.radius * config.size_advantage {
        Some((a.id, b.id))
    } else if b.radius > a.radius * config.size_advantage {
        Some((b.id, a.id))
    } else {
        None
    }
}

/// True if `biter`'s head is within reach of any of `body`'s segments past
/// the skip offset.
pub fn bites(biter: &Player, body: &Player, config: &GameConfig) -> bool {
    let head = biter.position();
    let reach = biter.radius * config.hit_radius_factor;
    let reach_sq = reach * reach;
    body.segments
        .iter()
        .skip(config.body_skip_segments)
        .any(|segment| head.distance_squared(segment) < reach_sq)
}

fn eat_player(
    world: &mut World,
    spawner: &mut FoodSpawner,
    config: &GameConfig,
    eater_id: PlayerId,
    victim_id: PlayerId,
    events: &mut Vec<GameEvent>,
) {
    if world.player(eater_id).is_none() {
        return;
    }
    let Some(victim) = world.remove_player(victim_id) else {
        return;
    };

    let gained_segments = (victim.segments.len() as f32 * config.victim_segment_gain).floor() as usize;
    let killer_name = match world.player_mut(eater_id) {
        Some(eater) => {
            eater.radius += victim.radius * config.victim_radius_gain;
            eater.score += victim.score;
            eater.grow(gained_segments);
            eater.name.clone()
        }
        None => return,
    };

    info!(
        "Player {} ({}) ate player {} ({}), score {}",
        eater_id, killer_name, victim.id, victim.name, victim.score
    );

    events.push(GameEvent::PlayerDied {
        victim_id: victim.id,
        victim_name: victim.name.clone(),
        killer_id: eater_id,
        killer_name,
        score: victim.score,
        length: victim.segments.len(),
        position: victim.position(),
    });

    let corpse = spawner.scatter_corpse(world, config, &victim);
    events.extend(corpse.into_iter().map(GameEvent::FoodSpawned));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::food::corpse_food_count;
    use assert_approx_eq::assert_approx_eq;
    use shared::Point;

    fn add_player(world: &mut World, x: f32, y: f32, radius: f32, segments: Vec<Point>) -> PlayerId {
        let id = world.allocate_player_id();
        let mut player = Player::new(id, format!("p{}", id), "#fff".to_string(), 0, Point::new(x, y), radius);
        player.segments = segments;
        world.add_player(player);
        id
    }

    fn add_food(world: &mut World, x: f32, y: f32, radius: f32, value: u32) -> u32 {
        let id = world.allocate_food_id();
        world.add_food(Food {
            id,
            x,
            y,
            radius,
            color: "#fff".to_string(),
            value,
        });
        id
    }

    fn trailing(x: f32, y: f32, count: usize) -> Vec<Point> {
        (0..count).map(|i| Point::new(x - 20.0 * i as f32, y)).collect()
    }

    #[test]
    fn test_food_consumption_scenario() {
        let config = GameConfig::default();
        let mut world = World::new(2000.0, 2000.0);
        let id = add_player(&mut world, 1000.0, 1000.0, 15.0, trailing(1000.0, 1000.0, 3));
        let food_id = add_food(&mut world, 1005.0, 1000.0, 5.0, 20);

        let mut events = Vec::new();
        resolve_food(&mut world, &config, &mut events);

        let player = world.player(id).unwrap();
        assert_approx_eq!(player.radius, 17.0);
        assert_eq!(player.score, 20);
        assert_eq!(player.length(), 4);
        // New segment stacks on the old tail, not the head
        assert_eq!(player.segments[3], Point::new(960.0, 1000.0));
        assert!(world.food(food_id).is_none());
        assert_eq!(
            events,
            vec![GameEvent::FoodCollected {
                food_id,
                player_id: id
            }]
        );
    }

    #[test]
    fn test_food_out_of_reach_is_kept() {
        let config = GameConfig::default();
        let mut world = World::new(2000.0, 2000.0);
        let id = add_player(&mut world, 1000.0, 1000.0, 15.0, trailing(1000.0, 1000.0, 3));
        let food_id = add_food(&mut world, 1020.0, 1000.0, 5.0, 20);

        let mut events = Vec::new();
        resolve_food(&mut world, &config, &mut events);

        assert!(events.is_empty());
        assert!(world.food(food_id).is_some());
        assert_eq!(world.player(id).unwrap().score, 0);
    }

    #[test]
    fn test_at_most_one_food_per_tick() {
        let config = GameConfig::default();
        let mut world = World::new(2000.0, 2000.0);
        let id = add_player(&mut world, 1000.0, 1000.0, 15.0, trailing(1000.0, 1000.0, 3));
        let first = add_food(&mut world, 1001.0, 1000.0, 5.0, 5);
        let second = add_food(&mut world, 1000.0, 1001.0, 5.0, 7);

        let mut events = Vec::new();
        resolve_food(&mut world, &config, &mut events);
        assert!(world.food(first).is_none());
        assert!(world.food(second).is_some());
        assert_eq!(world.player(id).unwrap().score, 5);

        resolve_food(&mut world, &config, &mut events);
        assert!(world.food(second).is_none());
        assert_eq!(world.player(id).unwrap().score, 12);
    }

    #[test]
    fn test_contested_food_goes_to_lower_id() {
        let config = GameConfig::default();
        let mut world = World::new(2000.0, 2000.0);
        let a = add_player(&mut world, 1000.0, 1000.0, 15.0, vec![]);
        let b = add_player(&mut world, 1010.0, 1000.0, 15.0, vec![]);
        add_food(&mut world, 1005.0, 1000.0, 5.0, 10);

        let mut events = Vec::new();
        resolve_food(&mut world, &config, &mut events);
        assert_eq!(world.player(a).unwrap().score, 10);
        assert_eq!(world.player(b).unwrap().score, 0);
    }

    #[test]
    fn test_player_consumption_scenario() {
        let config = GameConfig::default();
        let mut world = World::new(2000.0, 2000.0);
        let mut spawner = FoodSpawner::new(Some(1));
        let a = add_player(&mut world, 500.0, 500.0, 30.0, trailing(480.0, 500.0, 3));
        let b_segments = vec![Point::new(545.0, 500.0), Point::new(525.0, 500.0), Point::new(505.0, 500.0)];
        let b = add_player(&mut world, 565.0, 500.0, 20.0, b_segments);
        world.player_mut(b).unwrap().score = 33;
        let food_before = world.food_count();

        let mut events = Vec::new();
        resolve_players(&mut world, &mut spawner, &config, &mut events);

        assert!(world.player(b).is_none());
        let eater = world.player(a).unwrap();
        assert_approx_eq!(eater.radius, 40.0);
        assert_eq!(eater.score, 33);
        assert_eq!(world.food_count(), food_before + corpse_food_count(3, &config));
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::PlayerDied { victim_id, killer_id, score: 33, length: 3, .. }
                if *victim_id == b && *killer_id == a
        )));
        let spawned = events
            .iter()
            .filter(|e| matches!(e, GameEvent::FoodSpawned(_)))
            .count();
        assert_eq!(spawned, corpse_food_count(3, &config));
    }

    #[test]
    fn test_head_on_third_segment_is_eaten() {
        let config = GameConfig::default();
        let mut world = World::new(2000.0, 2000.0);
        let mut spawner = FoodSpawner::new(Some(1));
        let a = add_player(&mut world, 500.0, 500.0, 30.0, trailing(480.0, 500.0, 3));
        // B curls back so its third segment sits under its own head
        let b_segments = vec![Point::new(505.0, 540.0), Point::new(505.0, 520.0), Point::new(505.0, 500.0)];
        let b = add_player(&mut world, 505.0, 500.0, 20.0, b_segments);
        let food_before = world.food_count();

        let mut events = Vec::new();
        resolve_players(&mut world, &mut spawner, &config, &mut events);

        assert!(world.player(b).is_none());
        assert_approx_eq!(world.player(a).unwrap().radius, 40.0);
        assert_eq!(world.food_count(), food_before + 1);
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::PlayerDied { victim_id, killer_id, .. } if *victim_id == b && *killer_id == a
        )));
    }

    #[test]
    fn test_eater_gains_fraction_of_victim_segments() {
        let config = GameConfig::default();
        let mut world = World::new(2000.0, 2000.0);
        let mut spawner = FoodSpawner::new(Some(1));
        let a = add_player(&mut world, 1000.0, 1000.0, 40.0, trailing(980.0, 1000.0, 3));
        let victim_segments: Vec<Point> = (0..10).map(|i| Point::new(1005.0, 1000.0 + i as f32 * 20.0)).collect();
        let b = add_player(&mut world, 1005.0, 980.0, 20.0, victim_segments);

        let mut events = Vec::new();
        resolve_players(&mut world, &mut spawner, &config, &mut events);

        assert!(world.player(b).is_none());
        assert_eq!(world.player(a).unwrap().length(), 3 + 3);
        assert_eq!(world.food_count(), 4);
    }

    #[test]
    fn test_bigger_body_eats_smaller_biter() {
        let config = GameConfig::default();
        let mut world = World::new(2000.0, 2000.0);
        let mut spawner = FoodSpawner::new(Some(1));
        let big = add_player(&mut world, 100.0, 100.0, 30.0, trailing(100.0, 500.0, 5));
        // Small head rams the big one's body
        let small = add_player(&mut world, 60.0, 500.0, 12.0, trailing(300.0, 300.0, 3));

        let mut events = Vec::new();
        resolve_players(&mut world, &mut spawner, &config, &mut events);

        assert!(world.player(small).is_none());
        assert!(world.player(big).is_some());
    }

    #[test]
    fn test_overlap_without_size_advantage_does_nothing() {
        let config = GameConfig::default();
        let mut world = World::new(2000.0, 2000.0);
        let mut spawner = FoodSpawner::new(Some(1));
        // 21 is not more than 20 * 1.1
        let a = add_player(&mut world, 500.0, 500.0, 21.0, trailing(480.0, 500.0, 3));
        let b_segments = vec![Point::new(545.0, 500.0), Point::new(525.0, 500.0), Point::new(505.0, 500.0)];
        let b = add_player(&mut world, 565.0, 500.0, 20.0, b_segments);

        let mut events = Vec::new();
        resolve_players(&mut world, &mut spawner, &config, &mut events);

        assert!(events.is_empty());
        assert!(world.player(a).is_some());
        assert!(world.player(b).is_some());
    }

    #[test]
    fn test_first_segment_is_skipped() {
        let config = GameConfig::default();
        let mut world = World::new(2000.0, 2000.0);
        let mut spawner = FoodSpawner::new(Some(1));
        add_player(&mut world, 500.0, 500.0, 30.0, trailing(480.0, 500.0, 3));
        // Only segment 0 is within reach
        let b_segments = vec![Point::new(505.0, 500.0), Point::new(600.0, 600.0), Point::new(620.0, 600.0)];
        let b = add_player(&mut world, 700.0, 700.0, 10.0, b_segments);

        let mut events = Vec::new();
        resolve_players(&mut world, &mut spawner, &config, &mut events);
        assert!(world.player(b).is_some());
    }

    #[test]
    fn test_hit_factor_is_configurable() {
        let config = GameConfig {
            hit_radius_factor: 0.5,
            ..GameConfig::default()
        };
        let mut world = World::new(2000.0, 2000.0);
        let mut spawner = FoodSpawner::new(Some(1));
        add_player(&mut world, 500.0, 500.0, 30.0, trailing(480.0, 500.0, 3));
        // 20 units away: inside 1.0x reach, outside 0.5x
        let b_segments = vec![Point::new(560.0, 500.0), Point::new(540.0, 500.0), Point::new(520.0, 500.0)];
        let b = add_player(&mut world, 580.0, 500.0, 20.0, b_segments);

        let mut events = Vec::new();
        resolve_players(&mut world, &mut spawner, &config, &mut events);
        assert!(world.player(b).is_some());
    }

    #[test]
    fn test_victim_eliminated_once_per_tick() {
        let config = GameConfig::default();
        let mut world = World::new(2000.0, 2000.0);
        let mut spawner = FoodSpawner::new(Some(1));
        let victim_segments = vec![Point::new(520.0, 500.0), Point::new(510.0, 500.0), Point::new(500.0, 500.0)];
        let victim = add_player(&mut world, 540.0, 500.0, 10.0, victim_segments);
        let a = add_player(&mut world, 500.0, 505.0, 30.0, trailing(500.0, 900.0, 3));
        let c = add_player(&mut world, 500.0, 495.0, 30.0, trailing(900.0, 100.0, 3));

        let mut events = Vec::new();
        resolve_players(&mut world, &mut spawner, &config, &mut events);

        let deaths: Vec<&GameEvent> = events
            .iter()
            .filter(|e| matches!(e, GameEvent::PlayerDied { .. }))
            .collect();
        assert_eq!(deaths.len(), 1);
        assert!(world.player(victim).is_none());
        // Lower id among the eaters wins the pair iteration
        assert!(world.player(a).unwrap().score == 0);
        assert_approx_eq!(world.player(a).unwrap().radius, 35.0);
        assert_approx_eq!(world.player(c).unwrap().radius, 30.0);
    }

    #[test]
    fn test_full_resolve_runs_food_then_players() {
        let config = GameConfig::default();
        let mut world = World::new(2000.0, 2000.0);
        let mut spawner = FoodSpawner::new(Some(1));
        let a = add_player(&mut world, 500.0, 500.0, 30.0, trailing(480.0, 500.0, 3));
        add_food(&mut world, 502.0, 500.0, 5.0, 10);
        let b_segments = vec![Point::new(545.0, 500.0), Point::new(525.0, 500.0), Point::new(505.0, 500.0)];
        add_player(&mut world, 565.0, 500.0, 20.0, b_segments);

        let events = resolve(&mut world, &mut spawner, &config);
        assert!(matches!(events[0], GameEvent::FoodCollected { .. }));
        assert!(matches!(events[1], GameEvent::PlayerDied { .. }));
        // 30 + 10 * 0.1 + 20 * 0.5
        assert_approx_eq!(world.player(a).unwrap().radius, 41.0);
    }
}
