//! Authoritative game state and the per-tick simulation pipeline.
//!
//! [`GameState::step`] is the only code that advances simulation time. It
//! runs, in this order: boost expiry and snake physics for every player,
//! collision/consumption, food replenishment, leaderboard recomputation.
//! Broadcasting the outcome is left to the caller.

use crate::collision;
use crate::food::FoodSpawner;
use crate::leaderboard;
use crate::snake;
use crate::world::{Player, World};
use log::debug;
use shared::{
    Food, FoodId, GameConfig, LeaderboardEntry, PlayerId, Point, ServerMessage, Snapshot,
};

/// Something that happened during a tick that clients are told about.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    FoodSpawned(Food),
    FoodCollected {
        food_id: FoodId,
        player_id: PlayerId,
    },
    PlayerDied {
        victim_id: PlayerId,
        victim_name: String,
        killer_id: PlayerId,
        killer_name: String,
        score: u64,
        length: usize,
        position: Point,
    },
}

impl GameEvent {
    pub fn to_message(&self) -> ServerMessage {
        match self {
            GameEvent::FoodSpawned(food) => ServerMessage::FoodSpawned(food.clone()),
            GameEvent::FoodCollected { food_id, player_id } => ServerMessage::FoodCollected {
                id: *food_id,
                player_id: *player_id,
            },
            GameEvent::PlayerDied {
                victim_id,
                victim_name,
                killer_id,
                killer_name,
                score,
                length,
                position,
            } => ServerMessage::PlayerDied {
                id: *victim_id,
                name: victim_name.clone(),
                killer_id: *killer_id,
                killer_name: killer_name.clone(),
                score: *score,
                length: *length,
                x: position.x,
                y: position.y,
            },
        }
    }
}

#[derive(Debug, Default)]
pub struct TickOutcome {
    pub events: Vec<GameEvent>,
    pub leaderboard_changed: bool,
}

pub struct GameState {
    pub tick: u64,
    /// Simulation clock, advanced by each tick's `dt`.
    pub clock_ms: u64,
    pub world: World,
    config: GameConfig,
    spawner: FoodSpawner,
    leaderboard: Vec<LeaderboardEntry>,
}

impl GameState {
    /// An empty world. Call [`GameState::populate`] to stock it with food.
    pub fn new(config: GameConfig, seed: Option<u64>) -> Self {
        Self {
            tick: 0,
            clock_ms: 0,
            world: World::new(config.world_width, config.world_height),
            spawner: FoodSpawner::new(seed),
            leaderboard: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn populate(&mut self) -> Vec<Food> {
        self.spawner.fill(&mut self.world, &self.config)
    }

    /// A random spawn point kept clear of the walls.
    pub fn random_spawn_point(&mut self) -> Point {
        let margin = (self.config.initial_radius * 4.0)
            .min(self.world.width / 2.0)
            .min(self.world.height / 2.0);
        self.spawner.spawn_point(&self.world, margin)
    }

    /// Sets a player's steering target and, if given, its boost flag.
    /// Returns false if the player is not in the world.
    pub fn set_intent(&mut self, id: PlayerId, target: Option<Point>, boost: Option<bool>) -> bool {
        let (width, height) = (self.world.width, self.world.height);
        let Some(player) = self.world.player_mut(id) else {
            return false;
        };
        player.target = snake::sanitize_target(target, width, height);
        if let Some(active) = boost {
            snake::set_boost(player, active, self.clock_ms, &self.config);
        }
        true
    }

    pub fn set_boost(&mut self, id: PlayerId, active: bool) -> bool {
        let Some(player) = self.world.player_mut(id) else {
            return false;
        };
        snake::set_boost(player, active, self.clock_ms, &self.config);
        true
    }

    /// Removes a player and scatters its body as food. A second call for
    /// the same id finds nothing and returns `None`.
    pub fn remove_player(&mut self, id: PlayerId) -> Option<(Player, Vec<Food>)> {
        let player = self.world.remove_player(id)?;
        let corpse = self.spawner.scatter_corpse(&mut self.world, &self.config, &player);
        Some((player, corpse))
    }

    /// Runs one tick of `dt_ms` milliseconds.
    pub fn step(&mut self, dt_ms: f32) -> TickOutcome {
        self.tick += 1;
        self.clock_ms += dt_ms.max(0.0).round() as u64;

        let (width, height) = (self.world.width, self.world.height);
        for player in self.world.players_mut() {
            snake::update_boost(player, self.clock_ms, &self.config);
            snake::advance(player, width, height, &self.config, dt_ms);
        }

        let mut events = collision::resolve(&mut self.world, &mut self.spawner, &self.config);

        let spawned = self.spawner.replenish(&mut self.world, &self.config);
        events.extend(spawned.into_iter().map(GameEvent::FoodSpawned));

        let board = leaderboard::compute(&self.world, self.config.leaderboard_size);
        let leaderboard_changed = board != self.leaderboard;
        self.leaderboard = board;

        if self.tick % 100 == 0 {
            debug!(
                "Tick {}: {} players, {} food, {} events",
                self.tick,
                self.world.player_count(),
                self.world.food_count(),
                events.len()
            );
        }

        TickOutcome {
            events,
            leaderboard_changed,
        }
    }

    /// Leaderboard as of the last tick.
    pub fn leaderboard(&self) -> &[LeaderboardEntry] {
        &self.leaderboard
    }

    /// Leaderboard computed from the world right now.
    pub fn current_leaderboard(&self) -> Vec<LeaderboardEntry> {
        leaderboard::compute(&self.world, self.config.leaderboard_size)
    }

    pub fn snapshot(&self, self_id: Option<PlayerId>) -> Snapshot {
        Snapshot {
            tick: self.tick,
            world_width: self.world.width,
            world_height: self.world.height,
            players: self.world.players().map(Player::view).collect(),
            foods: self.world.foods().cloned().collect(),
            player_count: self.world.player_count(),
            self_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn add_player(game: &mut GameState, x: f32, y: f32, radius: f32, length: usize) -> PlayerId {
        let id = game.world.allocate_player_id();
        let mut player = Player::new(id, format!("p{}", id), "#fff".to_string(), 0, Point::new(x, y), radius);
        player.segments = vec![Point::new(x, y); length];
        game.world.add_player(player);
        id
    }

    #[test]
    fn test_game_state_creation() {
        let game = GameState::new(GameConfig::default(), Some(1));
        assert_eq!(game.tick, 0);
        assert_eq!(game.world.player_count(), 0);
        assert_eq!(game.world.food_count(), 0);
    }

    #[test]
    fn test_populate_fills_food() {
        let mut game = GameState::new(GameConfig::default(), Some(1));
        let spawned = game.populate();
        assert_eq!(spawned.len(), game.config().max_food);
    }

    #[test]
    fn test_step_moves_toward_target() {
        let mut game = GameState::new(GameConfig::default(), Some(1));
        let id = add_player(&mut game, 1000.0, 1000.0, 15.0, 3);
        assert!(game.set_intent(id, Some(Point::new(1500.0, 1000.0)), Some(false)));

        game.step(50.0);
        let player = game.world.player(id).unwrap();
        assert!(player.x > 1000.0);
        assert_approx_eq!(player.y, 1000.0);
        assert_eq!(game.tick, 1);
        assert_eq!(game.clock_ms, 50);
    }

    #[test]
    fn test_set_intent_for_missing_player() {
        let mut game = GameState::new(GameConfig::default(), Some(1));
        assert!(!game.set_intent(42, Some(Point::new(1.0, 1.0)), None));
        assert!(!game.set_boost(42, true));
    }

    #[test]
    fn test_set_intent_clamps_target() {
        let mut game = GameState::new(GameConfig::default(), Some(1));
        let id = add_player(&mut game, 1000.0, 1000.0, 15.0, 3);
        game.set_intent(id, Some(Point::new(-1.0e9, 5.0e9)), None);
        assert_eq!(game.world.player(id).unwrap().target, Some(Point::new(0.0, 2000.0)));
    }

    #[test]
    fn test_step_keeps_food_above_floor() {
        let mut game = GameState::new(GameConfig::default(), Some(1));
        for _ in 0..3 {
            game.step(50.0);
            assert!(game.world.food_count() >= game.config().food_floor());
        }
    }

    #[test]
    fn test_step_reports_spawned_food() {
        let mut game = GameState::new(GameConfig::default(), Some(1));
        let outcome = game.step(50.0);
        let spawned = outcome
            .events
            .iter()
            .filter(|e| matches!(e, GameEvent::FoodSpawned(_)))
            .count();
        assert_eq!(spawned, game.world.food_count());
    }

    #[test]
    fn test_physics_runs_before_collision() {
        let config = GameConfig {
            max_food: 0,
            ..GameConfig::default()
        };
        let mut game = GameState::new(config, Some(1));
        let id = add_player(&mut game, 1000.0, 1000.0, 15.0, 3);
        // Food just out of reach now, inside reach after one step
        let food_id = game.world.allocate_food_id();
        game.world.add_food(Food {
            id: food_id,
            x: 1025.0,
            y: 1000.0,
            radius: 5.0,
            color: "#fff".to_string(),
            value: 10,
        });
        game.set_intent(id, Some(Point::new(1500.0, 1000.0)), None);

        let outcome = game.step(50.0);
        assert!(game.world.food(food_id).is_none());
        assert!(outcome.events.contains(&GameEvent::FoodCollected {
            food_id,
            player_id: id
        }));
    }

    #[test]
    fn test_boost_expires_inside_tick() {
        let mut game = GameState::new(GameConfig::default(), Some(1));
        let id = add_player(&mut game, 1000.0, 1000.0, 15.0, 6);
        assert!(game.set_boost(id, true));
        assert!(game.world.player(id).unwrap().boosting);

        for _ in 0..5 {
            game.step(50.0);
        }
        assert!(!game.world.player(id).unwrap().boosting);
    }

    #[test]
    fn test_remove_player_is_idempotent() {
        let mut game = GameState::new(GameConfig::default(), Some(1));
        let id = add_player(&mut game, 1000.0, 1000.0, 15.0, 10);

        let (player, corpse) = game.remove_player(id).unwrap();
        assert_eq!(player.id, id);
        assert_eq!(corpse.len(), 4);
        assert!(game.remove_player(id).is_none());
        assert_eq!(game.world.food_count(), 4);
    }

    #[test]
    fn test_leaderboard_change_detection() {
        let config = GameConfig {
            max_food: 0,
            ..GameConfig::default()
        };
        let mut game = GameState::new(config, Some(1));
        assert!(!game.step(50.0).leaderboard_changed);

        let id = add_player(&mut game, 1000.0, 1000.0, 15.0, 3);
        assert!(game.step(50.0).leaderboard_changed);
        assert!(!game.step(50.0).leaderboard_changed);
        assert_eq!(game.leaderboard()[0].id, id);

        game.world.player_mut(id).unwrap().score = 99;
        assert_eq!(game.current_leaderboard()[0].score, 99);
        assert!(game.step(50.0).leaderboard_changed);
    }

    #[test]
    fn test_snapshot_contents() {
        let mut game = GameState::new(GameConfig::default(), Some(1));
        game.populate();
        let id = add_player(&mut game, 1000.0, 1000.0, 15.0, 3);

        let snapshot = game.snapshot(Some(id));
        assert_eq!(snapshot.players.len(), 1);
        assert_eq!(snapshot.player_count, 1);
        assert_eq!(snapshot.foods.len(), game.config().max_food);
        assert_eq!(snapshot.self_id, Some(id));
        assert_eq!(snapshot.world_width, 2000.0);
    }

    #[test]
    fn test_event_to_message() {
        let event = GameEvent::PlayerDied {
            victim_id: 2,
            victim_name: "b".to_string(),
            killer_id: 1,
            killer_name: "a".to_string(),
            score: 12,
            length: 7,
            position: Point::new(3.0, 4.0),
        };
        match event.to_message() {
            ServerMessage::PlayerDied {
                id,
                killer_name,
                length,
                x,
                ..
            } => {
                assert_eq!(id, 2);
                assert_eq!(killer_name, "a");
                assert_eq!(length, 7);
                assert_eq!(x, 3.0);
            }
            other => panic!("Unexpected message {:?}", other),
        }
    }
}
