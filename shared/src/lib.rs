//! Types shared between the arena server, the bot client and the tests.
//!
//! Everything that crosses the wire lives here: geometry, the food record,
//! the player view sent in snapshots, leaderboard rows, the tunable
//! [`GameConfig`] and the JSON envelope protocol in [`protocol`].

use serde::{Deserialize, Serialize};

pub mod protocol;

pub use protocol::{
    decode_client_message, get_timestamp, BoostRequest, ClientMessage, JoinRequest,
    MoveRequest, PongData, ProtocolError, ServerMessage, Snapshot,
};

pub type PlayerId = u32;
pub type FoodId = u32;

/// Colors handed out to players that do not pick one and to random food.
pub const PALETTE: [&str; 8] = [
    "#ff4757", "#2ed573", "#1e90ff", "#ffa502", "#a55eea", "#00d2d3", "#ff6b81", "#eccc68",
];

/// Longest boost a single request may buy.
pub const MAX_BOOST_DURATION_MS: u64 = 60_000;

/// Deterministic palette pick, so a player's default color is stable.
pub fn palette_color(seed: u32) -> String {
    PALETTE[seed as usize % PALETTE.len()].to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        self.distance_squared(other).sqrt()
    }

    pub fn distance_squared(&self, other: &Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Moves `self` toward `target` by `amount` world units.
    pub fn move_toward(&mut self, target: &Point, amount: f32) {
        let distance = self.distance(target);
        if distance <= f32::EPSILON {
            return;
        }
        self.x += (target.x - self.x) / distance * amount;
        self.y += (target.y - self.y) / distance * amount;
    }

    /// Clamps into `[min_x, max_x] × [min_y, max_y]`. A degenerate interval
    /// (min above max) collapses to its midpoint.
    pub fn clamp(&self, min_x: f32, max_x: f32, min_y: f32, max_y: f32) -> Point {
        Point {
            x: clamp_axis(self.x, min_x, max_x),
            y: clamp_axis(self.y, min_y, max_y),
        }
    }
}

fn clamp_axis(value: f32, min: f32, max: f32) -> f32 {
    if min > max {
        return (min + max) / 2.0;
    }
    value.max(min).min(max)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Food {
    pub id: FoodId,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub color: String,
    pub value: u32,
}

impl Food {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// A player as clients see it in `gameState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    pub head: u32,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub score: u64,
    pub length: usize,
    pub segments: Vec<Point>,
    pub boosting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: PlayerId,
    pub name: String,
    pub score: u64,
    pub length: usize,
}

/// Body of `GET /api/status`. `uptime` is in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub status: String,
    pub players: usize,
    pub foods: usize,
    pub uptime: f64,
}

/// Every tunable of the simulation.
///
/// Deployments disagree on world size, food counts and collision balance, so
/// nothing here is baked into the simulation code. Missing fields in a JSON
/// config file fall back to [`GameConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub world_width: f32,
    pub world_height: f32,

    pub max_food: usize,
    /// Fraction of `max_food` below which the spawner refills immediately.
    pub food_floor_ratio: f32,
    /// Between the floor and `max_food`, one food is added every this many ticks.
    pub food_trickle_ticks: u32,
    pub food_value_min: u32,
    pub food_value_max: u32,
    pub food_radius: f32,

    /// Share of a dead snake's segments that turn into food.
    pub corpse_fraction: f32,
    /// Maximum offset, per axis, of corpse food from its segment.
    pub corpse_jitter: f32,
    pub corpse_food_value: u32,

    pub tick_interval_ms: u64,
    pub base_speed: f32,
    pub boost_speed: f32,
    /// Speeds are expressed per frame of this length.
    pub reference_frame_ms: f32,
    pub min_move_distance: f32,

    pub link_distance: f32,
    /// Fraction of the excess link length closed per tick. 1.0 snaps the chain.
    pub chain_damping: f32,

    pub initial_radius: f32,
    pub min_radius: f32,
    pub initial_segments: usize,
    /// Boosting is refused at or below this length.
    pub min_segments: usize,

    pub food_growth_factor: f32,
    pub victim_radius_gain: f32,
    pub victim_segment_gain: f32,
    /// The eater must be larger than `victim.radius * size_advantage`.
    pub size_advantage: f32,
    /// Head-to-body contact distance as a multiple of the biting head's radius.
    pub hit_radius_factor: f32,
    /// Body segments below this index are never bitten.
    pub body_skip_segments: usize,

    pub boost_duration_ms: u64,
    pub boost_radius_cost: f32,

    pub leaderboard_size: usize,
    pub max_name_len: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            world_width: 2000.0,
            world_height: 2000.0,
            max_food: 100,
            food_floor_ratio: 0.8,
            food_trickle_ticks: 40,
            food_value_min: 5,
            food_value_max: 30,
            food_radius: 5.0,
            corpse_fraction: 0.4,
            corpse_jitter: 10.0,
            corpse_food_value: 10,
            tick_interval_ms: 50,
            base_speed: 2.5,
            boost_speed: 4.0,
            reference_frame_ms: 16.67,
            min_move_distance: 10.0,
            link_distance: 20.0,
            chain_damping: 1.0,
            initial_radius: 15.0,
            min_radius: 10.0,
            initial_segments: 3,
            min_segments: 3,
            food_growth_factor: 0.1,
            victim_radius_gain: 0.5,
            victim_segment_gain: 0.3,
            size_advantage: 1.1,
            hit_radius_factor: 1.0,
            body_skip_segments: 1,
            boost_duration_ms: 200,
            boost_radius_cost: 0.02,
            leaderboard_size: 10,
            max_name_len: 16,
        }
    }
}

impl GameConfig {
    /// Food count the spawner refills to without waiting for the trickle.
    pub fn food_floor(&self) -> usize {
        (self.max_food as f32 * self.food_floor_ratio).round() as usize
    }

    pub fn validate(&self) -> Result<(), String> {
        let knobs = [
            ("world_width", self.world_width),
            ("world_height", self.world_height),
            ("food_floor_ratio", self.food_floor_ratio),
            ("food_radius", self.food_radius),
            ("corpse_fraction", self.corpse_fraction),
            ("corpse_jitter", self.corpse_jitter),
            ("base_speed", self.base_speed),
            ("boost_speed", self.boost_speed),
            ("reference_frame_ms", self.reference_frame_ms),
            ("min_move_distance", self.min_move_distance),
            ("link_distance", self.link_distance),
            ("chain_damping", self.chain_damping),
            ("initial_radius", self.initial_radius),
            ("min_radius", self.min_radius),
            ("food_growth_factor", self.food_growth_factor),
            ("victim_radius_gain", self.victim_radius_gain),
            ("victim_segment_gain", self.victim_segment_gain),
            ("size_advantage", self.size_advantage),
            ("hit_radius_factor", self.hit_radius_factor),
            ("boost_radius_cost", self.boost_radius_cost),
        ];
        for (name, value) in knobs {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{} must be finite and non-negative, got {}", name, value));
            }
        }

        if self.world_width <= 0.0 || self.world_height <= 0.0 {
            return Err(format!(
                "world dimensions must be positive, got {}x{}",
                self.world_width, self.world_height
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err("tick_interval_ms must be non-zero".to_string());
        }
        if self.food_value_min > self.food_value_max {
            return Err(format!(
                "food_value_min ({}) exceeds food_value_max ({})",
                self.food_value_min, self.food_value_max
            ));
        }
        if self.food_floor_ratio > 1.0 {
            return Err("food_floor_ratio must be within [0, 1]".to_string());
        }
        if self.corpse_fraction > 1.0 {
            return Err("corpse_fraction must be within [0, 1]".to_string());
        }
        if self.food_radius <= 0.0 {
            return Err("food_radius must be positive".to_string());
        }
        if self.link_distance <= 0.0 {
            return Err("link_distance must be positive".to_string());
        }
        if self.chain_damping <= 0.0 || self.chain_damping > 1.0 {
            return Err("chain_damping must be within (0, 1]".to_string());
        }
        if self.boost_speed <= self.base_speed {
            return Err("boost_speed must exceed base_speed".to_string());
        }
        if self.min_radius <= 0.0 || self.initial_radius < self.min_radius {
            return Err("initial_radius must be at least min_radius > 0".to_string());
        }
        if self.initial_segments == 0 {
            return Err("initial_segments must be non-zero".to_string());
        }
        if self.reference_frame_ms <= 0.0 {
            return Err("reference_frame_ms must be positive".to_string());
        }
        // Below 1.0 two equal snakes could eat each other.
        if self.size_advantage < 1.0 {
            return Err("size_advantage must be at least 1".to_string());
        }
        if self.hit_radius_factor <= 0.0 {
            return Err("hit_radius_factor must be positive".to_string());
        }
        if self.boost_duration_ms == 0 || self.boost_duration_ms > MAX_BOOST_DURATION_MS {
            return Err(format!(
                "boost_duration_ms must be within 1..={}",
                MAX_BOOST_DURATION_MS
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_approx_eq!(a.distance(&b), 5.0);
        assert_approx_eq!(a.distance_squared(&b), 25.0);
    }

    #[test]
    fn test_point_move_toward() {
        let mut p = Point::new(0.0, 0.0);
        p.move_toward(&Point::new(10.0, 0.0), 4.0);
        assert_approx_eq!(p.x, 4.0);
        assert_approx_eq!(p.y, 0.0);

        // Zero-length direction leaves the point alone
        let mut q = Point::new(5.0, 5.0);
        q.move_toward(&Point::new(5.0, 5.0), 3.0);
        assert_eq!(q, Point::new(5.0, 5.0));
    }

    #[test]
    fn test_point_clamp() {
        let p = Point::new(-5.0, 2500.0).clamp(0.0, 2000.0, 0.0, 2000.0);
        assert_eq!(p, Point::new(0.0, 2000.0));

        let degenerate = Point::new(3.0, 3.0).clamp(60.0, 40.0, 0.0, 10.0);
        assert_approx_eq!(degenerate.x, 50.0);
        assert_approx_eq!(degenerate.y, 3.0);
    }

    #[test]
    fn test_palette_color_is_stable() {
        assert_eq!(palette_color(1), palette_color(1 + PALETTE.len() as u32));
        assert_ne!(palette_color(1), palette_color(2));
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = GameConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.food_floor(), 80);
        assert!(config.boost_speed / config.base_speed > 1.5);
    }

    #[test]
    fn test_config_validation_rejects_bad_values() {
        let mut config = GameConfig::default();
        config.world_width = 0.0;
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.food_value_min = 40;
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.boost_speed = config.base_speed;
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.chain_damping = 0.0;
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.world_width = f32::INFINITY;
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.world_height = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.boost_speed = f32::INFINITY;
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.victim_segment_gain = -0.3;
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.size_advantage = 0.5;
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.link_distance = 0.0;
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.food_radius = -1.0;
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.boost_duration_ms = u64::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_partial_json_uses_defaults() {
        let config: GameConfig =
            serde_json::from_str(r#"{ "world_width": 10000.0, "max_food": 200 }"#).unwrap();
        assert_approx_eq!(config.world_width, 10000.0);
        assert_eq!(config.max_food, 200);
        assert_approx_eq!(config.world_height, 2000.0);
        assert_approx_eq!(config.size_advantage, 1.1);
    }

    #[test]
    fn test_server_status_json_shape() {
        let status = ServerStatus {
            status: "online".to_string(),
            players: 2,
            foods: 80,
            uptime: 1.5,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "online");
        assert_eq!(json["players"], 2);
        assert_eq!(json["foods"], 80);
        assert_eq!(json["uptime"], 1.5);
    }

    #[test]
    fn test_player_view_serializes_camel_case() {
        let view = PlayerView {
            id: 7,
            name: "Ann".to_string(),
            color: "#fff".to_string(),
            head: 2,
            x: 1.0,
            y: 2.0,
            radius: 15.0,
            score: 3,
            length: 1,
            segments: vec![Point::new(1.0, 2.0)],
            boosting: true,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["boosting"], true);
        assert_eq!(json["segments"][0]["x"], 1.0);
    }
}
