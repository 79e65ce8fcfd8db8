//! Food Spawner: keeps the food population in its band and turns dead
//! snakes into food.

use crate::world::{Player, World};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{palette_color, Food, GameConfig, Point, PALETTE};

pub struct FoodSpawner {
    rng: StdRng,
    ticks_since_trickle: u32,
}

impl FoodSpawner {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            ticks_since_trickle: 0,
        }
    }

    /// Spawns one food at a uniformly random point and inserts it.
    pub fn spawn_random(&mut self, world: &mut World, config: &GameConfig) -> Food {
        let radius = config.food_radius;
        let x = self.rng.gen_range(0.0..=world.width);
        let y = self.rng.gen_range(0.0..=world.height);
        let position = world.clamp_point(Point::new(x, y), 0.0);
        let food = Food {
            id: world.allocate_food_id(),
            x: position.x,
            y: position.y,
            radius,
            color: PALETTE[self.rng.gen_range(0..PALETTE.len())].to_string(),
            value: self
                .rng
                .gen_range(config.food_value_min..=config.food_value_max),
        };
        world.add_food(food.clone());
        food
    }

    /// Fills the world up to `max_food`. Used once at start-up.
    pub fn fill(&mut self, world: &mut World, config: &GameConfig) -> Vec<Food> {
        let mut spawned = Vec::new();
        while world.food_count() < config.max_food {
            spawned.push(self.spawn_random(world, config));
        }
        spawned
    }

    /// Per-tick replenishment.
    ///
    /// Below the floor the world is refilled to the floor at once; between
    /// the floor and `max_food` one food trickles in every
    /// `food_trickle_ticks` ticks. Random food never pushes the count past
    /// `max_food`.
    pub fn replenish(&mut self, world: &mut World, config: &GameConfig) -> Vec<Food> {
        let mut spawned = Vec::new();
        let floor = config.food_floor().min(config.max_food);

        while world.food_count() < floor {
            spawned.push(self.spawn_random(world, config));
        }

        self.ticks_since_trickle += 1;
        if self.ticks_since_trickle >= config.food_trickle_ticks.max(1) {
            self.ticks_since_trickle = 0;
            if world.food_count() < config.max_food {
                spawned.push(self.spawn_random(world, config));
            }
        }

        if !spawned.is_empty() {
            debug!(
                "Spawner: {} food added, {} in world",
                spawned.len(),
                world.food_count()
            );
        }
        spawned
    }

    /// Turns `floor(len * corpse_fraction)` evenly spaced segments of a dead
    /// snake into food of its color, each jittered around its segment.
    pub fn scatter_corpse(&mut self, world: &mut World, config: &GameConfig, player: &Player) -> Vec<Food> {
        let length = player.segments.len();
        let count = corpse_food_count(length, config);
        let mut spawned = Vec::with_capacity(count);
        let jitter = config.corpse_jitter.max(0.0);
        let color = if player.color.is_empty() {
            palette_color(player.id)
        } else {
            player.color.clone()
        };

        for i in 0..count {
            let segment = player.segments[i * length / count];
            let dx = if jitter > 0.0 { self.rng.gen_range(-jitter..=jitter) } else { 0.0 };
            let dy = if jitter > 0.0 { self.rng.gen_range(-jitter..=jitter) } else { 0.0 };
            let position = world.clamp_point(Point::new(segment.x + dx, segment.y + dy), 0.0);
            let food = Food {
                id: world.allocate_food_id(),
                x: position.x,
                y: position.y,
                radius: config.food_radius,
                color: color.clone(),
                value: config.corpse_food_value,
            };
            world.add_food(food.clone());
            spawned.push(food);
        }

        spawned
    }

    /// A random spawn point at least `margin` from every edge.
    pub fn spawn_point(&mut self, world: &World, margin: f32) -> Point {
        let x = self.rng.gen_range(0.0..=world.width);
        let y = self.rng.gen_range(0.0..=world.height);
        world.clamp_point(Point::new(x, y), margin)
    }
}

pub fn corpse_food_count(length: usize, config: &GameConfig) -> usize {
    (length as f32 * config.corpse_fraction).floor() as usize
}
