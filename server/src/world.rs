//! The World Store: the single owner of every player and food record.
//!
//! Collections are ordered maps keyed by id, so iteration order is the
//! allocation (join) order. That keeps collision resolution and leaderboard
//! tie-breaks deterministic, which the tests rely on.

use log::debug;
use shared::{Food, FoodId, PlayerId, PlayerView, Point};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    pub head: u32,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub score: u64,
    pub segments: Vec<Point>,
    pub boosting: bool,
    /// Simulation-clock time at which the current boost lapses.
    pub boost_until_ms: u64,
    /// Where the player is steering. `None` means "hold still".
    pub target: Option<Point>,
}

impl Player {
    pub fn new(id: PlayerId, name: String, color: String, head: u32, spawn: Point, radius: f32) -> Self {
        Self {
            id,
            name,
            color,
            head,
            x: spawn.x,
            y: spawn.y,
            radius,
            score: 0,
            segments: Vec::new(),
            boosting: false,
            boost_until_ms: 0,
            target: None,
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn length(&self) -> usize {
        self.segments.len()
    }

    pub fn tail(&self) -> Point {
        self.segments.last().copied().unwrap_or_else(|| self.position())
    }

    /// Appends `count` segments stacked on the current tail.
    pub fn grow(&mut self, count: usize) {
        let tail = self.tail();
        self.segments.extend(std::iter::repeat(tail).take(count));
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            name: self.name.clone(),
            color: self.color.clone(),
            head: self.head,
            x: self.x,
            y: self.y,
            radius: self.radius,
            score: self.score,
            length: self.segments.len(),
            segments: self.segments.clone(),
            boosting: self.boosting,
        }
    }
}

#[derive(Debug, Clone)]
pub struct World {
    pub width: f32,
    pub height: f32,
    players: BTreeMap<PlayerId, Player>,
    foods: BTreeMap<FoodId, Food>,
    next_player_id: PlayerId,
    next_food_id: FoodId,
}

impl World {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            players: BTreeMap::new(),
            foods: BTreeMap::new(),
            next_player_id: 1,
            next_food_id: 1,
        }
    }

    /// Ids are never reused, even after the player is gone.
    pub fn allocate_player_id(&mut self) -> PlayerId {
        let id = self.next_player_id;
        self.next_player_id += 1;
        id
    }

    pub fn allocate_food_id(&mut self) -> FoodId {
        let id = self.next_food_id;
        self.next_food_id += 1;
        id
    }

    /// Returns false, leaving the store untouched, if the id is taken.
    pub fn add_player(&mut self, player: Player) -> bool {
        if self.players.contains_key(&player.id) {
            return false;
        }
        debug!("World: player {} added", player.id);
        self.players.insert(player.id, player);
        true
    }

    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        self.players.remove(&id)
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.values_mut()
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.keys().copied().collect()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn add_food(&mut self, food: Food) -> bool {
        if self.foods.contains_key(&food.id) {
            return false;
        }
        self.foods.insert(food.id, food);
        true
    }

    pub fn remove_food(&mut self, id: FoodId) -> Option<Food> {
        self.foods.remove(&id)
    }

    pub fn food(&self, id: FoodId) -> Option<&Food> {
        self.foods.get(&id)
    }

    pub fn foods(&self) -> impl Iterator<Item = &Food> {
        self.foods.values()
    }

    pub fn food_count(&self) -> usize {
        self.foods.len()
    }

    /// Hard clamp into the arena, keeping `margin` away from every edge.
    pub fn clamp_point(&self, point: Point, margin: f32) -> Point {
        point.clamp(margin, self.width - margin, margin, self.height - margin)
    }

    pub fn contains(&self, point: &Point) -> bool {
        (0.0..=self.width).contains(&point.x) && (0.0..=self.height).contains(&point.y)
    }
}
