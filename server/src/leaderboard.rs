//! Leaderboard ranking over the live players.

use crate::world::{Player, World};
use shared::LeaderboardEntry;

/// Top `limit` players by score. The sort is stable over the world's id
/// order, so equal scores rank by join order.
pub fn compute(world: &World, limit: usize) -> Vec<LeaderboardEntry> {
    let mut ranked: Vec<&Player> = world.players().collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
        .into_iter()
        .take(limit)
        .map(|player| LeaderboardEntry {
            id: player.id,
            name: player.name.clone(),
            score: player.score,
            length: player.length(),
        })
        .collect()
}
