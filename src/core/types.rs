//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};

/// Simulation frame counter (one tick of the real-time loop)
pub type Frame = u64;

/// Which side of the battle a battler fights on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Ally,
    Enemy,
}

/// Reference to a combatant
///
/// Actors are addressed by database id (1-based), enemies by their index in the troop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BattlerId {
    Actor(i32),
    Enemy(usize),
}

impl BattlerId {
    pub fn side(&self) -> Side {
        match self {
            BattlerId::Actor(_) => Side::Ally,
            BattlerId::Enemy(_) => Side::Enemy,
        }
    }

    pub fn is_ally(&self) -> bool {
        matches!(self, BattlerId::Actor(_))
    }
}

/// How a battle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleResult {
    Victory,
    Escape,
    Defeat,
    /// Ended by a script or a countdown timer
    Abort,
}

/// Screen position in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}
