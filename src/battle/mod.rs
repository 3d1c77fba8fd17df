//! Battle system - ATB scene, battle scripting, and combat resolution
//!
//! The scene drives everything frame by frame. Troop pages and common events run
//! on the battle interpreter, which shares the game state with the scene.
//!
//! Key pieces:
//! - `scene`: outer phase machine and the per-action sub-machine
//! - `interpreter`: battle opcodes, troop page scheduling, script hooks
//! - `algorithm`: what a queued action does to its targets
//! - `battler` / `state`: the mutable state scripts and actions touch

pub mod ai;
pub mod algorithm;
pub mod battler;
pub mod constants;
pub mod formation;
pub mod hooks;
pub mod interpreter;
pub mod scene;
pub mod state;
pub mod triggers;

// Re-exports for convenient access
pub use ai::{AutoBattleAi, BattleAi, EnemyAi};
pub use algorithm::{Algorithm, AlgorithmKind, Outcome};
pub use battler::{Battler, Combo, Pose, Roster};
pub use constants::*;
pub use hooks::{HookBinding, HookKind, HookTable};
pub use interpreter::{BattleDialect, BattleInterpreter};
pub use scene::{
    BattleActionState, BattleScene, BattleSetup, EventTrigger, FloatText, FrameIo, FrameStep,
    SceneEvent, SceneEventType, SceneLog, SceneState,
};
pub use state::{
    BattleCondition, BattleStatus, CountdownTimer, GameState, MessageBox, Notice, Switches,
    Variables,
};
pub use triggers::are_conditions_met;
