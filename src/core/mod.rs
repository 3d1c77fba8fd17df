pub mod config;
pub mod error;
pub mod types;

pub use config::{AtbMode, BattleConfig, BattleType, Dialect, Placement, Terms};
pub use error::{BattleError, Result};
pub use types::{BattleResult, BattlerId, Frame, Point, Side};
