//! Battle system constants - fixed legacy values in one place
//!
//! Tunables that games override live in `BattleConfig`; these do not change.

// Script-visible storage
pub const MAX_SWITCHES: usize = 5000;
pub const MAX_VARIABLES: usize = 5000;
pub const VARIABLE_MAX: i32 = 9_999_999;
pub const VARIABLE_MIN: i32 = -9_999_999;

// Battler timers (frames)
pub const DEATH_FADE_FRAMES: i32 = 36;
pub const BLINK_FRAMES: i32 = 20;
pub const ACTION_POSE_FRAMES: i32 = 12;
pub const DAMAGE_POSE_FRAMES: i32 = 15;

// Layout (pixels)
pub const SCREEN_WIDTH: i32 = 320;
pub const RUN_AWAY_STEP: i32 = 6;
pub const ROW_OFFSET: i32 = 24;

// UI
pub const WINDOW_MOVE_FRAMES: i32 = 8;

// Critical hit flash: red, green, blue, strength, frames
pub const CRITICAL_FLASH: (i32, i32, i32, i32, i32) = (28, 28, 28, 20, 8);

// Escape roll, percent
pub const ESCAPE_BASE_CHANCE: i32 = 150;
pub const ESCAPE_ATTEMPT_BONUS: i32 = 10;

// Hook bridge
pub const HOOK_ARG_COUNT: usize = 6;

// Damage
pub const CRITICAL_MULTIPLIER: i32 = 3;
pub const DAMAGE_VARIANCE_DIVISOR: i32 = 5;
