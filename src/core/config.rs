//! Battle configuration with documented constants
//!
//! Every tunable of the battle scene and the event interpreter lives here.
//! Values default to the legacy engine's behavior.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{BattleError, Result};

/// Which legacy command dialect scripts are written against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    Rpg2k,
    #[default]
    Rpg2k3,
}

/// Window layout of the battle UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleType {
    Traditional,
    #[default]
    Alternative,
    Gauge,
}

/// Whether gauges keep filling while the player browses menus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtbMode {
    #[default]
    Active,
    Wait,
}

/// How battlers are placed on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    #[default]
    Automatic,
    Manual,
}

/// Vocabulary shown by the battle scene
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Terms {
    pub battle_start: String,
    pub special_combat: String,
    pub escape_failure: String,
    pub miss: String,
    pub victory: String,
    pub defeat: String,
    pub exp_received: String,
    pub gold_received: String,
    pub item_received: String,
}

impl Default for Terms {
    fn default() -> Self {
        Self {
            battle_start: "Monsters appeared!".into(),
            special_combat: "Special combat!".into(),
            escape_failure: "Escape failed".into(),
            miss: "Miss".into(),
            victory: "Victory!".into(),
            defeat: "The party was defeated...".into(),
            exp_received: "EXP received".into(),
            gold_received: "Gold found:".into(),
            item_received: "obtained".into(),
        }
    }
}

/// Configuration for the battle scene and event interpreter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    // === SCRIPTING ===
    /// Command dialect; 2k3-only commands and page conditions are ignored under `Rpg2k`
    pub dialect: Dialect,

    /// Enables the battle hook bridge (`ControlBattleHooks` and hook triggers)
    pub maniac_patch: bool,

    /// Instructions one interpreter may execute in a single update before yielding
    ///
    /// Protects the frame loop from scripts that spin without waiting.
    pub interpreter_loop_limit: u32,

    // === LAYOUT ===
    pub battle_type: BattleType,
    pub atb_mode: AtbMode,
    pub placement: Placement,

    /// Mirror battle animations for flipped battlers
    pub invert_animations: bool,

    // === RULES ===
    /// Whether this encounter can be escaped at all
    pub escape_allowed: bool,

    /// Allows the debug menu key to interrupt the frame
    pub debug_menu_enabled: bool,

    /// Value at which a battler's gauge is full
    pub max_atb_gauge: i32,

    /// Frames an average-agility battler needs to fill its gauge from empty
    pub atb_fill_frames: i32,

    // === TIMING ===
    /// Frames per second; converts script waits given in tenths of a second
    pub frames_per_second: i32,

    /// Lifetime of a floating damage number
    pub float_text_frames: i32,

    /// Seed for every random roll in the battle
    pub rng_seed: u64,

    pub terms: Terms,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Rpg2k3,
            maniac_patch: false,
            interpreter_loop_limit: 10_000,

            battle_type: BattleType::Alternative,
            atb_mode: AtbMode::Active,
            placement: Placement::Automatic,
            invert_animations: false,

            escape_allowed: true,
            debug_menu_enabled: false,
            max_atb_gauge: 300_000,
            atb_fill_frames: 120,

            frames_per_second: 60,
            float_text_frames: 30,
            rng_seed: 0,

            terms: Terms::default(),
        }
    }
}

impl BattleConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_rpg2k3(&self) -> bool {
        self.dialect == Dialect::Rpg2k3
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate().map_err(BattleError::InvalidConfig)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_atb_gauge <= 0 {
            return Err(format!("max_atb_gauge ({}) must be positive", self.max_atb_gauge));
        }

        if self.atb_fill_frames <= 0 || self.atb_fill_frames > self.max_atb_gauge {
            return Err(format!(
                "atb_fill_frames ({}) must be in 1..={}",
                self.atb_fill_frames, self.max_atb_gauge
            ));
        }

        if self.frames_per_second <= 0 {
            return Err("frames_per_second must be positive".into());
        }

        if self.float_text_frames <= 0 {
            return Err("float_text_frames must be positive".into());
        }

        if self.interpreter_loop_limit == 0 {
            return Err("interpreter_loop_limit must be at least 1".into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(BattleConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = BattleConfig::from_toml_str(
            r#"
            dialect = "rpg2k"
            maniac_patch = true

            [terms]
            miss = "Dodged"
            "#,
        )
        .unwrap();

        assert_eq!(config.dialect, Dialect::Rpg2k);
        assert!(config.maniac_patch);
        assert_eq!(config.terms.miss, "Dodged");
        assert_eq!(config.terms.victory, Terms::default().victory);
        assert_eq!(config.max_atb_gauge, 300_000);
    }

    #[test]
    fn test_invalid_gauge_rejected() {
        let result = BattleConfig::from_toml_str("max_atb_gauge = 0");
        assert!(matches!(result, Err(BattleError::InvalidConfig(_))));
    }
}
