//! Game state visible to scripts
//!
//! Switches, variables, the roster and the transient battle status. Scripts
//! only mutate this through interpreter handlers; the scene owns everything else.

use ahash::AHashMap;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::battle::battler::Roster;
use crate::battle::constants::{MAX_SWITCHES, MAX_VARIABLES, VARIABLE_MAX, VARIABLE_MIN};
use crate::core::config::BattleConfig;
use crate::core::types::BattlerId;
use crate::data::Database;

// === SWITCHES AND VARIABLES ===

/// 1-based boolean store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Switches {
    data: Vec<bool>,
}

impl Switches {
    pub fn new(count: usize) -> Self {
        Self {
            data: vec![false; count],
        }
    }

    fn slot(&self, id: i32) -> Option<usize> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        (index < self.data.len()).then_some(index)
    }

    pub fn get(&self, id: i32) -> bool {
        self.slot(id).map(|i| self.data[i]).unwrap_or(false)
    }

    pub fn set(&mut self, id: i32, value: bool) {
        match self.slot(id) {
            Some(i) => self.data[i] = value,
            None => tracing::warn!("Invalid write sw[{}] = {}", id, value),
        }
    }

    pub fn flip(&mut self, id: i32) {
        let value = !self.get(id);
        self.set(id, value);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Default for Switches {
    fn default() -> Self {
        Self::new(MAX_SWITCHES)
    }
}

/// 1-based integer store, values clamped to the legacy range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variables {
    data: Vec<i32>,
}

impl Variables {
    pub fn new(count: usize) -> Self {
        Self {
            data: vec![0; count],
        }
    }

    fn slot(&self, id: i32) -> Option<usize> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        (index < self.data.len()).then_some(index)
    }

    pub fn get(&self, id: i32) -> i32 {
        self.slot(id).map(|i| self.data[i]).unwrap_or(0)
    }

    pub fn set(&mut self, id: i32, value: i32) {
        match self.slot(id) {
            Some(i) => self.data[i] = value.clamp(VARIABLE_MIN, VARIABLE_MAX),
            None => tracing::warn!("Invalid write var[{}] = {}", id, value),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Default for Variables {
    fn default() -> Self {
        Self::new(MAX_VARIABLES)
    }
}

// === MESSAGE BOX ===

/// Queue of message pages; the front page is on screen until dismissed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageBox {
    pages: Vec<String>,
}

impl MessageBox {
    pub fn show(&mut self, text: impl Into<String>) {
        self.pages.push(text.into());
    }

    pub fn is_active(&self) -> bool {
        !self.pages.is_empty()
    }

    pub fn current(&self) -> Option<&str> {
        self.pages.first().map(String::as_str)
    }

    /// Close the page on screen
    pub fn advance(&mut self) {
        if !self.pages.is_empty() {
            self.pages.remove(0);
        }
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }
}

// === BATTLE STATUS ===

/// Formation the battle starts in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleCondition {
    #[default]
    None,
    Initiative,
    Back,
    Surround,
    Pincers,
}

/// Something a script did that the scene should display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    HpChanged { target: BattlerId, change: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenFlash {
    pub red: i32,
    pub green: i32,
    pub blue: i32,
    pub strength: i32,
    pub frames: i32,
}

/// Battle animation currently playing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveAnimation {
    pub animation_id: i32,
    pub targets: Vec<BattlerId>,
    pub frames_left: i32,
}

/// Transient presentation state of the battle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BattleStatus {
    pub condition: BattleCondition,
    pub background: String,
    pub animation: Option<ActiveAnimation>,
    pub flash: Option<ScreenFlash>,
    pub pictures: AHashMap<i32, String>,
    pub notices: Vec<Notice>,
}

impl BattleStatus {
    pub fn show_picture(&mut self, id: i32, name: &str) {
        self.pictures.insert(id, name.to_string());
    }

    pub fn show_battle_animation(&mut self, animation_id: i32, targets: Vec<BattlerId>, frames: i32) {
        self.animation = Some(ActiveAnimation {
            animation_id,
            targets,
            frames_left: frames.max(1),
        });
    }

    pub fn is_animation_waiting(&self) -> bool {
        self.animation.is_some()
    }

    pub fn flash_once(&mut self, red: i32, green: i32, blue: i32, strength: i32, frames: i32) {
        self.flash = Some(ScreenFlash {
            red,
            green,
            blue,
            strength,
            frames,
        });
    }

    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Advance screen effects by one frame
    pub fn update(&mut self) {
        if let Some(anim) = self.animation.as_mut() {
            anim.frames_left -= 1;
            if anim.frames_left <= 0 {
                self.animation = None;
            }
        }
        if let Some(flash) = self.flash.as_mut() {
            flash.frames -= 1;
            if flash.frames <= 0 {
                self.flash = None;
            }
        }
    }
}

// === TIMERS ===

/// Countdown timer a map script started before the battle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountdownTimer {
    pub frames: i32,
    pub running: bool,
    /// Reaching zero aborts the battle
    pub battle_abort: bool,
}

impl CountdownTimer {
    pub fn start(frames: i32, battle_abort: bool) -> Self {
        Self {
            frames,
            running: true,
            battle_abort,
        }
    }

    /// Tick once; returns true when this tick expired an aborting timer
    pub fn update(&mut self) -> bool {
        if !self.running {
            return false;
        }
        if self.frames > 0 {
            self.frames -= 1;
        }
        if self.frames == 0 {
            self.running = false;
            return self.battle_abort;
        }
        false
    }
}

// === AGGREGATE ===

/// Everything a script can read or change
#[derive(Debug, Clone)]
pub struct GameState {
    pub switches: Switches,
    pub variables: Variables,
    pub roster: Roster,
    pub status: BattleStatus,
    pub message: MessageBox,
    pub timers: [CountdownTimer; 2],
    pub database: Database,
    pub rng: ChaCha8Rng,
}

impl GameState {
    pub fn new(database: Database, roster: Roster, config: &BattleConfig) -> Self {
        Self {
            switches: Switches::default(),
            variables: Variables::default(),
            roster,
            status: BattleStatus::default(),
            message: MessageBox::default(),
            timers: [CountdownTimer::default(); 2],
            database,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
        }
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(Database::default(), Roster::default(), &BattleConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switches_out_of_range() {
        let mut switches = Switches::new(3);
        switches.set(3, true);
        switches.set(4, true);
        switches.set(0, true);
        assert!(switches.get(3));
        assert!(!switches.get(4));
        assert!(!switches.get(0));
        switches.flip(3);
        assert!(!switches.get(3));
    }

    #[test]
    fn test_variables_clamped() {
        let mut vars = Variables::new(2);
        vars.set(1, i32::MAX);
        assert_eq!(vars.get(1), VARIABLE_MAX);
        vars.set(-1, 5);
        assert_eq!(vars.get(-1), 0);
    }

    #[test]
    fn test_message_pages() {
        let mut msg = MessageBox::default();
        msg.show("a");
        msg.show("b");
        assert_eq!(msg.current(), Some("a"));
        msg.advance();
        assert_eq!(msg.current(), Some("b"));
        msg.advance();
        assert!(!msg.is_active());
    }

    #[test]
    fn test_aborting_timer_expires_once() {
        let mut timer = CountdownTimer::start(2, true);
        assert!(!timer.update());
        assert!(timer.update());
        assert!(!timer.update());
    }
}
