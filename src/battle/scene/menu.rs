//! Menu cursors and the lists they browse

use crate::battle::battler::Roster;
use crate::battle::constants::WINDOW_MOVE_FRAMES;
use crate::battle::scene::SceneState;
use crate::core::types::BattlerId;
use crate::data::{BattleCommandKind, Database};

/// Entries of the option window: fight, auto battle, escape
pub const OPTION_COUNT: usize = 3;

/// What a target window is choosing a target for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Attack,
    Skill(i32),
    Item(i32),
}

/// One entry of an actor's command window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandEntry {
    Command { id: i32, kind: BattleCommandKind },
    /// Switches the actor between front and back row
    Row,
}

#[derive(Debug, Clone, Default)]
pub struct Menus {
    /// Frames left on the window slide; input waits until it is done
    pub window_move: i32,
    pub option_index: usize,
    pub actor_index: usize,
    pub command_index: usize,
    pub item_index: usize,
    pub skill_index: usize,
    pub target_index: usize,
    /// Subset filter of the skill window; 0 shows every skill
    pub skill_subset: i32,
    pub selection: Option<Selection>,
    /// Ticks once per frame; drives cursor blinking
    pub cursor_cycle: u32,
}

impl Menus {
    pub fn move_windows(&mut self) {
        self.window_move = WINDOW_MOVE_FRAMES;
    }

    pub fn update_windows(&mut self) {
        if self.window_move > 0 {
            self.window_move -= 1;
        }
    }

    fn cursor_mut(&mut self, state: SceneState) -> Option<&mut usize> {
        match state {
            SceneState::SelectOption => Some(&mut self.option_index),
            SceneState::SelectActor => Some(&mut self.actor_index),
            SceneState::SelectCommand => Some(&mut self.command_index),
            SceneState::SelectItem => Some(&mut self.item_index),
            SceneState::SelectSkill => Some(&mut self.skill_index),
            SceneState::SelectEnemyTarget | SceneState::SelectAllyTarget => Some(&mut self.target_index),
            _ => None,
        }
    }

    /// Move the active window's cursor, wrapping around `len` entries
    pub fn move_cursor(&mut self, state: SceneState, len: usize, down: bool) {
        if len == 0 {
            return;
        }
        if let Some(cursor) = self.cursor_mut(state) {
            *cursor = if down {
                (*cursor + 1) % len
            } else {
                (*cursor + len - 1) % len
            };
        }
    }
}

/// Commands an actor can pick, with the row entry for long command lists
pub fn actor_commands(roster: &Roster, db: &Database, actor_id: i32) -> Vec<CommandEntry> {
    let Some(actor) = roster.actor(actor_id) else {
        return Vec::new();
    };
    let mut entries: Vec<CommandEntry> = actor
        .commands
        .iter()
        .filter_map(|id| match db.command(*id) {
            Some(cmd) => Some(CommandEntry::Command { id: cmd.id, kind: cmd.kind }),
            None => {
                tracing::warn!("CommandWindow: Invalid battle command ID {}", id);
                None
            }
        })
        .collect();
    entries.push(CommandEntry::Row);
    entries
}

/// Items the party holds, by id
pub fn item_list(roster: &Roster) -> Vec<i32> {
    let mut items: Vec<i32> = roster
        .items
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(id, _)| *id)
        .collect();
    items.sort_unstable();
    items
}

/// Skills the actor knows within a subset
pub fn skill_list(roster: &Roster, db: &Database, actor_id: i32, subset: i32) -> Vec<i32> {
    let Some(actor) = roster.actor(actor_id) else {
        return Vec::new();
    };
    actor
        .skills
        .iter()
        .copied()
        .filter(|id| subset == 0 || db.skill(*id).is_some_and(|s| s.subset == subset))
        .collect()
}

/// Living enemies a target window offers
pub fn enemy_targets(roster: &Roster) -> Vec<BattlerId> {
    roster
        .enemies
        .iter()
        .filter(|e| e.exists())
        .map(|e| e.id)
        .collect()
}

/// Party members a target window offers; the dead stay selectable for revival
pub fn ally_targets(roster: &Roster) -> Vec<BattlerId> {
    roster
        .party_members()
        .filter(|a| !a.hidden)
        .map(|a| a.id)
        .collect()
}
