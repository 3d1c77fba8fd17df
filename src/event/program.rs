//! Event programs, troop pages and the program store

use std::rc::Rc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::battle::state::Switches;
use crate::core::types::Point;
use crate::event::command::Instruction;

/// When a common event starts on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    AutoStart,
    Parallel,
    #[default]
    CallOnly,
}

/// Switch that must hold a given state for the program to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardSwitch {
    pub switch_id: i32,
    #[serde(default = "GuardSwitch::default_expected")]
    pub expected: bool,
}

impl GuardSwitch {
    fn default_expected() -> bool {
        true
    }
}

/// A common event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventProgram {
    pub id: i32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub trigger: Trigger,
    #[serde(default)]
    pub guard_switch: Option<GuardSwitch>,
    pub instructions: Rc<[Instruction]>,
}

impl EventProgram {
    pub fn new(id: i32, trigger: Trigger, instructions: Vec<Instruction>) -> Self {
        Self {
            id,
            name: String::new(),
            trigger,
            guard_switch: None,
            instructions: instructions.into(),
        }
    }

    pub fn with_guard(mut self, switch_id: i32, expected: bool) -> Self {
        self.guard_switch = Some(GuardSwitch {
            switch_id,
            expected,
        });
        self
    }

    /// True when there is no guard or the guard switch holds its expected state
    pub fn guard_allows(&self, switches: &Switches) -> bool {
        match self.guard_switch {
            Some(guard) => switches.get(guard.switch_id) == guard.expected,
            None => true,
        }
    }
}

/// The ten trigger categories a troop page can react to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    SwitchA,
    SwitchB,
    Variable,
    Turn,
    TurnEnemy,
    TurnActor,
    Fatigue,
    EnemyHp,
    ActorHp,
    CommandActor,
}

impl ConditionKind {
    pub const ALL: [ConditionKind; 10] = [
        ConditionKind::SwitchA,
        ConditionKind::SwitchB,
        ConditionKind::Variable,
        ConditionKind::Turn,
        ConditionKind::TurnEnemy,
        ConditionKind::TurnActor,
        ConditionKind::Fatigue,
        ConditionKind::EnemyHp,
        ConditionKind::ActorHp,
        ConditionKind::CommandActor,
    ];

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// Bitset over `ConditionKind`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<ConditionKind>", into = "Vec<ConditionKind>")]
pub struct ConditionFlags(u16);

impl ConditionFlags {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        ConditionKind::ALL.iter().copied().collect()
    }

    pub fn from_bits(bits: u16) -> Self {
        Self(bits & Self::all().0)
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn with(mut self, kind: ConditionKind) -> Self {
        self.insert(kind);
        self
    }

    pub fn insert(&mut self, kind: ConditionKind) {
        self.0 |= kind.bit();
    }

    pub fn contains(&self, kind: ConditionKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn intersects(&self, other: ConditionFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = ConditionKind> + '_ {
        ConditionKind::ALL.iter().copied().filter(|k| self.contains(*k))
    }
}

impl FromIterator<ConditionKind> for ConditionFlags {
    fn from_iter<I: IntoIterator<Item = ConditionKind>>(iter: I) -> Self {
        let mut flags = Self::empty();
        for kind in iter {
            flags.insert(kind);
        }
        flags
    }
}

impl From<Vec<ConditionKind>> for ConditionFlags {
    fn from(kinds: Vec<ConditionKind>) -> Self {
        kinds.into_iter().collect()
    }
}

impl From<ConditionFlags> for Vec<ConditionKind> {
    fn from(flags: ConditionFlags) -> Self {
        flags.iter().collect()
    }
}

/// Declarative trigger of a troop page
///
/// Only the fields whose kind is present in `flags` are consulted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageCondition {
    pub flags: ConditionFlags,
    pub switch_a_id: i32,
    pub switch_b_id: i32,
    pub variable_id: i32,
    pub variable_value: i32,
    pub turn_a: i32,
    pub turn_b: i32,
    pub turn_enemy_id: i32,
    pub turn_enemy_a: i32,
    pub turn_enemy_b: i32,
    pub turn_actor_id: i32,
    pub turn_actor_a: i32,
    pub turn_actor_b: i32,
    pub fatigue_min: i32,
    pub fatigue_max: i32,
    pub enemy_id: i32,
    pub enemy_hp_min: i32,
    pub enemy_hp_max: i32,
    pub actor_id: i32,
    pub actor_hp_min: i32,
    pub actor_hp_max: i32,
    pub command_actor_id: i32,
    pub command_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TroopPage {
    #[serde(default)]
    pub condition: PageCondition,
    pub instructions: Rc<[Instruction]>,
}

impl TroopPage {
    pub fn new(condition: PageCondition, instructions: Vec<Instruction>) -> Self {
        Self {
            condition,
            instructions: instructions.into(),
        }
    }
}

/// An enemy slot of the encounter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TroopMember {
    pub enemy_id: i32,
    #[serde(default)]
    pub position: Point,
    #[serde(default)]
    pub hidden: bool,
}

/// The encounter: its enemies and its scripted pages
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Troop {
    pub id: i32,
    pub name: String,
    pub members: Vec<TroopMember>,
    pub pages: Vec<TroopPage>,
}

/// Which program a frame is executing
///
/// Negative values are common events, positive values are 1-based troop pages,
/// and 0 marks frames built on the fly (hook argument setup).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerTag(pub i32);

impl OwnerTag {
    pub const SYNTHETIC: OwnerTag = OwnerTag(0);

    pub fn for_common_event(id: i32) -> Self {
        Self(-id)
    }

    pub fn for_troop_page(page: usize) -> Self {
        Self(page as i32)
    }

    pub fn common_event_id(&self) -> Option<i32> {
        (self.0 < 0).then(|| -self.0)
    }

    pub fn troop_page(&self) -> Option<usize> {
        (self.0 > 0).then_some(self.0 as usize)
    }
}

/// Read-only table of every program a battle can run
#[derive(Debug, Clone, Default)]
pub struct ProgramStore {
    common_events: AHashMap<i32, EventProgram>,
    troop: Troop,
}

impl ProgramStore {
    pub fn new(common_events: Vec<EventProgram>, troop: Troop) -> Self {
        Self {
            common_events: common_events.into_iter().map(|ce| (ce.id, ce)).collect(),
            troop,
        }
    }

    pub fn common_event(&self, id: i32) -> Option<&EventProgram> {
        self.common_events.get(&id)
    }

    /// Common events sorted by id
    pub fn common_events(&self) -> Vec<&EventProgram> {
        let mut events: Vec<_> = self.common_events.values().collect();
        events.sort_by_key(|ce| ce.id);
        events
    }

    pub fn troop(&self) -> &Troop {
        &self.troop
    }

    /// Troop page by 1-based number
    pub fn page(&self, number: usize) -> Option<&TroopPage> {
        number.checked_sub(1).and_then(|i| self.troop.pages.get(i))
    }

    pub fn page_count(&self) -> usize {
        self.troop.pages.len()
    }

    /// Instructions a frame with this owner executes
    pub fn resolve(&self, owner: OwnerTag) -> Option<Rc<[Instruction]>> {
        if let Some(id) = owner.common_event_id() {
            return self.common_event(id).map(|ce| Rc::clone(&ce.instructions));
        }
        owner
            .troop_page()
            .and_then(|n| self.page(n))
            .map(|page| Rc::clone(&page.instructions))
    }
}
