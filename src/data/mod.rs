//! Static battle database
//!
//! Read-only definitions loaded once per battle: battlers, skills, items, states,
//! animations, battle commands, and system sounds.

use serde::{Deserialize, Serialize};

/// State id that marks a battler as dead
pub const DEATH_STATE: i32 = 1;

fn default_volume() -> i32 {
    100
}

fn default_hit_rate() -> i32 {
    100
}

/// A playable sound effect descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SoundEffect {
    pub name: String,
    #[serde(default = "default_volume")]
    pub volume: i32,
    #[serde(default = "default_volume")]
    pub tempo: i32,
}

impl SoundEffect {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            volume: 100,
            tempo: 100,
        }
    }
}

/// System sounds the battle scene plays on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemSound {
    Decision,
    Cancel,
    Buzzer,
    Escape,
    EnemyKill,
    AllyDamage,
    EnemyDamage,
    Evasion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemSounds {
    pub decision: SoundEffect,
    pub cancel: SoundEffect,
    pub buzzer: SoundEffect,
    pub escape: SoundEffect,
    pub enemy_kill: SoundEffect,
    pub ally_damage: SoundEffect,
    pub enemy_damage: SoundEffect,
    pub evasion: SoundEffect,
}

impl Default for SystemSounds {
    fn default() -> Self {
        Self {
            decision: SoundEffect::new("Decision"),
            cancel: SoundEffect::new("Cancel"),
            buzzer: SoundEffect::new("Buzzer"),
            escape: SoundEffect::new("Escape"),
            enemy_kill: SoundEffect::new("EnemyKill"),
            ally_damage: SoundEffect::new("AllyDamage"),
            enemy_damage: SoundEffect::new("EnemyDamage"),
            evasion: SoundEffect::new("Evasion"),
        }
    }
}

impl SystemSounds {
    pub fn get(&self, sound: SystemSound) -> &SoundEffect {
        match sound {
            SystemSound::Decision => &self.decision,
            SystemSound::Cancel => &self.cancel,
            SystemSound::Buzzer => &self.buzzer,
            SystemSound::Escape => &self.escape,
            SystemSound::EnemyKill => &self.enemy_kill,
            SystemSound::AllyDamage => &self.ally_damage,
            SystemSound::EnemyDamage => &self.enemy_damage,
            SystemSound::Evasion => &self.evasion,
        }
    }
}

/// Behavior forced on a battler by its states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Restriction {
    #[default]
    Normal,
    DoNothing,
    AttackEnemy,
    AttackAlly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDef {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub restriction: Restriction,
    /// HP applied at the start of each action round; negative is damage
    #[serde(default)]
    pub hp_change: i32,
    /// Turns until the state wears off; 0 = permanent
    #[serde(default)]
    pub auto_release_turns: i32,
    /// Bounces reflectable skills back at their user
    #[serde(default)]
    pub reflect: bool,
    #[serde(default)]
    pub priority: i32,
}

/// Who an effect can hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    SingleEnemy,
    AllEnemies,
    SingleAlly,
    AllAllies,
    User,
}

impl Scope {
    pub fn targets_allies(&self) -> bool {
        matches!(self, Scope::SingleAlly | Scope::AllAllies | Scope::User)
    }

    pub fn is_single(&self) -> bool {
        matches!(self, Scope::SingleEnemy | Scope::SingleAlly)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillDef {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub sp_cost: i32,
    #[serde(default)]
    pub power: i32,
    #[serde(default)]
    pub scope: Scope,
    /// Restores HP instead of dealing damage
    #[serde(default)]
    pub heals: bool,
    #[serde(default)]
    pub animation_id: i32,
    #[serde(default = "default_hit_rate")]
    pub hit_rate: i32,
    #[serde(default)]
    pub add_states: Vec<i32>,
    #[serde(default)]
    pub remove_states: Vec<i32>,
    #[serde(default)]
    pub reflectable: bool,
    /// Switch turned on after the skill resolves
    #[serde(default)]
    pub switch_on: Option<i32>,
    /// Skill subset used by subskill battle commands; 0 = any
    #[serde(default)]
    pub subset: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDef {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub hp_recovery: i32,
    #[serde(default = "ItemDef::default_scope")]
    pub scope: Scope,
    #[serde(default)]
    pub animation_id: i32,
}

impl ItemDef {
    fn default_scope() -> Scope {
        Scope::SingleAlly
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationDef {
    pub id: i32,
    #[serde(default)]
    pub name: String,
    pub frames: i32,
    #[serde(default)]
    pub se: Option<SoundEffect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleCommandKind {
    Attack,
    Defense,
    Escape,
    Item,
    Skill,
    Special,
    Subskill,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleCommandDef {
    pub id: i32,
    pub name: String,
    pub kind: BattleCommandKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemyActionKind {
    Attack,
    Defend,
    Skill(i32),
    Nothing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyAction {
    pub kind: EnemyActionKind,
    /// Relative weight when the AI picks an action
    pub rating: i32,
}

/// Row an actor stands in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Row {
    #[default]
    Front,
    Back,
}

/// Combat stats shared by actors and enemies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    pub max_hp: i32,
    pub max_sp: i32,
    pub attack: i32,
    pub defense: i32,
    pub spirit: i32,
    pub agility: i32,
    pub hit_rate: i32,
    pub crit_rate: i32,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            max_hp: 100,
            max_sp: 20,
            attack: 20,
            defense: 10,
            spirit: 10,
            agility: 20,
            hit_rate: 100,
            crit_rate: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorDef {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default)]
    pub skills: Vec<i32>,
    /// Battle command ids in menu order
    #[serde(default)]
    pub commands: Vec<i32>,
    #[serde(default)]
    pub row: Row,
    #[serde(default = "ActorDef::default_controllable")]
    pub controllable: bool,
    #[serde(default)]
    pub preemptive: bool,
}

impl ActorDef {
    fn default_controllable() -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyDef {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default)]
    pub exp: i32,
    #[serde(default)]
    pub gold: i32,
    #[serde(default)]
    pub drop_item: Option<i32>,
    #[serde(default)]
    pub actions: Vec<EnemyAction>,
    #[serde(default)]
    pub preemptive: bool,
}

/// Everything read-only a battle needs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Database {
    pub actors: Vec<ActorDef>,
    pub enemies: Vec<EnemyDef>,
    pub skills: Vec<SkillDef>,
    pub items: Vec<ItemDef>,
    pub states: Vec<StateDef>,
    pub animations: Vec<AnimationDef>,
    pub commands: Vec<BattleCommandDef>,
    pub system_sounds: SystemSounds,
}

impl Database {
    pub fn actor(&self, id: i32) -> Option<&ActorDef> {
        self.actors.iter().find(|a| a.id == id)
    }

    pub fn enemy(&self, id: i32) -> Option<&EnemyDef> {
        self.enemies.iter().find(|e| e.id == id)
    }

    pub fn skill(&self, id: i32) -> Option<&SkillDef> {
        self.skills.iter().find(|s| s.id == id)
    }

    pub fn item(&self, id: i32) -> Option<&ItemDef> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn state(&self, id: i32) -> Option<&StateDef> {
        self.states.iter().find(|s| s.id == id)
    }

    pub fn animation(&self, id: i32) -> Option<&AnimationDef> {
        self.animations.iter().find(|a| a.id == id)
    }

    pub fn command(&self, id: i32) -> Option<&BattleCommandDef> {
        self.commands.iter().find(|c| c.id == id)
    }

    pub fn system_se(&self, sound: SystemSound) -> &SoundEffect {
        self.system_sounds.get(sound)
    }
}
