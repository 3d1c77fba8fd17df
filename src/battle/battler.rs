//! Combatants and the roster that owns them

use ahash::AHashMap;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::battle::constants::{BLINK_FRAMES, DEATH_FADE_FRAMES};
use crate::core::types::{BattlerId, Point, Side};
use crate::data::{ActorDef, Database, EnemyDef, Restriction, Row, Stats, DEATH_STATE};
use crate::event::{Troop, TroopMember};

/// What a battler's sprite is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Pose {
    #[default]
    Idle,
    AttackLeft,
    AttackRight,
    Skill,
    Item,
    Defend,
    Damage,
    Dead,
    Victory,
    WalkLeft,
    WalkRight,
}

impl Pose {
    /// Swap left/right variants for a flipped battler
    pub fn adjusted_for_direction(self, flipped: bool) -> Self {
        if !flipped {
            return self;
        }
        match self {
            Pose::AttackRight => Pose::AttackLeft,
            Pose::AttackLeft => Pose::AttackRight,
            Pose::WalkRight => Pose::WalkLeft,
            Pose::WalkLeft => Pose::WalkRight,
            other => other,
        }
    }
}

/// A state currently applied to a battler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveState {
    pub id: i32,
    /// Turns the state has been active
    pub turns: i32,
}

/// A battle command repeated several times per action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combo {
    pub command_id: i32,
    pub times: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Battler {
    pub id: BattlerId,
    pub db_id: i32,
    pub name: String,
    pub stats: Stats,
    pub hp: i32,
    pub sp: i32,
    pub states: Vec<ActiveState>,
    pub hidden: bool,
    pub position: Point,
    pub flip: bool,
    pub gauge: i32,
    pub battle_turn: i32,
    pub last_battle_action: i32,
    pub combo: Option<Combo>,
    pub row: Row,
    pub controllable: bool,
    pub preemptive: bool,
    pub defending: bool,
    /// An action for this battler is waiting in the queue
    pub action_queued: bool,
    pub skills: Vec<i32>,
    pub commands: Vec<i32>,
    pub death_timer: i32,
    pub blink_timer: i32,
    pub pose: Pose,
    pub pose_frames: i32,
}

impl Battler {
    pub fn from_actor(def: &ActorDef) -> Self {
        Self {
            id: BattlerId::Actor(def.id),
            db_id: def.id,
            name: def.name.clone(),
            stats: def.stats,
            hp: def.stats.max_hp,
            sp: def.stats.max_sp,
            states: Vec::new(),
            hidden: false,
            position: Point::default(),
            flip: false,
            gauge: 0,
            battle_turn: 0,
            last_battle_action: -1,
            combo: None,
            row: def.row,
            controllable: def.controllable,
            preemptive: def.preemptive,
            defending: false,
            action_queued: false,
            skills: def.skills.clone(),
            commands: def.commands.clone(),
            death_timer: 0,
            blink_timer: 0,
            pose: Pose::Idle,
            pose_frames: 0,
        }
    }

    pub fn from_enemy(index: usize, def: &EnemyDef, member: &TroopMember) -> Self {
        Self {
            id: BattlerId::Enemy(index),
            db_id: def.id,
            name: def.name.clone(),
            stats: def.stats,
            hp: def.stats.max_hp,
            sp: def.stats.max_sp,
            states: Vec::new(),
            hidden: member.hidden,
            position: member.position,
            flip: false,
            gauge: 0,
            battle_turn: 0,
            last_battle_action: -1,
            combo: None,
            row: Row::Front,
            controllable: false,
            preemptive: def.preemptive,
            defending: false,
            action_queued: false,
            skills: Vec::new(),
            commands: Vec::new(),
            death_timer: 0,
            blink_timer: 0,
            pose: Pose::Idle,
            pose_frames: 0,
        }
    }

    pub fn side(&self) -> Side {
        self.id.side()
    }

    pub fn is_ally(&self) -> bool {
        self.id.is_ally()
    }

    pub fn has_state(&self, state_id: i32) -> bool {
        self.states.iter().any(|s| s.id == state_id)
    }

    pub fn is_dead(&self) -> bool {
        self.has_state(DEATH_STATE)
    }

    /// Visible and alive
    pub fn exists(&self) -> bool {
        !self.hidden && !self.is_dead()
    }

    /// Most severe restriction among active states
    pub fn restriction(&self, db: &Database) -> Restriction {
        self.states
            .iter()
            .filter_map(|s| db.state(s.id))
            .filter(|def| def.restriction != Restriction::Normal)
            .max_by_key(|def| def.priority)
            .map(|def| def.restriction)
            .unwrap_or(Restriction::Normal)
    }

    pub fn can_act(&self, db: &Database) -> bool {
        self.exists() && self.restriction(db) != Restriction::DoNothing
    }

    /// Alive, and any do-nothing state will wear off by itself
    pub fn can_act_or_recoverable(&self, db: &Database) -> bool {
        if self.is_dead() {
            return false;
        }
        self.states.iter().all(|s| {
            db.state(s.id)
                .map(|def| def.restriction != Restriction::DoNothing || def.auto_release_turns > 0)
                .unwrap_or(true)
        })
    }

    pub fn hp_percent(&self) -> i32 {
        if self.stats.max_hp <= 0 {
            return 0;
        }
        100 * self.hp / self.stats.max_hp
    }

    /// Apply an HP delta and return the change actually made
    ///
    /// Non-lethal damage never drops below 1 HP. Reaching 0 HP adds the death state.
    pub fn change_hp(&mut self, delta: i32, lethal: bool) -> i32 {
        if self.is_dead() {
            return 0;
        }
        let floor = if lethal || delta >= 0 { 0 } else { 1.min(self.hp) };
        let new_hp = (self.hp.saturating_add(delta)).clamp(floor, self.stats.max_hp);
        let change = new_hp - self.hp;
        self.hp = new_hp;
        if self.hp == 0 {
            self.kill();
        }
        change
    }

    pub fn set_sp(&mut self, sp: i32) {
        self.sp = sp.clamp(0, self.stats.max_sp);
    }

    fn kill(&mut self) {
        self.hp = 0;
        self.states.clear();
        self.states.push(ActiveState {
            id: DEATH_STATE,
            turns: 0,
        });
        self.gauge = 0;
        self.defending = false;
    }

    /// Returns whether the state was newly added
    pub fn add_state(&mut self, state_id: i32, db: &Database) -> bool {
        if self.is_dead() || self.has_state(state_id) {
            return false;
        }
        if state_id == DEATH_STATE {
            self.kill();
            return true;
        }
        if db.state(state_id).is_none() {
            tracing::warn!("AddState: Invalid state ID {}", state_id);
            return false;
        }
        self.states.push(ActiveState {
            id: state_id,
            turns: 0,
        });
        true
    }

    /// Returns whether the state was present
    pub fn remove_state(&mut self, state_id: i32) -> bool {
        let before = self.states.len();
        self.states.retain(|s| s.id != state_id);
        let removed = self.states.len() != before;
        if removed && state_id == DEATH_STATE {
            self.hp = self.hp.max(1);
            self.death_timer = 0;
        }
        removed
    }

    /// Count a turn on every state and release the ones that expired
    pub fn battle_state_heal(&mut self, db: &Database) -> Vec<i32> {
        let mut released = Vec::new();
        for state in &mut self.states {
            state.turns += 1;
        }
        self.states.retain(|s| {
            let expired = db
                .state(s.id)
                .map(|def| def.auto_release_turns > 0 && s.turns >= def.auto_release_turns)
                .unwrap_or(false);
            if expired {
                released.push(s.id);
            }
            !expired
        });
        released
    }

    /// Per-turn HP change from states; returns the change made
    pub fn apply_conditions(&mut self, db: &Database) -> i32 {
        let delta: i32 = self
            .states
            .iter()
            .filter_map(|s| db.state(s.id))
            .map(|def| def.hp_change)
            .sum();
        if delta == 0 {
            return 0;
        }
        self.change_hp(delta, false)
    }

    pub fn is_gauge_full(&self, max: i32) -> bool {
        self.gauge >= max
    }

    pub fn next_battle_turn(&mut self) {
        self.battle_turn += 1;
        self.defending = false;
    }

    pub fn set_battle_combo(&mut self, command_id: i32, times: i32) {
        self.combo = Some(Combo { command_id, times });
    }

    pub fn set_death_timer(&mut self) {
        self.death_timer = DEATH_FADE_FRAMES;
    }

    pub fn set_blink_timer(&mut self) {
        self.blink_timer = BLINK_FRAMES;
    }

    pub fn set_pose(&mut self, pose: Pose, frames: i32) {
        self.pose = pose;
        self.pose_frames = frames.max(0);
    }

    pub fn is_idle(&self) -> bool {
        self.pose_frames == 0
    }

    /// Advance sprite timers by one frame
    pub fn update_timers(&mut self) {
        if self.death_timer > 0 {
            self.death_timer -= 1;
        }
        if self.blink_timer > 0 {
            self.blink_timer -= 1;
        }
        if self.pose_frames > 0 {
            self.pose_frames -= 1;
            if self.pose_frames == 0 {
                self.pose = if self.is_dead() { Pose::Dead } else { Pose::Idle };
            }
        }
    }
}

/// Everyone taking part in the battle plus party-wide resources
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    /// Every actor of the database, in or out of the party
    pub actors: Vec<Battler>,
    /// Party order by actor id
    pub party: Vec<i32>,
    pub enemies: Vec<Battler>,
    pub items: AHashMap<i32, i32>,
    pub gold: i32,
    pub exp: AHashMap<i32, i32>,
    /// Party-wide discrete turn counter
    pub turns: i32,
}

impl Roster {
    pub fn new(db: &Database, party: &[i32], troop: &Troop) -> Self {
        let actors = db.actors.iter().map(Battler::from_actor).collect();
        let party = party
            .iter()
            .copied()
            .filter(|id| {
                let known = db.actor(*id).is_some();
                if !known {
                    tracing::warn!("Party: Invalid actor ID {}", id);
                }
                known
            })
            .collect();

        let mut enemies = Vec::new();
        for member in &troop.members {
            match db.enemy(member.enemy_id) {
                Some(def) => enemies.push(Battler::from_enemy(enemies.len(), def, member)),
                None => tracing::warn!("Troop: Invalid enemy ID {}", member.enemy_id),
            }
        }

        Self {
            actors,
            party,
            enemies,
            ..Default::default()
        }
    }

    pub fn actor(&self, id: i32) -> Option<&Battler> {
        self.actors.iter().find(|a| a.db_id == id)
    }

    pub fn actor_mut(&mut self, id: i32) -> Option<&mut Battler> {
        self.actors.iter_mut().find(|a| a.db_id == id)
    }

    /// Enemy by 0-based troop index; negative indices are invalid
    pub fn enemy(&self, index: i32) -> Option<&Battler> {
        usize::try_from(index).ok().and_then(|i| self.enemies.get(i))
    }

    pub fn enemy_mut(&mut self, index: i32) -> Option<&mut Battler> {
        usize::try_from(index).ok().and_then(move |i| self.enemies.get_mut(i))
    }

    pub fn battler(&self, id: BattlerId) -> Option<&Battler> {
        match id {
            BattlerId::Actor(a) => self.actor(a),
            BattlerId::Enemy(e) => self.enemies.get(e),
        }
    }

    pub fn battler_mut(&mut self, id: BattlerId) -> Option<&mut Battler> {
        match id {
            BattlerId::Actor(a) => self.actor_mut(a),
            BattlerId::Enemy(e) => self.enemies.get_mut(e),
        }
    }

    pub fn is_actor_in_party(&self, id: i32) -> bool {
        self.party.contains(&id)
    }

    pub fn is_in_party(&self, id: BattlerId) -> bool {
        match id {
            BattlerId::Actor(a) => self.is_actor_in_party(a),
            BattlerId::Enemy(_) => false,
        }
    }

    pub fn party_index(&self, id: i32) -> Option<usize> {
        self.party.iter().position(|p| *p == id)
    }

    pub fn party_ids(&self) -> Vec<BattlerId> {
        self.party.iter().map(|id| BattlerId::Actor(*id)).collect()
    }

    pub fn enemy_ids(&self) -> Vec<BattlerId> {
        (0..self.enemies.len()).map(BattlerId::Enemy).collect()
    }

    /// Party members in party order
    pub fn party_members(&self) -> impl Iterator<Item = &Battler> + '_ {
        self.party.iter().filter_map(move |id| self.actor(*id))
    }

    /// Ids of every battler that exists, party first
    pub fn active_ids(&self) -> Vec<BattlerId> {
        self.party_members()
            .chain(self.enemies.iter())
            .filter(|b| b.exists())
            .map(|b| b.id)
            .collect()
    }

    pub fn side_ids(&self, side: Side) -> Vec<BattlerId> {
        match side {
            Side::Ally => self.party_ids(),
            Side::Enemy => self.enemy_ids(),
        }
    }

    pub fn visible_enemy_count(&self) -> usize {
        self.enemies.iter().filter(|e| !e.hidden).count()
    }

    pub fn visible_party_count(&self) -> usize {
        self.party_members().filter(|a| !a.hidden).count()
    }

    pub fn is_party_defeated(&self) -> bool {
        !self.party_members().any(|a| a.exists())
    }

    pub fn are_enemies_defeated(&self) -> bool {
        !self.enemies.iter().any(|e| e.exists())
    }

    /// 100 minus the average HP percentage of living party members
    pub fn fatigue(&self) -> i32 {
        let living: Vec<i32> = self
            .party_members()
            .filter(|a| !a.is_dead())
            .map(Battler::hp_percent)
            .collect();
        if living.is_empty() {
            return 100;
        }
        100 - living.iter().sum::<i32>() / living.len() as i32
    }

    pub fn inc_turns(&mut self) {
        self.turns += 1;
    }

    pub fn random_active(&self, side: Side, rng: &mut ChaCha8Rng) -> Option<BattlerId> {
        let candidates: Vec<BattlerId> = self
            .side_ids(side)
            .into_iter()
            .filter(|id| self.battler(*id).map(Battler::exists).unwrap_or(false))
            .collect();
        if candidates.is_empty() {
            return None;
        }
        Some(candidates[rng.gen_range(0..candidates.len())])
    }

    pub fn average_agility(&self) -> i32 {
        let agilities: Vec<i32> = self
            .party_members()
            .chain(self.enemies.iter())
            .filter(|b| b.exists())
            .map(|b| b.stats.agility.max(1))
            .collect();
        if agilities.is_empty() {
            return 1;
        }
        (agilities.iter().sum::<i32>() / agilities.len() as i32).max(1)
    }

    /// Fill every eligible gauge; returns who gained how much
    pub fn update_atb_gauges(&mut self, db: &Database, max: i32, fill_frames: i32) -> Vec<(BattlerId, i32)> {
        let average = self.average_agility();
        let base = (max / fill_frames.max(1)).max(1);
        let ids: Vec<BattlerId> = self
            .party_ids()
            .into_iter()
            .chain(self.enemy_ids())
            .collect();

        let mut gains = Vec::new();
        for id in ids {
            let Some(battler) = self.battler_mut(id) else {
                continue;
            };
            if battler.hidden || !battler.can_act_or_recoverable(db) || battler.is_gauge_full(max) {
                continue;
            }
            let gain = (base * battler.stats.agility.max(1) / average).max(1);
            let before = battler.gauge;
            battler.gauge = (battler.gauge + gain).min(max);
            gains.push((id, battler.gauge - before));
        }
        gains
    }

    pub fn gain_gold(&mut self, amount: i32) {
        self.gold = self.gold.saturating_add(amount).max(0);
    }

    pub fn add_item(&mut self, item_id: i32, count: i32) {
        let entry = self.items.entry(item_id).or_insert(0);
        *entry = (*entry + count).clamp(0, 99);
    }

    pub fn item_count(&self, item_id: i32) -> i32 {
        self.items.get(&item_id).copied().unwrap_or(0)
    }

    pub fn gain_exp(&mut self, actor_id: i32, amount: i32) {
        *self.exp.entry(actor_id).or_insert(0) += amount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::StateDef;

    fn actor(id: i32, hp: i32) -> ActorDef {
        ActorDef {
            id,
            name: format!("Actor{}", id),
            stats: Stats {
                max_hp: hp,
                ..Default::default()
            },
            skills: vec![],
            commands: vec![],
            row: Row::Front,
            controllable: true,
            preemptive: false,
        }
    }

    #[test]
    fn test_non_lethal_floors_at_one() {
        let mut b = Battler::from_actor(&actor(1, 100));
        b.hp = 50;
        assert_eq!(b.change_hp(-80, false), -49);
        assert_eq!(b.hp, 1);
        assert!(!b.is_dead());

        assert_eq!(b.change_hp(-5, true), -1);
        assert!(b.is_dead());
        assert_eq!(b.change_hp(20, false), 0);
    }

    #[test]
    fn test_state_auto_release() {
        let db = Database {
            states: vec![StateDef {
                id: 4,
                name: "Sleep".into(),
                restriction: Restriction::DoNothing,
                hp_change: 0,
                auto_release_turns: 2,
                reflect: false,
                priority: 10,
            }],
            ..Default::default()
        };
        let mut b = Battler::from_actor(&actor(1, 100));
        assert!(b.add_state(4, &db));
        assert!(!b.can_act(&db));
        assert!(b.can_act_or_recoverable(&db));

        assert!(b.battle_state_heal(&db).is_empty());
        assert_eq!(b.battle_state_heal(&db), vec![4]);
        assert!(b.can_act(&db));
    }

    #[test]
    fn test_roster_lookup_and_defeat() {
        let db = Database {
            actors: vec![actor(1, 10), actor(2, 10)],
            ..Default::default()
        };
        let mut roster = Roster::new(&db, &[2, 9], &Troop::default());
        assert_eq!(roster.party, vec![2]);
        assert!(roster.actor(1).is_some());
        assert!(!roster.is_actor_in_party(1));
        assert!(roster.enemy(-1).is_none());

        assert!(!roster.is_party_defeated());
        if let Some(a) = roster.actor_mut(2) {
            a.change_hp(-10, true);
        }
        assert!(roster.is_party_defeated());
        assert_eq!(roster.fatigue(), 100);
    }
}
