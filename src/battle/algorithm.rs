//! Battle algorithms - what one queued action does to its targets
//!
//! An algorithm is built when a battler commits to an action and driven by the
//! scene's action sub-machine: start, then execute/apply per target, then
//! optionally repeat. All arithmetic is integer.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::battle::battler::{Pose, Roster};
use crate::battle::constants::{CRITICAL_MULTIPLIER, DAMAGE_VARIANCE_DIVISOR};
use crate::battle::state::GameState;
use crate::core::types::{BattlerId, Side};
use crate::data::{Database, Scope, SoundEffect, SystemSound};

/// Effect family of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlgorithmKind {
    /// Plain attack
    Normal,
    Skill(i32),
    Item(i32),
    Defend,
    /// The battler does nothing (restricted or no valid choice)
    None,
}

/// Outcome of executing against the current target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub critical: bool,
    /// HP delta to apply; `None` when the action does not touch HP
    pub hp: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Algorithm {
    pub kind: AlgorithmKind,
    pub source: BattlerId,
    targets: Vec<BattlerId>,
    current: usize,
    /// Times the whole target list is processed per action
    repeat: i32,
    repeats_done: i32,
    reflect_target: Option<BattlerId>,
    outcome: Outcome,
}

impl Algorithm {
    fn with_kind(kind: AlgorithmKind, source: BattlerId, targets: Vec<BattlerId>) -> Self {
        Self {
            kind,
            source,
            targets,
            current: 0,
            repeat: 1,
            repeats_done: 0,
            reflect_target: None,
            outcome: Outcome::default(),
        }
    }

    pub fn normal(source: BattlerId, target: BattlerId) -> Self {
        Self::with_kind(AlgorithmKind::Normal, source, vec![target])
    }

    pub fn skill(source: BattlerId, skill_id: i32, targets: Vec<BattlerId>) -> Self {
        Self::with_kind(AlgorithmKind::Skill(skill_id), source, targets)
    }

    pub fn item(source: BattlerId, item_id: i32, targets: Vec<BattlerId>) -> Self {
        Self::with_kind(AlgorithmKind::Item(item_id), source, targets)
    }

    pub fn defend(source: BattlerId) -> Self {
        Self::with_kind(AlgorithmKind::Defend, source, vec![source])
    }

    pub fn none(source: BattlerId) -> Self {
        Self::with_kind(AlgorithmKind::None, source, Vec::new())
    }

    /// Hit every target this many times (dual attacks)
    pub fn with_repeat(mut self, repeat: i32) -> Self {
        self.repeat = repeat.max(1);
        self
    }

    /// Targets a scope resolves to, given an explicit pick for single scopes
    pub fn targets_for_scope(roster: &Roster, source: BattlerId, scope: Scope, pick: Option<BattlerId>) -> Vec<BattlerId> {
        let own = source.side();
        let other = match own {
            Side::Ally => Side::Enemy,
            Side::Enemy => Side::Ally,
        };
        let living = |side: Side| -> Vec<BattlerId> {
            roster
                .side_ids(side)
                .into_iter()
                .filter(|id| roster.battler(*id).is_some_and(|b| b.exists()))
                .collect()
        };
        match scope {
            Scope::User => vec![source],
            Scope::AllEnemies => living(other),
            Scope::AllAllies => living(own),
            Scope::SingleEnemy | Scope::SingleAlly => pick.into_iter().collect(),
        }
    }

    pub fn targets(&self) -> &[BattlerId] {
        &self.targets
    }

    pub fn target(&self) -> Option<BattlerId> {
        self.targets.get(self.current).copied()
    }

    pub fn reflect_target(&self) -> Option<BattlerId> {
        self.reflect_target
    }

    pub fn is_skill(&self) -> bool {
        matches!(self.kind, AlgorithmKind::Skill(_))
    }

    fn scope(&self, db: &Database) -> Scope {
        match self.kind {
            AlgorithmKind::Normal => Scope::SingleEnemy,
            AlgorithmKind::Skill(id) => db.skill(id).map(|s| s.scope).unwrap_or_default(),
            AlgorithmKind::Item(id) => db.item(id).map(|i| i.scope).unwrap_or(Scope::SingleAlly),
            AlgorithmKind::Defend | AlgorithmKind::None => Scope::User,
        }
    }

    /// Whether the action aims at the source's own side
    pub fn is_targeting_party(&self, db: &Database) -> bool {
        self.scope(db).targets_allies()
    }

    /// Targets on the source's side may be dead (revival); others must exist
    fn is_valid_target(&self, roster: &Roster, id: BattlerId) -> bool {
        match roster.battler(id) {
            Some(b) if id.side() == self.source.side() => !b.hidden,
            Some(b) => b.exists(),
            None => false,
        }
    }

    pub fn is_current_target_valid(&self, roster: &Roster) -> bool {
        self.target().is_some_and(|id| self.is_valid_target(roster, id))
    }

    /// Begin a pass over the targets
    ///
    /// A single enemy target that died since selection is swapped for a random
    /// living one of the same side. Skill costs are paid here, once per pass.
    pub fn start(&mut self, game: &mut GameState) {
        self.current = 0;
        self.outcome = Outcome::default();

        let single = self.scope(&game.database).is_single();
        if single {
            if let Some(target) = self.targets.first().copied() {
                if !self.is_valid_target(&game.roster, target) && target.side() != self.source.side() {
                    if let Some(replacement) = game.roster.random_active(target.side(), &mut game.rng) {
                        self.targets[0] = replacement;
                    }
                }
            }
        } else if self.kind != AlgorithmKind::Defend && self.kind != AlgorithmKind::None {
            let roster = &game.roster;
            let kept: Vec<BattlerId> = self
                .targets
                .iter()
                .copied()
                .filter(|id| self.is_valid_target(roster, *id))
                .collect();
            self.targets = kept;
        }

        if let AlgorithmKind::Skill(id) = self.kind {
            let cost = game.database.skill(id).map(|s| s.sp_cost).unwrap_or(0);
            if let Some(source) = game.roster.battler_mut(self.source) {
                let sp = source.sp - cost;
                source.set_sp(sp);
            }
        }
        if let AlgorithmKind::Item(id) = self.kind {
            if self.repeats_done == 0 && self.source.is_ally() {
                game.roster.add_item(id, -1);
            }
        }
    }

    /// Swap the targets for the source when a reflecting target is hit
    ///
    /// Returns whether anything was reflected.
    pub fn reflect_targets(&mut self, game: &GameState) -> bool {
        let AlgorithmKind::Skill(id) = self.kind else {
            return false;
        };
        let reflectable = game.database.skill(id).is_some_and(|s| s.reflectable);
        if !reflectable || self.is_targeting_party(&game.database) {
            return false;
        }
        let reflector = self.targets.iter().copied().find(|t| {
            game.roster.battler(*t).is_some_and(|b| {
                b.states
                    .iter()
                    .any(|s| game.database.state(s.id).is_some_and(|def| def.reflect))
            })
        });
        match reflector {
            Some(target) => {
                self.reflect_target = Some(target);
                self.targets = vec![self.source];
                self.current = 0;
                true
            }
            None => false,
        }
    }

    /// Roll the effect against the current target
    pub fn execute(&mut self, game: &mut GameState) -> Outcome {
        self.outcome = Outcome::default();
        let Some(target_id) = self.target() else {
            return self.outcome;
        };
        let (Some(source), Some(target)) = (
            game.roster.battler(self.source).cloned(),
            game.roster.battler(target_id).cloned(),
        ) else {
            return self.outcome;
        };
        let rng = &mut game.rng;

        self.outcome = match self.kind {
            AlgorithmKind::Normal => {
                if rng.gen_range(0..100) >= source.stats.hit_rate {
                    Outcome::default()
                } else {
                    let mut damage = (source.stats.attack / 2 - target.stats.defense / 4).max(0);
                    let critical = rng.gen_range(0..100) < source.stats.crit_rate;
                    damage = vary(damage, rng);
                    if critical {
                        damage *= CRITICAL_MULTIPLIER;
                    }
                    if target.defending {
                        damage /= 2;
                    }
                    Outcome {
                        success: true,
                        critical,
                        hp: Some(-damage),
                    }
                }
            }
            AlgorithmKind::Skill(id) => match game.database.skill(id) {
                Some(skill) => {
                    if rng.gen_range(0..100) >= skill.hit_rate {
                        Outcome::default()
                    } else {
                        let hp = if skill.power == 0 {
                            None
                        } else if skill.heals {
                            Some(vary(skill.power + source.stats.spirit / 2, rng))
                        } else {
                            let damage = (skill.power + source.stats.spirit / 2 - target.stats.spirit / 4).max(0);
                            Some(-vary(damage, rng))
                        };
                        Outcome {
                            success: true,
                            critical: false,
                            hp,
                        }
                    }
                }
                None => {
                    tracing::warn!("Algorithm: Invalid skill ID {}", id);
                    Outcome::default()
                }
            },
            AlgorithmKind::Item(id) => match game.database.item(id) {
                Some(item) => Outcome {
                    success: !target.is_dead() || item.hp_recovery == 0,
                    critical: false,
                    hp: (item.hp_recovery != 0).then_some(item.hp_recovery),
                },
                None => {
                    tracing::warn!("Algorithm: Invalid item ID {}", id);
                    Outcome::default()
                }
            },
            AlgorithmKind::Defend => Outcome {
                success: true,
                critical: false,
                hp: None,
            },
            AlgorithmKind::None => Outcome::default(),
        };
        self.outcome
    }

    /// Apply the last executed outcome to the current target
    ///
    /// Returns the states that were newly added.
    pub fn apply(&mut self, game: &mut GameState) -> Vec<i32> {
        let Some(target_id) = self.target() else {
            return Vec::new();
        };
        if !self.outcome.success {
            return Vec::new();
        }

        if self.kind == AlgorithmKind::Defend {
            if let Some(source) = game.roster.battler_mut(self.source) {
                source.defending = true;
            }
            return Vec::new();
        }

        let (add, remove) = match self.kind {
            AlgorithmKind::Skill(id) => game
                .database
                .skill(id)
                .map(|s| (s.add_states.clone(), s.remove_states.clone()))
                .unwrap_or_default(),
            _ => (Vec::new(), Vec::new()),
        };

        let db = &game.database;
        let Some(target) = game.roster.battler_mut(target_id) else {
            return Vec::new();
        };
        if let Some(hp) = self.outcome.hp {
            target.change_hp(hp, true);
        }
        for state in remove {
            target.remove_state(state);
        }
        add.into_iter()
            .filter(|state| target.add_state(*state, db))
            .collect()
    }

    /// Move to the next target; false once the list is done
    pub fn target_next(&mut self) -> bool {
        if self.current + 1 < self.targets.len() {
            self.current += 1;
            true
        } else {
            false
        }
    }

    /// Start another hit on the same targets if the action repeats
    pub fn repeat_next(&mut self) -> bool {
        self.repeats_done += 1;
        if self.repeats_done < self.repeat {
            self.current = 0;
            true
        } else {
            false
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.success
    }

    pub fn is_critical_hit(&self) -> bool {
        self.outcome.critical
    }

    pub fn is_affect_hp(&self) -> bool {
        self.outcome.hp.is_some()
    }

    pub fn affected_hp(&self) -> i32 {
        self.outcome.hp.unwrap_or(0)
    }

    /// Healing or support rather than harm
    pub fn is_positive(&self) -> bool {
        match self.kind {
            AlgorithmKind::Item(_) | AlgorithmKind::Defend => true,
            AlgorithmKind::Skill(_) => self.outcome.hp.map(|hp| hp > 0).unwrap_or(false),
            AlgorithmKind::Normal | AlgorithmKind::None => false,
        }
    }

    pub fn animation_id(&self, db: &Database) -> i32 {
        match self.kind {
            AlgorithmKind::Skill(id) => db.skill(id).map(|s| s.animation_id).unwrap_or(0),
            AlgorithmKind::Item(id) => db.item(id).map(|i| i.animation_id).unwrap_or(0),
            _ => 0,
        }
    }

    /// Notification shown when the action begins
    pub fn start_message(&self, db: &Database) -> String {
        match self.kind {
            AlgorithmKind::Skill(id) => db.skill(id).map(|s| s.name.clone()).unwrap_or_default(),
            AlgorithmKind::Item(id) => db.item(id).map(|i| i.name.clone()).unwrap_or_default(),
            _ => String::new(),
        }
    }

    pub fn failure_se(&self, db: &Database) -> SoundEffect {
        db.system_se(SystemSound::Evasion).clone()
    }

    pub fn source_pose(&self) -> Pose {
        match self.kind {
            AlgorithmKind::Normal => Pose::AttackRight,
            AlgorithmKind::Skill(_) => Pose::Skill,
            AlgorithmKind::Item(_) => Pose::Item,
            AlgorithmKind::Defend => Pose::Defend,
            AlgorithmKind::None => Pose::Idle,
        }
    }

    /// Turn on the switch a skill sets once it resolved
    pub fn process_post_action_switches(&self, game: &mut GameState) {
        if let AlgorithmKind::Skill(id) = self.kind {
            if let Some(switch_id) = game.database.skill(id).and_then(|s| s.switch_on) {
                game.switches.set(switch_id, true);
            }
        }
    }
}

/// Spread a value by up to a fifth either way
fn vary(value: i32, rng: &mut impl Rng) -> i32 {
    let spread = value / DAMAGE_VARIANCE_DIVISOR;
    if spread <= 0 {
        return value;
    }
    (value + rng.gen_range(-spread..=spread)).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ActorDef, EnemyDef, ItemDef, Row, SkillDef, StateDef, Stats};
    use crate::event::{Troop, TroopMember};

    fn game() -> GameState {
        let db = Database {
            actors: vec![ActorDef {
                id: 1,
                name: "Hero".into(),
                stats: Stats {
                    attack: 60,
                    ..Default::default()
                },
                skills: vec![2],
                commands: vec![],
                row: Row::Front,
                controllable: true,
                preemptive: false,
            }],
            enemies: vec![EnemyDef {
                id: 1,
                name: "Imp".into(),
                stats: Stats::default(),
                exp: 0,
                gold: 0,
                drop_item: None,
                actions: vec![],
                preemptive: false,
            }],
            skills: vec![SkillDef {
                id: 2,
                name: "Bolt".into(),
                sp_cost: 4,
                power: 10,
                scope: Scope::AllEnemies,
                heals: false,
                animation_id: 3,
                hit_rate: 100,
                add_states: vec![],
                remove_states: vec![],
                reflectable: true,
                switch_on: Some(7),
                subset: 0,
            }],
            items: vec![ItemDef {
                id: 1,
                name: "Potion".into(),
                hp_recovery: 30,
                scope: Scope::SingleAlly,
                animation_id: 0,
            }],
            states: vec![StateDef {
                id: 5,
                name: "Mirror".into(),
                restriction: Default::default(),
                hp_change: 0,
                auto_release_turns: 0,
                reflect: true,
                priority: 0,
            }],
            ..Default::default()
        };
        let member = TroopMember {
            enemy_id: 1,
            position: Default::default(),
            hidden: false,
        };
        let troop = Troop {
            members: vec![member.clone(), member],
            ..Default::default()
        };
        GameState {
            roster: Roster::new(&db, &[1], &troop),
            database: db,
            ..Default::default()
        }
    }

    #[test]
    fn test_normal_attack_damages() {
        let mut game = game();
        let mut algo = Algorithm::normal(BattlerId::Actor(1), BattlerId::Enemy(0));
        algo.start(&mut game);
        let outcome = algo.execute(&mut game);
        assert!(outcome.success);
        assert!(outcome.hp.is_some_and(|hp| hp < 0));
        algo.apply(&mut game);
        assert!(game.roster.enemies[0].hp < 100);
        assert!(!algo.target_next());
    }

    #[test]
    fn test_skill_hits_every_target_and_pays_once() {
        let mut game = game();
        let targets = Algorithm::targets_for_scope(&game.roster, BattlerId::Actor(1), Scope::AllEnemies, None);
        assert_eq!(targets.len(), 2);
        let mut algo = Algorithm::skill(BattlerId::Actor(1), 2, targets);
        algo.start(&mut game);

        let mut hits = 0;
        loop {
            algo.execute(&mut game);
            algo.apply(&mut game);
            hits += 1;
            if !algo.target_next() {
                break;
            }
        }
        assert_eq!(hits, 2);
        assert_eq!(game.roster.actor(1).map(|a| a.sp), Some(16));

        algo.process_post_action_switches(&mut game);
        assert!(game.switches.get(7));
    }

    #[test]
    fn test_reflect_redirects_to_source() {
        let mut game = game();
        let db = game.database.clone();
        game.roster.enemies[1].add_state(5, &db);
        let mut algo = Algorithm::skill(BattlerId::Actor(1), 2, vec![BattlerId::Enemy(0), BattlerId::Enemy(1)]);
        assert!(algo.reflect_targets(&game));
        assert_eq!(algo.targets(), &[BattlerId::Actor(1)]);
        assert_eq!(algo.reflect_target(), Some(BattlerId::Enemy(1)));
    }

    #[test]
    fn test_repeat_runs_requested_passes() {
        let mut algo = Algorithm::normal(BattlerId::Actor(1), BattlerId::Enemy(0)).with_repeat(2);
        assert!(algo.repeat_next());
        assert!(!algo.repeat_next());
    }

    #[test]
    fn test_dead_single_target_is_replaced() {
        let mut game = game();
        game.roster.enemies[0].change_hp(-1000, true);
        let mut algo = Algorithm::normal(BattlerId::Actor(1), BattlerId::Enemy(0));
        algo.start(&mut game);
        assert_eq!(algo.target(), Some(BattlerId::Enemy(1)));
        assert!(algo.is_current_target_valid(&game.roster));
    }

    #[test]
    fn test_item_consumed_and_heals() {
        let mut game = game();
        game.roster.add_item(1, 2);
        if let Some(hero) = game.roster.actor_mut(1) {
            hero.hp = 40;
        }
        let mut algo = Algorithm::item(BattlerId::Actor(1), 1, vec![BattlerId::Actor(1)]);
        assert!(algo.is_targeting_party(&game.database));
        algo.start(&mut game);
        algo.execute(&mut game);
        algo.apply(&mut game);
        assert_eq!(game.roster.item_count(1), 1);
        assert_eq!(game.roster.actor(1).map(|a| a.hp), Some(70));
        assert!(algo.is_positive());
    }
}
