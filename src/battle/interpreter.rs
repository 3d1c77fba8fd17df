//! Battle interpreter
//!
//! The base interpreter plus the battle command dialect, troop page scheduling,
//! and the hook bridge. Hooks run on a second interpreter so they never disturb
//! the suspension state of the main one.

use std::rc::Rc;

use crate::battle::constants::HOOK_ARG_COUNT;
use crate::battle::hooks::{HookKind, HookTable};
use crate::battle::state::{BattleCondition, GameState, Notice};
use crate::battle::triggers::are_conditions_met;
use crate::core::config::BattleConfig;
use crate::core::types::{BattleResult, BattlerId};
use crate::data::SystemSound;
use crate::event::{ConditionFlags, Instruction, Opcode, OwnerTag, ProgramStore};
use crate::interpreter::commands::compare;
use crate::interpreter::{
    AsyncOp, Dialect, Env, ExecutionSnapshot, Interpreter, BRANCH_ELSE, SUBCOMMAND_SENTINEL,
};

fn play_system_se(env: &mut Env<'_>, sound: SystemSound) {
    let se = env.game.database.system_se(sound).clone();
    env.audio.play_se(&se);
}

/// `percent` of `value`, widened so script operands cannot overflow
fn percent_of(percent: i32, value: i32) -> i32 {
    let scaled = i64::from(percent) * i64::from(value) / 100;
    scaled.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Battle command table and the state those commands share with the scene
#[derive(Debug, Clone, Default)]
pub struct BattleDialect {
    rpg2k3: bool,
    maniac: bool,
    hooks: HookTable,
    hook_runner: Interpreter,
    in_hook: bool,
    force_flee: bool,
    targets_single_enemy: bool,
    target_enemy_index: i32,
    current_actor_id: i32,
}

impl BattleDialect {
    pub fn new(config: &BattleConfig) -> Self {
        Self {
            rpg2k3: config.is_rpg2k3(),
            maniac: config.maniac_patch,
            hook_runner: Interpreter::new(config),
            ..Default::default()
        }
    }

    pub fn hooks(&self) -> &HookTable {
        &self.hooks
    }

    /// Run a bound hook: its common event after one variable write per argument
    ///
    /// The secondary interpreter is pumped once right away so the hook's effects are
    /// visible to the caller. Hooks triggered from inside a running hook are dropped.
    pub fn trigger_hook(&mut self, kind: HookKind, args: [i32; HOOK_ARG_COUNT], env: &mut Env<'_>) -> bool {
        if !self.maniac || self.in_hook {
            return false;
        }
        let binding = self.hooks.get(kind);
        if !binding.is_bound() {
            return false;
        }
        let store = env.store;
        let Some(event) = store.common_event(binding.common_event_id) else {
            tracing::warn!(
                "ControlBattleHooks: Can't call invalid common event {}",
                binding.common_event_id
            );
            return false;
        };

        self.hook_runner.push_common_event(event);
        let setup: Vec<Instruction> = args
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let var = binding.variable_start + i as i32;
                Instruction::new(Opcode::ControlVariables, 0, [0, var, var, 0, 0, *value, 0])
            })
            .collect();
        self.hook_runner.push(setup.into(), OwnerTag::SYNTHETIC);

        tracing::debug!("hook {:?} -> common event {}", kind, binding.common_event_id);
        self.pump_hooks(env);
        true
    }

    /// Keep draining hooks that suspended; returns whether one is still running
    pub fn process_hook_sub_events(&mut self, env: &mut Env<'_>) -> bool {
        if !self.maniac || !self.hook_runner.is_running() {
            return false;
        }
        self.pump_hooks(env);
        true
    }

    pub fn is_hook_running(&self) -> bool {
        self.hook_runner.is_running()
    }

    fn pump_hooks(&mut self, env: &mut Env<'_>) {
        let mut runner = std::mem::take(&mut self.hook_runner);
        self.in_hook = true;
        runner.update(env, self, true);
        self.in_hook = false;
        self.hook_runner = runner;
    }

    // === COMMANDS ===

    fn command_call_common_event(&mut self, interp: &mut Interpreter, env: &mut Env<'_>, inst: &Instruction) -> bool {
        if !self.rpg2k3 {
            return true;
        }
        let id = inst.param(0);
        match env.store.common_event(id) {
            Some(event) => interp.push_common_event(event),
            None => tracing::warn!("CallCommonEvent: Can't call invalid common event {}", id),
        }
        true
    }

    fn command_force_flee(&mut self, env: &mut Env<'_>, inst: &Instruction) -> bool {
        if !self.rpg2k3 {
            return true;
        }
        let check = inst.param(2) == 0;
        let condition = env.game.status.condition;

        match inst.param(0) {
            0 => {
                if !check || condition != BattleCondition::Pincers {
                    self.force_flee = true;
                }
            }
            1 => {
                if !check || condition != BattleCondition::Surround {
                    let mut escaped = 0;
                    for enemy in env.game.roster.enemies.iter_mut().filter(|e| e.exists()) {
                        enemy.hidden = true;
                        enemy.set_death_timer();
                        escaped += 1;
                    }
                    if escaped > 0 {
                        play_system_se(env, SystemSound::Escape);
                    }
                }
            }
            2 => {
                if !check || condition != BattleCondition::Surround {
                    let Some(enemy) = env.game.roster.enemy_mut(inst.param(1)) else {
                        tracing::warn!("ForceFlee: Invalid enemy ID {}", inst.param(1));
                        return true;
                    };
                    if enemy.exists() {
                        enemy.hidden = true;
                        enemy.set_death_timer();
                        play_system_se(env, SystemSound::Escape);
                    }
                }
            }
            mode => tracing::warn!("ForceFlee: unknown mode {}", mode),
        }
        true
    }

    fn command_enable_combo(&mut self, env: &mut Env<'_>, inst: &Instruction) -> bool {
        if !self.rpg2k3 {
            return true;
        }
        let actor_id = inst.param(0);
        if !env.game.roster.is_actor_in_party(actor_id) {
            return true;
        }
        match env.game.roster.actor_mut(actor_id) {
            Some(actor) => actor.set_battle_combo(inst.param(1), inst.param(2)),
            None => tracing::warn!("EnableCombo: Invalid actor ID {}", actor_id),
        }
        true
    }

    fn command_change_monster_hp(&mut self, env: &mut Env<'_>, inst: &Instruction) -> bool {
        let index = inst.param(0);
        let Some(enemy) = env.game.roster.enemy(index) else {
            tracing::warn!("ChangeMonsterHp: Invalid enemy ID {}", index);
            return true;
        };
        if enemy.is_dead() {
            return true;
        }

        let lose = inst.param(1) > 0;
        let lethal = inst.param(4) > 0;
        let hp = enemy.hp;
        let mut change = match inst.param(2) {
            0 => inst.param(3),
            1 => env.game.variables.get(inst.param(3)),
            2 => percent_of(inst.param(3), hp),
            operand => {
                tracing::warn!("ChangeMonsterHp: unknown operand {}", operand);
                0
            }
        };
        if lose {
            change = change.saturating_neg();
        }

        let (id, new_hp, dead) = match env.game.roster.enemy_mut(index) {
            Some(enemy) => {
                enemy.change_hp(change, lethal);
                (enemy.id, enemy.hp, enemy.is_dead())
            }
            None => return true,
        };
        env.game
            .status
            .push_notice(Notice::HpChanged { target: id, change });

        if dead {
            play_system_se(env, SystemSound::EnemyKill);
            if let Some(enemy) = env.game.roster.enemy_mut(index) {
                enemy.set_death_timer();
            }
        }

        self.trigger_hook(HookKind::StatChange, [index, 0, change, new_hp, 0, 0], env);
        true
    }

    fn command_change_monster_mp(&mut self, env: &mut Env<'_>, inst: &Instruction) -> bool {
        let index = inst.param(0);
        let operand = inst.param(2);
        let mut change = match operand {
            0 => inst.param(3),
            1 => env.game.variables.get(inst.param(3)),
            _ => {
                tracing::warn!("ChangeMonsterMp: unknown operand {}", operand);
                0
            }
        };
        if inst.param(1) > 0 {
            change = change.saturating_neg();
        }

        let Some(enemy) = env.game.roster.enemy_mut(index) else {
            tracing::warn!("ChangeMonsterMp: Invalid enemy ID {}", index);
            return true;
        };
        let sp = enemy.sp.saturating_add(change);
        enemy.set_sp(sp);
        let new_sp = enemy.sp;

        self.trigger_hook(HookKind::StatChange, [index, 1, change, new_sp, 0, 0], env);
        true
    }

    fn command_change_monster_condition(&mut self, env: &mut Env<'_>, inst: &Instruction) -> bool {
        let index = inst.param(0);
        let remove = inst.param(1) > 0;
        let state_id = inst.param(2);
        let game = &mut *env.game;
        let Some(enemy) = game.roster.enemy_mut(index) else {
            tracing::warn!("ChangeMonsterCondition: Invalid enemy ID {}", index);
            return true;
        };

        // Removal skips the death fade: the enemy vanishes at once
        let changed = if remove {
            enemy.remove_state(state_id)
        } else {
            enemy.add_state(state_id, &game.database)
        };

        if changed {
            self.trigger_hook(
                HookKind::SetState,
                [index, state_id, i32::from(!remove), 0, 0, 0],
                env,
            );
        }
        true
    }

    fn command_show_hidden_monster(&mut self, env: &mut Env<'_>, inst: &Instruction) -> bool {
        match env.game.roster.enemy_mut(inst.param(0)) {
            Some(enemy) => enemy.hidden = false,
            None => tracing::warn!("ShowHiddenMonster: Invalid enemy ID {}", inst.param(0)),
        }
        true
    }

    fn command_show_battle_animation(&mut self, interp: &mut Interpreter, env: &mut Env<'_>, inst: &Instruction) -> bool {
        let animation_id = inst.param(0);
        let target = inst.param(1);
        let wait = inst.param(2) != 0;
        let allies = self.rpg2k3 && inst.params.len() > 3 && inst.param(3) != 0;

        let roster = &env.game.roster;
        let targets: Vec<BattlerId> = if target < 0 {
            if allies {
                roster
                    .party_members()
                    .filter(|a| a.exists() || a.is_dead())
                    .map(|a| a.id)
                    .collect()
            } else {
                roster
                    .enemies
                    .iter()
                    .filter(|e| e.exists())
                    .map(|e| e.id)
                    .collect()
            }
        } else if allies {
            roster.actor(target).map(|a| a.id).into_iter().collect()
        } else {
            roster.enemy(target).map(|e| e.id).into_iter().collect()
        };

        let mut frames = 0;
        if !targets.is_empty() {
            match env.game.database.animation(animation_id) {
                Some(anim) => {
                    frames = anim.frames;
                    if let Some(se) = anim.se.clone() {
                        env.audio.play_se(&se);
                    }
                    env.game
                        .status
                        .show_battle_animation(animation_id, targets, frames);
                }
                None => tracing::warn!("ShowBattleAnimation: Invalid animation ID {}", animation_id),
            }
        }

        if wait {
            interp.set_wait_frames(frames);
        }
        true
    }

    fn command_conditional_branch_battle(&mut self, interp: &mut Interpreter, env: &mut Env<'_>, inst: &Instruction) -> bool {
        let game = &*env.game;
        let result = match inst.param(0) {
            0 => game.switches.get(inst.param(1)) == (inst.param(2) == 0),
            1 => {
                let lhs = game.variables.get(inst.param(1));
                let rhs = if inst.param(2) == 0 {
                    inst.param(3)
                } else {
                    game.variables.get(inst.param(3))
                };
                compare(inst.param(4), lhs, rhs)
            }
            2 => match game.roster.actor(inst.param(1)) {
                Some(actor) => actor.can_act(&game.database),
                None => {
                    tracing::warn!("ConditionalBranchBattle: Invalid actor ID {}", inst.param(1));
                    false
                }
            },
            3 => match game.roster.enemy(inst.param(1)) {
                Some(enemy) => enemy.can_act(&game.database),
                None => {
                    tracing::warn!("ConditionalBranchBattle: Invalid enemy ID {}", inst.param(1));
                    false
                }
            },
            4 => self.rpg2k3 && self.targets_single_enemy && self.target_enemy_index == inst.param(1),
            5 => {
                self.rpg2k3
                    && self.current_actor_id == inst.param(1)
                    && game
                        .roster
                        .actor(self.current_actor_id)
                        .is_some_and(|a| a.last_battle_action == inst.param(2))
            }
            6 => match game.roster.enemy(inst.param(1)) {
                Some(enemy) => enemy.has_state(inst.param(2)),
                None => {
                    tracing::warn!("ConditionalBranchBattle: Invalid enemy ID {}", inst.param(1));
                    false
                }
            },
            kind => {
                tracing::warn!("ConditionalBranchBattle: Branch {} unsupported", kind);
                false
            }
        };

        let mut sub_idx = SUBCOMMAND_SENTINEL;
        let mut advance = true;
        if !result {
            sub_idx = BRANCH_ELSE;
            advance = interp.skip_to_next_conditional(
                &[
                    Opcode::ElseBranchBattle,
                    Opcode::EndBranchBattle,
                    Opcode::ElseBranch,
                    Opcode::EndBranch,
                ],
                inst.indent,
            );
        }
        interp.set_subcommand_index(inst.indent, sub_idx);
        advance
    }

    fn command_control_battle_hooks(&mut self, inst: &Instruction) -> bool {
        if !self.maniac {
            tracing::warn!("ControlBattleHooks: hook bridge disabled");
            return true;
        }
        match HookKind::from_index(inst.param(0)) {
            Some(kind) => self.hooks.bind(kind, inst.param(1), inst.param(2)),
            None => tracing::warn!("ControlBattleHooks: unknown hook {}", inst.param(0)),
        }
        true
    }
}

impl Dialect for BattleDialect {
    fn execute(&mut self, interp: &mut Interpreter, env: &mut Env<'_>, inst: &Instruction) -> Option<bool> {
        let advance = match inst.opcode {
            Opcode::CallCommonEvent => self.command_call_common_event(interp, env, inst),
            Opcode::ForceFlee => self.command_force_flee(env, inst),
            Opcode::EnableCombo => self.command_enable_combo(env, inst),
            Opcode::ChangeMonsterHp => self.command_change_monster_hp(env, inst),
            Opcode::ChangeMonsterMp => self.command_change_monster_mp(env, inst),
            Opcode::ChangeMonsterCondition => self.command_change_monster_condition(env, inst),
            Opcode::ShowHiddenMonster => self.command_show_hidden_monster(env, inst),
            Opcode::ChangeBattleBackground => {
                env.game.status.background = inst.text().to_string();
                true
            }
            Opcode::ShowBattleAnimation => self.command_show_battle_animation(interp, env, inst),
            Opcode::TerminateBattle => {
                interp.set_async_op(AsyncOp::TerminateBattle(BattleResult::Abort));
                false
            }
            Opcode::ConditionalBranchBattle => self.command_conditional_branch_battle(interp, env, inst),
            Opcode::ElseBranchBattle => interp.option_generic(
                inst,
                BRANCH_ELSE,
                &[Opcode::EndBranchBattle, Opcode::EndBranch],
            ),
            Opcode::EndBranchBattle => true,
            Opcode::ControlBattleHooks => self.command_control_battle_hooks(inst),
            _ => return None,
        };
        Some(advance)
    }
}

/// Main battle interpreter with its troop page ledger
#[derive(Debug, Clone, Default)]
pub struct BattleInterpreter {
    interp: Interpreter,
    dialect: BattleDialect,
    executed: Vec<bool>,
}

impl BattleInterpreter {
    pub fn new(config: &BattleConfig, page_count: usize) -> Self {
        Self {
            interp: Interpreter::new(config),
            dialect: BattleDialect::new(config),
            executed: vec![false; page_count],
        }
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interp
    }

    pub fn dialect(&self) -> &BattleDialect {
        &self.dialect
    }

    pub fn dialect_mut(&mut self) -> &mut BattleDialect {
        &mut self.dialect
    }

    /// Schedule the first eligible troop page; returns its 1-based number or 0
    ///
    /// Rejected while a page or event is already running.
    pub fn schedule_next_page(
        &mut self,
        store: &ProgramStore,
        game: &GameState,
        required: ConditionFlags,
        source: Option<BattlerId>,
    ) -> usize {
        if self.interp.is_running() {
            return 0;
        }
        let pages = &store.troop().pages;
        if self.executed.len() != pages.len() {
            self.executed.resize(pages.len(), false);
        }

        for (i, page) in pages.iter().enumerate() {
            if self.executed[i]
                || !page.condition.flags.intersects(required)
                || !are_conditions_met(&page.condition, game, source, self.dialect.rpg2k3)
            {
                continue;
            }
            self.interp.clear();
            self.interp
                .push(Rc::clone(&page.instructions), OwnerTag::for_troop_page(i + 1));
            self.executed[i] = true;
            tracing::debug!("scheduled troop page {}", i + 1);
            return i + 1;
        }
        0
    }

    /// Make every page eligible again; called once per turn
    pub fn reset_all_pages_executed(&mut self) {
        self.executed.iter_mut().for_each(|e| *e = false);
    }

    pub fn is_page_executed(&self, number: usize) -> bool {
        number
            .checked_sub(1)
            .and_then(|i| self.executed.get(i))
            .copied()
            .unwrap_or(false)
    }

    pub fn update(&mut self, env: &mut Env<'_>, allow_suspend: bool) {
        self.interp.update(env, &mut self.dialect, allow_suspend);
    }

    pub fn is_running(&self) -> bool {
        self.interp.is_running()
    }

    pub fn is_async_pending(&self) -> bool {
        self.interp.is_async_pending()
    }

    pub fn async_op(&self) -> &AsyncOp {
        self.interp.async_op()
    }

    pub fn is_waiting(&self) -> bool {
        self.interp.is_waiting()
    }

    pub fn clear(&mut self) {
        self.interp.clear();
    }

    pub fn save_state(&self) -> ExecutionSnapshot {
        self.interp.save_state()
    }

    pub fn set_state(&mut self, snapshot: &ExecutionSnapshot, store: &ProgramStore) {
        self.interp.set_state(snapshot, store);
    }

    pub fn is_force_flee_enabled(&self) -> bool {
        self.dialect.force_flee
    }

    pub fn reset_force_flee(&mut self) {
        self.dialect.force_flee = false;
    }

    /// Record what the acting battler is aiming at, for conditional branches
    pub fn set_current_enemy_targeted(&mut self, single: bool, enemy_index: i32) {
        self.dialect.targets_single_enemy = single;
        self.dialect.target_enemy_index = enemy_index;
    }

    pub fn set_current_acting_actor(&mut self, actor_id: i32) {
        self.dialect.current_actor_id = actor_id;
    }

    /// Drop every frame owned by this common event
    pub fn remove_common_event_frames(&mut self, common_event_id: i32) {
        let tag = OwnerTag::for_common_event(common_event_id);
        self.interp.retain_frames(|frame| frame.owner_tag != tag);
    }

    /// Push a common event unless it is already on the stack
    ///
    /// Hook-bound events are always pushed.
    pub fn start_common_event(&mut self, store: &ProgramStore, common_event_id: i32) -> bool {
        let Some(event) = store.common_event(common_event_id) else {
            tracing::warn!("CallCommonEvent: Can't call invalid common event {}", common_event_id);
            return false;
        };
        let tag = OwnerTag::for_common_event(common_event_id);
        let on_stack = self.interp.frames().iter().any(|f| f.owner_tag == tag);
        if on_stack && !self.dialect.hooks.binds_common_event(common_event_id) {
            return false;
        }
        self.interp.push_common_event(event);
        true
    }

    pub fn trigger_hook(&mut self, kind: HookKind, args: [i32; HOOK_ARG_COUNT], env: &mut Env<'_>) -> bool {
        self.dialect.trigger_hook(kind, args, env)
    }

    pub fn process_hook_sub_events(&mut self, env: &mut Env<'_>) -> bool {
        self.dialect.process_hook_sub_events(env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::battler::Roster;
    use crate::data::{Database, EnemyDef, Stats};
    use crate::event::{ConditionKind, EventProgram, PageCondition, Troop, TroopMember, TroopPage};
    use crate::platform::{InstantAssets, SoundLog};

    fn troop(pages: Vec<TroopPage>) -> Troop {
        Troop {
            members: vec![TroopMember {
                enemy_id: 1,
                position: Default::default(),
                hidden: false,
            }],
            pages,
            ..Default::default()
        }
    }

    fn game(troop: &Troop) -> GameState {
        let db = Database {
            enemies: vec![EnemyDef {
                id: 1,
                name: "Bat".into(),
                stats: Stats::default(),
                exp: 1,
                gold: 1,
                drop_item: None,
                actions: vec![],
                preemptive: false,
            }],
            ..Default::default()
        };
        GameState {
            roster: Roster::new(&db, &[], troop),
            database: db,
            ..Default::default()
        }
    }

    fn run(bi: &mut BattleInterpreter, store: &ProgramStore, game: &mut GameState, audio: &mut SoundLog) {
        let mut assets = InstantAssets::default();
        let mut env = Env::new(store, game, audio, &mut assets);
        bi.update(&mut env, true);
    }

    #[test]
    fn test_percent_hp_loss_floors_at_one() {
        let troop = troop(vec![]);
        let store = ProgramStore::new(vec![], troop.clone());
        let mut game = game(&troop);
        game.roster.enemies[0].hp = 50;
        let mut audio = SoundLog::new();

        let mut bi = BattleInterpreter::new(&BattleConfig::default(), 0);
        bi.interp.push(
            vec![Instruction::new(Opcode::ChangeMonsterHp, 0, [0, 1, 2, 100, 0])].into(),
            OwnerTag(-1),
        );
        run(&mut bi, &store, &mut game, &mut audio);

        let enemy = &game.roster.enemies[0];
        assert_eq!(enemy.hp, 1);
        assert_eq!(enemy.death_timer, 0);
        assert_eq!(audio.count("EnemyKill"), 0);
        assert_eq!(
            game.status.notices,
            vec![Notice::HpChanged {
                target: BattlerId::Enemy(0),
                change: -50
            }]
        );
    }

    #[test]
    fn test_extreme_hp_and_mp_operands_saturate() {
        let troop = troop(vec![]);
        let store = ProgramStore::new(vec![], troop.clone());
        let mut game = game(&troop);
        game.roster.enemies[0].stats.max_hp = 500;
        game.roster.enemies[0].hp = 500;
        game.roster.enemies[0].sp = 10;
        let mut audio = SoundLog::new();

        let mut bi = BattleInterpreter::new(&BattleConfig::default(), 0);
        bi.interp.push(
            vec![
                Instruction::new(Opcode::ChangeMonsterHp, 0, [0, 1, 2, 9_999_999, 0]),
                Instruction::new(Opcode::ChangeMonsterHp, 0, [0, 1, 0, i32::MIN, 0]),
                Instruction::new(Opcode::ChangeMonsterMp, 0, [0, 1, 0, i32::MIN]),
                Instruction::new(Opcode::ChangeMonsterHp, 0, [0, 0, 2, i32::MAX, 0]),
            ]
            .into(),
            OwnerTag(-1),
        );
        run(&mut bi, &store, &mut game, &mut audio);

        let enemy = &game.roster.enemies[0];
        assert!(!enemy.is_dead());
        assert_eq!(enemy.hp, enemy.stats.max_hp);
        assert_eq!(enemy.sp, enemy.stats.max_sp);
        assert_eq!(percent_of(i32::MAX, i32::MAX), i32::MAX);
        assert_eq!(percent_of(-50, 10), -5);
    }

    #[test]
    fn test_lethal_hp_loss_kills() {
        let troop = troop(vec![]);
        let store = ProgramStore::new(vec![], troop.clone());
        let mut game = game(&troop);
        let mut audio = SoundLog::new();

        let mut bi = BattleInterpreter::new(&BattleConfig::default(), 0);
        bi.interp.push(
            vec![Instruction::new(Opcode::ChangeMonsterHp, 0, [0, 1, 0, 500, 1])].into(),
            OwnerTag(-1),
        );
        run(&mut bi, &store, &mut game, &mut audio);

        assert!(game.roster.enemies[0].is_dead());
        assert!(game.roster.enemies[0].death_timer > 0);
        assert_eq!(audio.count("EnemyKill"), 1);
    }

    #[test]
    fn test_schedule_once_per_turn() {
        let condition = PageCondition {
            flags: ConditionFlags::empty().with(ConditionKind::Turn),
            turn_a: 0,
            ..Default::default()
        };
        let troop = troop(vec![TroopPage::new(condition, vec![])]);
        let store = ProgramStore::new(vec![], troop.clone());
        let game = game(&troop);
        let all = ConditionFlags::all();

        let mut bi = BattleInterpreter::new(&BattleConfig::default(), 1);
        assert_eq!(bi.schedule_next_page(&store, &game, all, None), 1);
        bi.clear();
        assert_eq!(bi.schedule_next_page(&store, &game, all, None), 0);

        bi.reset_all_pages_executed();
        let only_switch = ConditionFlags::empty().with(ConditionKind::SwitchA);
        assert_eq!(bi.schedule_next_page(&store, &game, only_switch, None), 0);
        assert_eq!(bi.schedule_next_page(&store, &game, all, None), 1);
        assert!(bi.is_page_executed(1));
    }

    #[test]
    fn test_schedule_rejected_while_running() {
        let condition = PageCondition {
            flags: ConditionFlags::empty().with(ConditionKind::Turn),
            ..Default::default()
        };
        let troop = troop(vec![TroopPage::new(condition, vec![])]);
        let store = ProgramStore::new(vec![], troop.clone());
        let game = game(&troop);

        let mut bi = BattleInterpreter::new(&BattleConfig::default(), 1);
        bi.interp
            .push(vec![Instruction::new(Opcode::Comment, 0, [])].into(), OwnerTag(-1));
        assert_eq!(bi.schedule_next_page(&store, &game, ConditionFlags::all(), None), 0);
        assert!(!bi.is_page_executed(1));
    }

    #[test]
    fn test_battle_branch_takes_else() {
        let troop = troop(vec![]);
        let store = ProgramStore::new(vec![], troop.clone());
        let mut game = game(&troop);
        let mut audio = SoundLog::new();

        let mut bi = BattleInterpreter::new(&BattleConfig::default(), 0);
        bi.interp.push(
            vec![
                // Enemy 0 has state 9?
                Instruction::new(Opcode::ConditionalBranchBattle, 0, [6, 0, 9]),
                Instruction::new(Opcode::ControlSwitches, 1, [0, 1, 1, 0]),
                Instruction::new(Opcode::ElseBranchBattle, 0, []),
                Instruction::new(Opcode::ControlSwitches, 1, [0, 2, 2, 0]),
                Instruction::new(Opcode::EndBranchBattle, 0, []),
            ]
            .into(),
            OwnerTag(-1),
        );
        run(&mut bi, &store, &mut game, &mut audio);

        assert!(!game.switches.get(1));
        assert!(game.switches.get(2));
        assert!(!bi.is_running());
    }

    #[test]
    fn test_terminate_battle_suspends() {
        let troop = troop(vec![]);
        let store = ProgramStore::new(vec![], troop.clone());
        let mut game = game(&troop);
        let mut audio = SoundLog::new();

        let mut bi = BattleInterpreter::new(&BattleConfig::default(), 0);
        bi.interp.push(
            vec![
                Instruction::new(Opcode::TerminateBattle, 0, []),
                Instruction::new(Opcode::ControlSwitches, 0, [0, 1, 1, 0]),
            ]
            .into(),
            OwnerTag(-1),
        );
        run(&mut bi, &store, &mut game, &mut audio);

        assert_eq!(bi.async_op(), &AsyncOp::TerminateBattle(BattleResult::Abort));
        assert!(!game.switches.get(1));
    }

    #[test]
    fn test_hook_writes_arguments_before_event() {
        let troop = troop(vec![]);
        // Copies hook argument 3 (var 12) into var 1
        let hook_event = EventProgram::new(
            5,
            crate::event::Trigger::CallOnly,
            vec![Instruction::new(Opcode::ControlVariables, 0, [0, 1, 1, 0, 1, 12, 0])],
        );
        let store = ProgramStore::new(vec![hook_event], troop.clone());
        let mut game = game(&troop);
        let mut audio = SoundLog::new();
        let mut assets = InstantAssets::default();

        let config = BattleConfig {
            maniac_patch: true,
            ..Default::default()
        };
        let mut bi = BattleInterpreter::new(&config, 0);
        bi.dialect_mut().hooks.bind(HookKind::DamagePop, 5, 10);

        let mut env = Env::new(&store, &mut game, &mut audio, &mut assets);
        assert!(bi.trigger_hook(HookKind::DamagePop, [1, 2, 3, 4, 5, 6], &mut env));

        assert_eq!(game.variables.get(10), 1);
        assert_eq!(game.variables.get(15), 6);
        assert_eq!(game.variables.get(1), 3);
        assert!(!bi.is_running());
    }

    #[test]
    fn test_remove_common_event_frames() {
        let mut bi = BattleInterpreter::new(&BattleConfig::default(), 0);
        let body: Rc<[Instruction]> = vec![Instruction::new(Opcode::Comment, 0, [])].into();
        bi.interp.push(Rc::clone(&body), OwnerTag::for_common_event(3));
        bi.interp.push(Rc::clone(&body), OwnerTag::for_common_event(4));
        bi.interp.push(body, OwnerTag::for_common_event(3));

        bi.remove_common_event_frames(3);
        assert_eq!(bi.interpreter().frames().len(), 1);
        assert_eq!(bi.interpreter().frames()[0].owner_tag, OwnerTag(-4));
    }
}
