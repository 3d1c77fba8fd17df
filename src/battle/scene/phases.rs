//! Outer state handlers of the battle scene
//!
//! Each handler runs one step of its state and tells the dispatcher whether to
//! keep going this frame. Substates are numbered per handler.

use rand::Rng;

use super::menu::{self, CommandEntry, Selection};
use super::{BattleActionReturn, BattleScene, EventTrigger, FrameIo, SceneActionReturn, SceneEventType, SceneState};
use crate::battle::ai::restricted_action;
use crate::battle::algorithm::{Algorithm, AlgorithmKind};
use crate::battle::battler::Pose;
use crate::battle::constants::{ESCAPE_ATTEMPT_BONUS, ESCAPE_BASE_CHANCE};
use crate::battle::formation;
use crate::battle::state::BattleCondition;
use crate::core::config::{AtbMode, BattleType};
use crate::core::types::{BattleResult, BattlerId};
use crate::data::{BattleCommandKind, Restriction, Row, Scope, SystemSound};
use crate::platform::Button;

use SceneActionReturn::{ContinueThisFrame as Continue, WaitTillNextFrame as Wait};

impl BattleScene {
    pub(super) fn process_scene_action(&mut self, io: &mut FrameIo<'_>) -> SceneActionReturn {
        // A killed or removed actor drops out of its menus at once
        if let Some(actor) = self.active_actor {
            let gone = !self.game.roster.is_actor_in_party(actor)
                || !self.game.roster.actor(actor).is_some_and(|a| a.exists());
            if gone && self.is_menu_state() {
                self.active_actor = None;
                self.set_state(SceneState::SelectActor);
            }
        }

        match self.state {
            SceneState::Start => self.process_start(),
            SceneState::SelectOption => self.process_option(io),
            SceneState::SelectActor => self.process_actor(io, false),
            SceneState::AutoBattle => self.process_actor(io, true),
            SceneState::SelectCommand => self.process_command(io),
            SceneState::SelectItem => self.process_item(io),
            SceneState::SelectSkill => self.process_skill(io),
            SceneState::SelectEnemyTarget => self.process_target(io, true),
            SceneState::SelectAllyTarget => self.process_target(io, false),
            SceneState::Battle => self.process_battle(io),
            SceneState::Victory => self.process_victory(),
            SceneState::Defeat => self.process_defeat(),
            SceneState::Escape => self.process_escape(io),
        }
    }

    fn is_menu_state(&self) -> bool {
        matches!(
            self.state,
            SceneState::SelectCommand
                | SceneState::SelectItem
                | SceneState::SelectSkill
                | SceneState::SelectEnemyTarget
                | SceneState::SelectAllyTarget
        )
    }

    pub(super) fn play_system_se(&self, io: &mut FrameIo<'_>, sound: SystemSound) {
        io.audio.play_se(self.game.database.system_se(sound));
    }

    // === START ===

    fn process_start(&mut self) -> SceneActionReturn {
        const START_MESSAGE: u8 = 0;
        const SPECIAL_MESSAGE: u8 = 1;
        const UPDATE_BATTLERS: u8 = 2;

        match self.substate {
            START_MESSAGE => {
                let text = self.config.terms.battle_start.clone();
                if !text.is_empty() {
                    self.show_notification(&text);
                    self.set_wait(10, 80);
                }
                self.set_substate(SPECIAL_MESSAGE);
                Continue
            }
            SPECIAL_MESSAGE => {
                self.end_notification();
                let condition = self.game.status.condition;
                let text = self.config.terms.special_combat.clone();
                if !text.is_empty() && (condition != BattleCondition::None || self.first_strike) {
                    let favorable = matches!(condition, BattleCondition::Initiative | BattleCondition::Surround)
                        || (condition == BattleCondition::None && self.first_strike);
                    if favorable {
                        self.show_notification(&text);
                    }
                    self.set_wait(30, 70);
                }
                self.set_substate(UPDATE_BATTLERS);
                Continue
            }
            UPDATE_BATTLERS => {
                self.end_notification();
                let condition = self.game.status.condition;
                formation::update_enemies_direction(&mut self.game.roster, condition);
                formation::update_actors_direction(&mut self.game.roster, condition);
                self.set_substate(UPDATE_BATTLERS + 1);
                Continue
            }
            _ => {
                if !self.check_battle_end_and_schedule_events(EventTrigger::All, None) {
                    return Continue;
                }
                self.set_state(SceneState::SelectOption);
                Continue
            }
        }
    }

    // === OPTION WINDOW ===

    fn is_escape_allowed_from_option_window(&self) -> bool {
        let condition = self.game.status.condition;
        self.config.escape_allowed
            && self.game.roster.turns == 0
            && (self.first_strike
                || matches!(condition, BattleCondition::Initiative | BattleCondition::Surround))
    }

    fn is_escape_allowed_from_actor_command(&self) -> bool {
        self.config.escape_allowed && self.game.status.condition != BattleCondition::Pincers
    }

    fn process_option(&mut self, io: &mut FrameIo<'_>) -> SceneActionReturn {
        const BEGIN: u8 = 0;

        if self.substate == BEGIN {
            if self.config.battle_type == BattleType::Traditional {
                self.set_state(SceneState::SelectActor);
                return Continue;
            }
            if self.previous_state != SceneState::Start {
                self.ui.move_windows();
            }
            self.set_substate(BEGIN + 1);
            return Continue;
        }

        if self.triggered(io.input, Button::Decision) {
            if self.game.message.is_active() {
                return Wait;
            }
            match self.ui.option_index {
                0 => {
                    self.play_system_se(io, SystemSound::Decision);
                    self.ui.move_windows();
                    self.set_state(SceneState::SelectActor);
                }
                1 => {
                    self.ui.move_windows();
                    self.set_state(SceneState::AutoBattle);
                    self.play_system_se(io, SystemSound::Decision);
                }
                _ => {
                    if self.is_escape_allowed_from_option_window() {
                        self.play_system_se(io, SystemSound::Decision);
                        self.set_state(SceneState::Escape);
                    } else {
                        self.play_system_se(io, SystemSound::Buzzer);
                    }
                }
            }
        }
        Wait
    }

    // === ACTOR SELECTION ===

    /// Party members the player can give a command right now
    fn ready_actors(&self) -> Vec<i32> {
        let max = self.config.max_atb_gauge;
        self.game
            .roster
            .party
            .iter()
            .copied()
            .filter(|id| {
                self.is_controllable(BattlerId::Actor(*id))
                    && self
                        .game
                        .roster
                        .actor(*id)
                        .is_some_and(|a| a.exists() && a.is_gauge_full(max) && !a.action_queued)
            })
            .collect()
    }

    fn process_actor(&mut self, io: &mut FrameIo<'_>, auto_battle: bool) -> SceneActionReturn {
        const BEGIN: u8 = 0;
        const WAIT_INPUT: u8 = 1;
        const WAIT_ACTOR: u8 = 2;

        if self.substate == BEGIN {
            if self.config.battle_type == BattleType::Traditional {
                self.set_substate(WAIT_ACTOR);
                return Continue;
            }
            self.set_substate(WAIT_INPUT);
        }

        if !self.actions.is_empty() {
            self.set_state(SceneState::Battle);
            return Continue;
        }

        if self.substate == WAIT_ACTOR {
            if let Some(actor) = self.ready_actors().first().copied() {
                self.active_actor = Some(actor);
                self.ui.actor_index = self.game.roster.party_index(actor).unwrap_or(0);
                self.set_state(SceneState::SelectCommand);
            }
            return Wait;
        }

        if self.triggered(io.input, Button::Cancel) {
            self.play_system_se(io, SystemSound::Cancel);
            self.set_state(SceneState::SelectOption);
            return Wait;
        }

        if auto_battle {
            return Wait;
        }

        let ready = self.ready_actors();
        let Some(first) = ready.first().copied() else {
            return Wait;
        };
        let under_cursor = self.game.roster.party.get(self.ui.actor_index).copied();
        let actor = match under_cursor {
            Some(id) if ready.contains(&id) => id,
            _ => {
                self.ui.actor_index = self.game.roster.party_index(first).unwrap_or(0);
                first
            }
        };
        if self.triggered(io.input, Button::Decision) {
            self.active_actor = Some(actor);
            self.set_state(SceneState::SelectCommand);
        }
        Wait
    }

    // === COMMAND WINDOW ===

    fn process_command(&mut self, io: &mut FrameIo<'_>) -> SceneActionReturn {
        const BEGIN: u8 = 0;

        if self.substate == BEGIN {
            if matches!(self.previous_state, SceneState::SelectActor | SceneState::AutoBattle) {
                self.ui.command_index = 0;
            }
            self.set_substate(BEGIN + 1);
        }

        if self.config.atb_mode == AtbMode::Active && !self.actions.is_empty() {
            self.set_state(SceneState::Battle);
            return Continue;
        }

        let Some(actor_id) = self.active_actor else {
            self.set_state(SceneState::SelectActor);
            return Continue;
        };
        let source = BattlerId::Actor(actor_id);

        if self.triggered(io.input, Button::Decision) {
            let entries = menu::actor_commands(&self.game.roster, &self.game.database, actor_id);
            match entries.get(self.ui.command_index).copied() {
                Some(CommandEntry::Command { id, kind }) => match kind {
                    BattleCommandKind::Attack => {
                        self.play_system_se(io, SystemSound::Decision);
                        self.ui.selection = Some(Selection::Attack);
                        self.set_state(SceneState::SelectEnemyTarget);
                    }
                    BattleCommandKind::Defense => {
                        self.play_system_se(io, SystemSound::Decision);
                        self.action_selected(Algorithm::defend(source));
                    }
                    BattleCommandKind::Escape => {
                        if self.is_escape_allowed_from_actor_command() {
                            self.play_system_se(io, SystemSound::Decision);
                            if let Some(actor) = self.game.roster.actor_mut(actor_id) {
                                actor.gauge = 0;
                            }
                            self.set_state(SceneState::Escape);
                        } else {
                            self.play_system_se(io, SystemSound::Buzzer);
                        }
                    }
                    BattleCommandKind::Item => {
                        self.play_system_se(io, SystemSound::Decision);
                        self.set_state(SceneState::SelectItem);
                    }
                    BattleCommandKind::Skill => {
                        self.play_system_se(io, SystemSound::Decision);
                        self.ui.skill_subset = 0;
                        self.set_state(SceneState::SelectSkill);
                    }
                    BattleCommandKind::Special => {
                        self.play_system_se(io, SystemSound::Decision);
                        self.action_selected(Algorithm::none(source));
                    }
                    BattleCommandKind::Subskill => {
                        self.play_system_se(io, SystemSound::Decision);
                        self.ui.skill_subset = id;
                        self.set_state(SceneState::SelectSkill);
                    }
                },
                Some(CommandEntry::Row) => self.row_selected(io, actor_id),
                None => {}
            }
            return Wait;
        }

        if self.triggered(io.input, Button::Cancel) {
            self.play_system_se(io, SystemSound::Cancel);
            if let Some(actor) = self.game.roster.actor_mut(actor_id) {
                actor.last_battle_action = -1;
            }
            self.active_actor = None;
            self.set_state(SceneState::SelectActor);
        }
        Wait
    }

    /// Back row can always move up; front row only if someone else stays in front
    fn row_selected(&mut self, io: &mut FrameIo<'_>, actor_id: i32) {
        let front = self
            .game
            .roster
            .party_members()
            .filter(|a| a.row == Row::Front)
            .count();
        let Some(row) = self.game.roster.actor(actor_id).map(|a| a.row) else {
            return;
        };
        if row == Row::Front && front < 2 {
            self.play_system_se(io, SystemSound::Buzzer);
            return;
        }

        self.play_system_se(io, SystemSound::Decision);
        let condition = self.game.status.condition;
        let index = self.game.roster.party_index(actor_id).unwrap_or(0);
        if let Some(actor) = self.game.roster.actor_mut(actor_id) {
            actor.row = match row {
                Row::Front => Row::Back,
                Row::Back => Row::Front,
            };
            actor.position = formation::actor_position(index, actor.row, condition);
        }
        self.action_selected(Algorithm::none(BattlerId::Actor(actor_id)));
    }

    // === ITEM AND SKILL WINDOWS ===

    fn build_action(selection: Selection, source: BattlerId, targets: Vec<BattlerId>) -> Option<Algorithm> {
        let action = match selection {
            Selection::Attack => Algorithm::normal(source, targets.first().copied()?),
            Selection::Skill(id) => Algorithm::skill(source, id, targets),
            Selection::Item(id) => Algorithm::item(source, id, targets),
        };
        Some(action)
    }

    /// Single scopes open a target window; the rest are queued right away
    fn choose_targets(&mut self, selection: Selection, scope: Scope, source: BattlerId) {
        match scope {
            Scope::SingleEnemy => {
                self.ui.selection = Some(selection);
                self.set_state(SceneState::SelectEnemyTarget);
            }
            Scope::SingleAlly => {
                self.ui.selection = Some(selection);
                self.set_state(SceneState::SelectAllyTarget);
            }
            _ => {
                let targets = Algorithm::targets_for_scope(&self.game.roster, source, scope, None);
                match Self::build_action(selection, source, targets) {
                    Some(action) => self.action_selected(action),
                    None => tracing::warn!("{:?} has no target", selection),
                }
            }
        }
    }

    fn process_item(&mut self, io: &mut FrameIo<'_>) -> SceneActionReturn {
        if self.substate == 0 {
            let count = menu::item_list(&self.game.roster).len();
            self.ui.item_index = self.ui.item_index.min(count.saturating_sub(1));
            self.set_substate(1);
        }
        let Some(actor_id) = self.active_actor else {
            self.set_state(SceneState::SelectActor);
            return Continue;
        };

        if self.triggered(io.input, Button::Decision) {
            let items = menu::item_list(&self.game.roster);
            let usable = items.get(self.ui.item_index).and_then(|id| {
                let def = self.game.database.item(*id)?;
                (self.game.roster.item_count(*id) > 0).then_some((def.id, def.scope))
            });
            match usable {
                Some((item_id, scope)) => {
                    self.play_system_se(io, SystemSound::Decision);
                    self.choose_targets(Selection::Item(item_id), scope, BattlerId::Actor(actor_id));
                }
                None => self.play_system_se(io, SystemSound::Buzzer),
            }
            return Wait;
        }

        if self.triggered(io.input, Button::Cancel) {
            self.play_system_se(io, SystemSound::Cancel);
            self.set_state(SceneState::SelectCommand);
        }
        Wait
    }

    fn process_skill(&mut self, io: &mut FrameIo<'_>) -> SceneActionReturn {
        let Some(actor_id) = self.active_actor else {
            self.set_state(SceneState::SelectActor);
            return Continue;
        };
        if self.substate == 0 {
            let count = menu::skill_list(&self.game.roster, &self.game.database, actor_id, self.ui.skill_subset).len();
            self.ui.skill_index = self.ui.skill_index.min(count.saturating_sub(1));
            self.set_substate(1);
        }

        if self.triggered(io.input, Button::Decision) {
            let skills = menu::skill_list(&self.game.roster, &self.game.database, actor_id, self.ui.skill_subset);
            let sp = self.game.roster.actor(actor_id).map(|a| a.sp).unwrap_or(0);
            let usable = skills
                .get(self.ui.skill_index)
                .and_then(|id| self.game.database.skill(*id))
                .filter(|skill| skill.sp_cost <= sp)
                .map(|skill| (skill.id, skill.scope));
            match usable {
                Some((skill_id, scope)) => {
                    self.play_system_se(io, SystemSound::Decision);
                    self.choose_targets(Selection::Skill(skill_id), scope, BattlerId::Actor(actor_id));
                }
                None => self.play_system_se(io, SystemSound::Buzzer),
            }
            return Wait;
        }

        if self.triggered(io.input, Button::Cancel) {
            self.play_system_se(io, SystemSound::Cancel);
            self.set_state(SceneState::SelectCommand);
        }
        Wait
    }

    // === TARGET WINDOWS ===

    fn process_target(&mut self, io: &mut FrameIo<'_>, enemies: bool) -> SceneActionReturn {
        let targets = if enemies {
            menu::enemy_targets(&self.game.roster)
        } else {
            menu::ally_targets(&self.game.roster)
        };
        if self.substate == 0 {
            self.ui.target_index = 0;
            self.set_substate(1);
        }
        if self.ui.target_index >= targets.len() {
            self.ui.target_index = 0;
        }
        let Some(actor_id) = self.active_actor else {
            self.set_state(SceneState::SelectActor);
            return Continue;
        };

        if self.triggered(io.input, Button::Decision) {
            let (Some(target), Some(selection)) = (targets.get(self.ui.target_index).copied(), self.ui.selection) else {
                self.play_system_se(io, SystemSound::Buzzer);
                return Wait;
            };
            self.play_system_se(io, SystemSound::Decision);
            if enemies {
                let target_position = self.game.roster.battler(target).map(|b| b.position);
                if let (Some(position), Some(actor)) = (target_position, self.game.roster.actor_mut(actor_id)) {
                    formation::face_target(actor, position);
                }
            }
            if let Some(action) = Self::build_action(selection, BattlerId::Actor(actor_id), vec![target]) {
                self.action_selected(action);
            }
            return Wait;
        }

        if self.triggered(io.input, Button::Cancel) {
            self.play_system_se(io, SystemSound::Cancel);
            self.set_state(self.previous_state);
        }
        Wait
    }

    // === BATTLE ===

    /// Swap an action for what the source's current states allow
    fn prepare_battle_action(&mut self, action: Algorithm) -> Algorithm {
        let source = action.source;
        let Some(battler) = self.game.roster.battler(source) else {
            return action;
        };
        if action.kind != AlgorithmKind::None && !battler.can_act(&self.game.database) {
            return Algorithm::none(source);
        }
        match battler.restriction(&self.game.database) {
            Restriction::AttackAlly | Restriction::AttackEnemy => {
                restricted_action(source, &mut self.game).unwrap_or(action)
            }
            _ => action,
        }
    }

    fn process_battle(&mut self, io: &mut FrameIo<'_>) -> SceneActionReturn {
        const BEGIN: u8 = 0;
        const PRE_ACTION: u8 = 1;
        const PRE_EVENTS: u8 = 2;
        const BATTLE_ACTION: u8 = 3;
        const POST_EVENTS: u8 = 4;
        const POST: u8 = 5;

        if self.substate == BEGIN {
            self.set_substate(PRE_ACTION);
        }

        if self.substate == PRE_ACTION {
            while let Some(source) = self.actions.front().map(|a| a.source) {
                let roster = &self.game.roster;
                let valid = roster.battler(source).is_some_and(|b| b.exists())
                    && (!source.is_ally() || roster.is_in_party(source));
                if valid {
                    break;
                }
                if roster.is_in_party(source) {
                    self.next_turn(source);
                }
                self.actions.pop_front();
                if let Some(battler) = self.game.roster.battler_mut(source) {
                    battler.action_queued = false;
                }
                self.log.push(
                    SceneEventType::ActionDiscarded { source },
                    format!("{:?} can no longer act", source),
                    self.frame,
                );
            }

            let Some(action) = self.actions.pop_front() else {
                self.set_substate(POST);
                return Continue;
            };
            let source = action.source;
            let action = self.prepare_battle_action(action);
            self.pending_action = Some(action);
            self.action_state = super::BattleActionState::Begin;
            self.set_substate(PRE_EVENTS);
            self.next_turn(source);
        }

        if self.substate == PRE_EVENTS {
            let Some((source, single_enemy)) = self.pending_action.as_ref().map(|a| {
                let single = match a.targets() {
                    [BattlerId::Enemy(index)] => Some(*index as i32),
                    _ => None,
                };
                (a.source, single)
            }) else {
                self.set_substate(PRE_ACTION);
                return Continue;
            };
            let actor_id = match source {
                BattlerId::Actor(id) => id,
                BattlerId::Enemy(_) => 0,
            };
            self.interpreter.set_current_acting_actor(actor_id);
            self.interpreter
                .set_current_enemy_targeted(single_enemy.is_some(), single_enemy.unwrap_or(-1));

            if !self.check_battle_end_and_schedule_events(EventTrigger::BeforeAction, Some(source)) {
                return Continue;
            }
            tracing::debug!("start battle action of {:?}", source);
            self.set_substate(BATTLE_ACTION);
        }

        if self.substate == BATTLE_ACTION {
            match self.process_battle_action(io) {
                BattleActionReturn::Continue => return Continue,
                BattleActionReturn::Wait => return Wait,
                BattleActionReturn::Finished => self.set_substate(POST_EVENTS),
            }
        }

        if self.substate == POST_EVENTS {
            let source = self.pending_action.as_ref().map(|a| a.source);
            if let Some(source @ BattlerId::Enemy(_)) = source {
                if !self.check_battle_end_and_schedule_events(EventTrigger::AfterAction, Some(source)) {
                    return Continue;
                }
            }
            if let Some(BattlerId::Actor(id)) = source {
                if self.active_actor == Some(id) {
                    self.active_actor = None;
                }
            }
            self.pending_action = None;
            if let Some(battler) = source.and_then(|s| self.game.roster.battler_mut(s)) {
                battler.action_queued = false;
            }

            if self.check_battle_end_conditions() {
                return Continue;
            }
            self.set_substate(PRE_ACTION);
            return Continue;
        }

        if self.substate == POST {
            let actor_left = self
                .active_actor
                .map_or(true, |id| !self.game.roster.actor(id).is_some_and(|a| a.exists()));
            let next = if !actor_left {
                self.previous_state
            } else if self.previous_state == SceneState::AutoBattle {
                SceneState::AutoBattle
            } else {
                SceneState::SelectActor
            };
            self.set_state(next);
            return Wait;
        }

        Wait
    }

    // === END STATES ===

    fn process_victory(&mut self) -> SceneActionReturn {
        const BEGIN: u8 = 0;
        const MESSAGES: u8 = 1;

        match self.substate {
            BEGIN => {
                let party = self.game.roster.party.clone();
                for id in party {
                    if let Some(actor) = self.game.roster.actor_mut(id) {
                        actor.set_pose(Pose::Victory, 0);
                    }
                }
                self.set_wait(30, 30);
                self.set_substate(MESSAGES);
                Continue
            }
            MESSAGES => {
                let defeated = self.game.roster.enemies.iter().filter(|e| e.is_dead());
                let mut exp = 0;
                let mut gold = 0;
                let mut drops = Vec::new();
                for enemy in defeated {
                    if let Some(def) = self.game.database.enemy(enemy.db_id) {
                        exp += def.exp;
                        gold += def.gold;
                        drops.extend(def.drop_item);
                    }
                }

                let terms = &self.config.terms;
                self.game.message.show(terms.victory.clone());
                if exp > 0 {
                    self.game.message.show(format!("{} {}", exp, terms.exp_received));
                }
                if gold > 0 {
                    self.game.message.show(format!("{} {}", terms.gold_received, gold));
                }
                for item in &drops {
                    let name = self
                        .game
                        .database
                        .item(*item)
                        .map(|i| i.name.clone())
                        .unwrap_or_else(|| "??? BAD ITEM ???".to_string());
                    self.game.message.show(format!("{} {}", name, terms.item_received));
                }

                let party = self.game.roster.party.clone();
                for id in party {
                    self.game.roster.gain_exp(id, exp);
                }
                self.game.roster.gain_gold(gold);
                for item in drops {
                    self.game.roster.add_item(item, 1);
                }
                tracing::info!("victory: {} exp, {} gold", exp, gold);

                self.set_substate(MESSAGES + 1);
                Continue
            }
            _ => {
                self.end_battle(BattleResult::Victory);
                Continue
            }
        }
    }

    fn process_defeat(&mut self) -> SceneActionReturn {
        const BEGIN: u8 = 0;
        const MESSAGES: u8 = 1;

        match self.substate {
            BEGIN => {
                self.set_wait(60, 60);
                self.set_substate(MESSAGES);
                Continue
            }
            MESSAGES => {
                let text = self.config.terms.defeat.clone();
                self.game.message.show(text);
                self.set_substate(MESSAGES + 1);
                Continue
            }
            _ => {
                self.end_battle(BattleResult::Defeat);
                Continue
            }
        }
    }

    /// Roll an escape; each failure makes the next attempt easier
    fn try_escape(&mut self) -> bool {
        let roster = &self.game.roster;
        let average = |agilities: Vec<i32>| -> i32 {
            if agilities.is_empty() {
                return 1;
            }
            (agilities.iter().sum::<i32>() / agilities.len() as i32).max(1)
        };
        let party = average(
            roster
                .party_members()
                .filter(|a| a.exists())
                .map(|a| a.stats.agility)
                .collect(),
        );
        let enemies = average(
            roster
                .enemies
                .iter()
                .filter(|e| e.exists())
                .map(|e| e.stats.agility)
                .collect(),
        );
        let chance = ESCAPE_BASE_CHANCE - 100 * enemies / party + ESCAPE_ATTEMPT_BONUS * self.escape_attempts;
        let roll = self.game.rng.gen_range(0..100);
        let escaped = roll < chance;
        if !escaped {
            self.escape_attempts += 1;
        }
        tracing::debug!("escape roll {} against {}%: {}", roll, chance, escaped);
        escaped
    }

    fn process_escape(&mut self, io: &mut FrameIo<'_>) -> SceneActionReturn {
        const BEGIN: u8 = 0;
        const FAILURE: u8 = 1;
        const SUCCESS: u8 = 2;

        match self.substate {
            BEGIN => {
                let forced = self.interpreter.is_force_flee_enabled();
                if forced {
                    self.interpreter.reset_force_flee();
                }
                if forced || self.previous_state == SceneState::SelectOption || self.try_escape() {
                    self.play_system_se(io, SystemSound::Escape);
                    let party = self.game.roster.party.clone();
                    for id in party {
                        if let Some(actor) = self.game.roster.actor_mut(id) {
                            let pose = Pose::WalkRight.adjusted_for_direction(actor.flip);
                            actor.set_pose(pose, 0);
                        }
                    }
                    self.running_away = true;
                    self.set_substate(SUCCESS);
                } else {
                    self.set_substate(FAILURE);
                    let text = self.config.terms.escape_failure.clone();
                    self.show_notification(&text);
                }
                self.set_wait(10, 30);
                Continue
            }
            FAILURE => {
                self.end_notification();
                self.set_state(SceneState::SelectActor);
                Continue
            }
            _ => {
                self.end_notification();
                self.end_battle(BattleResult::Escape);
                Continue
            }
        }
    }
}
