//! Battle-action sub-machine
//!
//! Drives the pending action through `Begin -> StartAlgo -> Animation ->
//! [AnimationReflect] -> Apply -> Finished`. Multi-hit repeats and combos re-enter
//! `StartAlgo`.

use super::{BattleActionReturn, BattleActionState, BattleScene, FrameIo, SceneEventType};
use crate::battle::algorithm::{Algorithm, AlgorithmKind};
use crate::battle::battler::Pose;
use crate::battle::constants::{ACTION_POSE_FRAMES, CRITICAL_FLASH, DAMAGE_POSE_FRAMES};
use crate::battle::formation;
use crate::battle::hooks::HookKind;
use crate::core::types::BattlerId;
use crate::data::{SoundEffect, SystemSound};

use BattleActionReturn::{Continue, Finished, Wait};

impl BattleScene {
    pub(super) fn process_battle_action(&mut self, io: &mut FrameIo<'_>) -> BattleActionReturn {
        self.end_notification();

        let Some(mut action) = self.pending_action.take() else {
            return Finished;
        };
        let rc = self.step_battle_action(&mut action, io);
        if self.result.is_none() {
            self.pending_action = Some(action);
        }
        rc
    }

    fn step_battle_action(&mut self, action: &mut Algorithm, io: &mut FrameIo<'_>) -> BattleActionReturn {
        let source_dead = self
            .game
            .roster
            .battler(action.source)
            .map_or(true, |b| b.is_dead());
        if action.kind == AlgorithmKind::None && source_dead {
            return Finished;
        }

        if self.game.status.is_animation_waiting() {
            return Wait;
        }
        if self.game.roster.battler(action.source).is_some_and(|b| !b.is_idle()) {
            return Wait;
        }

        match self.action_state {
            BattleActionState::Begin => self.action_begin(action),
            BattleActionState::StartAlgo => self.action_start_algo(action, io),
            BattleActionState::Animation => self.action_animation(action, io),
            BattleActionState::AnimationReflect => self.action_animation_reflect(action),
            BattleActionState::Apply => self.action_apply(action, io),
            BattleActionState::Finished => self.action_finished(action),
        }
    }

    fn set_action_state(&mut self, state: BattleActionState) {
        tracing::trace!("battle action {:?} -> {:?}", self.action_state, state);
        self.action_state = state;
    }

    fn action_begin(&mut self, action: &mut Algorithm) -> BattleActionReturn {
        let active = self.game.roster.active_ids();
        for id in &active {
            let db = &self.game.database;
            if let Some(battler) = self.game.roster.battler_mut(*id) {
                for state in battler.battle_state_heal(db) {
                    tracing::debug!("{:?} recovered from state {}", id, state);
                }
            }
        }

        if self.combo_repeat == 1 {
            let message = action.start_message(&self.game.database);
            if !message.is_empty() {
                self.show_notification(&message);
                if action.is_skill() {
                    self.set_wait(15, 50);
                } else {
                    self.set_wait(10, 40);
                }
            }

            for id in active {
                let db = &self.game.database;
                let change = match self.game.roster.battler_mut(id) {
                    Some(battler) => battler.apply_conditions(db),
                    None => 0,
                };
                if change != 0 {
                    self.add_float_text(id, change.abs().to_string(), change > 0);
                }
            }
        }

        self.set_action_state(BattleActionState::StartAlgo);
        Continue
    }

    fn action_start_algo(&mut self, action: &mut Algorithm, io: &mut FrameIo<'_>) -> BattleActionReturn {
        let targets_party = action.is_targeting_party(&self.game.database);
        action.start(&mut self.game);

        if let (BattlerId::Actor(_), Some(target @ BattlerId::Enemy(_))) = (action.source, action.target()) {
            if !targets_party {
                let target_position = self.game.roster.battler(target).map(|b| b.position);
                if let (Some(position), Some(actor)) = (target_position, self.game.roster.battler_mut(action.source)) {
                    formation::face_target(actor, position);
                }
            }
        }

        if let Some(source) = self.game.roster.battler_mut(action.source) {
            let pose = action.source_pose().adjusted_for_direction(source.flip);
            if pose != Pose::Idle {
                source.set_pose(pose, ACTION_POSE_FRAMES);
            }
        }

        let target = action.target().map(super::hook_battler_ref).unwrap_or((-1, 0));
        self.trigger_battler_hook(HookKind::Targeting, action.source, [target.0, target.1, 0, 0], io);

        self.log.push(
            SceneEventType::ActionStarted { source: action.source },
            format!("{:?} starts {:?} (combo {})", action.source, action.kind, self.combo_repeat),
            self.frame,
        );
        self.set_action_state(BattleActionState::Animation);
        Continue
    }

    /// Show the action's animation over `targets`, with its sound
    fn play_action_animation(&mut self, action: &Algorithm, targets: Vec<BattlerId>, io: &mut FrameIo<'_>) {
        let animation_id = action.animation_id(&self.game.database);
        if animation_id == 0 {
            return;
        }
        let Some(animation) = self.game.database.animation(animation_id) else {
            tracing::warn!("BattleAction: Invalid animation ID {}", animation_id);
            return;
        };
        let frames = animation.frames;
        if let Some(se) = animation.se.clone() {
            io.audio.play_se(&se);
        }
        self.game.status.show_battle_animation(animation_id, targets, frames);
    }

    fn action_animation(&mut self, action: &mut Algorithm, io: &mut FrameIo<'_>) -> BattleActionReturn {
        self.play_action_animation(action, action.targets().to_vec(), io);

        if action.reflect_targets(&self.game) {
            self.set_action_state(BattleActionState::AnimationReflect);
        } else {
            self.set_action_state(BattleActionState::Apply);
        }
        Continue
    }

    fn action_animation_reflect(&mut self, action: &mut Algorithm) -> BattleActionReturn {
        let animation_id = action.animation_id(&self.game.database);
        if animation_id != 0 {
            let frames = self.game.database.animation(animation_id).map_or(1, |a| a.frames);
            let targets = action.reflect_target().into_iter().collect();
            self.game.status.show_battle_animation(animation_id, targets, frames);
        }
        self.set_action_state(BattleActionState::Apply);
        Continue
    }

    fn action_apply(&mut self, action: &mut Algorithm, io: &mut FrameIo<'_>) -> BattleActionReturn {
        if !action.is_current_target_valid(&self.game.roster) {
            self.set_action_state(BattleActionState::Finished);
            return Continue;
        }

        // Identical sounds across targets play once
        let mut sounds: Vec<SoundEffect> = Vec::new();
        let mut queue_se = |se: SoundEffect| {
            if !sounds.contains(&se) {
                sounds.push(se);
            }
        };

        loop {
            let Some(target) = action.target() else {
                break;
            };
            let was_dead = self.game.roster.battler(target).is_some_and(|b| b.is_dead());

            action.execute(&mut self.game);
            let added_states = action.apply(&mut self.game);

            if action.is_success() && action.affected_hp() < 0 {
                let kill_se = self.game.database.system_se(SystemSound::EnemyKill).clone();
                if let Some(battler) = self.game.roster.battler_mut(target) {
                    match target {
                        BattlerId::Enemy(_) => {
                            battler.set_blink_timer();
                            if !was_dead && battler.is_dead() {
                                io.audio.play_se(&kill_se);
                                battler.set_death_timer();
                            }
                        }
                        BattlerId::Actor(_) => battler.set_pose(Pose::Damage, DAMAGE_POSE_FRAMES),
                    }
                }
            }

            if action.is_success() {
                if action.is_critical_hit() {
                    let (red, green, blue, strength, frames) = CRITICAL_FLASH;
                    self.game.status.flash_once(red, green, blue, strength, frames);
                }
                if action.is_affect_hp() {
                    let hp = action.affected_hp();
                    if hp != 0 || !action.is_positive() {
                        self.add_float_text(target, hp.abs().to_string(), hp > 0);
                    }
                    if !action.is_positive() {
                        let sound = if target.is_ally() {
                            SystemSound::AllyDamage
                        } else {
                            SystemSound::EnemyDamage
                        };
                        queue_se(self.game.database.system_se(sound).clone());
                    }
                    let critical = i32::from(action.is_critical_hit());
                    self.trigger_battler_hook(HookKind::DamagePop, target, [hp, critical, 0, 0], io);
                }
            } else {
                queue_se(action.failure_se(&self.game.database));
                let miss = self.config.terms.miss.clone();
                self.add_float_text(target, miss, false);
            }

            for state in added_states {
                self.trigger_battler_hook(HookKind::SetState, target, [state, 0, 0, 0], io);
            }

            if !action.target_next() {
                break;
            }
        }

        for se in &sounds {
            io.audio.play_se(se);
        }
        self.set_wait(30, 30);

        if action.repeat_next() {
            self.set_action_state(BattleActionState::StartAlgo);
            return Continue;
        }

        let combo = self
            .game
            .roster
            .battler(action.source)
            .and_then(|b| b.combo.map(|combo| (b.last_battle_action, combo)));
        if let Some((last_action, combo)) = combo {
            if last_action == combo.command_id && combo.times > self.combo_repeat {
                self.combo_repeat += 1;
                self.set_action_state(BattleActionState::StartAlgo);
                return Continue;
            }
        }

        self.set_action_state(BattleActionState::Finished);
        Continue
    }

    fn action_finished(&mut self, action: &mut Algorithm) -> BattleActionReturn {
        self.set_wait(30, 30);
        self.combo_repeat = 1;
        action.process_post_action_switches(&mut self.game);
        Finished
    }
}
