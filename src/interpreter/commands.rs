//! Base command table

use std::ops::RangeInclusive;

use rand::Rng;

use crate::data::SoundEffect;
use crate::event::{Instruction, Opcode};
use crate::interpreter::frame::BRANCH_ELSE;
use crate::interpreter::{AsyncOp, Env, Interpreter, SUBCOMMAND_SENTINEL};
use crate::platform::AssetKind;

/// Relational operators shared by every conditional branch
pub fn compare(op: i32, lhs: i32, rhs: i32) -> bool {
    match op {
        0 => lhs == rhs,
        1 => lhs >= rhs,
        2 => lhs <= rhs,
        3 => lhs > rhs,
        4 => lhs < rhs,
        5 => lhs != rhs,
        _ => {
            tracing::warn!("Unknown comparison operator {}", op);
            false
        }
    }
}

/// Intersect a 1-based target range with the storage, warning once for the overflow
fn clamp_targets(command: &str, start: i32, end: i32, len: usize) -> RangeInclusive<i32> {
    let last = i32::try_from(len).unwrap_or(i32::MAX);
    if start <= end && (start < 1 || end > last) {
        tracing::warn!("{}: target range {}..={} exceeds 1..={}", command, start, end, last);
    }
    start.max(1)..=end.min(last)
}

impl Interpreter {
    /// Execute one instruction with the base table; returns whether to advance
    pub fn execute_base(&mut self, env: &mut Env<'_>, inst: &Instruction) -> bool {
        match inst.opcode {
            Opcode::Comment | Opcode::Label | Opcode::Loop | Opcode::EndBranch => true,
            Opcode::ShowMessage => {
                env.game.message.show(inst.text());
                true
            }
            Opcode::ControlSwitches => self.command_control_switches(env, inst),
            Opcode::ControlVariables => self.command_control_variables(env, inst),
            Opcode::ConditionalBranch => self.command_conditional_branch(env, inst),
            Opcode::ElseBranch => self.option_generic(inst, BRANCH_ELSE, &[Opcode::EndBranch]),
            Opcode::BreakLoop => self.command_break_loop(inst),
            Opcode::EndLoop => self.command_end_loop(inst),
            Opcode::JumpToLabel => self.command_jump_to_label(inst),
            Opcode::Wait => {
                self.set_wait_tenths(inst.param(0));
                true
            }
            Opcode::CallEvent => self.command_call_event(env, inst),
            Opcode::PlaySound => {
                let se = SoundEffect {
                    name: inst.text().to_string(),
                    volume: if inst.params.is_empty() { 100 } else { inst.param(0) },
                    tempo: if inst.params.len() < 2 { 100 } else { inst.param(1) },
                };
                env.audio.play_se(&se);
                true
            }
            Opcode::ShowPicture => self.command_show_picture(env, inst),
            Opcode::EndEventProcessing => {
                if let Some(frame) = self.top_frame_mut() {
                    frame.cursor = frame.program().len();
                }
                false
            }
            other if other.is_battle_only() => {
                tracing::debug!("Battle command {:?} skipped outside battle", other);
                true
            }
            other => {
                tracing::warn!("Unsupported command {:?} (indent {})", other, inst.indent);
                true
            }
        }
    }

    fn command_control_switches(&mut self, env: &mut Env<'_>, inst: &Instruction) -> bool {
        let (start, end) = match inst.param(0) {
            0 => (inst.param(1), inst.param(1)),
            1 => (inst.param(1), inst.param(2)),
            2 => {
                let id = env.game.variables.get(inst.param(1));
                (id, id)
            }
            mode => {
                tracing::warn!("ControlSwitches: unknown target mode {}", mode);
                return true;
            }
        };

        for id in clamp_targets("ControlSwitches", start, end, env.game.switches.len()) {
            match inst.param(3) {
                0 => env.game.switches.set(id, true),
                1 => env.game.switches.set(id, false),
                _ => env.game.switches.flip(id),
            }
        }
        true
    }

    fn command_control_variables(&mut self, env: &mut Env<'_>, inst: &Instruction) -> bool {
        let value = match inst.param(4) {
            0 => inst.param(5),
            1 => env.game.variables.get(inst.param(5)),
            2 => {
                let (a, b) = (inst.param(5), inst.param(6));
                env.game.rng.gen_range(a.min(b)..=a.max(b))
            }
            operand => {
                tracing::warn!("ControlVariables: unknown operand {}", operand);
                return true;
            }
        };

        let (start, end) = match inst.param(0) {
            0 => (inst.param(1), inst.param(1)),
            1 => (inst.param(1), inst.param(2)),
            2 => {
                let id = env.game.variables.get(inst.param(1));
                (id, id)
            }
            mode => {
                tracing::warn!("ControlVariables: unknown target mode {}", mode);
                return true;
            }
        };

        for id in clamp_targets("ControlVariables", start, end, env.game.variables.len()) {
            let current = env.game.variables.get(id);
            let result = match inst.param(3) {
                0 => value,
                1 => current.saturating_add(value),
                2 => current.saturating_sub(value),
                3 => current.saturating_mul(value),
                4 if value != 0 => current / value,
                5 if value != 0 => current % value,
                _ => current,
            };
            env.game.variables.set(id, result);
        }
        true
    }

    fn command_conditional_branch(&mut self, env: &mut Env<'_>, inst: &Instruction) -> bool {
        let result = match inst.param(0) {
            0 => env.game.switches.get(inst.param(1)) == (inst.param(2) == 0),
            1 => {
                let lhs = env.game.variables.get(inst.param(1));
                let rhs = if inst.param(2) == 0 {
                    inst.param(3)
                } else {
                    env.game.variables.get(inst.param(3))
                };
                compare(inst.param(4), lhs, rhs)
            }
            kind => {
                tracing::warn!("ConditionalBranch: branch {} unsupported", kind);
                false
            }
        };

        let mut sub_idx = SUBCOMMAND_SENTINEL;
        let mut advance = true;
        if !result {
            sub_idx = BRANCH_ELSE;
            advance = self.skip_to_next_conditional(&[Opcode::ElseBranch, Opcode::EndBranch], inst.indent);
        }
        self.set_subcommand_index(inst.indent, sub_idx);
        advance
    }

    fn command_break_loop(&mut self, inst: &Instruction) -> bool {
        let Some(frame) = self.top_frame_mut() else {
            return true;
        };
        let program = std::rc::Rc::clone(frame.program());
        let target = program
            .iter()
            .enumerate()
            .skip(frame.cursor + 1)
            .find(|(_, i)| i.opcode == Opcode::EndLoop && i.indent < inst.indent)
            .map(|(index, _)| index);

        match target {
            // Land on the EndLoop and step past it
            Some(index) => {
                frame.cursor = index;
                true
            }
            None => {
                frame.cursor = program.len();
                false
            }
        }
    }

    fn command_end_loop(&mut self, inst: &Instruction) -> bool {
        let Some(frame) = self.top_frame_mut() else {
            return true;
        };
        let program = std::rc::Rc::clone(frame.program());
        let start = program[..frame.cursor]
            .iter()
            .rposition(|i| i.opcode == Opcode::Loop && i.indent == inst.indent);

        match start {
            Some(index) => frame.cursor = index,
            None => tracing::warn!("EndLoop without matching Loop at indent {}", inst.indent),
        }
        true
    }

    fn command_jump_to_label(&mut self, inst: &Instruction) -> bool {
        let label = inst.param(0);
        let Some(frame) = self.top_frame_mut() else {
            return true;
        };
        match frame
            .program()
            .iter()
            .position(|i| i.opcode == Opcode::Label && i.param(0) == label)
        {
            Some(index) => frame.cursor = index,
            None => tracing::warn!("JumpToLabel: label {} not found", label),
        }
        true
    }

    fn command_call_event(&mut self, env: &mut Env<'_>, inst: &Instruction) -> bool {
        let id = inst.param(0);
        match env.store.common_event(id) {
            Some(event) => self.push_common_event(event),
            None => tracing::warn!("CallEvent: Can't call invalid common event {}", id),
        }
        true
    }

    fn command_show_picture(&mut self, env: &mut Env<'_>, inst: &Instruction) -> bool {
        let name = inst.text().to_string();
        let request = env.assets.request(AssetKind::Picture, &name);
        env.game.status.show_picture(inst.param(0), &name);

        if !env.assets.is_ready(request) {
            self.set_async_op(AsyncOp::LoadAsset {
                request,
                kind: AssetKind::Picture,
                name,
            });
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_operators() {
        assert!(compare(0, 3, 3));
        assert!(compare(1, 4, 3));
        assert!(compare(2, 3, 3));
        assert!(compare(3, 4, 3));
        assert!(compare(4, 2, 3));
        assert!(compare(5, 2, 3));
        assert!(!compare(5, 3, 3));
        assert!(!compare(9, 3, 3));
    }

    #[test]
    fn test_target_range_clamped_to_storage() {
        assert_eq!(clamp_targets("t", 1, i32::MAX, 50), 1..=50);
        assert_eq!(clamp_targets("t", i32::MIN, 3, 50), 1..=3);
        assert_eq!(clamp_targets("t", 7, 7, 50), 7..=7);
        assert!(clamp_targets("t", 60, 70, 50).is_empty());
        assert!(clamp_targets("t", 9, 2, 50).is_empty());
    }
}
