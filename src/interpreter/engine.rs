//! Frame stack, dispatch loop and branch bookkeeping

use std::rc::Rc;

use crate::core::config::BattleConfig;
use crate::event::{EventProgram, Instruction, Opcode, OwnerTag, ProgramStore};
use crate::interpreter::frame::{ExecutionFrame, ExecutionSnapshot, SUBCOMMAND_SENTINEL};
use crate::interpreter::{AsyncOp, Dialect, Env};

const DEFAULT_LOOP_LIMIT: u32 = 10_000;
const DEFAULT_FPS: i32 = 60;

#[derive(Debug, Clone)]
pub struct Interpreter {
    stack: Vec<ExecutionFrame>,
    async_op: AsyncOp,
    wait_frames: i32,
    yield_requested: bool,
    loop_limit: u32,
    frames_per_second: i32,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self {
            stack: Vec::new(),
            async_op: AsyncOp::None,
            wait_frames: 0,
            yield_requested: false,
            loop_limit: DEFAULT_LOOP_LIMIT,
            frames_per_second: DEFAULT_FPS,
        }
    }
}

impl Interpreter {
    pub fn new(config: &BattleConfig) -> Self {
        Self {
            loop_limit: config.interpreter_loop_limit,
            frames_per_second: config.frames_per_second,
            ..Default::default()
        }
    }

    /// Put a program on top of the stack, starting at its first instruction
    pub fn push(&mut self, program: Rc<[Instruction]>, owner_tag: OwnerTag) {
        tracing::debug!("push frame owner={} len={}", owner_tag.0, program.len());
        self.stack.push(ExecutionFrame::new(program, owner_tag));
    }

    pub fn push_common_event(&mut self, event: &EventProgram) {
        self.push(
            Rc::clone(&event.instructions),
            OwnerTag::for_common_event(event.id),
        );
    }

    pub fn is_running(&self) -> bool {
        !self.stack.is_empty()
    }

    pub fn is_async_pending(&self) -> bool {
        self.async_op != AsyncOp::None
    }

    pub fn async_op(&self) -> &AsyncOp {
        &self.async_op
    }

    /// A `Wait` command is still counting down
    pub fn is_waiting(&self) -> bool {
        self.wait_frames > 0
    }

    pub fn frames(&self) -> &[ExecutionFrame] {
        &self.stack
    }

    /// Drop every frame and any pending suspension
    pub fn clear(&mut self) {
        self.stack.clear();
        self.async_op = AsyncOp::None;
        self.wait_frames = 0;
        self.yield_requested = false;
    }

    pub fn retain_frames(&mut self, keep: impl FnMut(&ExecutionFrame) -> bool) {
        self.stack.retain(keep);
    }

    pub fn save_state(&self) -> ExecutionSnapshot {
        ExecutionSnapshot {
            stack: self.stack.iter().map(ExecutionFrame::snapshot).collect(),
            wait_frames: self.wait_frames,
        }
    }

    /// Replace the whole stack with a snapshot
    ///
    /// Frames whose owner no longer resolves are dropped with a warning.
    pub fn set_state(&mut self, snapshot: &ExecutionSnapshot, store: &ProgramStore) {
        self.clear();
        for frame in &snapshot.stack {
            match store.resolve(frame.owner_tag) {
                Some(program) => self.stack.push(ExecutionFrame::restore(frame, program)),
                None => tracing::warn!(
                    "SetState: dropping frame with unresolvable owner {}",
                    frame.owner_tag.0
                ),
            }
        }
        self.wait_frames = snapshot.wait_frames.max(0);
    }

    /// Run instructions until the stack empties or something suspends execution
    ///
    /// With `allow_suspend == false` a pending asset load and a running wait are
    /// considered finished, so the owner can force progress after a resource arrived.
    pub fn update(&mut self, env: &mut Env<'_>, dialect: &mut dyn Dialect, allow_suspend: bool) {
        if !allow_suspend {
            if let AsyncOp::LoadAsset { .. } = self.async_op {
                self.async_op = AsyncOp::None;
            }
            self.wait_frames = 0;
        }

        if self.is_async_pending() {
            return;
        }

        if self.wait_frames > 0 {
            self.wait_frames -= 1;
            return;
        }

        let mut executed: u32 = 0;
        while let Some(top) = self.stack.last() {
            if env.game.message.is_active() {
                break;
            }

            if top.is_complete() {
                tracing::trace!("pop frame owner={}", top.owner_tag.0);
                self.stack.pop();
                continue;
            }

            if executed >= self.loop_limit {
                tracing::warn!(
                    "Interpreter executed {} commands without waiting, yielding to the next frame",
                    executed
                );
                break;
            }
            executed += 1;

            let depth = self.stack.len();
            let cursor = top.cursor;
            let program = Rc::clone(top.program());
            let inst = &program[cursor];
            tracing::trace!("exec {:?} indent={} at {}", inst.opcode, inst.indent, cursor);

            let advance = match dialect.execute(self, env, inst) {
                Some(advance) => advance,
                None => self.execute_base(env, inst),
            };

            if advance && self.stack.len() >= depth {
                self.stack[depth - 1].cursor += 1;
            }

            if self.is_async_pending() || self.wait_frames > 0 {
                break;
            }
            if std::mem::take(&mut self.yield_requested) {
                break;
            }
        }
    }

    // === FRAME ACCESS FOR HANDLERS ===

    pub(crate) fn top_frame_mut(&mut self) -> Option<&mut ExecutionFrame> {
        self.stack.last_mut()
    }

    pub(crate) fn set_async_op(&mut self, op: AsyncOp) {
        self.async_op = op;
    }

    pub(crate) fn set_wait_tenths(&mut self, tenths: i32) {
        let frames = tenths.max(0) * self.frames_per_second / 10;
        if frames == 0 {
            self.yield_requested = true;
        }
        self.wait_frames = frames;
    }

    pub(crate) fn set_wait_frames(&mut self, frames: i32) {
        self.wait_frames = frames.max(0);
    }

    pub fn subcommand_index(&self, indent: i32) -> i32 {
        self.stack
            .last()
            .map(|f| f.subcommand_index(indent))
            .unwrap_or(SUBCOMMAND_SENTINEL)
    }

    pub fn set_subcommand_index(&mut self, indent: i32, choice: i32) {
        if let Some(frame) = self.stack.last_mut() {
            frame.set_subcommand_index(indent, choice);
        }
    }

    /// Move the cursor forward to the first of `codes` at `indent` or shallower
    ///
    /// Deeper instructions are stepped over without inspection. The cursor lands on
    /// the terminator (or the end of the program), so the caller must not advance.
    pub fn skip_to_next_conditional(&mut self, codes: &[Opcode], indent: i32) -> bool {
        if let Some(frame) = self.stack.last_mut() {
            let program = Rc::clone(frame.program());
            let mut index = frame.cursor + 1;
            while index < program.len() {
                let inst = &program[index];
                if inst.indent <= indent && codes.contains(&inst.opcode) {
                    break;
                }
                index += 1;
            }
            frame.cursor = index;
        }
        false
    }

    /// Shared body of else-style options
    ///
    /// Runs the option when the branch at this indent chose it, otherwise skips to
    /// the next of `next`.
    pub fn option_generic(&mut self, inst: &Instruction, option: i32, next: &[Opcode]) -> bool {
        if self.subcommand_index(inst.indent) == option {
            self.set_subcommand_index(inst.indent, SUBCOMMAND_SENTINEL);
            true
        } else {
            self.skip_to_next_conditional(next, inst.indent)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::state::GameState;
    use crate::event::Troop;
    use crate::interpreter::BaseDialect;
    use crate::platform::{InstantAssets, SoundLog};

    fn program(list: Vec<Instruction>) -> Rc<[Instruction]> {
        list.into()
    }

    fn run(interp: &mut Interpreter, game: &mut GameState) {
        let store = ProgramStore::new(vec![], Troop::default());
        let mut audio = SoundLog::new();
        let mut assets = InstantAssets::default();
        let mut env = Env::new(&store, game, &mut audio, &mut assets);
        interp.update(&mut env, &mut BaseDialect, true);
    }

    #[test]
    fn test_drains_program_and_pops() {
        let mut interp = Interpreter::default();
        let mut game = GameState::default();
        interp.push(
            program(vec![
                Instruction::new(Opcode::ControlSwitches, 0, [0, 3, 3, 0]),
                Instruction::new(Opcode::ControlVariables, 0, [0, 2, 2, 0, 0, 42, 0]),
            ]),
            OwnerTag(-1),
        );

        run(&mut interp, &mut game);

        assert!(!interp.is_running());
        assert!(interp.save_state().is_empty());
        assert!(game.switches.get(3));
        assert_eq!(game.variables.get(2), 42);
    }

    #[test]
    fn test_wait_suspends_for_frames() {
        let mut interp = Interpreter::default();
        let mut game = GameState::default();
        // 0.1 s at 60 fps = 6 frames
        interp.push(
            program(vec![
                Instruction::new(Opcode::Wait, 0, [1]),
                Instruction::new(Opcode::ControlSwitches, 0, [0, 1, 1, 0]),
            ]),
            OwnerTag(-1),
        );

        run(&mut interp, &mut game);
        assert!(interp.is_waiting());
        for _ in 0..6 {
            run(&mut interp, &mut game);
            assert!(!game.switches.get(1));
        }
        run(&mut interp, &mut game);
        assert!(game.switches.get(1));
        assert!(!interp.is_running());
    }

    #[test]
    fn test_loop_limit_yields() {
        let mut config = BattleConfig::default();
        config.interpreter_loop_limit = 50;
        let mut interp = Interpreter::new(&config);
        let mut game = GameState::default();
        interp.push(
            program(vec![
                Instruction::new(Opcode::Loop, 0, []),
                Instruction::new(Opcode::ControlVariables, 1, [0, 1, 1, 1, 0, 1, 0]),
                Instruction::new(Opcode::EndLoop, 0, []),
            ]),
            OwnerTag(-1),
        );

        run(&mut interp, &mut game);
        assert!(interp.is_running());
        assert!(game.variables.get(1) > 0);
        assert!(game.variables.get(1) <= 50);
    }

    #[test]
    fn test_skip_lands_on_terminator() {
        let mut interp = Interpreter::default();
        interp.push(
            program(vec![
                Instruction::new(Opcode::ConditionalBranch, 0, []),
                Instruction::new(Opcode::EndBranch, 1, []),
                Instruction::new(Opcode::Comment, 1, []),
                Instruction::new(Opcode::ElseBranch, 0, []),
            ]),
            OwnerTag(-1),
        );

        assert!(!interp.skip_to_next_conditional(&[Opcode::ElseBranch, Opcode::EndBranch], 0));
        assert_eq!(interp.frames()[0].cursor, 3);
    }
}
