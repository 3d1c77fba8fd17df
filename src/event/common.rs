//! Common event runtime
//!
//! Parallel common events own a private interpreter that restarts whenever it
//! finishes. Auto-start events are only reported as ready; the owner pushes them
//! into its main interpreter.

use crate::battle::state::Switches;
use crate::event::{EventProgram, ProgramStore, Trigger};
use crate::interpreter::{
    AsyncOp, Dialect, Env, ExecutionSnapshot, FrameSnapshot, Interpreter,
};

#[derive(Debug, Clone)]
pub struct CommonEvent {
    program: EventProgram,
    interpreter: Option<Interpreter>,
}

impl CommonEvent {
    pub fn new(program: &EventProgram) -> Self {
        let interpreter = (program.trigger == Trigger::Parallel
            && !program.instructions.is_empty())
        .then(|| {
            let mut interp = Interpreter::default();
            interp.push_common_event(program);
            interp
        });

        Self {
            program: program.clone(),
            interpreter,
        }
    }

    pub fn id(&self) -> i32 {
        self.program.id
    }

    pub fn interpreter(&self) -> Option<&Interpreter> {
        self.interpreter.as_ref()
    }

    /// Parallel event whose guard switch lets it run (or `force_run`)
    pub fn is_waiting_background_execution(&self, switches: &Switches, force_run: bool) -> bool {
        self.program.trigger == Trigger::Parallel
            && (force_run || self.program.guard_allows(switches))
    }

    /// Auto-start event that should take over the main interpreter
    pub fn is_waiting_foreground_execution(&self, switches: &Switches) -> bool {
        self.program.trigger == Trigger::AutoStart
            && self.program.guard_allows(switches)
            && !self.program.instructions.is_empty()
    }

    /// Step the parallel interpreter once
    ///
    /// `resume_async` means a previously reported asset is ready: the event runs
    /// even if its switch went off, without allowing the old suspension to hold it.
    pub fn update(&mut self, env: &mut Env<'_>, dialect: &mut dyn Dialect, resume_async: bool) -> AsyncOp {
        if !self.is_waiting_background_execution(&env.game.switches, resume_async) {
            return AsyncOp::None;
        }
        let Some(interp) = self.interpreter.as_mut() else {
            return AsyncOp::None;
        };

        if !interp.is_running() {
            interp.push_common_event(&self.program);
        }
        interp.update(env, dialect, !resume_async);

        if interp.is_async_pending() {
            return interp.async_op().clone();
        }
        AsyncOp::None
    }

    /// Execution state as persisted; idle parallel events store one empty frame
    pub fn save_state(&self) -> ExecutionSnapshot {
        let mut state = self
            .interpreter
            .as_ref()
            .map(Interpreter::save_state)
            .unwrap_or_default();
        if self.program.trigger == Trigger::Parallel && state.stack.is_empty() {
            state.stack.push(FrameSnapshot::placeholder());
        }
        state
    }

    /// Load a persisted state; empty and placeholder stacks leave the event as is
    pub fn load_state(&mut self, snapshot: &ExecutionSnapshot, store: &ProgramStore) {
        match snapshot.stack.first() {
            Some(first) if !first.is_placeholder() => {
                self.interpreter
                    .get_or_insert_with(Interpreter::default)
                    .set_state(snapshot, store);
            }
            _ => {}
        }
    }
}
