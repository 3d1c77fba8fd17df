//! Interpreter Engine
//!
//! A stack-of-frames machine that runs event programs cooperatively: one `update`
//! per frame, suspending on waits, open messages, and asynchronous asset loads.

pub mod commands;
pub mod engine;
pub mod frame;

use crate::battle::state::GameState;
use crate::core::types::BattleResult;
use crate::event::{Instruction, ProgramStore};
use crate::platform::{AssetKind, AssetLoader, AssetRequest, AudioSink};

pub use engine::Interpreter;
pub use frame::{
    ExecutionFrame, ExecutionSnapshot, FrameSnapshot, BRANCH_ELSE, SUBCOMMAND_SENTINEL,
};

/// Operation the interpreter is suspended on, for its owner to act upon
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AsyncOp {
    #[default]
    None,
    /// Waiting for an asset; resume with `allow_suspend = false` once it is ready
    LoadAsset {
        request: AssetRequest,
        kind: AssetKind,
        name: String,
    },
    /// A script asked to end the battle
    TerminateBattle(BattleResult),
}

/// Everything a handler may touch while executing
pub struct Env<'a> {
    pub store: &'a ProgramStore,
    pub game: &'a mut GameState,
    pub audio: &'a mut dyn AudioSink,
    pub assets: &'a mut dyn AssetLoader,
}

impl<'a> Env<'a> {
    pub fn new(
        store: &'a ProgramStore,
        game: &'a mut GameState,
        audio: &'a mut dyn AudioSink,
        assets: &'a mut dyn AssetLoader,
    ) -> Self {
        Self {
            store,
            game,
            audio,
            assets,
        }
    }
}

/// A command table layered over the base one
///
/// `execute` returns `Some(advance)` for instructions it owns and `None` to fall
/// through to the base table.
pub trait Dialect {
    fn execute(
        &mut self,
        interp: &mut Interpreter,
        env: &mut Env<'_>,
        inst: &Instruction,
    ) -> Option<bool>;
}

/// Base command table only
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseDialect;

impl Dialect for BaseDialect {
    fn execute(
        &mut self,
        _interp: &mut Interpreter,
        _env: &mut Env<'_>,
        _inst: &Instruction,
    ) -> Option<bool> {
        None
    }
}
