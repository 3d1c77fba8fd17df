//! Event Program Store
//!
//! Scripted instruction sequences (common events and troop pages), the trigger
//! conditions attached to troop pages, and the runtime wrapper for common events.

pub mod command;
pub mod common;
pub mod program;

pub use command::{Instruction, Opcode};
pub use common::CommonEvent;
pub use program::{
    ConditionFlags, ConditionKind, EventProgram, GuardSwitch, OwnerTag, PageCondition,
    ProgramStore, Trigger, Troop, TroopMember, TroopPage,
};
