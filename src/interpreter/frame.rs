//! Execution frames and their serializable snapshot

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::event::{Instruction, OwnerTag};

/// Branch index meaning "an option at this indent already ran"
pub const SUBCOMMAND_SENTINEL: i32 = 255;

/// Branch index of the else arm
pub const BRANCH_ELSE: i32 = 1;

/// One running program on the interpreter stack
#[derive(Debug, Clone)]
pub struct ExecutionFrame {
    pub owner_tag: OwnerTag,
    program: Rc<[Instruction]>,
    /// Next instruction; equal to the program length once the frame is done
    pub cursor: usize,
    branch_choices: Vec<(i32, i32)>,
}

impl ExecutionFrame {
    pub fn new(program: Rc<[Instruction]>, owner_tag: OwnerTag) -> Self {
        Self {
            owner_tag,
            program,
            cursor: 0,
            branch_choices: Vec::new(),
        }
    }

    pub fn program(&self) -> &Rc<[Instruction]> {
        &self.program
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.program.len()
    }

    pub fn current(&self) -> Option<&Instruction> {
        self.program.get(self.cursor)
    }

    pub fn subcommand_index(&self, indent: i32) -> i32 {
        self.branch_choices
            .iter()
            .find(|(i, _)| *i == indent)
            .map(|(_, choice)| *choice)
            .unwrap_or(SUBCOMMAND_SENTINEL)
    }

    pub fn set_subcommand_index(&mut self, indent: i32, choice: i32) {
        match self.branch_choices.iter_mut().find(|(i, _)| *i == indent) {
            Some(entry) => entry.1 = choice,
            None => {
                self.branch_choices.push((indent, choice));
                self.branch_choices.sort_by_key(|(i, _)| *i);
            }
        }
    }

    pub fn snapshot(&self) -> FrameSnapshot {
        FrameSnapshot {
            owner_tag: self.owner_tag,
            cursor: self.cursor as i32,
            branch_choices: self.branch_choices.clone(),
        }
    }

    /// Rebuild a frame from a snapshot against already-resolved instructions
    pub fn restore(snapshot: &FrameSnapshot, program: Rc<[Instruction]>) -> Self {
        let cursor = (snapshot.cursor.max(0) as usize).min(program.len());
        Self {
            owner_tag: snapshot.owner_tag,
            program,
            cursor,
            branch_choices: snapshot.branch_choices.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    pub owner_tag: OwnerTag,
    pub cursor: i32,
    #[serde(default)]
    pub branch_choices: Vec<(i32, i32)>,
}

impl FrameSnapshot {
    /// Empty frame stored for idle parallel events
    pub fn placeholder() -> Self {
        Self::default()
    }

    pub fn is_placeholder(&self) -> bool {
        self.owner_tag == OwnerTag::SYNTHETIC && self.cursor == 0 && self.branch_choices.is_empty()
    }
}

/// Serializable interpreter state; an empty stack means "not running"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    #[serde(default)]
    pub stack: Vec<FrameSnapshot>,
    #[serde(default)]
    pub wait_frames: i32,
}

impl ExecutionSnapshot {
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
