//! Instruction set of event programs

use serde::{Deserialize, Serialize};

/// Fixed command table shared by both dialects
///
/// Names deserialize in snake_case. Anything the table does not know becomes
/// `Unsupported`, which the interpreter logs and steps over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Opcode {
    // Base dialect
    Comment,
    ShowMessage,
    ControlSwitches,
    ControlVariables,
    ConditionalBranch,
    ElseBranch,
    EndBranch,
    Loop,
    BreakLoop,
    EndLoop,
    Label,
    JumpToLabel,
    Wait,
    CallEvent,
    PlaySound,
    /// Loads a picture asynchronously before showing it
    ShowPicture,
    EndEventProcessing,

    // Battle dialect
    CallCommonEvent,
    ForceFlee,
    EnableCombo,
    ChangeMonsterHp,
    ChangeMonsterMp,
    ChangeMonsterCondition,
    ShowHiddenMonster,
    ChangeBattleBackground,
    ShowBattleAnimation,
    TerminateBattle,
    ConditionalBranchBattle,
    ElseBranchBattle,
    EndBranchBattle,
    ControlBattleHooks,

    #[serde(other)]
    Unsupported,
}

impl Opcode {
    /// Commands only the battle interpreter understands
    pub fn is_battle_only(&self) -> bool {
        matches!(
            self,
            Opcode::CallCommonEvent
                | Opcode::ForceFlee
                | Opcode::EnableCombo
                | Opcode::ChangeMonsterHp
                | Opcode::ChangeMonsterMp
                | Opcode::ChangeMonsterCondition
                | Opcode::ShowHiddenMonster
                | Opcode::ChangeBattleBackground
                | Opcode::ShowBattleAnimation
                | Opcode::TerminateBattle
                | Opcode::ConditionalBranchBattle
                | Opcode::ElseBranchBattle
                | Opcode::EndBranchBattle
                | Opcode::ControlBattleHooks
        )
    }
}

/// One line of an event program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    #[serde(default)]
    pub indent: i32,
    #[serde(default)]
    pub params: Vec<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Instruction {
    pub fn new(opcode: Opcode, indent: i32, params: impl Into<Vec<i32>>) -> Self {
        Self {
            opcode,
            indent,
            params: params.into(),
            text: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Parameter `i`, or 0 when the instruction is shorter
    pub fn param(&self, i: usize) -> i32 {
        self.params.get(i).copied().unwrap_or(0)
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}
