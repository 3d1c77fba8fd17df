//! External hook bridge slots
//!
//! One slot per hook category. Binding a slot again replaces the previous binding.

use serde::{Deserialize, Serialize};

/// Moments at which the scene calls out to a bound common event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    AtbIncrement,
    DamagePop,
    Targeting,
    SetState,
    StatChange,
}

impl HookKind {
    pub const ALL: [HookKind; 5] = [
        HookKind::AtbIncrement,
        HookKind::DamagePop,
        HookKind::Targeting,
        HookKind::SetState,
        HookKind::StatChange,
    ];

    pub fn from_index(index: i32) -> Option<Self> {
        usize::try_from(index).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Common event to run and the first variable receiving the hook arguments
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookBinding {
    pub common_event_id: i32,
    pub variable_start: i32,
}

impl HookBinding {
    pub fn is_bound(&self) -> bool {
        self.common_event_id > 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookTable {
    slots: [HookBinding; 5],
}

impl HookTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, kind: HookKind, common_event_id: i32, variable_start: i32) {
        self.slots[kind.slot()] = HookBinding {
            common_event_id,
            variable_start,
        };
    }

    pub fn get(&self, kind: HookKind) -> HookBinding {
        self.slots[kind.slot()]
    }

    /// Is this common event bound to any hook
    pub fn binds_common_event(&self, common_event_id: i32) -> bool {
        common_event_id > 0 && self.slots.iter().any(|b| b.common_event_id == common_event_id)
    }
}
