//! Troop page trigger evaluation
//!
//! A page runs when every category flagged in its condition holds. Pages with no
//! flag at all never run.

use crate::battle::state::GameState;
use crate::core::types::BattlerId;
use crate::event::{ConditionKind, PageCondition};

/// Turn window check shared by party, enemy and actor turn conditions
///
/// `multiple == 0` matches exactly turn `start`; otherwise every `multiple` turns
/// from `start` on.
pub fn check_turns(turns: i32, multiple: i32, start: i32) -> bool {
    if multiple > 0 {
        turns >= start && (turns - start) % multiple == 0
    } else {
        turns == start
    }
}

fn percent_in_window(hp_percent: i32, min: i32, max: i32) -> bool {
    hp_percent >= min && hp_percent <= max
}

/// Short-circuit AND over every flagged category
///
/// `source` is the battler whose action triggered the check, if any. Enemy/actor
/// turn and command conditions only exist in the 2k3 dialect.
pub fn are_conditions_met(
    condition: &PageCondition,
    game: &GameState,
    source: Option<BattlerId>,
    rpg2k3: bool,
) -> bool {
    let flags = condition.flags;
    if flags.is_empty() {
        return false;
    }

    if flags.contains(ConditionKind::SwitchA) && !game.switches.get(condition.switch_a_id) {
        return false;
    }

    if flags.contains(ConditionKind::SwitchB) && !game.switches.get(condition.switch_b_id) {
        return false;
    }

    if flags.contains(ConditionKind::Variable)
        && game.variables.get(condition.variable_id) < condition.variable_value
    {
        return false;
    }

    let roster = &game.roster;
    if flags.contains(ConditionKind::Turn)
        && !check_turns(roster.turns, condition.turn_b, condition.turn_a)
    {
        return false;
    }

    if rpg2k3 && flags.contains(ConditionKind::TurnEnemy) {
        let Some(enemy) = roster.enemy(condition.turn_enemy_id) else {
            tracing::warn!("AreConditionsMet: Invalid enemy ID {}", condition.turn_enemy_id);
            return false;
        };
        if source.is_some_and(|s| s != enemy.id) {
            return false;
        }
        if !check_turns(enemy.battle_turn, condition.turn_enemy_b, condition.turn_enemy_a) {
            return false;
        }
    }

    if rpg2k3 && flags.contains(ConditionKind::TurnActor) {
        let Some(actor) = roster.actor(condition.turn_actor_id) else {
            tracing::warn!("AreConditionsMet: Invalid actor ID {}", condition.turn_actor_id);
            return false;
        };
        if source.is_some_and(|s| s != actor.id) {
            return false;
        }
        if !check_turns(actor.battle_turn, condition.turn_actor_b, condition.turn_actor_a) {
            return false;
        }
    }

    if rpg2k3
        && flags.contains(ConditionKind::Fatigue)
        && !percent_in_window(roster.fatigue(), condition.fatigue_min, condition.fatigue_max)
    {
        return false;
    }

    if flags.contains(ConditionKind::EnemyHp) {
        let Some(enemy) = roster.enemy(condition.enemy_id) else {
            tracing::warn!("AreConditionsMet: Invalid enemy ID {}", condition.enemy_id);
            return false;
        };
        if !percent_in_window(enemy.hp_percent(), condition.enemy_hp_min, condition.enemy_hp_max) {
            return false;
        }
    }

    if flags.contains(ConditionKind::ActorHp) {
        let Some(actor) = roster.actor(condition.actor_id) else {
            tracing::warn!("AreConditionsMet: Invalid actor ID {}", condition.actor_id);
            return false;
        };
        if !percent_in_window(actor.hp_percent(), condition.actor_hp_min, condition.actor_hp_max) {
            return false;
        }
    }

    if rpg2k3 && flags.contains(ConditionKind::CommandActor) {
        let Some(source) = source else {
            return false;
        };
        let Some(actor) = roster.actor(condition.command_actor_id) else {
            tracing::warn!("AreConditionsMet: Invalid actor ID {}", condition.command_actor_id);
            return false;
        };
        if source != actor.id || actor.last_battle_action != condition.command_id {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::battler::Roster;
    use crate::data::{ActorDef, Database, EnemyDef, Row, Stats};
    use crate::event::{ConditionFlags, Troop, TroopMember};

    fn game() -> GameState {
        let db = Database {
            actors: vec![ActorDef {
                id: 1,
                name: "Alex".into(),
                stats: Stats::default(),
                skills: vec![],
                commands: vec![],
                row: Row::Front,
                controllable: true,
                preemptive: false,
            }],
            enemies: vec![EnemyDef {
                id: 1,
                name: "Slime".into(),
                stats: Stats::default(),
                exp: 0,
                gold: 0,
                drop_item: None,
                actions: vec![],
                preemptive: false,
            }],
            ..Default::default()
        };
        let troop = Troop {
            members: vec![TroopMember {
                enemy_id: 1,
                position: Default::default(),
                hidden: false,
            }],
            ..Default::default()
        };
        let roster = Roster::new(&db, &[1], &troop);
        GameState {
            roster,
            database: db,
            ..Default::default()
        }
    }

    #[test]
    fn test_check_turns() {
        assert!(check_turns(3, 0, 3));
        assert!(!check_turns(4, 0, 3));
        assert!(check_turns(2, 3, 2));
        assert!(check_turns(5, 3, 2));
        assert!(!check_turns(6, 3, 2));
        assert!(!check_turns(1, 3, 2));
    }

    #[test]
    fn test_empty_flags_never_met() {
        let game = game();
        assert!(!are_conditions_met(&PageCondition::default(), &game, None, true));
    }

    #[test]
    fn test_switch_and_variable() {
        let mut game = game();
        let condition = PageCondition {
            flags: ConditionFlags::empty()
                .with(ConditionKind::SwitchA)
                .with(ConditionKind::Variable),
            switch_a_id: 2,
            variable_id: 5,
            variable_value: 10,
            ..Default::default()
        };
        assert!(!are_conditions_met(&condition, &game, None, true));
        game.switches.set(2, true);
        game.variables.set(5, 9);
        assert!(!are_conditions_met(&condition, &game, None, true));
        game.variables.set(5, 10);
        assert!(are_conditions_met(&condition, &game, None, true));
    }

    #[test]
    fn test_enemy_turn_requires_matching_source() {
        let mut game = game();
        game.roster.enemies[0].battle_turn = 1;
        let condition = PageCondition {
            flags: ConditionFlags::empty().with(ConditionKind::TurnEnemy),
            turn_enemy_id: 0,
            turn_enemy_a: 1,
            ..Default::default()
        };
        assert!(are_conditions_met(&condition, &game, None, true));
        assert!(are_conditions_met(&condition, &game, Some(BattlerId::Enemy(0)), true));
        assert!(!are_conditions_met(&condition, &game, Some(BattlerId::Actor(1)), true));
    }

    #[test]
    fn test_command_actor_checks_last_action() {
        let mut game = game();
        let condition = PageCondition {
            flags: ConditionFlags::empty().with(ConditionKind::CommandActor),
            command_actor_id: 1,
            command_id: 4,
            ..Default::default()
        };
        assert!(!are_conditions_met(&condition, &game, None, true));
        if let Some(actor) = game.roster.actor_mut(1) {
            actor.last_battle_action = 4;
        }
        assert!(are_conditions_met(&condition, &game, Some(BattlerId::Actor(1)), true));
    }

    #[test]
    fn test_enemy_hp_window() {
        let mut game = game();
        game.roster.enemies[0].hp = 30;
        let condition = PageCondition {
            flags: ConditionFlags::empty().with(ConditionKind::EnemyHp),
            enemy_id: 0,
            enemy_hp_min: 0,
            enemy_hp_max: 50,
            ..Default::default()
        };
        assert!(are_conditions_met(&condition, &game, None, false));
        game.roster.enemies[0].hp = 51;
        assert!(!are_conditions_met(&condition, &game, None, false));
    }
}
