//! Action choice for battlers nobody controls
//!
//! Enemies pick from their action list weighted by rating; actors on auto-battle
//! (or without player control) attack a random enemy. State restrictions override
//! both.

use rand::Rng;

use crate::battle::algorithm::Algorithm;
use crate::battle::state::GameState;
use crate::core::types::{BattlerId, Side};
use crate::data::{EnemyActionKind, Restriction, Scope};

/// Picks the next action of one battler
pub trait BattleAi {
    fn choose_action(&mut self, source: BattlerId, game: &mut GameState) -> Algorithm;
}

fn opposite(side: Side) -> Side {
    match side {
        Side::Ally => Side::Enemy,
        Side::Enemy => Side::Ally,
    }
}

/// Random living target matching a scope, seen from `source`
pub fn pick_for_scope(source: BattlerId, scope: Scope, game: &mut GameState) -> Option<BattlerId> {
    let side = match scope {
        Scope::SingleEnemy | Scope::AllEnemies => opposite(source.side()),
        Scope::SingleAlly | Scope::AllAllies => source.side(),
        Scope::User => return Some(source),
    };
    game.roster.random_active(side, &mut game.rng)
}

/// Action forced by the battler's most severe state, if any
pub fn restricted_action(source: BattlerId, game: &mut GameState) -> Option<Algorithm> {
    let restriction = game.roster.battler(source)?.restriction(&game.database);
    let side = match restriction {
        Restriction::Normal => return None,
        Restriction::DoNothing => return Some(Algorithm::none(source)),
        Restriction::AttackAlly => source.side(),
        Restriction::AttackEnemy => opposite(source.side()),
    };
    let action = match game.roster.random_active(side, &mut game.rng) {
        Some(target) => Algorithm::normal(source, target),
        None => Algorithm::none(source),
    };
    Some(action)
}

/// Weighted random choice over the enemy's usable actions
#[derive(Debug, Clone, Copy, Default)]
pub struct EnemyAi;

impl EnemyAi {
    fn build(source: BattlerId, kind: EnemyActionKind, game: &mut GameState) -> Algorithm {
        match kind {
            EnemyActionKind::Attack => match game.roster.random_active(Side::Ally, &mut game.rng) {
                Some(target) => Algorithm::normal(source, target),
                None => Algorithm::none(source),
            },
            EnemyActionKind::Defend => Algorithm::defend(source),
            EnemyActionKind::Skill(id) => {
                let scope = game.database.skill(id).map(|s| s.scope).unwrap_or_default();
                let pick = pick_for_scope(source, scope, game);
                let targets = Algorithm::targets_for_scope(&game.roster, source, scope, pick);
                if targets.is_empty() {
                    Algorithm::none(source)
                } else {
                    Algorithm::skill(source, id, targets)
                }
            }
            EnemyActionKind::Nothing => Algorithm::none(source),
        }
    }
}

impl BattleAi for EnemyAi {
    fn choose_action(&mut self, source: BattlerId, game: &mut GameState) -> Algorithm {
        let Some(enemy) = game.roster.battler(source) else {
            return Algorithm::none(source);
        };
        let Some(def) = game.database.enemy(enemy.db_id) else {
            tracing::warn!("EnemyAi: Invalid enemy ID {}", enemy.db_id);
            return Algorithm::none(source);
        };

        let sp = enemy.sp;
        let usable: Vec<(EnemyActionKind, i32)> = def
            .actions
            .iter()
            .filter(|a| a.rating > 0)
            .filter(|a| match a.kind {
                EnemyActionKind::Skill(id) => game.database.skill(id).is_some_and(|s| s.sp_cost <= sp),
                _ => true,
            })
            .map(|a| (a.kind, a.rating))
            .collect();

        let total: i32 = usable.iter().map(|(_, rating)| rating).sum();
        if total <= 0 {
            return Self::build(source, EnemyActionKind::Attack, game);
        }

        let mut roll = game.rng.gen_range(0..total);
        let mut chosen = EnemyActionKind::Nothing;
        for (kind, rating) in usable {
            if roll < rating {
                chosen = kind;
                break;
            }
            roll -= rating;
        }
        tracing::trace!("enemy {:?} chose {:?}", source, chosen);
        Self::build(source, chosen, game)
    }
}

/// Plain attacks on a random living enemy
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoBattleAi;

impl BattleAi for AutoBattleAi {
    fn choose_action(&mut self, source: BattlerId, game: &mut GameState) -> Algorithm {
        match game.roster.random_active(opposite(source.side()), &mut game.rng) {
            Some(target) => Algorithm::normal(source, target),
            None => Algorithm::none(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::algorithm::AlgorithmKind;
    use crate::battle::battler::Roster;
    use crate::data::{ActorDef, Database, EnemyAction, EnemyDef, Row, SkillDef, StateDef, Stats};
    use crate::event::{Troop, TroopMember};

    fn game(actions: Vec<EnemyAction>) -> GameState {
        let db = Database {
            actors: vec![ActorDef {
                id: 1,
                name: "Hero".into(),
                stats: Stats::default(),
                skills: vec![],
                commands: vec![],
                row: Row::Front,
                controllable: true,
                preemptive: false,
            }],
            enemies: vec![EnemyDef {
                id: 1,
                name: "Orc".into(),
                stats: Stats {
                    max_sp: 5,
                    ..Default::default()
                },
                exp: 0,
                gold: 0,
                drop_item: None,
                actions,
                preemptive: false,
            }],
            skills: vec![SkillDef {
                id: 9,
                name: "Quake".into(),
                sp_cost: 50,
                power: 40,
                scope: Scope::AllEnemies,
                heals: false,
                animation_id: 0,
                hit_rate: 100,
                add_states: vec![],
                remove_states: vec![],
                reflectable: false,
                switch_on: None,
                subset: 0,
            }],
            states: vec![StateDef {
                id: 3,
                name: "Berserk".into(),
                restriction: Restriction::AttackAlly,
                hp_change: 0,
                auto_release_turns: 0,
                reflect: false,
                priority: 5,
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
        GameState {
            roster: Roster::new(&db, &[1], &troop),
            database: db,
            ..Default::default()
        }
    }

    #[test]
    fn test_unaffordable_skill_never_chosen() {
        let mut game = game(vec![
            EnemyAction {
                kind: EnemyActionKind::Skill(9),
                rating: 10,
            },
            EnemyAction {
                kind: EnemyActionKind::Defend,
                rating: 1,
            },
        ]);
        for _ in 0..20 {
            let action = EnemyAi.choose_action(BattlerId::Enemy(0), &mut game);
            assert_eq!(action.kind, AlgorithmKind::Defend);
        }
    }

    #[test]
    fn test_empty_action_list_attacks() {
        let mut game = game(vec![]);
        let action = EnemyAi.choose_action(BattlerId::Enemy(0), &mut game);
        assert_eq!(action.kind, AlgorithmKind::Normal);
        assert_eq!(action.target(), Some(BattlerId::Actor(1)));
    }

    #[test]
    fn test_berserk_attacks_own_side() {
        let mut game = game(vec![]);
        let db = game.database.clone();
        game.roster.enemies[0].add_state(3, &db);
        let action = restricted_action(BattlerId::Enemy(0), &mut game);
        assert_eq!(action.and_then(|a| a.target()), Some(BattlerId::Enemy(0)));

        assert!(restricted_action(BattlerId::Actor(1), &mut game).is_none());
    }

    #[test]
    fn test_auto_battle_targets_enemy() {
        let mut game = game(vec![]);
        let action = AutoBattleAi.choose_action(BattlerId::Actor(1), &mut game);
        assert_eq!(action.target(), Some(BattlerId::Enemy(0)));
    }
}
