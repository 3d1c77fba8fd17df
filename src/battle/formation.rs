//! Formation rules - placement, facing, and ATB seeding per battle condition
//!
//! Run once at battle start, and again whenever facing has to be recomputed.

use crate::battle::battler::{Battler, Roster};
use crate::battle::constants::{ROW_OFFSET, SCREEN_WIDTH};
use crate::battle::state::BattleCondition;
use crate::core::config::Placement;
use crate::core::types::{BattlerId, Point};
use crate::data::{Database, Row};

const PARTY_BASE_X: i32 = 248;
const PARTY_BASE_Y: i32 = 88;
const PARTY_SPACING_Y: i32 = 24;

/// Downgrade conditions the layout cannot support
///
/// Pincers needs two visible enemies and surround two visible party members;
/// neither works with manual placement.
pub fn resolve_battle_condition(condition: BattleCondition, placement: Placement, roster: &Roster) -> BattleCondition {
    let manual = placement == Placement::Manual;
    let mut condition = condition;
    if condition == BattleCondition::Pincers && (manual || roster.visible_enemy_count() <= 1) {
        condition = BattleCondition::Back;
    }
    if condition == BattleCondition::Surround && (manual || roster.visible_party_count() <= 1) {
        condition = BattleCondition::Initiative;
    }
    condition
}

fn mirror(x: i32) -> i32 {
    SCREEN_WIDTH - x
}

/// Screen position of an actor by party index and row
pub fn actor_position(index: usize, row: Row, condition: BattleCondition) -> Point {
    let row_shift = match row {
        Row::Front => 0,
        Row::Back => ROW_OFFSET,
    };
    let x = PARTY_BASE_X + row_shift;
    let y = PARTY_BASE_Y + PARTY_SPACING_Y * index as i32;
    let x = match condition {
        BattleCondition::Back => mirror(x),
        BattleCondition::Surround if index & 1 == 1 => mirror(x),
        _ => x,
    };
    Point::new(x, y)
}

/// Screen position of an enemy from its troop slot
///
/// `index` is the visible index for visible enemies and the troop index for hidden ones.
pub fn enemy_position(troop_position: Point, index: usize, condition: BattleCondition) -> Point {
    let x = troop_position.x;
    let x = match condition {
        BattleCondition::Back => mirror(x),
        BattleCondition::Surround => SCREEN_WIDTH / 4 + x / 2,
        BattleCondition::Pincers if index & 1 == 0 => x / 2,
        BattleCondition::Pincers => mirror(x / 2),
        _ => x,
    };
    Point::new(x, troop_position.y)
}

/// Where a battler stands under `condition`, from its party slot or troop slot
pub fn battle_position(roster: &Roster, id: BattlerId, troop_positions: &[Point], condition: BattleCondition) -> Option<Point> {
    match id {
        BattlerId::Actor(actor_id) => {
            let index = roster.party.iter().position(|p| *p == actor_id)?;
            let row = roster.actor(actor_id)?.row;
            Some(actor_position(index, row, condition))
        }
        BattlerId::Enemy(real) => {
            let enemy = roster.enemies.get(real)?;
            let index = enemy_layout_indices(&roster.enemies)[real];
            let base = troop_positions.get(real).copied().unwrap_or(enemy.position);
            Some(enemy_position(base, index, condition))
        }
    }
}

/// Visible index for visible enemies, troop index for hidden ones
fn enemy_layout_indices(enemies: &[Battler]) -> Vec<usize> {
    let mut visible = 0;
    enemies
        .iter()
        .enumerate()
        .map(|(real, enemy)| {
            let idx = if enemy.hidden { real } else { visible };
            if !enemy.hidden {
                visible += 1;
            }
            idx
        })
        .collect()
}

pub fn init_enemies(roster: &mut Roster, troop_positions: &[Point], condition: BattleCondition) {
    let indices = enemy_layout_indices(&roster.enemies);
    for (real, enemy) in roster.enemies.iter_mut().enumerate() {
        let idx = indices[real];
        let base = troop_positions.get(real).copied().unwrap_or(enemy.position);
        enemy.position = enemy_position(base, idx, condition);
        enemy.flip = match condition {
            BattleCondition::None => false,
            BattleCondition::Initiative | BattleCondition::Back | BattleCondition::Surround => true,
            BattleCondition::Pincers => idx & 1 == 0,
        };
    }
}

pub fn init_actors(roster: &mut Roster, db: &Database, condition: BattleCondition) {
    let party = roster.party.clone();

    // Back row joins the front when nobody in front can fight
    let front_can_fight = roster.party_members().any(|a| {
        a.row == Row::Front && !a.hidden && a.can_act_or_recoverable(db)
    });
    if !front_can_fight {
        for id in &party {
            if let Some(actor) = roster.actor_mut(*id) {
                actor.row = Row::Front;
            }
        }
    }

    for (idx, id) in party.iter().enumerate() {
        if let Some(actor) = roster.actor_mut(*id) {
            actor.position = actor_position(idx, actor.row, condition);
            actor.flip = condition == BattleCondition::Surround && idx & 1 == 1;
        }
    }
}

fn init_atb_gauge(battler: &mut Battler, db: &Database, condition: BattleCondition, first_strike: bool, preempt: i32, ambush: i32, max: i32) {
    if battler.hidden || !battler.can_act_or_recoverable(db) {
        return;
    }
    battler.gauge = match condition {
        BattleCondition::Initiative | BattleCondition::Surround => preempt,
        BattleCondition::Back | BattleCondition::Pincers => ambush,
        BattleCondition::None => {
            if first_strike || battler.preemptive {
                preempt
            } else {
                max / 2
            }
        }
    };
}

/// Seed gauges: a favorable condition fills the party and empties the enemies
pub fn init_atb_gauges(roster: &mut Roster, db: &Database, condition: BattleCondition, first_strike: bool, max: i32) {
    for enemy in roster.enemies.iter_mut() {
        init_atb_gauge(enemy, db, condition, first_strike, 0, max, max);
    }
    let party = roster.party.clone();
    for id in party {
        if let Some(actor) = roster.actor_mut(id) {
            init_atb_gauge(actor, db, condition, first_strike, max, 0, max);
        }
    }
}

/// `prefer` if any visible other satisfies `cmp(other.x, me.x)`, else `!prefer`
fn check_flip<'a>(others: impl Iterator<Item = &'a Battler>, me_x: i32, prefer: bool, cmp: impl Fn(i32, i32) -> bool) -> bool {
    for other in others {
        if !other.hidden && cmp(other.position.x, me_x) {
            return prefer;
        }
    }
    !prefer
}

pub fn update_enemies_direction(roster: &mut Roster, condition: BattleCondition) {
    let indices = enemy_layout_indices(&roster.enemies);
    let flips: Vec<bool> = roster
        .enemies
        .iter()
        .enumerate()
        .map(|(real, enemy)| {
            let x = enemy.position.x;
            match condition {
                BattleCondition::None | BattleCondition::Initiative => {
                    check_flip(roster.party_members(), x, false, |o, m| o >= m)
                }
                BattleCondition::Back => check_flip(roster.party_members(), x, true, |o, m| o <= m),
                BattleCondition::Surround | BattleCondition::Pincers => indices[real] & 1 == 0,
            }
        })
        .collect();
    for (enemy, flip) in roster.enemies.iter_mut().zip(flips) {
        enemy.flip = flip;
    }
}

pub fn update_actors_direction(roster: &mut Roster, condition: BattleCondition) {
    let party = roster.party.clone();
    let flips: Vec<bool> = party
        .iter()
        .enumerate()
        .map(|(idx, id)| {
            let x = roster.actor(*id).map(|a| a.position.x).unwrap_or(0);
            match condition {
                BattleCondition::None | BattleCondition::Initiative => {
                    check_flip(roster.enemies.iter(), x, false, |o, m| o <= m)
                }
                BattleCondition::Back => check_flip(roster.enemies.iter(), x, true, |o, m| o >= m),
                BattleCondition::Surround | BattleCondition::Pincers => idx & 1 == 1,
            }
        })
        .collect();
    for (id, flip) in party.iter().zip(flips) {
        if let Some(actor) = roster.actor_mut(*id) {
            actor.flip = flip;
        }
    }
}

/// Turn the source around if the target is behind it
pub fn face_target(source: &mut Battler, target_position: Point) {
    let sx = source.position.x;
    let tx = target_position.x;
    if (source.flip && tx < sx) || (!source.flip && tx > sx) {
        source.flip = !source.flip;
    }
}
