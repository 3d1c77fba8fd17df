//! Battle interpreter integration tests

use atb_engine::battle::*;
use atb_engine::core::{BattleConfig, BattleResult, BattlerId, Dialect};
use atb_engine::data::{ActorDef, AnimationDef, Database, EnemyDef, Row, SoundEffect, StateDef, Stats};
use atb_engine::event::{
    ConditionFlags, ConditionKind, EventProgram, Instruction, Opcode, PageCondition, ProgramStore, Trigger,
    Troop, TroopMember, TroopPage,
};
use atb_engine::interpreter::{AsyncOp, Env};
use atb_engine::platform::{InstantAssets, SoundLog};

fn database() -> Database {
    Database {
        actors: vec![ActorDef {
            id: 1,
            name: "Alex".into(),
            stats: Stats::default(),
            skills: vec![],
            commands: vec![1],
            row: Row::Front,
            controllable: true,
            preemptive: false,
        }],
        enemies: vec![EnemyDef {
            id: 1,
            name: "Bat".into(),
            stats: Stats::default(),
            exp: 3,
            gold: 4,
            drop_item: None,
            actions: vec![],
            preemptive: false,
        }],
        states: vec![StateDef {
            id: 2,
            name: "Poison".into(),
            restriction: Default::default(),
            hp_change: -5,
            auto_release_turns: 0,
            reflect: false,
            priority: 10,
        }],
        animations: vec![AnimationDef {
            id: 1,
            name: "Slash".into(),
            frames: 10,
            se: Some(SoundEffect::new("Slash")),
        }],
        ..Default::default()
    }
}

fn troop(hidden: bool, pages: Vec<TroopPage>) -> Troop {
    Troop {
        members: vec![
            TroopMember {
                enemy_id: 1,
                position: Default::default(),
                hidden: false,
            },
            TroopMember {
                enemy_id: 1,
                position: Default::default(),
                hidden,
            },
        ],
        pages,
        ..Default::default()
    }
}

fn game(troop: &Troop) -> GameState {
    let db = database();
    GameState {
        roster: Roster::new(&db, &[1], troop),
        database: db,
        ..Default::default()
    }
}

fn maniac() -> BattleConfig {
    BattleConfig {
        maniac_patch: true,
        ..Default::default()
    }
}

/// Run common event `id` on the main battle interpreter for one update
fn run_event(bi: &mut BattleInterpreter, store: &ProgramStore, game: &mut GameState, audio: &mut SoundLog, id: i32) {
    bi.start_common_event(store, id);
    update(bi, store, game, audio);
}

fn update(bi: &mut BattleInterpreter, store: &ProgramStore, game: &mut GameState, audio: &mut SoundLog) {
    let mut assets = InstantAssets::default();
    let mut env = Env::new(store, game, audio, &mut assets);
    bi.update(&mut env, true);
}

fn set_var(indent: i32, var: i32, value: i32) -> Instruction {
    Instruction::new(Opcode::ControlVariables, indent, [0, var, var, 0, 0, value, 0])
}

fn add_var(indent: i32, var: i32, value: i32) -> Instruction {
    Instruction::new(Opcode::ControlVariables, indent, [0, var, var, 1, 0, value, 0])
}

#[test]
fn test_after_action_pages_chain_through_switches() {
    let first = TroopPage::new(
        PageCondition {
            flags: ConditionFlags::empty().with(ConditionKind::EnemyHp),
            enemy_id: 0,
            enemy_hp_min: 0,
            enemy_hp_max: 50,
            ..Default::default()
        },
        vec![Instruction::new(Opcode::ControlSwitches, 0, [0, 1, 1, 0])],
    );
    let second = TroopPage::new(
        PageCondition {
            flags: ConditionFlags::empty().with(ConditionKind::SwitchA),
            switch_a_id: 1,
            ..Default::default()
        },
        vec![set_var(0, 1, 5)],
    );
    let troop = troop(false, vec![first, second]);
    let store = ProgramStore::new(vec![], troop.clone());
    let mut game = game(&troop);
    let mut audio = SoundLog::new();
    let mut bi = BattleInterpreter::new(&BattleConfig::default(), store.page_count());
    let flags = EventTrigger::AfterAction.flags();

    assert_eq!(bi.schedule_next_page(&store, &game, flags, None), 0);

    game.roster.enemies[0].hp = 40;
    assert_eq!(bi.schedule_next_page(&store, &game, flags, None), 1);
    update(&mut bi, &store, &mut game, &mut audio);
    assert!(game.switches.get(1));

    assert_eq!(bi.schedule_next_page(&store, &game, flags, None), 2);
    update(&mut bi, &store, &mut game, &mut audio);
    assert_eq!(game.variables.get(1), 5);

    assert_eq!(bi.schedule_next_page(&store, &game, flags, None), 0);
    bi.reset_all_pages_executed();
    assert!(!bi.is_page_executed(1));
    assert_eq!(bi.schedule_next_page(&store, &game, flags, None), 1);
}

#[test]
fn test_turn_pages_ignore_after_action_checks() {
    let page = TroopPage::new(
        PageCondition {
            flags: ConditionFlags::empty().with(ConditionKind::Turn),
            turn_a: 0,
            ..Default::default()
        },
        vec![set_var(0, 1, 1)],
    );
    let troop = troop(false, vec![page]);
    let store = ProgramStore::new(vec![], troop.clone());
    let game = game(&troop);
    let mut bi = BattleInterpreter::new(&BattleConfig::default(), store.page_count());

    assert_eq!(bi.schedule_next_page(&store, &game, EventTrigger::AfterAction.flags(), None), 0);
    assert_eq!(bi.schedule_next_page(&store, &game, EventTrigger::BeforeAction.flags(), None), 1);
}

#[test]
fn test_force_flee_modes() {
    let troop = troop(false, vec![]);
    let store = ProgramStore::new(
        vec![
            EventProgram::new(1, Trigger::CallOnly, vec![Instruction::new(Opcode::ForceFlee, 0, [0, 0, 0])]),
            EventProgram::new(2, Trigger::CallOnly, vec![Instruction::new(Opcode::ForceFlee, 0, [0, 0, 1])]),
            EventProgram::new(3, Trigger::CallOnly, vec![Instruction::new(Opcode::ForceFlee, 0, [1, 0, 0])]),
            EventProgram::new(4, Trigger::CallOnly, vec![Instruction::new(Opcode::ForceFlee, 0, [2, 1, 0])]),
        ],
        troop.clone(),
    );
    let mut game = game(&troop);
    let mut audio = SoundLog::new();
    let mut bi = BattleInterpreter::new(&BattleConfig::default(), 0);

    game.status.condition = BattleCondition::Pincers;
    run_event(&mut bi, &store, &mut game, &mut audio, 1);
    assert!(!bi.is_force_flee_enabled());

    run_event(&mut bi, &store, &mut game, &mut audio, 2);
    assert!(bi.is_force_flee_enabled());
    bi.reset_force_flee();

    game.status.condition = BattleCondition::None;
    run_event(&mut bi, &store, &mut game, &mut audio, 4);
    assert!(game.roster.enemies[1].hidden);
    assert!(!game.roster.enemies[0].hidden);
    assert_eq!(audio.count("Escape"), 1);

    run_event(&mut bi, &store, &mut game, &mut audio, 3);
    assert!(game.roster.enemies.iter().all(|e| e.hidden));
    assert_eq!(audio.count("Escape"), 2);
}

#[test]
fn test_monster_condition_branch_and_set_state_hook() {
    let troop = troop(false, vec![]);
    let branch = |first_var: i32| {
        vec![
            Instruction::new(Opcode::ConditionalBranchBattle, 0, [6, 0, 2]),
            set_var(1, first_var, 1),
            Instruction::new(Opcode::ElseBranchBattle, 0, []),
            set_var(1, first_var, 2),
            Instruction::new(Opcode::EndBranchBattle, 0, []),
        ]
    };
    let store = ProgramStore::new(
        vec![
            EventProgram::new(1, Trigger::CallOnly, branch(1)),
            EventProgram::new(
                2,
                Trigger::CallOnly,
                vec![
                    Instruction::new(Opcode::ControlBattleHooks, 0, [3, 9, 40]),
                    Instruction::new(Opcode::ChangeMonsterCondition, 0, [0, 0, 2]),
                ],
            ),
            EventProgram::new(3, Trigger::CallOnly, branch(2)),
            EventProgram::new(9, Trigger::CallOnly, vec![add_var(0, 50, 1)]),
        ],
        troop.clone(),
    );
    let mut game = game(&troop);
    let mut audio = SoundLog::new();
    let mut bi = BattleInterpreter::new(&maniac(), 0);

    run_event(&mut bi, &store, &mut game, &mut audio, 1);
    assert_eq!(game.variables.get(1), 2);

    run_event(&mut bi, &store, &mut game, &mut audio, 2);
    assert!(game.roster.enemies[0].has_state(2));
    assert_eq!(bi.dialect().hooks().get(HookKind::SetState).common_event_id, 9);
    assert_eq!(game.variables.get(40), 0);
    assert_eq!(game.variables.get(41), 2);
    assert_eq!(game.variables.get(42), 1);
    assert_eq!(game.variables.get(50), 1);

    run_event(&mut bi, &store, &mut game, &mut audio, 3);
    assert_eq!(game.variables.get(2), 1);
}

#[test]
fn test_hooks_disabled_without_bridge() {
    let troop = troop(false, vec![]);
    let store = ProgramStore::new(
        vec![
            EventProgram::new(1, Trigger::CallOnly, vec![Instruction::new(Opcode::ControlBattleHooks, 0, [1, 9, 40])]),
            EventProgram::new(9, Trigger::CallOnly, vec![add_var(0, 50, 1)]),
        ],
        troop.clone(),
    );
    let mut game = game(&troop);
    let mut audio = SoundLog::new();
    let mut bi = BattleInterpreter::new(&BattleConfig::default(), 0);

    run_event(&mut bi, &store, &mut game, &mut audio, 1);
    assert!(!bi.dialect().hooks().get(HookKind::DamagePop).is_bound());

    let mut assets = InstantAssets::default();
    let mut env = Env::new(&store, &mut game, &mut audio, &mut assets);
    assert!(!bi.trigger_hook(HookKind::DamagePop, [0; HOOK_ARG_COUNT], &mut env));
    assert_eq!(game.variables.get(50), 0);
}

#[test]
fn test_change_monster_mp_reports_stat_change() {
    let troop = troop(false, vec![]);
    let store = ProgramStore::new(
        vec![
            EventProgram::new(
                1,
                Trigger::CallOnly,
                vec![
                    Instruction::new(Opcode::ControlBattleHooks, 0, [4, 9, 60]),
                    Instruction::new(Opcode::ChangeMonsterMp, 0, [0, 1, 0, 5]),
                ],
            ),
            EventProgram::new(9, Trigger::CallOnly, vec![]),
        ],
        troop.clone(),
    );
    let mut game = game(&troop);
    let mut audio = SoundLog::new();
    let mut bi = BattleInterpreter::new(&maniac(), 0);

    run_event(&mut bi, &store, &mut game, &mut audio, 1);

    assert_eq!(game.roster.enemies[0].sp, 15);
    assert_eq!(game.variables.get(60), 0);
    assert_eq!(game.variables.get(61), 1);
    assert_eq!(game.variables.get(62), -5);
    assert_eq!(game.variables.get(63), 15);
}

#[test]
fn test_hidden_monster_background_and_animation() {
    let troop = troop(true, vec![]);
    let store = ProgramStore::new(
        vec![EventProgram::new(
            1,
            Trigger::CallOnly,
            vec![
                Instruction::new(Opcode::ShowHiddenMonster, 0, [1]),
                Instruction::new(Opcode::ChangeBattleBackground, 0, []).with_text("castle"),
                Instruction::new(Opcode::ShowBattleAnimation, 0, [1, -1, 1]),
                Instruction::new(Opcode::ControlSwitches, 0, [0, 3, 3, 0]),
            ],
        )],
        troop.clone(),
    );
    let mut game = game(&troop);
    let mut audio = SoundLog::new();
    let mut bi = BattleInterpreter::new(&BattleConfig::default(), 0);
    assert!(game.roster.enemies[1].hidden);

    run_event(&mut bi, &store, &mut game, &mut audio, 1);

    assert!(!game.roster.enemies[1].hidden);
    assert_eq!(game.status.background, "castle");
    assert_eq!(audio.count("Slash"), 1);
    let targets = game.status.animation.as_ref().map(|a| a.targets.clone());
    assert_eq!(targets, Some(vec![BattlerId::Enemy(0), BattlerId::Enemy(1)]));

    assert!(bi.is_waiting());
    assert!(!game.switches.get(3));
    for _ in 0..11 {
        update(&mut bi, &store, &mut game, &mut audio);
    }
    assert!(game.switches.get(3));
}

#[test]
fn test_combo_and_common_event_need_2k3_dialect() {
    let troop = troop(false, vec![]);
    let store = ProgramStore::new(
        vec![
            EventProgram::new(
                1,
                Trigger::CallOnly,
                vec![
                    Instruction::new(Opcode::EnableCombo, 0, [1, 3, 2]),
                    Instruction::new(Opcode::EnableCombo, 0, [7, 3, 2]),
                    Instruction::new(Opcode::CallCommonEvent, 0, [2]),
                ],
            ),
            EventProgram::new(2, Trigger::CallOnly, vec![set_var(0, 8, 1)]),
        ],
        troop.clone(),
    );
    let mut audio = SoundLog::new();

    let mut game_2k3 = game(&troop);
    let mut bi = BattleInterpreter::new(&BattleConfig::default(), 0);
    run_event(&mut bi, &store, &mut game_2k3, &mut audio, 1);
    assert_eq!(
        game_2k3.roster.actor(1).and_then(|a| a.combo),
        Some(Combo {
            command_id: 3,
            times: 2
        })
    );
    assert_eq!(game_2k3.variables.get(8), 1);

    let mut game_2k = game(&troop);
    let config = BattleConfig {
        dialect: Dialect::Rpg2k,
        ..Default::default()
    };
    let mut bi = BattleInterpreter::new(&config, 0);
    run_event(&mut bi, &store, &mut game_2k, &mut audio, 1);
    assert_eq!(game_2k.roster.actor(1).and_then(|a| a.combo), None);
    assert_eq!(game_2k.variables.get(8), 0);
}

#[test]
fn test_terminate_battle_holds_the_stack() {
    let troop = troop(false, vec![]);
    let store = ProgramStore::new(
        vec![EventProgram::new(
            1,
            Trigger::CallOnly,
            vec![
                Instruction::new(Opcode::TerminateBattle, 0, []),
                Instruction::new(Opcode::ControlSwitches, 0, [0, 1, 1, 0]),
            ],
        )],
        troop.clone(),
    );
    let mut game = game(&troop);
    let mut audio = SoundLog::new();
    let mut bi = BattleInterpreter::new(&BattleConfig::default(), 0);

    run_event(&mut bi, &store, &mut game, &mut audio, 1);
    assert_eq!(bi.async_op(), &AsyncOp::TerminateBattle(BattleResult::Abort));
    update(&mut bi, &store, &mut game, &mut audio);
    assert!(!game.switches.get(1));
    assert!(bi.is_running());
}

#[test]
fn test_start_common_event_skips_duplicates() {
    let troop = troop(false, vec![]);
    let store = ProgramStore::new(
        vec![EventProgram::new(5, Trigger::CallOnly, vec![Instruction::new(Opcode::Wait, 0, [10])])],
        troop,
    );
    let mut bi = BattleInterpreter::new(&BattleConfig::default(), 0);

    assert!(bi.start_common_event(&store, 5));
    assert!(!bi.start_common_event(&store, 5));
    assert!(!bi.start_common_event(&store, 6));
    assert_eq!(bi.interpreter().frames().len(), 1);

    bi.remove_common_event_frames(5);
    assert!(!bi.is_running());
}
