//! Scene unit tests

use super::*;
use crate::data::{ActorDef, BattleCommandDef, BattleCommandKind, EnemyDef, ItemDef, Row, Scope, Stats};
use crate::event::TroopMember;
use crate::platform::{DeferredAssets, InputState, InstantAssets, SoundLog};

fn database(controllable: bool, enemy_hp: i32) -> Database {
    Database {
        actors: vec![ActorDef {
            id: 1,
            name: "Alex".into(),
            stats: Stats::default(),
            skills: vec![],
            commands: vec![1],
            row: Row::Front,
            controllable,
            preemptive: false,
        }],
        enemies: vec![EnemyDef {
            id: 1,
            name: "Slime".into(),
            stats: Stats {
                max_hp: enemy_hp,
                ..Default::default()
            },
            exp: 5,
            gold: 10,
            drop_item: Some(1),
            actions: vec![],
            preemptive: false,
        }],
        items: vec![ItemDef {
            id: 1,
            name: "Potion".into(),
            hp_recovery: 30,
            scope: Scope::SingleAlly,
            animation_id: 0,
        }],
        commands: vec![BattleCommandDef {
            id: 1,
            name: "Attack".into(),
            kind: BattleCommandKind::Attack,
        }],
        ..Default::default()
    }
}

fn quiet_config() -> BattleConfig {
    let mut config = BattleConfig::default();
    config.terms.battle_start.clear();
    config.terms.special_combat.clear();
    config
}

fn setup(enemies: usize) -> BattleSetup {
    BattleSetup {
        party: vec![1],
        troop: Troop {
            members: (0..enemies)
                .map(|i| TroopMember {
                    enemy_id: 1,
                    position: Point::new(60, 80 + 30 * i as i32),
                    hidden: false,
                })
                .collect(),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn scene(controllable: bool, enemy_hp: i32, enemies: usize) -> BattleScene {
    BattleScene::new(quiet_config(), database(controllable, enemy_hp), setup(enemies)).unwrap()
}

fn step(scene: &mut BattleScene, input: &InputState, audio: &mut SoundLog) {
    let mut assets = InstantAssets::default();
    let mut io = FrameIo::new(input, audio, &mut assets);
    scene.update(&mut io);
}

fn run_idle(scene: &mut BattleScene, frames: usize, audio: &mut SoundLog) {
    let input = InputState::new();
    for _ in 0..frames {
        step(scene, &input, audio);
    }
}

#[test]
fn test_invalid_config_rejected() {
    let mut config = quiet_config();
    config.max_atb_gauge = 0;
    let result = BattleScene::new(config, database(true, 10), setup(1));
    assert!(matches!(result, Err(BattleError::InvalidConfig(_))));
}

#[test]
fn test_wait_timer_min_and_max() {
    let mut scene = scene(true, 10, 1);
    let idle = InputState::new();
    scene.set_wait(10, 30);
    let released: Vec<bool> = (0..30).map(|_| scene.check_wait(&idle)).collect();
    assert!(released[..29].iter().all(|r| !r));
    assert!(released[29]);

    let mut held = InputState::new();
    held.hold(Button::Decision);
    scene.set_wait(10, 30);
    let released: Vec<bool> = (0..10).map(|_| scene.check_wait(&held)).collect();
    assert!(released[..9].iter().all(|r| !r));
    assert!(released[9]);
    assert_eq!(scene.wait_frames(), 0);
}

#[test]
fn test_cancel_holds_wait() {
    let mut scene = scene(true, 10, 1);
    let mut input = InputState::new();
    input.hold(Button::Cancel);
    scene.set_wait(0, 5);
    for _ in 0..20 {
        assert!(!scene.check_wait(&input));
    }
    assert_eq!(scene.wait_frames(), 5);
}

#[test]
fn test_float_text_expires() {
    let mut scene = scene(true, 10, 1);
    scene.add_float_text(BattlerId::Enemy(0), "12".into(), false);
    let frames = scene.config.float_text_frames;
    for _ in 0..frames - 1 {
        scene.update_float_texts();
    }
    assert_eq!(scene.float_texts().len(), 1);
    scene.update_float_texts();
    assert!(scene.float_texts().is_empty());
}

#[test]
fn test_frame_step_order() {
    let mut scene = scene(true, 10, 1);
    let mut audio = SoundLog::new();
    run_idle(&mut scene, 1, &mut audio);
    assert_eq!(
        scene.last_frame_steps(),
        &[
            FrameStep::AssetContinuation,
            FrameStep::Screen,
            FrameStep::Battlers,
            FrameStep::FloatText,
            FrameStep::RunningAway,
            FrameStep::Ui,
            FrameStep::Events,
            FrameStep::Timers,
            FrameStep::DebugMenu,
            FrameStep::EndCheck,
            FrameStep::Atb,
            FrameStep::Cursors,
            FrameStep::Dispatch,
        ]
    );
    assert_eq!(scene.state(), SceneState::SelectOption);
}

#[test]
fn test_start_waits_for_backdrop() {
    let mut scene = scene(true, 10, 1);
    let input = InputState::new();
    let mut audio = SoundLog::new();
    let mut assets = DeferredAssets::new(2);
    for _ in 0..2 {
        let mut io = FrameIo::new(&input, &mut audio, &mut assets);
        scene.update(&mut io);
        assert!(scene.last_frame_steps().is_empty());
        assert_eq!(scene.state(), SceneState::Start);
    }
    let mut io = FrameIo::new(&input, &mut audio, &mut assets);
    scene.update(&mut io);
    assert_eq!(scene.last_frame_steps().first(), Some(&FrameStep::AssetContinuation));
    assert_eq!(scene.state(), SceneState::SelectOption);
}

#[test]
fn test_invalid_queue_front_discarded_without_turn() {
    let mut scene = scene(true, 9999, 2);
    let mut audio = SoundLog::new();
    run_idle(&mut scene, 1, &mut audio);

    scene.game.roster.enemies[0].change_hp(-99_999, true);
    scene.action_selected(Algorithm::normal(BattlerId::Enemy(0), BattlerId::Actor(1)));
    scene.action_selected(Algorithm::normal(BattlerId::Actor(1), BattlerId::Enemy(1)));
    scene.set_state(SceneState::Battle);
    run_idle(&mut scene, 200, &mut audio);

    let log = scene.log();
    assert_eq!(
        log.count(|e| *e == SceneEventType::ActionDiscarded { source: BattlerId::Enemy(0) }),
        1
    );
    assert_eq!(
        log.count(|e| *e == SceneEventType::TurnAdvanced { battler: BattlerId::Enemy(0) }),
        0
    );
    assert_eq!(
        log.count(|e| *e == SceneEventType::ActionStarted { source: BattlerId::Actor(1) }),
        1
    );
    assert!(scene.game.roster.enemies[1].hp < 9999);
}

#[test]
fn test_combo_runs_exactly_configured_times() {
    let mut scene = scene(true, 9999, 1);
    let mut audio = SoundLog::new();
    run_idle(&mut scene, 1, &mut audio);

    if let Some(actor) = scene.game.roster.actor_mut(1) {
        actor.set_battle_combo(1, 3);
        actor.last_battle_action = 1;
    }
    scene.action_selected(Algorithm::normal(BattlerId::Actor(1), BattlerId::Enemy(0)));
    scene.set_state(SceneState::Battle);
    run_idle(&mut scene, 400, &mut audio);

    let started = scene
        .log()
        .count(|e| *e == SceneEventType::ActionStarted { source: BattlerId::Actor(1) });
    assert_eq!(started, 3);
    assert_eq!(scene.combo_repeat, 1);
}

#[test]
fn test_escape_from_option_window() {
    let mut setup = setup(1);
    setup.first_strike = true;
    let mut scene = BattleScene::new(quiet_config(), database(true, 10), setup).unwrap();
    let mut audio = SoundLog::new();
    run_idle(&mut scene, 1, &mut audio);

    let mut input = InputState::new();
    input.press(Button::Up);
    step(&mut scene, &input, &mut audio);
    assert_eq!(scene.menus().option_index, 2);

    let mut input = InputState::new();
    input.press(Button::Decision);
    step(&mut scene, &input, &mut audio);
    assert_eq!(scene.state(), SceneState::Escape);
    assert!(!scene.is_running_away());

    run_idle(&mut scene, 1, &mut audio);
    assert!(scene.is_running_away());

    run_idle(&mut scene, 60, &mut audio);
    assert_eq!(scene.result(), Some(BattleResult::Escape));
    assert_eq!(audio.count("Escape"), 1);
}

#[test]
fn test_auto_actor_wins_and_collects_rewards() {
    let mut scene = scene(false, 1, 1);
    let mut audio = SoundLog::new();
    let mut input = InputState::new();
    for _ in 0..2000 {
        if scene.is_finished() {
            break;
        }
        input.press(Button::Decision);
        step(&mut scene, &input, &mut audio);
        input.next_frame();
    }

    assert_eq!(scene.result(), Some(BattleResult::Victory));
    assert_eq!(scene.game().roster.gold, 10);
    assert_eq!(scene.game().roster.item_count(1), 1);
    assert!(audio.count("EnemyKill") >= 1);
    assert_eq!(scene.log().count(|e| matches!(e, SceneEventType::BattleEnded { .. })), 1);
}
