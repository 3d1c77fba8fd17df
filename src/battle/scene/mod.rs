//! Battle scene - the per-frame ATB state machine
//!
//! `BattleScene::update` is called once per frame. It advances presentation timers,
//! runs events, fills gauges, and then dispatches the outer state machine until a
//! handler asks to wait for the next frame. Actions chosen by menus or AI go through
//! a FIFO queue and are resolved one at a time by the battle-action sub-machine.

mod action;
pub mod menu;
mod phases;
#[cfg(test)]
mod tests;

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::battle::ai::{restricted_action, AutoBattleAi, BattleAi, EnemyAi};
use crate::battle::algorithm::Algorithm;
use crate::battle::battler::Roster;
use crate::battle::constants::{HOOK_ARG_COUNT, RUN_AWAY_STEP};
use crate::battle::formation;
use crate::battle::hooks::HookKind;
use crate::battle::interpreter::BattleInterpreter;
use crate::battle::state::{BattleCondition, CountdownTimer, GameState, Notice};
use crate::core::config::{AtbMode, BattleConfig};
use crate::core::error::{BattleError, Result};
use crate::core::types::{BattleResult, BattlerId, Frame, Point};
use crate::data::{Database, Restriction};
use crate::event::{CommonEvent, ConditionFlags, ConditionKind, EventProgram, ProgramStore, Troop};
use crate::interpreter::{AsyncOp, Env, ExecutionSnapshot};
use crate::platform::{AssetKind, AssetLoader, AssetRequest, AudioSink, Button, InputSource};

pub use menu::{CommandEntry, Menus, Selection};

/// Safety valve for the dispatch loop of a single frame
const MAX_SCENE_ACTIONS_PER_FRAME: u32 = 1000;

// === STATES ===

/// Outer state of the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SceneState {
    Start,
    SelectOption,
    SelectActor,
    AutoBattle,
    SelectCommand,
    SelectItem,
    SelectSkill,
    SelectEnemyTarget,
    SelectAllyTarget,
    Battle,
    Victory,
    Defeat,
    Escape,
}

/// Progress of the action being resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BattleActionState {
    Begin,
    StartAlgo,
    Animation,
    AnimationReflect,
    Apply,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SceneActionReturn {
    ContinueThisFrame,
    WaitTillNextFrame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BattleActionReturn {
    Continue,
    Wait,
    Finished,
}

/// Work the frame loop performed, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameStep {
    AssetContinuation,
    DebugResume,
    Screen,
    Battlers,
    FloatText,
    RunningAway,
    Ui,
    Events,
    Timers,
    DebugMenu,
    EndCheck,
    Atb,
    Cursors,
    Dispatch,
}

/// Which troop page categories an event check may fire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTrigger {
    BeforeAction,
    AfterAction,
    All,
}

impl EventTrigger {
    pub fn flags(self) -> ConditionFlags {
        match self {
            EventTrigger::BeforeAction => ConditionFlags::empty()
                .with(ConditionKind::Turn)
                .with(ConditionKind::TurnActor)
                .with(ConditionKind::TurnEnemy)
                .with(ConditionKind::CommandActor),
            EventTrigger::AfterAction => ConditionFlags::empty()
                .with(ConditionKind::SwitchA)
                .with(ConditionKind::SwitchB)
                .with(ConditionKind::Variable)
                .with(ConditionKind::Fatigue)
                .with(ConditionKind::EnemyHp)
                .with(ConditionKind::ActorHp),
            EventTrigger::All => ConditionFlags::all(),
        }
    }
}

// === EVENT LOG ===

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SceneEventType {
    BattleStarted,
    StateChanged { from: SceneState, to: SceneState },
    ActionQueued { source: BattlerId },
    ActionDiscarded { source: BattlerId },
    ActionStarted { source: BattlerId },
    TurnAdvanced { battler: BattlerId },
    PageScheduled { page: usize },
    BattleEnded { result: BattleResult },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneEvent {
    pub frame: Frame,
    pub event_type: SceneEventType,
    pub description: String,
}

/// Everything notable the scene did, in order
#[derive(Debug, Clone, Default)]
pub struct SceneLog {
    pub events: Vec<SceneEvent>,
}

impl SceneLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event_type: SceneEventType, description: String, frame: Frame) {
        tracing::trace!("[{}] {}", frame, description);
        self.events.push(SceneEvent {
            frame,
            event_type,
            description,
        });
    }

    pub fn count(&self, matches: impl Fn(&SceneEventType) -> bool) -> usize {
        self.events.iter().filter(|e| matches(&e.event_type)).count()
    }
}

// === PRESENTATION ===

/// Damage or message popping up over a battler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloatText {
    pub target: BattlerId,
    pub x: i32,
    pub y: i32,
    pub text: String,
    pub heal: bool,
    pub remaining: i32,
}

// === SETUP ===

/// Everything a battle starts from besides config and database
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleSetup {
    /// Party actor ids in order
    pub party: Vec<i32>,
    pub troop: Troop,
    pub common_events: Vec<EventProgram>,
    pub condition: BattleCondition,
    pub first_strike: bool,
    pub background: String,
    /// Countdown timers carried in from the map
    pub timers: [CountdownTimer; 2],
}

/// Host collaborators for one frame
pub struct FrameIo<'a> {
    pub input: &'a dyn InputSource,
    pub audio: &'a mut dyn AudioSink,
    pub assets: &'a mut dyn AssetLoader,
}

impl<'a> FrameIo<'a> {
    pub fn new(input: &'a dyn InputSource, audio: &'a mut dyn AudioSink, assets: &'a mut dyn AssetLoader) -> Self {
        Self { input, audio, assets }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Continuation {
    FinishStart,
    ResumeInterpreter,
    ResumeCommonEvent(usize),
}

#[derive(Debug, Clone, Copy)]
struct PendingAsset {
    request: AssetRequest,
    continuation: Continuation,
}

// === SCENE ===

pub struct BattleScene {
    config: BattleConfig,
    store: ProgramStore,
    game: GameState,
    interpreter: BattleInterpreter,
    common_events: Vec<CommonEvent>,
    enemy_ai: Box<dyn BattleAi>,
    auto_ai: Box<dyn BattleAi>,
    troop_positions: Vec<Point>,
    first_strike: bool,

    state: SceneState,
    previous_state: SceneState,
    substate: u8,
    input_consumed: bool,

    action_state: BattleActionState,
    actions: VecDeque<Algorithm>,
    pending_action: Option<Algorithm>,
    active_actor: Option<i32>,
    combo_repeat: i32,

    wait: i32,
    min_wait: i32,
    float_texts: Vec<FloatText>,
    notification: Option<String>,
    running_away: bool,
    escape_attempts: i32,
    resume_from_debug: bool,

    started: bool,
    pending_asset: Option<PendingAsset>,
    result: Option<BattleResult>,
    frame: Frame,
    steps: Vec<FrameStep>,
    ui: Menus,
    log: SceneLog,
}

impl BattleScene {
    pub fn new(config: BattleConfig, database: Database, setup: BattleSetup) -> Result<Self> {
        config.validate().map_err(BattleError::InvalidConfig)?;

        let roster = Roster::new(&database, &setup.party, &setup.troop);
        let mut game = GameState::new(database, roster, &config);
        game.timers = setup.timers;
        game.status.background = setup.background;
        game.status.condition =
            formation::resolve_battle_condition(setup.condition, config.placement, &game.roster);

        let troop_positions = setup.troop.members.iter().map(|m| m.position).collect();
        let store = ProgramStore::new(setup.common_events, setup.troop);
        let interpreter = BattleInterpreter::new(&config, store.page_count());
        let common_events = store.common_events().into_iter().map(CommonEvent::new).collect();

        tracing::info!(
            "battle setup: {} party members, {} enemies, condition {:?}",
            game.roster.party.len(),
            game.roster.enemies.len(),
            game.status.condition
        );

        Ok(Self {
            config,
            store,
            game,
            interpreter,
            common_events,
            enemy_ai: Box::new(EnemyAi),
            auto_ai: Box::new(AutoBattleAi),
            troop_positions,
            first_strike: setup.first_strike,
            state: SceneState::Start,
            previous_state: SceneState::Start,
            substate: 0,
            input_consumed: false,
            action_state: BattleActionState::Begin,
            actions: VecDeque::new(),
            pending_action: None,
            active_actor: None,
            combo_repeat: 1,
            wait: 0,
            min_wait: 0,
            float_texts: Vec::new(),
            notification: None,
            running_away: false,
            escape_attempts: 0,
            resume_from_debug: false,
            started: false,
            pending_asset: None,
            result: None,
            frame: 0,
            steps: Vec::new(),
            ui: Menus::default(),
            log: SceneLog::new(),
        })
    }

    pub fn set_enemy_ai(&mut self, ai: Box<dyn BattleAi>) {
        self.enemy_ai = ai;
    }

    pub fn set_auto_battle_ai(&mut self, ai: Box<dyn BattleAi>) {
        self.auto_ai = ai;
    }

    // === ACCESSORS ===

    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut GameState {
        &mut self.game
    }

    pub fn store(&self) -> &ProgramStore {
        &self.store
    }

    pub fn interpreter(&self) -> &BattleInterpreter {
        &self.interpreter
    }

    pub fn interpreter_mut(&mut self) -> &mut BattleInterpreter {
        &mut self.interpreter
    }

    pub fn state(&self) -> SceneState {
        self.state
    }

    pub fn previous_state(&self) -> SceneState {
        self.previous_state
    }

    pub fn battle_action_state(&self) -> BattleActionState {
        self.action_state
    }

    pub fn result(&self) -> Option<BattleResult> {
        self.result
    }

    pub fn is_finished(&self) -> bool {
        self.result.is_some()
    }

    pub fn frame_count(&self) -> Frame {
        self.frame
    }

    /// Steps the last `update` performed
    pub fn last_frame_steps(&self) -> &[FrameStep] {
        &self.steps
    }

    pub fn log(&self) -> &SceneLog {
        &self.log
    }

    pub fn pending_actions(&self) -> &VecDeque<Algorithm> {
        &self.actions
    }

    pub fn active_actor(&self) -> Option<i32> {
        self.active_actor
    }

    pub fn notification(&self) -> Option<&str> {
        self.notification.as_deref()
    }

    pub fn float_texts(&self) -> &[FloatText] {
        &self.float_texts
    }

    pub fn menus(&self) -> &Menus {
        &self.ui
    }

    pub fn is_running_away(&self) -> bool {
        self.running_away
    }

    pub fn wait_frames(&self) -> i32 {
        self.wait
    }

    /// Main interpreter stack and each common event's, for persistence
    pub fn save_event_state(&self) -> (ExecutionSnapshot, Vec<(i32, ExecutionSnapshot)>) {
        let common = self
            .common_events
            .iter()
            .map(|ce| (ce.id(), ce.save_state()))
            .collect();
        (self.interpreter.save_state(), common)
    }

    pub fn load_event_state(&mut self, main: &ExecutionSnapshot, common: &[(i32, ExecutionSnapshot)]) {
        self.interpreter.set_state(main, &self.store);
        for (id, snapshot) in common {
            match self.common_events.iter_mut().find(|ce| ce.id() == *id) {
                Some(ce) => ce.load_state(snapshot, &self.store),
                None => tracing::warn!("LoadEventState: unknown common event {}", id),
            }
        }
    }

    // === FRAME LOOP ===

    /// Advance the battle by one frame
    pub fn update(&mut self, io: &mut FrameIo<'_>) {
        self.steps.clear();
        self.input_consumed = false;
        if self.result.is_some() {
            return;
        }
        self.frame += 1;

        if !self.started {
            self.started = true;
            let name = if self.game.status.background.is_empty() {
                "battle".to_string()
            } else {
                self.game.status.background.clone()
            };
            let request = io.assets.request(AssetKind::Backdrop, &name);
            self.pending_asset = Some(PendingAsset {
                request,
                continuation: Continuation::FinishStart,
            });
            self.log
                .push(SceneEventType::BattleStarted, format!("battle started on {}", name), self.frame);
        }

        if let Some(pending) = self.pending_asset {
            if !io.assets.is_ready(pending.request) {
                return;
            }
            self.pending_asset = None;
            self.steps.push(FrameStep::AssetContinuation);
            self.run_continuation(pending.continuation, io);
            if self.result.is_some() || self.pending_asset.is_some() {
                return;
            }
        }

        if self.update_battle_state(io) {
            self.dispatch(io);
        }
    }

    fn run_continuation(&mut self, continuation: Continuation, io: &mut FrameIo<'_>) {
        match continuation {
            Continuation::FinishStart => self.finish_start(),
            Continuation::ResumeInterpreter => {
                let mut env = Env::new(&self.store, &mut self.game, &mut *io.audio, &mut *io.assets);
                self.interpreter.update(&mut env, false);
                self.check_interpreter_async();
            }
            Continuation::ResumeCommonEvent(index) => {
                let Some(ce) = self.common_events.get_mut(index) else {
                    return;
                };
                let mut env = Env::new(&self.store, &mut self.game, &mut *io.audio, &mut *io.assets);
                let op = ce.update(&mut env, self.interpreter.dialect_mut(), true);
                if let AsyncOp::LoadAsset { request, .. } = op {
                    self.pending_asset = Some(PendingAsset {
                        request,
                        continuation: Continuation::ResumeCommonEvent(index),
                    });
                }
            }
        }
    }

    /// Place everyone and seed gauges once the backdrop is loaded
    fn finish_start(&mut self) {
        let condition = self.game.status.condition;
        let game = &mut self.game;
        formation::init_enemies(&mut game.roster, &self.troop_positions, condition);
        formation::init_actors(&mut game.roster, &game.database, condition);
        formation::init_atb_gauges(
            &mut game.roster,
            &game.database,
            condition,
            self.first_strike,
            self.config.max_atb_gauge,
        );
    }

    /// Per-frame bookkeeping; false stops the frame before dispatch
    fn update_battle_state(&mut self, io: &mut FrameIo<'_>) -> bool {
        if self.resume_from_debug {
            self.resume_from_debug = false;
            self.steps.push(FrameStep::DebugResume);
            return true;
        }

        self.steps.push(FrameStep::Screen);
        self.game.status.update();

        self.steps.push(FrameStep::Battlers);
        self.update_battlers();

        self.steps.push(FrameStep::FloatText);
        self.update_float_texts();

        self.steps.push(FrameStep::RunningAway);
        if self.running_away {
            self.update_running_away();
        }

        self.steps.push(FrameStep::Ui);
        self.update_ui(io.input);

        self.steps.push(FrameStep::Events);
        if !self.update_events(io) {
            return false;
        }

        self.steps.push(FrameStep::Timers);
        if self.update_timers() {
            self.end_battle(BattleResult::Abort);
            return false;
        }

        self.steps.push(FrameStep::DebugMenu);
        if self.config.debug_menu_enabled && io.input.is_triggered(Button::DebugMenu) {
            tracing::debug!("debug menu requested");
            self.resume_from_debug = true;
            return false;
        }

        self.steps.push(FrameStep::EndCheck);
        self.check_battle_end_conditions();

        self.steps.push(FrameStep::Atb);
        self.update_atb(io);

        self.steps.push(FrameStep::Cursors);
        self.ui.cursor_cycle = self.ui.cursor_cycle.wrapping_add(1);
        true
    }

    fn dispatch(&mut self, io: &mut FrameIo<'_>) {
        self.steps.push(FrameStep::Dispatch);
        for _ in 0..MAX_SCENE_ACTIONS_PER_FRAME {
            if self.result.is_some() || self.ui.window_move > 0 {
                return;
            }
            if self.game.message.is_active() || self.interpreter.is_running() {
                return;
            }
            if !self.check_wait(io.input) {
                return;
            }
            if self.process_scene_action(io) == SceneActionReturn::WaitTillNextFrame {
                return;
            }
        }
        tracing::warn!(
            "Scene dispatched {} actions in one frame, yielding in {:?}",
            MAX_SCENE_ACTIONS_PER_FRAME,
            self.state
        );
    }

    fn update_battlers(&mut self) {
        let Roster {
            actors,
            party,
            enemies,
            ..
        } = &mut self.game.roster;
        for actor in actors.iter_mut().filter(|a| party.contains(&a.db_id)) {
            actor.update_timers();
        }
        for enemy in enemies.iter_mut() {
            enemy.update_timers();
        }
    }

    fn update_float_texts(&mut self) {
        for text in &mut self.float_texts {
            if text.remaining % 2 == 0 {
                text.y += match text.remaining {
                    t if t <= 10 => 1,
                    t if t < 20 => 0,
                    _ => -1,
                };
            }
            text.remaining -= 1;
        }
        self.float_texts.retain(|t| t.remaining > 0);
    }

    fn update_running_away(&mut self) {
        let Roster { actors, party, .. } = &mut self.game.roster;
        for actor in actors.iter_mut().filter(|a| party.contains(&a.db_id)) {
            actor.position.x += if actor.flip { -RUN_AWAY_STEP } else { RUN_AWAY_STEP };
        }
    }

    fn update_ui(&mut self, input: &dyn InputSource) {
        self.ui.update_windows();
        if self.game.message.is_active() {
            if input.is_triggered(Button::Decision) {
                self.game.message.advance();
                self.input_consumed = true;
            }
            return;
        }
        if self.ui.window_move > 0 {
            return;
        }
        let len = self.menu_len();
        if input.is_triggered(Button::Down) {
            self.ui.move_cursor(self.state, len, true);
        } else if input.is_triggered(Button::Up) {
            self.ui.move_cursor(self.state, len, false);
        }
    }

    /// Entries of the window the current state browses
    fn menu_len(&self) -> usize {
        let roster = &self.game.roster;
        let db = &self.game.database;
        let actor = self.active_actor.unwrap_or(0);
        match self.state {
            SceneState::SelectOption => menu::OPTION_COUNT,
            SceneState::SelectActor => roster.party.len(),
            SceneState::SelectCommand => menu::actor_commands(roster, db, actor).len(),
            SceneState::SelectItem => menu::item_list(roster).len(),
            SceneState::SelectSkill => menu::skill_list(roster, db, actor, self.ui.skill_subset).len(),
            SceneState::SelectEnemyTarget => menu::enemy_targets(roster).len(),
            SceneState::SelectAllyTarget => menu::ally_targets(roster).len(),
            _ => 0,
        }
    }

    /// Decision/cancel edges, unless a closed message already used them this frame
    fn triggered(&self, input: &dyn InputSource, button: Button) -> bool {
        !self.input_consumed && input.is_triggered(button)
    }

    fn update_timers(&mut self) -> bool {
        let mut abort = false;
        for timer in &mut self.game.timers {
            if timer.update() {
                abort = true;
            }
        }
        if abort {
            tracing::info!("countdown timer expired, aborting battle");
        }
        abort
    }

    // === EVENTS ===

    /// Run hooks, the main interpreter and parallel common events
    ///
    /// Returns false when the frame must stop here.
    fn update_events(&mut self, io: &mut FrameIo<'_>) -> bool {
        {
            let mut env = Env::new(&self.store, &mut self.game, &mut *io.audio, &mut *io.assets);
            self.interpreter.process_hook_sub_events(&mut env);
        }

        if !self.interpreter.is_running() {
            let switches = &self.game.switches;
            let auto_start = self
                .common_events
                .iter()
                .find(|ce| ce.is_waiting_foreground_execution(switches))
                .map(|ce| ce.id());
            if let Some(id) = auto_start {
                tracing::debug!("auto-start common event {}", id);
                self.interpreter.start_common_event(&self.store, id);
            }
        }

        {
            let mut env = Env::new(&self.store, &mut self.game, &mut *io.audio, &mut *io.assets);
            self.interpreter.update(&mut env, true);
        }

        for index in 0..self.common_events.len() {
            let mut env = Env::new(&self.store, &mut self.game, &mut *io.audio, &mut *io.assets);
            let op = self.common_events[index].update(&mut env, self.interpreter.dialect_mut(), false);
            if let AsyncOp::LoadAsset { request, .. } = op {
                self.pending_asset = Some(PendingAsset {
                    request,
                    continuation: Continuation::ResumeCommonEvent(index),
                });
                return false;
            }
        }

        if self.interpreter.is_force_flee_enabled() && self.state != SceneState::Escape {
            self.set_state(SceneState::Escape);
        }

        if !self.check_interpreter_async() {
            return false;
        }

        for notice in self.game.status.take_notices() {
            match notice {
                Notice::HpChanged { target, change } => {
                    self.add_float_text(target, change.abs().to_string(), change > 0);
                }
            }
        }
        true
    }

    /// React to the main interpreter's suspension; false stops the frame
    fn check_interpreter_async(&mut self) -> bool {
        if !self.interpreter.is_async_pending() {
            return true;
        }
        match self.interpreter.async_op().clone() {
            AsyncOp::TerminateBattle(result) => {
                self.end_battle(result);
                false
            }
            AsyncOp::LoadAsset { request, .. } => {
                self.pending_asset = Some(PendingAsset {
                    request,
                    continuation: Continuation::ResumeInterpreter,
                });
                false
            }
            AsyncOp::None => true,
        }
    }

    /// Fire a hook with a battler reference as its first two arguments
    fn trigger_battler_hook(&mut self, kind: HookKind, battler: BattlerId, rest: [i32; 4], io: &mut FrameIo<'_>) {
        let (side, id) = hook_battler_ref(battler);
        let args: [i32; HOOK_ARG_COUNT] = [side, id, rest[0], rest[1], rest[2], rest[3]];
        let mut env = Env::new(&self.store, &mut self.game, &mut *io.audio, &mut *io.assets);
        self.interpreter.trigger_hook(kind, args, &mut env);
    }

    /// Schedule a troop page unless events or the battle end take precedence
    ///
    /// Returns true when the scene may proceed.
    fn check_battle_end_and_schedule_events(&mut self, trigger: EventTrigger, source: Option<BattlerId>) -> bool {
        if self.interpreter.is_running() {
            return false;
        }
        if trigger != EventTrigger::AfterAction
            && (self.interpreter.is_waiting() || self.game.message.is_active())
        {
            return true;
        }
        if self.check_battle_end_conditions() {
            return false;
        }

        let page = self
            .interpreter
            .schedule_next_page(&self.store, &self.game, trigger.flags(), source);
        if page > 0 {
            self.log.push(
                SceneEventType::PageScheduled { page },
                format!("troop page {} scheduled ({:?})", page, trigger),
                self.frame,
            );
        }
        !self.interpreter.is_running()
    }

    /// Switch to defeat or victory if either side is wiped out
    fn check_battle_end_conditions(&mut self) -> bool {
        if self.state == SceneState::Defeat || self.game.roster.is_party_defeated() {
            if self.state != SceneState::Defeat {
                self.set_state(SceneState::Defeat);
            }
            return true;
        }
        if self.state == SceneState::Victory || self.game.roster.are_enemies_defeated() {
            if self.state != SceneState::Victory {
                self.set_state(SceneState::Victory);
            }
            return true;
        }
        false
    }

    // === ATB ===

    fn is_atb_accumulating(&self) -> bool {
        if self.game.status.is_animation_waiting() {
            return false;
        }
        let active = self.config.atb_mode == AtbMode::Active;
        match self.state {
            SceneState::SelectEnemyTarget
            | SceneState::SelectAllyTarget
            | SceneState::SelectItem
            | SceneState::SelectSkill
            | SceneState::SelectCommand => active,
            SceneState::AutoBattle | SceneState::SelectActor => true,
            _ => false,
        }
    }

    fn update_atb(&mut self, io: &mut FrameIo<'_>) {
        if self.interpreter.is_running() || self.game.message.is_active() {
            return;
        }
        if self.is_atb_accumulating() {
            let gains = self.game.roster.update_atb_gauges(
                &self.game.database,
                self.config.max_atb_gauge,
                self.config.atb_fill_frames,
            );
            for (id, gain) in gains {
                let gauge = self.game.roster.battler(id).map(|b| b.gauge).unwrap_or(0);
                self.trigger_battler_hook(HookKind::AtbIncrement, id, [gain, gauge, 0, 0], io);
            }
        }
        self.create_enemy_actions();
        self.create_actor_auto_actions();
    }

    fn is_controllable(&self, id: BattlerId) -> bool {
        self.game
            .roster
            .battler(id)
            .is_some_and(|b| b.controllable && b.restriction(&self.game.database) == Restriction::Normal)
    }

    fn create_enemy_actions(&mut self) {
        let max = self.config.max_atb_gauge;
        for id in self.game.roster.enemy_ids() {
            let ready = self
                .game
                .roster
                .battler(id)
                .is_some_and(|e| e.exists() && e.is_gauge_full(max) && !e.action_queued);
            if !ready {
                continue;
            }
            let action = match restricted_action(id, &mut self.game) {
                Some(action) => action,
                None => self.enemy_ai.choose_action(id, &mut self.game),
            };
            self.action_selected(action);
        }
    }

    fn create_actor_auto_actions(&mut self) {
        let max = self.config.max_atb_gauge;
        let auto_battle = self.state == SceneState::AutoBattle;
        for id in self.game.roster.party_ids() {
            let ready = self
                .game
                .roster
                .battler(id)
                .is_some_and(|a| a.exists() && a.is_gauge_full(max) && !a.action_queued);
            if !ready || (self.is_controllable(id) && !auto_battle) {
                continue;
            }
            let action = match restricted_action(id, &mut self.game) {
                Some(action) => action,
                None => self.auto_ai.choose_action(id, &mut self.game),
            };
            self.action_selected(action);
        }
    }

    /// Queue an action chosen by a menu or an AI
    pub fn action_selected(&mut self, action: Algorithm) {
        let source = action.source;
        let from_menu = match source {
            BattlerId::Actor(id) => self.active_actor == Some(id),
            BattlerId::Enemy(_) => false,
        };
        let last_action = from_menu.then(|| {
            let actor = self.active_actor.unwrap_or(0);
            let entries = menu::actor_commands(&self.game.roster, &self.game.database, actor);
            match entries.get(self.ui.command_index) {
                Some(CommandEntry::Command { id, .. }) => *id,
                _ if entries.len() > 6 => -1,
                _ => 0,
            }
        });

        let Some(battler) = self.game.roster.battler_mut(source) else {
            tracing::warn!("ActionSelected: unknown battler {:?}", source);
            return;
        };
        battler.gauge = 0;
        battler.action_queued = true;
        if let Some(last) = last_action {
            battler.last_battle_action = last;
        }

        self.log.push(
            SceneEventType::ActionQueued { source },
            format!("{:?} queued {:?}", source, action.kind),
            self.frame,
        );
        self.actions.push_back(action);

        if source.is_ally() {
            self.first_strike = false;
        }
        if from_menu {
            self.set_state(SceneState::SelectActor);
        }
    }

    fn next_turn(&mut self, id: BattlerId) {
        self.game.roster.inc_turns();
        if let Some(battler) = self.game.roster.battler_mut(id) {
            battler.next_battle_turn();
        }
        self.interpreter.reset_all_pages_executed();
        self.log.push(
            SceneEventType::TurnAdvanced { battler: id },
            format!("turn {} for {:?}", self.game.roster.turns, id),
            self.frame,
        );
    }

    // === STATE AND TIMING ===

    fn set_state(&mut self, state: SceneState) {
        tracing::debug!("scene state {:?} -> {:?}", self.state, state);
        self.log.push(
            SceneEventType::StateChanged {
                from: self.state,
                to: state,
            },
            format!("{:?} -> {:?}", self.state, state),
            self.frame,
        );
        self.previous_state = self.state;
        self.state = state;
        self.substate = 0;
    }

    fn set_substate(&mut self, substate: u8) {
        self.substate = substate;
    }

    /// Hold the scene for `max` frames; decision or shift skip after `min`
    fn set_wait(&mut self, min: i32, max: i32) {
        self.wait = max;
        self.min_wait = max - min;
    }

    fn check_wait(&mut self, input: &dyn InputSource) -> bool {
        if self.wait > 0 {
            if input.is_pressed(Button::Cancel) {
                return false;
            }
            self.wait -= 1;
            if self.wait > self.min_wait {
                return false;
            }
            if !input.is_pressed(Button::Decision) && !input.is_pressed(Button::Shift) && self.wait > 0 {
                return false;
            }
            self.wait = 0;
        }
        true
    }

    fn show_notification(&mut self, text: &str) {
        if !text.is_empty() {
            self.notification = Some(text.to_string());
        }
    }

    fn end_notification(&mut self) {
        self.notification = None;
    }

    fn add_float_text(&mut self, target: BattlerId, text: String, heal: bool) {
        let position = self
            .game
            .roster
            .battler(target)
            .map(|b| b.position)
            .unwrap_or_default();
        self.float_texts.push(FloatText {
            target,
            x: position.x,
            y: position.y,
            text,
            heal,
            remaining: self.config.float_text_frames,
        });
    }

    fn end_battle(&mut self, result: BattleResult) {
        if self.result.is_some() {
            return;
        }
        self.result = Some(result);
        self.interpreter.clear();
        self.actions.clear();
        self.pending_action = None;
        let Roster { actors, enemies, .. } = &mut self.game.roster;
        for battler in actors.iter_mut().chain(enemies.iter_mut()) {
            battler.action_queued = false;
        }
        tracing::info!(
            "battle ended: {:?} after {} frames, {} turns",
            result,
            self.frame,
            self.game.roster.turns
        );
        self.log.push(
            SceneEventType::BattleEnded { result },
            format!("battle ended with {:?}", result),
            self.frame,
        );
    }
}

/// Side code (0 ally, 1 enemy) and id used by hook arguments
fn hook_battler_ref(id: BattlerId) -> (i32, i32) {
    match id {
        BattlerId::Actor(actor) => (0, actor),
        BattlerId::Enemy(index) => (1, index as i32),
    }
}
