//! Headless Battle Runner
//!
//! Loads a scenario (database + battle setup), runs the scene frame by frame with
//! scripted input, and prints a JSON summary.

use std::fs;
use std::path::{Path, PathBuf};

use atb_engine::battle::{BattleScene, BattleSetup, FrameIo};
use atb_engine::core::{BattleConfig, Result};
use atb_engine::data::Database;
use atb_engine::platform::{Button, InputState, InstantAssets, SoundLog};
use clap::Parser;
use serde::{Deserialize, Serialize};

/// Headless Battle Runner - scripted ATB battles without a window
#[derive(Parser, Debug)]
#[command(name = "battle_runner")]
#[command(about = "Run a battle scenario headless and print a summary")]
struct Args {
    /// Scenario file (.toml or .json) with `database` and `setup` tables
    scenario: PathBuf,

    /// Battle config TOML; overrides the scenario's own config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum frames before giving up
    #[arg(long, default_value_t = 36_000)]
    max_frames: u64,

    /// Press Decision every N frames (0 = never)
    #[arg(long, default_value_t = 4)]
    decision_every: u64,

    /// Override the config's random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Output format: json or text
    #[arg(long, default_value = "json")]
    format: String,

    /// Print the scene event log to stderr
    #[arg(long, short = 'v')]
    verbose: bool,
}

/// Everything one battle needs
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Scenario {
    config: Option<BattleConfig>,
    database: Database,
    setup: BattleSetup,
}

#[derive(Serialize)]
struct MemberSummary {
    id: i32,
    name: String,
    hp: i32,
    max_hp: i32,
}

/// JSON output structure
#[derive(Serialize)]
struct RunSummary {
    result: Option<String>,
    frames: u64,
    turns: i32,
    party: Vec<MemberSummary>,
    enemies_alive: usize,
    gold: i32,
    sounds_played: usize,
    events_logged: usize,
    seed: u64,
}

fn load_scenario(path: &Path) -> Result<Scenario> {
    let content = fs::read_to_string(path)?;
    let is_json = path.extension().is_some_and(|ext| ext == "json");
    let scenario = if is_json {
        serde_json::from_str(&content)?
    } else {
        toml::from_str(&content)?
    };
    Ok(scenario)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("atb_engine=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let scenario = load_scenario(&args.scenario)?;
    let mut config = match &args.config {
        Some(path) => BattleConfig::load(path)?,
        None => scenario.config.unwrap_or_default(),
    };
    if let Some(seed) = args.seed {
        config.rng_seed = seed;
    }
    let seed = config.rng_seed;

    let mut scene = BattleScene::new(config, scenario.database, scenario.setup)?;
    tracing::info!("running {} for at most {} frames", args.scenario.display(), args.max_frames);

    let mut input = InputState::new();
    let mut audio = SoundLog::new();
    let mut assets = InstantAssets::default();
    let mut logged = 0;

    while !scene.is_finished() && scene.frame_count() < args.max_frames {
        input.next_frame();
        if args.decision_every > 0 && scene.frame_count() % args.decision_every == 0 {
            input.press(Button::Decision);
        }

        let mut io = FrameIo::new(&input, &mut audio, &mut assets);
        scene.update(&mut io);

        if args.verbose {
            for event in scene.log().events.iter().skip(logged) {
                eprintln!("  [{}] {:?}: {}", event.frame, event.event_type, event.description);
            }
            logged = scene.log().events.len();
        }
    }

    if !scene.is_finished() {
        tracing::warn!("battle still running after {} frames", args.max_frames);
    }

    let game = scene.game();
    let summary = RunSummary {
        result: scene.result().map(|r| format!("{:?}", r)),
        frames: scene.frame_count(),
        turns: game.roster.turns,
        party: game
            .roster
            .party_members()
            .map(|a| MemberSummary {
                id: a.db_id,
                name: a.name.clone(),
                hp: a.hp,
                max_hp: a.stats.max_hp,
            })
            .collect(),
        enemies_alive: game.roster.enemies.iter().filter(|e| e.exists()).count(),
        gold: game.roster.gold,
        sounds_played: audio.played.len(),
        events_logged: scene.log().events.len(),
        seed,
    };

    match args.format.as_str() {
        "text" => {
            println!("Battle Result");
            println!("=============");
            println!("Result: {}", summary.result.as_deref().unwrap_or("unfinished"));
            println!("Frames: {}", summary.frames);
            println!("Turns: {}", summary.turns);
            for member in &summary.party {
                println!("  {} HP {}/{}", member.name, member.hp, member.max_hp);
            }
            println!("Enemies alive: {}", summary.enemies_alive);
            println!("Gold: {}", summary.gold);
            println!("Seed: {}", summary.seed);
        }
        other => {
            if other != "json" {
                eprintln!("Unknown format '{}', defaulting to json", other);
            }
            let json = serde_json::to_string_pretty(&summary)?;
            println!("{}", json);
        }
    }
    Ok(())
}
