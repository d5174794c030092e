//! `locobot` – runs the pick-and-place demo on a simulated Locobot.
//!
//! 1. Loads `~/.locobot/pick_place.toml` (writing the defaults on first
//!    run) and applies `LOCOBOT_*` overrides.
//! 2. Wires the simulated robot, with drive commands going over the topic
//!    bus to a simulated base.
//! 3. Runs the loop until Ctrl-C (or the configured iteration limit) and
//!    prints a summary.  Any driver failure exits with a nonzero status.

mod config;

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use tracing::{error, info, warn};

use locobot_hal::sim::SimLocobot;
use locobot_hal::{Locobot, SystemClock};
use locobot_middleware::{CmdVelPublisher, TopicBus, spawn_sim_base};
use locobot_runtime::{Locomotion, PickPlace, RunSummary, init_tracing};
use locobot_types::LocoError;

fn main() -> ExitCode {
    let _telemetry = init_tracing("locobot-pick-place");

    print_banner();

    let cfg = match load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            println!("{}: {e}", "Config error".red());
            return ExitCode::FAILURE;
        }
    };
    let loop_cfg = match cfg.pick_place() {
        Ok(c) => c,
        Err(e) => {
            println!("{}: {e}", "Config error".red());
            return ExitCode::FAILURE;
        }
    };

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the loop can only end on its iteration limit");
    }

    // ── Robot ─────────────────────────────────────────────────────────────
    let bus = TopicBus::new(cfg.cmd_vel_queue_size);
    let base = spawn_sim_base(&bus, cfg.loop_period_secs as f32);
    let bot = match build_robot(&cfg, &bus) {
        Ok(bot) => bot,
        Err(e) => {
            println!("{}: {e}", "Robot error".red());
            return ExitCode::FAILURE;
        }
    };
    info!(robot = %cfg.robot_model, ?bot, "robot ready");

    let locomotion = match cfg.rng_seed {
        Some(seed) => Locomotion::seeded(seed),
        None => Locomotion::from_entropy(),
    };
    println!(
        "  Running on {} ({} objects on the table). Press {} to stop.\n",
        cfg.robot_model.bold(),
        cfg.sim.objects.len(),
        "Ctrl-C".bold()
    );

    // ── Loop ──────────────────────────────────────────────────────────────
    let mut pick_place = PickPlace::new(bot, loop_cfg, locomotion);
    let result = pick_place.run(&shutdown, &mut std::io::stdout());

    // Dropping the robot and bus closes the drive-command topic.
    drop(pick_place);
    drop(bus);
    match base.join() {
        Ok(pose) => info!(x = pose.x, y = pose.y, heading = pose.heading_rad, "base odometry"),
        Err(_) => warn!("simulated base thread panicked"),
    }

    match result {
        Ok(summary) => {
            print_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "pick and place aborted");
            println!("{}: {e}", "Error".red().bold());
            ExitCode::FAILURE
        }
    }
}

/// Read the config file, writing the defaults if there is none.
fn load_config() -> Result<config::Config, LocoError> {
    let path = config::config_path();
    let mut cfg = match config::load()? {
        Some(cfg) => {
            println!("  Config loaded from {}", path.display().to_string().bold());
            cfg
        }
        None => {
            let cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    path.display().to_string().bold()
                ),
                Err(e) => warn!(error = %e, "could not write default config; continuing with defaults"),
            }
            cfg
        }
    };
    config::apply_env_overrides(&mut cfg);
    Ok(cfg)
}

fn build_robot(cfg: &config::Config, bus: &TopicBus) -> Result<Locobot, LocoError> {
    let scene = cfg.sim.objects.iter().fold(
        SimLocobot::new()
            .with_arm_model(cfg.arm_model.as_str())
            .with_refresh_every(cfg.sim.refresh_every),
        |scene, object| scene.with_object(object.name.as_str(), object.position()),
    );
    scene
        .into_builder()
        .base(Box::new(CmdVelPublisher::new(bus, cfg.cmd_vel_topic.as_str())))
        .clock(Box::new(SystemClock))
        .build()
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   __                 __          __ "#.bold().cyan());
    println!("{}", r#"  / /  ___  ________ / /  ___  __/ /_"#.bold().cyan());
    println!("{}", r#" / /__/ _ \/ __/ _ \/ _ \/ _ \/_  __/"#.bold().cyan());
    println!("{}", r#"/____/\___/\__/\___/_.__/\___/ /_/   "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Locobot Pick and Place".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!();
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("  {}", "Run summary".bold());
    println!("    iterations          {}", summary.iterations);
    println!("    picks               {}", summary.picks);
    println!("    duplicates skipped  {}", summary.duplicates_skipped);
    println!("    drive commands      {}", summary.drive_commands);
}
