//! Drives the traffic lights of a SUMO network with random actions.
//!
//! Useful to check that phase commands reach the simulator: every change of the
//! phase of a watched traffic light is logged, and per-step records are written to
//! a CSV file.
//!
//! ```bash
//! cargo run --example random_control -- --net network.net.xml --cfg simulation.sumocfg --gui
//! ```
use anyhow::Result;
use clap::Parser;
use csv::WriterBuilder;
use greenwave_core::{
    record::{BufferedRecorder, Record, RecordValue, Recorder},
    Env,
};
use greenwave_sumo_env::{ControlProfile, SumoAct, SumoEnv, SumoEnvConfig};
use log::info;
use serde::Serialize;
use std::{convert::TryFrom, fs::File, thread::sleep, time::Duration};

/// Drive SUMO traffic lights with random actions
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Network description
    #[arg(long, default_value = "network.net.xml")]
    net: String,

    /// SUMO configuration
    #[arg(long, default_value = "simulation.sumocfg")]
    cfg: String,

    /// Route file rewritten before every episode
    #[arg(long, default_value = "routes.rou.xml")]
    routes: String,

    /// Environment configuration in YAML, overrides the other options
    #[arg(long)]
    config: Option<String>,

    /// Control profile, `smart_lock` or `drain`
    #[arg(long, default_value = "smart_lock")]
    profile: String,

    /// Run sumo-gui
    #[arg(long, default_value_t = false)]
    gui: bool,

    /// Number of steps
    #[arg(long, default_value_t = 100)]
    steps: usize,

    /// Index of the watched traffic light
    #[arg(long, default_value_t = 0)]
    watch: usize,

    /// Wall-clock milliseconds between steps
    #[arg(long, default_value_t = 0)]
    wait: u64,

    /// Output file of the step records
    #[arg(long, default_value = "random_control.csv")]
    csv: String,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    seed: i64,
}

#[derive(Debug, Serialize)]
struct ControlRecord {
    episode: usize,
    step: usize,
    sim_time: f32,
    reward: f32,
    vehicles: Option<f32>,
    switches: f32,
    sim_failures: f32,
    phase_before: Option<f32>,
    phase_after: Option<f32>,
    reason: Option<String>,
}

impl TryFrom<&Record> for ControlRecord {
    type Error = anyhow::Error;

    fn try_from(record: &Record) -> Result<Self> {
        Ok(Self {
            episode: record.get_scalar("episode")? as _,
            step: record.get_scalar("step")? as _,
            sim_time: record.get_scalar("sim_time")?,
            reward: record.get_scalar("reward")?,
            vehicles: record.get_scalar("vehicles").ok(),
            switches: record.get_scalar("switches")?,
            sim_failures: record.get_scalar("sim_failures")?,
            phase_before: record.get_scalar("phase_before").ok(),
            phase_after: record.get_scalar("phase_after").ok(),
            reason: record.get_string("reason").ok(),
        })
    }
}

fn env_config(args: &Args) -> Result<SumoEnvConfig> {
    if let Some(path) = args.config.as_ref() {
        return SumoEnvConfig::load(path);
    }
    let profile = match args.profile.as_str() {
        "drain" => ControlProfile::drain(),
        "smart_lock" => ControlProfile::smart_lock(),
        p => anyhow::bail!("unknown profile {}", p),
    };
    Ok(SumoEnvConfig::default()
        .net_file(&args.net)
        .sumocfg(&args.cfg)
        .route_file(&args.routes)
        .gui(args.gui)
        .profile(profile))
}

fn scalar(v: Option<usize>) -> Option<RecordValue> {
    v.map(|v| RecordValue::Scalar(v as f32))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    fastrand::seed(args.seed as u64);

    let config = env_config(&args)?;
    let mut env: SumoEnv = SumoEnv::build(&config, args.seed)?;
    let dims = env.action_dims();
    let watched = env
        .registry()
        .signals()
        .get(args.watch)
        .map(|s| s.id.clone())
        .ok_or_else(|| anyhow::anyhow!("no traffic light with index {}", args.watch))?;
    info!("Watching traffic light {}", watched);

    let mut recorder = BufferedRecorder::new();
    let mut episode = 0;
    let mut step = 0;
    let mut changes = 0;
    env.reset_with_index(episode)?;

    for _ in 0..args.steps {
        let phase_before = env.phase(args.watch);
        let (s, mut record) = env.step(&SumoAct::random(&dims))?;
        let phase_after = env.phase(args.watch);

        if phase_before != phase_after && !s.is_done() {
            changes += 1;
            info!(
                "{} changed phase: {:?} -> {:?} at {:.1} s",
                watched, phase_before, phase_after, s.info.sim_time
            );
        }

        record.insert("episode", RecordValue::Scalar(episode as _));
        record.insert("step", RecordValue::Scalar(step as _));
        record.insert("reward", RecordValue::Scalar(s.reward));
        if let Some(v) = scalar(phase_before) {
            record.insert("phase_before", v);
        }
        if let Some(v) = scalar(phase_after) {
            record.insert("phase_after", v);
        }
        recorder.write(record);

        if s.is_done() {
            episode += 1;
            step = 0;
            env.reset_with_index(episode)?;
        } else {
            step += 1;
        }
        if args.wait > 0 {
            sleep(Duration::from_millis(args.wait));
        }
    }
    env.close();
    info!("{} phase changes of {} in {} steps", changes, watched, args.steps);

    let mut wtr = WriterBuilder::new()
        .has_headers(true)
        .from_writer(File::create(&args.csv)?);
    for record in recorder.iter() {
        wtr.serialize(ControlRecord::try_from(record)?)?;
    }
    wtr.flush()?;
    info!("Records written to {}", args.csv);

    Ok(())
}
