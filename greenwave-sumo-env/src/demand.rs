//! Random traffic demand for an episode.
use crate::DemandConfig;
use anyhow::{bail, Context, Result};
use log::{debug, warn};
use std::{
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

/// Runs SUMO's `randomTrips.py` to write a fresh route file.
#[derive(Debug, Clone)]
pub struct DemandGenerator {
    config: DemandConfig,
    tools_dir: Option<PathBuf>,
    net_file: PathBuf,
    route_file: PathBuf,
}

impl DemandGenerator {
    /// Creates a generator writing `route_file` for the network in `net_file`.
    pub fn new(
        config: &DemandConfig,
        tools_dir: Option<PathBuf>,
        net_file: impl Into<PathBuf>,
        route_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config: config.clone(),
            tools_dir,
            net_file: net_file.into(),
            route_file: route_file.into(),
        }
    }

    /// Command line generating demand up to `episode_duration` plus the margin.
    pub fn command(&self, script: &Path, episode_duration: f64, seed: Option<i64>) -> Command {
        let c = &self.config;
        let mut cmd = Command::new(&c.python);
        cmd.arg(script)
            .arg("-n")
            .arg(&self.net_file)
            .arg("-r")
            .arg(&self.route_file)
            .arg("-e")
            .arg((episode_duration + c.horizon_margin).to_string())
            .arg("-p")
            .arg(c.period.to_string())
            .arg("--fringe-factor")
            .arg(c.fringe_factor.to_string())
            .arg("--min-distance")
            .arg(c.min_distance.to_string());
        if c.validate {
            cmd.arg("--validate");
        }
        match seed {
            Some(seed) => cmd.arg("--seed").arg(seed.to_string()),
            None => cmd.arg("--random"),
        };
        cmd
    }

    fn run(&self, episode_duration: f64, seed: Option<i64>) -> Result<()> {
        let script = self
            .tools_dir
            .as_ref()
            .map(|d| d.join("randomTrips.py"))
            .context("SUMO tools not found, set SUMO_HOME")?;

        let mut cmd = self.command(&script, episode_duration, seed);
        debug!("{:?}", cmd);
        let status = cmd
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("failed to run {}", self.config.python))?;
        if !status.success() {
            bail!("randomTrips.py failed: {}", status);
        }
        Ok(())
    }

    /// Writes the route file.
    ///
    /// Returns `false` on failure; the episode then runs with whatever route file
    /// already exists.
    pub fn generate(&self, episode_duration: f64, seed: Option<i64>) -> bool {
        match self.run(episode_duration, seed) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Demand generation failed, keeping {}: {:#}",
                    self.route_file.display(),
                    e
                );
                false
            }
        }
    }
}
