//! Configuration of [`SumoEnv`](crate::SumoEnv).
//!
//! If environment variable `SUMO_HOME` exists, it is used as the SUMO installation
//! directory, in which the demand generator is looked up.
use crate::SumoEnvError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    env,
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

/// Install locations of the SUMO tools tried when `SUMO_HOME` is not set.
const TOOLS_FALLBACK_DIRS: [&str; 2] = ["/usr/share/sumo/tools", "/usr/local/share/sumo/tools"];

/// Rule ending an episode early when traffic runs out.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub enum StarvationRule {
    /// After `warmup_steps` steps, ends the episode when fewer than
    /// `min_vehicles` vehicles are in the network.
    Density {
        /// Grace period in steps.
        warmup_steps: usize,
        /// Minimum number of live vehicles.
        min_vehicles: usize,
    },

    /// Ends the episode when the network is empty after at least `min_steps` steps.
    Drain {
        /// Minimum number of steps.
        min_steps: usize,
    },
}

/// Timing and termination policy of signal control.
///
/// Two named profiles are provided; they disagree on timing and on the
/// starvation rule and are kept as separate configurations.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ControlProfile {
    /// Name used in logs.
    pub name: String,

    /// Simulated seconds per simulator tick.
    pub step_length: f64,

    /// Simulated seconds between two decisions of the agent.
    pub decision_interval: f64,

    /// Minimum simulated seconds a signal holds a phase before switching again.
    pub min_phase_time: f64,

    /// Duration of the transitional phase inserted before the target phase.
    /// `None` switches directly.
    pub transition_time: Option<f64>,

    /// Simulated seconds after which the episode terminates.
    pub episode_duration: f64,

    /// Early termination rule.
    pub starvation: StarvationRule,

    /// Number of steps after which the episode is truncated.
    pub max_steps: Option<usize>,
}

impl ControlProfile {
    /// Fast decisions with a dwell lock and a density-based early stop.
    pub fn smart_lock() -> Self {
        Self {
            name: "smart_lock".to_string(),
            step_length: 0.4,
            decision_interval: 2.0,
            min_phase_time: 8.0,
            transition_time: None,
            episode_duration: 3600.0,
            starvation: StarvationRule::Density {
                warmup_steps: 60,
                min_vehicles: 10,
            },
            max_steps: None,
        }
    }

    /// Slower decisions with yellow transitions, stopping when the network drains.
    pub fn drain() -> Self {
        Self {
            name: "drain".to_string(),
            step_length: 1.0,
            decision_interval: 5.0,
            min_phase_time: 10.0,
            transition_time: Some(3.0),
            episode_duration: 3600.0,
            starvation: StarvationRule::Drain { min_steps: 60 },
            max_steps: Some(720),
        }
    }

    /// Checks that the tick and decision lengths are positive finite numbers.
    pub fn validate(&self) -> Result<(), SumoEnvError> {
        for (field, value) in [
            ("step_length", self.step_length),
            ("decision_interval", self.decision_interval),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(SumoEnvError::InvalidProfile { field, value });
            }
        }
        Ok(())
    }

    /// Number of simulator ticks per environment step, at least one.
    pub fn ticks_per_step(&self) -> usize {
        (self.decision_interval / self.step_length).round().max(1.0) as usize
    }

    /// Sets the simulated seconds per tick.
    pub fn step_length(mut self, v: f64) -> Self {
        self.step_length = v;
        self
    }

    /// Sets the decision interval in simulated seconds.
    pub fn decision_interval(mut self, v: f64) -> Self {
        self.decision_interval = v;
        self
    }

    /// Sets the minimum phase dwell time in simulated seconds.
    pub fn min_phase_time(mut self, v: f64) -> Self {
        self.min_phase_time = v;
        self
    }

    /// Sets the duration of the transitional phase.
    pub fn transition_time(mut self, v: Option<f64>) -> Self {
        self.transition_time = v;
        self
    }

    /// Sets the episode duration in simulated seconds.
    pub fn episode_duration(mut self, v: f64) -> Self {
        self.episode_duration = v;
        self
    }

    /// Sets the early termination rule.
    pub fn starvation(mut self, v: StarvationRule) -> Self {
        self.starvation = v;
        self
    }

    /// Sets the step ceiling.
    pub fn max_steps(mut self, v: Option<usize>) -> Self {
        self.max_steps = v;
        self
    }
}

impl Default for ControlProfile {
    fn default() -> Self {
        Self::smart_lock()
    }
}

/// Configuration of [`ObservationBuilder`](crate::ObservationBuilder).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ObservationConfig {
    /// Number of approach slots per signal; extra approaches are dropped and
    /// missing ones are zero.
    pub max_approaches: usize,
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self { max_approaches: 4 }
    }
}

/// Weights of [`Reward`](crate::Reward).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RewardConfig {
    /// Weight of the number of halted vehicles.
    pub queue_weight: f64,

    /// Weight of the waiting time in seconds.
    pub wait_weight: f64,

    /// Per-link waiting time beyond which the excess is amplified.
    pub max_wait: f64,

    /// Extra weight of the excess waiting time; zero disables the penalty.
    pub amplifier: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            queue_weight: 1.0,
            wait_weight: 0.05,
            max_wait: 120.0,
            amplifier: 0.0,
        }
    }
}

/// Parameters of the random demand generator run before each episode.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DemandConfig {
    /// Python interpreter running the generator.
    pub python: String,

    /// Seconds added to the episode duration to get the demand horizon.
    pub horizon_margin: f64,

    /// Mean period between departures in seconds.
    pub period: f64,

    /// Weight of trips starting or ending at the fringe of the network.
    pub fringe_factor: f64,

    /// Minimum straight-line trip distance in meters.
    pub min_distance: f64,

    /// Removes trips that cannot be routed.
    pub validate: bool,
}

impl Default for DemandConfig {
    fn default() -> Self {
        Self {
            python: "python".to_string(),
            horizon_margin: 500.0,
            period: 1.5,
            fringe_factor: 10.0,
            min_distance: 300.0,
            validate: true,
        }
    }
}

/// Configuration of [`SumoEnv`](crate::SumoEnv).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SumoEnvConfig {
    /// Network description (`.net.xml`). Required.
    pub net_file: Option<PathBuf>,

    /// Route file written by the demand generator.
    pub route_file: PathBuf,

    /// Scenario configuration (`.sumocfg`). Required.
    pub sumocfg: Option<PathBuf>,

    /// SUMO installation directory.
    pub sumo_home: Option<PathBuf>,

    /// Runs `sumo-gui` instead of `sumo`.
    pub gui: bool,

    /// Overrides the simulator binary.
    pub sumo_binary: Option<String>,

    /// Label of the environment in logs. Random if not given.
    pub label: Option<String>,

    /// Timing and termination policy.
    pub profile: ControlProfile,

    /// Observation layout.
    pub observation: ObservationConfig,

    /// Reward weights.
    pub reward: RewardConfig,

    /// Demand regenerated on every reset; `None` keeps the route file as is.
    pub demand: Option<DemandConfig>,

    /// Simulator ticks run after a reset before the first observation.
    pub warmup_ticks: usize,

    /// Wall-clock seconds slept after every tick when the GUI is on.
    pub gui_delay: f64,

    /// Number of connection attempts to a launched simulator.
    pub connect_retries: usize,
}

impl Default for SumoEnvConfig {
    fn default() -> Self {
        let sumo_home = env::var("SUMO_HOME").ok().map(PathBuf::from);

        Self {
            net_file: None,
            route_file: PathBuf::from("routes.rou.xml"),
            sumocfg: None,
            sumo_home,
            gui: false,
            sumo_binary: None,
            label: None,
            profile: ControlProfile::default(),
            observation: ObservationConfig::default(),
            reward: RewardConfig::default(),
            demand: Some(DemandConfig::default()),
            warmup_ticks: 5,
            gui_delay: 0.01,
            connect_retries: 60,
        }
    }
}

impl SumoEnvConfig {
    /// Sets the network description.
    pub fn net_file(mut self, v: impl Into<PathBuf>) -> Self {
        self.net_file = Some(v.into());
        self
    }

    /// Sets the route file.
    pub fn route_file(mut self, v: impl Into<PathBuf>) -> Self {
        self.route_file = v.into();
        self
    }

    /// Sets the scenario configuration.
    pub fn sumocfg(mut self, v: impl Into<PathBuf>) -> Self {
        self.sumocfg = Some(v.into());
        self
    }

    /// Sets the SUMO installation directory.
    pub fn sumo_home(mut self, v: impl Into<PathBuf>) -> Self {
        self.sumo_home = Some(v.into());
        self
    }

    /// Turns the GUI on or off.
    pub fn gui(mut self, v: bool) -> Self {
        self.gui = v;
        self
    }

    /// Sets the simulator binary.
    pub fn sumo_binary(mut self, v: impl Into<String>) -> Self {
        self.sumo_binary = Some(v.into());
        self
    }

    /// Sets the label.
    pub fn label(mut self, v: impl Into<String>) -> Self {
        self.label = Some(v.into());
        self
    }

    /// Sets the control profile.
    pub fn profile(mut self, v: ControlProfile) -> Self {
        self.profile = v;
        self
    }

    /// Sets the observation layout.
    pub fn observation(mut self, v: ObservationConfig) -> Self {
        self.observation = v;
        self
    }

    /// Sets the reward weights.
    pub fn reward(mut self, v: RewardConfig) -> Self {
        self.reward = v;
        self
    }

    /// Sets the demand generator; `None` disables regeneration.
    pub fn demand(mut self, v: Option<DemandConfig>) -> Self {
        self.demand = v;
        self
    }

    /// Sets the number of warm-up ticks.
    pub fn warmup_ticks(mut self, v: usize) -> Self {
        self.warmup_ticks = v;
        self
    }

    /// Sets the delay after each tick with the GUI.
    pub fn gui_delay(mut self, v: f64) -> Self {
        self.gui_delay = v;
        self
    }

    /// Sets the number of connection attempts.
    pub fn connect_retries(mut self, v: usize) -> Self {
        self.connect_retries = v;
        self
    }

    /// Returns the network description path.
    pub fn net_file_path(&self) -> Result<&Path, SumoEnvError> {
        self.net_file
            .as_deref()
            .ok_or(SumoEnvError::MissingConfig("net_file"))
    }

    /// Returns the scenario configuration path.
    pub fn sumocfg_path(&self) -> Result<&Path, SumoEnvError> {
        self.sumocfg
            .as_deref()
            .ok_or(SumoEnvError::MissingConfig("sumocfg"))
    }

    /// Returns the simulator binary to launch.
    pub fn binary(&self) -> &str {
        match self.sumo_binary.as_deref() {
            Some(b) => b,
            None if self.gui => "sumo-gui",
            None => "sumo",
        }
    }

    /// Returns the directory of the SUMO tools, if one can be found.
    pub fn tools_dir(&self) -> Option<PathBuf> {
        match self.sumo_home.as_ref() {
            Some(home) => Some(home.join("tools")),
            None => TOOLS_FALLBACK_DIRS
                .iter()
                .map(|p| PathBuf::from(*p))
                .find(|p| p.exists()),
        }
    }

    /// Loads configuration from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
