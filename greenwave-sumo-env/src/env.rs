//! Traffic-signal control environment.
use crate::{
    ActionTranslator, ControlProfile, DemandGenerator, FailSoft, Launcher, ObservationBuilder,
    Reward, SignalRegistry, Simulator, StarvationRule, SumoAct, SumoEnvConfig, SumoEnvError,
    SumoLauncher, SumoObs, Topology,
};
use anyhow::Result;
use chrono::{DateTime, Local};
use greenwave_core::{
    record::{Record, RecordValue},
    Env, Info, Step,
};
use log::{debug, info};

/// Why an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The simulated time budget of the episode is used up.
    TimeBudget,

    /// Too few vehicles after the warm-up period.
    LowDensity,

    /// The network emptied.
    Drained,

    /// The step ceiling was reached (truncation).
    StepLimit,
}

/// Information attached to observations.
#[derive(Debug, Clone, PartialEq)]
pub struct SumoInfo {
    /// Steps since the last reset.
    pub step: usize,

    /// Vehicles in the network, `None` if the query failed.
    pub vehicles: Option<usize>,

    /// Simulated seconds since the last reset.
    pub sim_time: f64,

    /// Set on the last step of an episode.
    pub reason: Option<TerminationReason>,
}

impl Info for SumoInfo {}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Lifecycle of a [`SumoEnv`].
///
/// ```mermaid
/// stateDiagram-v2
///     [*] --> Uninitialized: build
///     Uninitialized --> Running: reset
///     Running --> Running: step
///     Running --> Terminated: terminated, truncated or close
///     Terminated --> Running: reset
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Built, no episode started yet.
    Uninitialized,

    /// An episode is running and the simulator is connected.
    Running,

    /// The last episode ended and the simulator is closed.
    Terminated,
}

/// Decides whether an episode ends after `step` steps.
///
/// Every rule is evaluated; the reason reported is the first rule that fired, in
/// the order time budget, starvation, step ceiling. Starvation is not checked when
/// the vehicle count is unknown. Returns `(is_terminated, is_truncated, reason)`.
pub fn check_termination(
    profile: &ControlProfile,
    step: usize,
    vehicles: Option<usize>,
) -> (bool, bool, Option<TerminationReason>) {
    let mut reasons = vec![];

    if step as f64 * profile.decision_interval >= profile.episode_duration {
        reasons.push(TerminationReason::TimeBudget);
    }
    if let Some(vehicles) = vehicles {
        match profile.starvation {
            StarvationRule::Density {
                warmup_steps,
                min_vehicles,
            } => {
                if step > warmup_steps && vehicles < min_vehicles {
                    reasons.push(TerminationReason::LowDensity);
                }
            }
            StarvationRule::Drain { min_steps } => {
                if step >= min_steps && vehicles == 0 {
                    reasons.push(TerminationReason::Drained);
                }
            }
        }
    }
    let is_terminated = !reasons.is_empty();
    let is_truncated = profile.max_steps.map_or(false, |m| step >= m);
    if is_truncated {
        reasons.push(TerminationReason::StepLimit);
    }

    (is_terminated, is_truncated, reasons.first().copied())
}

struct Episode {
    index: usize,
    step: usize,
    ticks: usize,
    ret: f32,
    started: DateTime<Local>,
}

impl Episode {
    fn new(index: usize) -> Self {
        Self {
            index,
            step: 0,
            ticks: 0,
            ret: 0.0,
            started: Local::now(),
        }
    }
}

/// Traffic-signal control on a SUMO network.
///
/// Each traffic light of the network is an agent choosing one of its green phases
/// every decision interval; see [`SumoAct`] and [`ObservationBuilder`]. The reward
/// is the congestion cost computed by [`Reward`].
///
/// The environment owns its simulator connection. [`Env::build`] runs a short
/// discovery simulation to find the traffic lights; every reset regenerates the
/// demand and starts a new simulator. Failed simulator calls during an episode
/// contribute neutral values and are counted in the `"sim_failures"` entry of the
/// step record.
pub struct SumoEnv<L: Launcher = SumoLauncher> {
    config: SumoEnvConfig,
    label: String,
    seed: i64,
    launcher: L,
    topology: Topology,
    registry: SignalRegistry,
    translator: ActionTranslator,
    obs_builder: ObservationBuilder,
    reward: Reward,
    demand: Option<DemandGenerator>,
    sim: Option<L::Sim>,
    lifecycle: Lifecycle,
    episode: Episode,
}

impl<L: Launcher> SumoEnv<L> {
    /// Builds the environment with a given launcher.
    pub fn with_launcher(config: &SumoEnvConfig, mut launcher: L, seed: i64) -> Result<Self> {
        config.profile.validate()?;
        let net_file = config.net_file_path()?;
        let topology = Topology::load(net_file)?;
        let label = match config.label.as_ref() {
            Some(label) => label.clone(),
            None => format!("greenwave_{}", fastrand::u32(..100_000)),
        };
        info!(
            "{}: {} intersections, {} links in {}",
            label,
            topology.intersections().len(),
            topology.links().len(),
            net_file.display()
        );

        let mut sim = launcher.launch(&format!("{}_discovery", label), Some(seed))?;
        let registry = SignalRegistry::discover(&mut sim, &topology);
        if let Err(e) = sim.close() {
            debug!("{}: closing the discovery simulation failed: {}", label, e);
        }
        let registry = registry?;
        if registry.is_empty() {
            return Err(SumoEnvError::NoSignals.into());
        }
        info!(
            "{}: {} traffic lights, action dimensions {:?}",
            label,
            registry.len(),
            registry.action_dims()
        );

        let profile = &config.profile;
        let translator =
            ActionTranslator::new(profile.min_phase_time, profile.transition_time, registry.len());
        let obs_builder = ObservationBuilder::new(&config.observation);
        let reward = Reward::new(&config.reward, &topology, registry.signals());
        let demand = config.demand.as_ref().map(|d| {
            DemandGenerator::new(d, config.tools_dir(), net_file, &config.route_file)
        });

        Ok(Self {
            config: config.clone(),
            label,
            seed,
            launcher,
            topology,
            registry,
            translator,
            obs_builder,
            reward,
            demand,
            sim: None,
            lifecycle: Lifecycle::Uninitialized,
            episode: Episode::new(0),
        })
    }

    /// Number of choices of each signal, in action order.
    pub fn action_dims(&self) -> Vec<usize> {
        self.registry.action_dims()
    }

    /// Length of an observation.
    pub fn obs_dim(&self) -> usize {
        self.obs_builder.obs_dim(self.registry.len())
    }

    /// Controlled signals.
    pub fn registry(&self) -> &SignalRegistry {
        &self.registry
    }

    /// Network topology.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Label of the environment in logs.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Launcher of the simulator.
    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Simulated seconds since the last reset.
    pub fn sim_time(&self) -> f64 {
        self.episode.ticks as f64 * self.config.profile.step_length
    }

    /// Current phase of the `ix`-th signal as reported by the simulator.
    ///
    /// `None` if no episode is running or the query failed.
    pub fn phase(&mut self, ix: usize) -> Option<usize> {
        let signal = self.registry.signals().get(ix)?;
        self.sim.as_mut()?.phase(&signal.id).ok()
    }

    fn close_sim(&mut self) {
        if let Some(mut sim) = self.sim.take() {
            if let Err(e) = sim.close() {
                debug!("{}: closing the simulation failed: {}", self.label, e);
            }
        }
    }

    /// Advances the simulator by one tick and completes elapsed transitions.
    fn tick(&mut self, fs: &mut FailSoft) {
        if let Some(sim) = self.sim.as_mut() {
            fs.ok(sim.simulation_step());
            self.episode.ticks += 1;
            let now = self.episode.ticks as f64 * self.config.profile.step_length;
            self.translator.poll(sim, self.registry.signals(), now, fs);
        }
    }

    fn observe(&mut self, fs: &mut FailSoft) -> Result<(SumoObs, f32, Option<usize>)> {
        let now = self.sim_time();
        let sim = self.sim.as_mut().ok_or(SumoEnvError::NotRunning)?;
        let obs = self.obs_builder.build(
            sim,
            &self.topology,
            self.registry.signals(),
            &self.translator,
            now,
            fs,
        );
        let reward = self.reward.compute(sim, fs);
        let vehicles = fs.ok(sim.vehicle_count());
        Ok((obs, reward, vehicles))
    }

    fn start_episode(&mut self, seed: Option<i64>) -> Result<(SumoObs, SumoInfo)> {
        let duration = self.config.profile.episode_duration;
        if let Some(demand) = self.demand.as_ref() {
            demand.generate(duration, seed);
        }

        self.close();
        self.sim = Some(self.launcher.launch(&self.label, seed)?);
        self.translator.reset();
        self.episode = Episode::new(self.episode.index + 1);
        self.lifecycle = Lifecycle::Running;

        let mut fs = FailSoft::new();
        for _ in 0..self.config.warmup_ticks {
            self.tick(&mut fs);
        }
        let (obs, _, vehicles) = self.observe(&mut fs)?;
        fs.log(&self.label);

        info!(
            "{}: episode {} started ({}, {:?} vehicles)",
            self.label, self.episode.index, self.config.profile.name, vehicles
        );

        let info = SumoInfo {
            step: 0,
            vehicles,
            sim_time: self.sim_time(),
            reason: None,
        };
        Ok((obs, info))
    }

    fn finish_episode(&mut self, reason: Option<TerminationReason>) {
        self.close_sim();
        self.lifecycle = Lifecycle::Terminated;

        let wall = Local::now().signed_duration_since(self.episode.started);
        info!(
            "{}: episode {} ended after {} steps ({:.1} min simulated, {:.1} s wall), reason {:?}, return {:.1}",
            self.label,
            self.episode.index,
            self.episode.step,
            self.sim_time() / 60.0,
            wall.num_milliseconds() as f64 / 1000.0,
            reason,
            self.episode.ret
        );
    }
}

impl<L: Launcher> Env for SumoEnv<L> {
    type Config = SumoEnvConfig;
    type Obs = SumoObs;
    type Act = SumoAct;
    type Info = SumoInfo;

    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized,
    {
        let launcher = L::build(config)?;
        Self::with_launcher(config, launcher, seed)
    }

    /// Starts an episode with random demand.
    fn reset(&mut self) -> Result<(SumoObs, SumoInfo)> {
        self.start_episode(None)
    }

    /// Starts an episode seeded with the seed of the environment plus `ix`.
    fn reset_with_index(&mut self, ix: usize) -> Result<(SumoObs, SumoInfo)> {
        self.start_episode(Some(self.seed + ix as i64))
    }

    fn step(&mut self, a: &SumoAct) -> Result<(Step<Self>, Record)> {
        if self.lifecycle != Lifecycle::Running {
            return Err(SumoEnvError::NotRunning.into());
        }

        let mut fs = FailSoft::new();
        let now = self.sim_time();
        let sim = self.sim.as_mut().ok_or(SumoEnvError::NotRunning)?;
        let switches = self
            .translator
            .apply(sim, self.registry.signals(), a.choices(), now, &mut fs);

        for _ in 0..self.config.profile.ticks_per_step() {
            self.tick(&mut fs);
        }
        self.episode.step += 1;

        let (obs, reward, vehicles) = self.observe(&mut fs)?;
        self.episode.ret += reward;
        let (is_terminated, is_truncated, reason) =
            check_termination(&self.config.profile, self.episode.step, vehicles);
        fs.log(&self.label);

        let mut record = Record::from_slice(&[
            ("sim_time", RecordValue::Scalar(self.sim_time() as f32)),
            ("switches", RecordValue::Scalar(switches as f32)),
            ("sim_failures", RecordValue::Scalar(fs.failures() as f32)),
        ]);
        if let Some(v) = vehicles {
            record.insert("vehicles", RecordValue::Scalar(v as f32));
        }
        if let Some(r) = reason {
            record.insert("reason", RecordValue::String(format!("{:?}", r)));
        }

        let info = SumoInfo {
            step: self.episode.step,
            vehicles,
            sim_time: self.sim_time(),
            reason,
        };
        if is_terminated || is_truncated {
            self.finish_episode(reason);
        }

        let step = Step::new(obs, a.clone(), reward, is_terminated, is_truncated, info);
        Ok((step, record))
    }

    fn close(&mut self) {
        self.close_sim();
        if self.lifecycle == Lifecycle::Running {
            self.lifecycle = Lifecycle::Terminated;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_budget() {
        let profile = ControlProfile::smart_lock().episode_duration(10.0);
        assert_eq!(check_termination(&profile, 4, Some(100)), (false, false, None));
        assert_eq!(
            check_termination(&profile, 5, Some(100)),
            (true, false, Some(TerminationReason::TimeBudget))
        );
    }

    #[test]
    fn test_density_rule() {
        let profile = ControlProfile::smart_lock();
        assert_eq!(check_termination(&profile, 60, Some(0)), (false, false, None));
        assert_eq!(
            check_termination(&profile, 61, Some(9)),
            (true, false, Some(TerminationReason::LowDensity))
        );
        assert_eq!(check_termination(&profile, 61, Some(10)), (false, false, None));
        // Unknown vehicle count skips the rule.
        assert_eq!(check_termination(&profile, 61, None), (false, false, None));
    }

    #[test]
    fn test_drain_rule_and_step_limit() {
        let profile = ControlProfile::drain();
        assert_eq!(check_termination(&profile, 59, Some(0)), (false, false, None));
        assert_eq!(
            check_termination(&profile, 60, Some(0)),
            (true, false, Some(TerminationReason::Drained))
        );
        assert_eq!(
            check_termination(&profile, 720, Some(5)),
            (true, true, Some(TerminationReason::TimeBudget))
        );

        let profile = profile.max_steps(Some(100));
        assert_eq!(
            check_termination(&profile, 100, Some(5)),
            (false, true, Some(TerminationReason::StepLimit))
        );
    }

    #[test]
    fn test_first_reason_wins() {
        let profile = ControlProfile::smart_lock().episode_duration(10.0);
        let (terminated, _, reason) = check_termination(&profile, 100, Some(0));
        assert!(terminated);
        assert_eq!(reason, Some(TerminationReason::TimeBudget));
    }
}
