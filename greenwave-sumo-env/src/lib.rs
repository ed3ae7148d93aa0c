//! Traffic-signal control on [SUMO](https://eclipse.dev/sumo/) as a greenwave environment.
//!
//! [`SumoEnv`] drives a SUMO process over TraCI, its remote-control protocol. Every
//! traffic light of the network is controlled by one component of the action:
//!
//! * [`Topology`] reads the network description once.
//! * [`SignalRegistry`] asks the simulator for its traffic lights, keeps the green
//!   phases of each one and binds it to an intersection of the topology.
//! * [`ActionTranslator`] turns choices into phase commands, holding every phase for
//!   a minimum dwell time and optionally passing through a yellow phase.
//! * [`ObservationBuilder`] and [`Reward`] read queues and waiting times.
//!
//! Timing and termination follow a [`ControlProfile`]. Two are provided,
//! [`ControlProfile::smart_lock`] (the default) and [`ControlProfile::drain`].
//!
//! Simulator calls return [`SimResult`]. During an episode, failures are folded into
//! neutral values with [`FailSoft`], so a single faulty query never aborts a step.
//! Building and resetting the environment fail hard.
//!
//! ```no_run
//! use greenwave_core::Env;
//! use greenwave_sumo_env::{SumoAct, SumoEnv, SumoEnvConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = SumoEnvConfig::default()
//!     .net_file("network.net.xml")
//!     .sumocfg("simulation.sumocfg");
//! let mut env: SumoEnv = SumoEnv::build(&config, 42)?;
//! let dims = env.action_dims();
//! let (_obs, _info) = env.reset()?;
//! loop {
//!     let (step, _record) = env.step(&SumoAct::random(&dims))?;
//!     if step.is_done() {
//!         break;
//!     }
//! }
//! env.close();
//! # Ok(())
//! # }
//! ```
mod act;
mod config;
mod demand;
mod env;
mod error;
mod fail_soft;
mod obs;
mod process;
mod registry;
mod reward;
mod simulator;
mod topology;
mod translator;
pub mod traci;
pub mod util;
pub use act::SumoAct;
pub use config::{
    ControlProfile, DemandConfig, ObservationConfig, RewardConfig, StarvationRule, SumoEnvConfig,
};
pub use demand::DemandGenerator;
pub use env::{check_termination, Lifecycle, SumoEnv, SumoInfo, TerminationReason};
pub use error::SumoEnvError;
pub use fail_soft::FailSoft;
pub use obs::{ObservationBuilder, SumoObs};
pub use process::{SumoLauncher, SumoProcess};
pub use registry::{is_green_phase, Signal, SignalRegistry, DEFAULT_GREEN_PHASES};
pub use reward::Reward;
pub use simulator::{Launcher, SimError, SimResult, Simulator};
pub use topology::{lane_to_edge, Intersection, Link, Topology, TopologyError};
pub use translator::{ActionTranslator, SignalState};
