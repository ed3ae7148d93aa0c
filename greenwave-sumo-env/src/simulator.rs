//! Interface to a running traffic simulator.
//!
//! [`Simulator`] is the connection handle every component of the environment works
//! through. There is no process-wide client: each environment owns the handle
//! returned by its [`Launcher`], so several environments can run in one process.
use crate::SumoEnvConfig;
use anyhow::Result;
use thiserror::Error;

/// A failed simulator call.
///
/// During an episode these failures are transient from the point of view of the
/// environment: they are folded into neutral values with
/// [`FailSoft`](crate::FailSoft) instead of aborting the step.
#[derive(Error, Debug)]
pub enum SimError {
    /// The connection to the simulator failed.
    #[error("simulator connection error: {0}")]
    Io(#[from] std::io::Error),

    /// The simulator rejected a command, e.g., because the object id is unknown.
    #[error("command 0x{command:02x} failed: {description}")]
    Command {
        /// Command identifier.
        command: u8,
        /// Description sent by the simulator.
        description: String,
    },

    /// The simulator sent something that could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The connection has already been closed.
    #[error("simulator connection is closed")]
    Closed,
}

/// Result of a single simulator call.
pub type SimResult<T> = std::result::Result<T, SimError>;

/// Request/response interface to a running simulation.
///
/// All calls block until the simulator answers.
pub trait Simulator {
    /// Advances the simulation by one tick.
    fn simulation_step(&mut self) -> SimResult<()>;

    /// Ids of all traffic lights.
    fn traffic_light_ids(&mut self) -> SimResult<Vec<String>>;

    /// Lanes controlled by a traffic light, one entry per signal link.
    fn controlled_lanes(&mut self, tls_id: &str) -> SimResult<Vec<String>>;

    /// State strings of the phases of the traffic light's active program.
    fn program_states(&mut self, tls_id: &str) -> SimResult<Vec<String>>;

    /// Index of the current phase of a traffic light.
    fn phase(&mut self, tls_id: &str) -> SimResult<usize>;

    /// Switches a traffic light to the given phase.
    fn set_phase(&mut self, tls_id: &str, phase: usize) -> SimResult<()>;

    /// Number of halting vehicles on an edge in the last tick.
    fn edge_halting_number(&mut self, edge_id: &str) -> SimResult<u32>;

    /// Sum of the waiting times of vehicles on an edge, in seconds.
    fn edge_waiting_time(&mut self, edge_id: &str) -> SimResult<f64>;

    /// Number of vehicles currently in the network.
    fn vehicle_count(&mut self) -> SimResult<usize>;

    /// Closes the connection. Closing a closed connection succeeds.
    fn close(&mut self) -> SimResult<()>;
}

/// Starts simulator processes.
pub trait Launcher {
    /// Connection handle of a launched simulator.
    type Sim: Simulator;

    /// Builds the launcher from the environment configuration.
    fn build(config: &SumoEnvConfig) -> Result<Self>
    where
        Self: Sized;

    /// Starts a fresh simulator and connects to it.
    ///
    /// `label` names the run in logs; `seed` is the random seed of the simulation.
    fn launch(&mut self, label: &str, seed: Option<i64>) -> Result<Self::Sim>;
}
