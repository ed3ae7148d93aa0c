//! Errors in the environment.
use thiserror::Error;

/// Faults that stop the environment from being built or stepped.
///
/// Unlike [`SimError`](crate::SimError), these are not folded into neutral values.
#[derive(Error, Debug)]
pub enum SumoEnvError {
    /// The simulator reported no traffic light to control.
    #[error("no controllable traffic light in the network")]
    NoSignals,

    /// The environment was stepped without a running episode.
    #[error("no episode is running, call reset first")]
    NotRunning,

    /// A required configuration entry is not set.
    #[error("configuration entry `{0}` is required")]
    MissingConfig(&'static str),

    /// A timing entry of the control profile is not a positive finite number.
    #[error("profile entry `{field}` must be positive and finite, got {value}")]
    InvalidProfile {
        /// Name of the entry.
        field: &'static str,
        /// Rejected value.
        value: f64,
    },

    /// A launched simulator did not accept a connection.
    #[error("simulator did not accept a connection on port {port} after {attempts} attempts")]
    ConnectTimeout {
        /// Port the simulator was told to listen on.
        port: u16,
        /// Number of connection attempts.
        attempts: usize,
    },
}
