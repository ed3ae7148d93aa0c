//! Environment.
use super::{Act, Info, Obs, Step};
use crate::record::Record;
use anyhow::Result;

/// Represents an environment, typically an MDP.
///
/// An environment owns every external resource it needs (processes, connections),
/// so several instances can live side by side in a single process.
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Observation of the environment.
    type Obs: Obs;

    /// Action of the environment.
    type Act: Act;

    /// Information in the [`Step`] object and returned on reset.
    type Info: Info;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Starts a new episode and returns its first observation.
    fn reset(&mut self) -> Result<(Self::Obs, Self::Info)>;

    /// Starts a new episode, using `ix` to vary the episode deterministically.
    ///
    /// The index is used in an arbitrary way, e.g., as an offset of the random seed.
    /// [`DefaultEvaluator`](crate::DefaultEvaluator) calls this method with the
    /// episode number.
    fn reset_with_index(&mut self, ix: usize) -> Result<(Self::Obs, Self::Info)>;

    /// Performs an environment step.
    ///
    /// An `Err` is returned only for faults that make stepping impossible,
    /// for example stepping an environment that has not been reset.
    fn step(&mut self, a: &Self::Act) -> Result<(Step<Self>, Record)>
    where
        Self: Sized;

    /// Releases the resources held by the environment.
    ///
    /// Calling this method on an already closed environment does nothing.
    fn close(&mut self);
}
