//! Core functionalities.
mod env;
mod policy;
mod step;
pub use env::Env;
pub use policy::Policy;
use std::fmt::Debug;
pub use step::{Info, Step};

/// An observation of an environment.
pub trait Obs: Clone + Debug {
    /// Returns the number of scalar features in the observation.
    fn len(&self) -> usize;

    /// Returns `true` if the observation carries no features.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An action applied to an environment.
pub trait Act: Clone + Debug {
    /// Returns the number of components of the action.
    ///
    /// Multi-agent environments take one component per controlled entity.
    fn len(&self) -> usize;

    /// Returns `true` if the action has no components.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
