#![warn(missing_docs)]
//! Core abstractions of greenwave.
//!
//! This crate defines the contract between an environment and whatever drives it,
//! typically a policy optimizer running outside this workspace:
//!
//! * [`Env`] builds, resets and steps an environment, and releases its resources
//!   with [`Env::close`].
//! * [`Step`] is what an environment emits on every interaction step.
//! * [`Policy`] maps an observation to an action.
//! * [`record`] holds key-value records produced by environments and evaluators.
//!
//! [`DefaultEvaluator`] and [`util::eval_with_recorder`] run whole episodes with a
//! policy and are used for evaluation and for manual checks of an environment.
pub mod error;
pub mod record;
pub mod util;

mod base;
pub use base::{Act, Env, Info, Obs, Policy, Step};

mod evaluator;
pub use evaluator::{DefaultEvaluator, Evaluator};
