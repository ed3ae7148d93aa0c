//! Types and traits for recording values produced while running environments.
//!
//! Environments attach a [`Record`] to every step, e.g., the number of vehicles in
//! the network or the signals whose phase changed. Evaluation loops add their own
//! entries and hand the records to a [`Recorder`].
//!
//! ```rust
//! use greenwave_core::record::{Record, RecordValue};
//!
//! let mut record = Record::empty();
//! record.insert("step", RecordValue::Scalar(1.0));
//! record.insert("reward", RecordValue::Scalar(-12.5));
//! record.insert("reason", RecordValue::String("LowDensity".to_string()));
//! assert_eq!(record.get_scalar("reward").unwrap(), -12.5);
//! ```
mod base;
mod buffered_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use recorder::Recorder;
