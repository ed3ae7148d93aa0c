//! Folding of failed simulator calls into neutral values.
use crate::{SimError, SimResult};
use log::debug;

/// Accumulates the outcome of simulator calls made while building one value.
///
/// A failed call contributes its neutral value (zero for counts and times) and is
/// counted, so the caller can report how many calls went wrong without aborting.
///
/// ```
/// use greenwave_sumo_env::{FailSoft, SimError};
///
/// let mut fs = FailSoft::new();
/// let q = fs.value::<u32>(Ok(3)) + fs.value::<u32>(Err(SimError::Closed));
/// assert_eq!(q, 3);
/// assert_eq!(fs.failures(), 1);
/// ```
#[derive(Debug, Default)]
pub struct FailSoft {
    failures: usize,
    last_error: Option<String>,
}

impl FailSoft {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of a successful call, or `T::default()`.
    pub fn value<T: Default>(&mut self, result: SimResult<T>) -> T {
        self.value_or(result, T::default())
    }

    /// Returns the value of a successful call, or `neutral`.
    pub fn value_or<T>(&mut self, result: SimResult<T>, neutral: T) -> T {
        match result {
            Ok(v) => v,
            Err(e) => {
                self.record(e);
                neutral
            }
        }
    }

    /// Returns the value of a successful call, or `None` after counting the failure.
    pub fn ok<T>(&mut self, result: SimResult<T>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.record(e);
                None
            }
        }
    }

    fn record(&mut self, e: SimError) {
        self.failures += 1;
        self.last_error = Some(e.to_string());
    }

    /// Number of failed calls.
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Logs the number of failed calls, if any, at debug level.
    pub fn log(&self, what: &str) {
        if let Some(e) = self.last_error.as_ref() {
            debug!(
                "{}: {} simulator call(s) failed, last error: {}",
                what, self.failures, e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_fold_into_neutral_values() {
        let mut fs = FailSoft::new();
        let w = fs.value(Ok(2.5f64)) + fs.value::<f64>(Err(SimError::Protocol("bad".into())));
        let p = fs.value_or(Err(SimError::Closed), 7usize);

        assert_eq!(w, 2.5);
        assert_eq!(p, 7);
        assert_eq!(fs.failures(), 2);
        assert_eq!(fs.ok::<u32>(Err(SimError::Closed)), None);
        assert_eq!(fs.failures(), 3);
    }
}
