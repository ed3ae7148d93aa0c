//! Action of [`SumoEnv`](crate::SumoEnv).
use greenwave_core::Act;

/// One choice per signal, in registration order.
///
/// A choice `k` selects the `k`-th green phase of the signal. Out-of-range choices
/// select the first green phase.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SumoAct(pub Vec<usize>);

impl SumoAct {
    /// Creates an action.
    pub fn new(choices: Vec<usize>) -> Self {
        Self(choices)
    }

    /// Draws a uniformly random choice for each signal.
    pub fn random(action_dims: &[usize]) -> Self {
        Self(action_dims.iter().map(|&n| fastrand::usize(..n.max(1))).collect())
    }

    /// Choices as a slice.
    pub fn choices(&self) -> &[usize] {
        &self.0
    }
}

impl Act for SumoAct {
    fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<usize>> for SumoAct {
    fn from(choices: Vec<usize>) -> Self {
        Self(choices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_choices_are_in_range() {
        fastrand::seed(42);
        let dims = [2, 3, 1];
        for _ in 0..100 {
            let a = SumoAct::random(&dims);
            assert_eq!(a.len(), 3);
            assert!(a.choices().iter().zip(dims.iter()).all(|(&c, &n)| c < n));
        }
    }
}
