//! Observation of [`SumoEnv`](crate::SumoEnv).
use crate::{ActionTranslator, FailSoft, ObservationConfig, Signal, Simulator, Topology};
use greenwave_core::Obs;
use ndarray::Array1;

/// Observation, one block of [`ObservationBuilder::block_size`] values per signal.
#[derive(Clone, Debug, PartialEq)]
pub struct SumoObs(pub Array1<f32>);

impl Obs for SumoObs {
    fn len(&self) -> usize {
        self.0.len()
    }
}

impl SumoObs {
    /// Values as a slice.
    pub fn as_slice(&self) -> &[f32] {
        // An Array1 built from a Vec is always contiguous
        self.0.as_slice().unwrap_or(&[])
    }

    /// Block of the `ix`-th signal.
    pub fn block(&self, ix: usize, block_size: usize) -> &[f32] {
        let s = self.as_slice();
        let start = (ix * block_size).min(s.len());
        let end = (start + block_size).min(s.len());
        &s[start..end]
    }
}

impl From<Vec<f32>> for SumoObs {
    fn from(v: Vec<f32>) -> Self {
        Self(Array1::from(v))
    }
}

/// Reads the state of the signals into a [`SumoObs`].
///
/// The block of a signal is
///
/// * halted vehicles on each incoming link of its intersection, truncated or
///   zero-padded to `max_approaches`,
/// * total waiting time on those links in minutes,
/// * current phase index,
/// * 1 if the signal would accept a switch, else 0.
///
/// A failed query contributes 0, so the length never changes.
#[derive(Debug, Clone)]
pub struct ObservationBuilder {
    max_approaches: usize,
}

impl ObservationBuilder {
    /// Creates a builder.
    pub fn new(config: &ObservationConfig) -> Self {
        Self {
            max_approaches: config.max_approaches,
        }
    }

    /// Number of values per signal.
    pub fn block_size(&self) -> usize {
        self.max_approaches + 3
    }

    /// Length of an observation for `n_signals` signals.
    pub fn obs_dim(&self, n_signals: usize) -> usize {
        n_signals * self.block_size()
    }

    /// Builds the observation at simulated time `now`.
    pub fn build<S: Simulator>(
        &self,
        sim: &mut S,
        topology: &Topology,
        signals: &[Signal],
        translator: &ActionTranslator,
        now: f64,
        fs: &mut FailSoft,
    ) -> SumoObs {
        let mut values = Vec::with_capacity(self.obs_dim(signals.len()));

        for (ix, signal) in signals.iter().enumerate() {
            let incoming: &[String] = topology
                .intersection(signal.intersection)
                .map(|j| j.incoming.as_slice())
                .unwrap_or(&[]);

            let mut queues = vec![0f32; self.max_approaches];
            let mut waiting = 0f64;
            for (i, link) in incoming.iter().enumerate() {
                let q = fs.value(sim.edge_halting_number(link));
                if i < self.max_approaches {
                    queues[i] = q as f32;
                }
                waiting += fs.value(sim.edge_waiting_time(link));
            }
            let phase = fs.value(sim.phase(&signal.id));
            let ready = translator.dwell_ready(ix, now);

            values.extend(queues);
            values.push((waiting / 60.0) as f32);
            values.push(phase as f32);
            values.push(if ready { 1.0 } else { 0.0 });
        }

        SumoObs::from(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        util::mock::{MockWorld, SAMPLE_NET},
        SignalRegistry,
    };

    #[test]
    fn test_block_layout() {
        let topology = Topology::parse(SAMPLE_NET).unwrap();
        let world = MockWorld::sample();
        let mut sim = MockWorld::simulator(&world);
        let registry = SignalRegistry::discover(&mut sim, &topology).unwrap();
        let translator = ActionTranslator::new(8.0, None, registry.len());
        let builder = ObservationBuilder::new(&ObservationConfig { max_approaches: 3 });
        {
            let mut w = world.borrow_mut();
            w.set_edge("W_C1", 2, 30.0);
            w.set_edge("N1_C1", 1, 30.0);
            // The fourth approach of C1 is beyond max_approaches but still waits.
            w.set_edge("C2_C1", 5, 60.0);
            w.set_edge("E_C2", 4, 6.0);
            w.set_phase_of("C2", 2);
        }
        let mut fs = FailSoft::new();

        let obs = builder.build(&mut sim, &topology, registry.signals(), &translator, 8.0, &mut fs);

        assert_eq!(obs.len(), 2 * 6);
        assert_eq!(obs.block(0, 6), &[2.0, 1.0, 0.0, 2.0, 0.0, 1.0]);
        assert_eq!(obs.block(1, 6), &[0.0, 0.0, 4.0, 0.1, 2.0, 1.0]);
        assert_eq!(fs.failures(), 0);
    }

    #[test]
    fn test_shape_holds_when_every_query_fails() {
        let topology = Topology::parse(SAMPLE_NET).unwrap();
        let world = MockWorld::sample();
        let mut sim = MockWorld::simulator(&world);
        let registry = SignalRegistry::discover(&mut sim, &topology).unwrap();
        let translator = ActionTranslator::new(8.0, None, registry.len());
        let builder = ObservationBuilder::new(&ObservationConfig::default());
        {
            let mut w = world.borrow_mut();
            w.fail_all_edges(true);
            w.fail_signal("C1");
            w.fail_signal("C2");
        }
        let mut fs = FailSoft::new();

        let obs = builder.build(&mut sim, &topology, registry.signals(), &translator, 0.0, &mut fs);

        assert_eq!(obs.len(), builder.obs_dim(registry.len()));
        assert!(obs.as_slice().iter().all(|&v| v == 0.0));
        assert!(fs.failures() > 0);
    }
}
