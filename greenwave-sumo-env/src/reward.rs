//! Reward of [`SumoEnv`](crate::SumoEnv).
use crate::{FailSoft, RewardConfig, Signal, Simulator, Topology};
use std::collections::HashSet;

/// Congestion cost over the incoming links of the controlled intersections.
///
/// `reward = -(queue_weight * Q + wait_weight * (W + amplifier * E))` where `Q` is
/// the number of halted vehicles, `W` the total waiting time and `E` the sum of the
/// per-link waiting time beyond `max_wait`. Each link counts once even if several
/// signals share its intersection.
#[derive(Debug, Clone)]
pub struct Reward {
    config: RewardConfig,
    links: Vec<String>,
}

impl Reward {
    /// Collects the monitored links of `signals`.
    pub fn new(config: &RewardConfig, topology: &Topology, signals: &[Signal]) -> Self {
        let mut seen = HashSet::new();
        let links = signals
            .iter()
            .filter_map(|s| topology.intersection(s.intersection))
            .flat_map(|j| j.incoming.iter())
            .filter(|l| seen.insert(l.as_str()))
            .cloned()
            .collect();

        Self {
            config: config.clone(),
            links,
        }
    }

    /// Monitored links.
    pub fn links(&self) -> &[String] {
        &self.links
    }

    /// Reads the simulator and returns the reward. Failed queries contribute 0.
    pub fn compute<S: Simulator>(&self, sim: &mut S, fs: &mut FailSoft) -> f32 {
        let mut queue = 0f64;
        let mut waiting = 0f64;
        let mut excess = 0f64;

        for link in self.links.iter() {
            queue += fs.value(sim.edge_halting_number(link)) as f64;
            let w = fs.value(sim.edge_waiting_time(link));
            waiting += w;
            excess += (w - self.config.max_wait).max(0.0);
        }

        let c = &self.config;
        let cost = c.queue_weight * queue + c.wait_weight * (waiting + c.amplifier * excess);
        -cost as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        util::mock::{MockWorld, SAMPLE_NET},
        SignalRegistry,
    };

    fn setup(config: RewardConfig) -> (
        std::rc::Rc<std::cell::RefCell<MockWorld>>,
        crate::util::mock::MockSimulator,
        Reward,
    ) {
        let topology = Topology::parse(SAMPLE_NET).unwrap();
        let world = MockWorld::sample();
        let mut sim = MockWorld::simulator(&world);
        let registry = SignalRegistry::discover(&mut sim, &topology).unwrap();
        let reward = Reward::new(&config, &topology, registry.signals());
        (world, sim, reward)
    }

    #[test]
    fn test_links_are_deduplicated() {
        let topology = Topology::parse(SAMPLE_NET).unwrap();
        let world = MockWorld::sample();
        let mut sim = MockWorld::simulator(&world);
        let registry = SignalRegistry::discover(&mut sim, &topology).unwrap();
        let mut signals = registry.signals().to_vec();
        signals.push(signals[0].clone());

        let reward = Reward::new(&RewardConfig::default(), &topology, &signals);
        assert_eq!(reward.links().len(), 7);
    }

    #[test]
    fn test_weighted_cost() {
        let (world, mut sim, reward) = setup(RewardConfig::default());
        {
            let mut w = world.borrow_mut();
            w.set_edge("W_C1", 3, 100.0);
            w.set_edge("E_C2", 2, 20.0);
        }
        let mut fs = FailSoft::new();

        let r = reward.compute(&mut sim, &mut fs);
        assert!((r - -(5.0 + 0.05 * 120.0)).abs() < 1e-5);
    }

    #[test]
    fn test_excess_wait_is_amplified() {
        let config = RewardConfig {
            queue_weight: 0.0,
            wait_weight: 1.0,
            max_wait: 60.0,
            amplifier: 2.0,
        };
        let (world, mut sim, reward) = setup(config);
        {
            let mut w = world.borrow_mut();
            w.set_edge("W_C1", 0, 100.0);
            w.set_edge("E_C2", 0, 50.0);
        }
        let mut fs = FailSoft::new();

        // W = 150, E = 40
        assert!((reward.compute(&mut sim, &mut fs) - -230.0).abs() < 1e-5);
    }

    #[test]
    fn test_finite_when_every_query_fails() {
        let (world, mut sim, reward) = setup(RewardConfig::default());
        world.borrow_mut().fail_all_edges(true);
        let mut fs = FailSoft::new();

        let r = reward.compute(&mut sim, &mut fs);
        assert!(r.is_finite());
        assert_eq!(r, 0.0);
        assert_eq!(fs.failures(), 2 * reward.links().len());
    }
}
