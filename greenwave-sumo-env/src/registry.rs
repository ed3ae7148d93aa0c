//! Discovery of controllable traffic lights.
use crate::{FailSoft, SimResult, Simulator, Topology};
use log::{debug, warn};

/// Phases assumed when a program yields no usable green phase.
pub const DEFAULT_GREEN_PHASES: [usize; 2] = [0, 2];

/// Returns `true` if a phase state gives right of way to some link and has no
/// transitional (yellow) link.
pub fn is_green_phase(state: &str) -> bool {
    state.chars().any(|c| c == 'G' || c == 'g')
        && !state.chars().any(|c| c == 'y' || c == 'Y' || c == 'u')
}

/// A controllable traffic light.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    /// Id of the traffic light in the simulator.
    pub id: String,

    /// Index of the intersection the signal is bound to.
    pub intersection: usize,

    /// Indices of the phases an agent can select, never empty.
    pub green_phases: Vec<usize>,

    /// Number of phases of the active program; 0 if it could not be read.
    pub program_len: usize,
}

impl Signal {
    /// Number of choices of an agent for this signal.
    pub fn action_dim(&self) -> usize {
        self.green_phases.len()
    }
}

/// Controllable signals of a network, in the order the simulator reports them.
///
/// The order defines the layout of actions and observations.
#[derive(Debug, Clone, Default)]
pub struct SignalRegistry {
    signals: Vec<Signal>,
}

impl SignalRegistry {
    /// Queries the simulator for its traffic lights and binds them to `topology`.
    ///
    /// Fails only if the list of traffic lights cannot be read. Failures on single
    /// signals degrade to the default green phases and the fallback binding.
    pub fn discover<S: Simulator>(sim: &mut S, topology: &Topology) -> SimResult<Self> {
        let ids = sim.traffic_light_ids()?;
        let mut fs = FailSoft::new();
        let signals = ids
            .into_iter()
            .map(|id| {
                let states = fs.value(sim.program_states(&id));
                let lanes = fs.value(sim.controlled_lanes(&id));
                Self::signal(id, &states, &lanes, topology)
            })
            .collect();
        fs.log("signal discovery");

        Ok(Self { signals })
    }

    /// Builds a signal from its program and controlled lanes.
    pub fn signal(id: String, states: &[String], lanes: &[String], topology: &Topology) -> Signal {
        let mut green_phases: Vec<usize> = states
            .iter()
            .enumerate()
            .filter(|(_, s)| is_green_phase(s))
            .map(|(i, _)| i)
            .collect();
        if green_phases.is_empty() {
            warn!(
                "Traffic light {} has no usable green phase in {:?}, assuming phases {:?}",
                id, states, DEFAULT_GREEN_PHASES
            );
            green_phases = DEFAULT_GREEN_PHASES.to_vec();
        }

        let intersection = match lanes.iter().find_map(|l| topology.destination_of_lane(l)) {
            Some(ix) => ix,
            None => {
                warn!(
                    "Traffic light {} controls no lane into a known intersection, binding it to the first one",
                    id
                );
                0
            }
        };
        debug!(
            "Traffic light {}: green phases {:?}, intersection {}",
            id, green_phases, intersection
        );

        Signal {
            id,
            intersection,
            green_phases,
            program_len: states.len(),
        }
    }

    /// Signals in registration order.
    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    /// Number of signals.
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    /// Returns `true` if there is no signal.
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Number of choices per signal.
    pub fn action_dims(&self) -> Vec<usize> {
        self.signals.iter().map(Signal::action_dim).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::mock::{MockWorld, SAMPLE_NET};

    fn states(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_is_green_phase() {
        assert!(is_green_phase("GGrr"));
        assert!(is_green_phase("rrgG"));
        assert!(!is_green_phase("yyrr"));
        assert!(!is_green_phase("GGyr"));
        assert!(!is_green_phase("rrrr"));
        assert!(!is_green_phase("uuGG"));
        assert!(!is_green_phase(""));
    }

    #[test]
    fn test_signal_green_phases_and_binding() {
        let topology = Topology::parse(SAMPLE_NET).unwrap();
        let s = SignalRegistry::signal(
            "C".to_string(),
            &states(&["GGrr", "yyrr", "rrGG", "rryy"]),
            &states(&["unknown_0", "W_C1_0", "N1_C1_0"]),
            &topology,
        );

        assert_eq!(s.green_phases, vec![0, 2]);
        assert_eq!(s.program_len, 4);
        assert_eq!(s.intersection, topology.intersection_index("C1").unwrap());
        assert_eq!(s.action_dim(), 2);
    }

    #[test]
    fn test_degenerate_program_defaults() {
        let topology = Topology::parse(SAMPLE_NET).unwrap();
        let s = SignalRegistry::signal(
            "X".to_string(),
            &states(&["yyyy", "rrrr"]),
            &[],
            &topology,
        );

        assert_eq!(s.green_phases, vec![0, 2]);
        assert_eq!(s.intersection, 0);
    }

    #[test]
    fn test_discover_isolates_signal_failures() {
        let topology = Topology::parse(SAMPLE_NET).unwrap();
        let world = MockWorld::sample();
        world.borrow_mut().fail_signal("C2");
        let mut sim = MockWorld::simulator(&world);

        let registry = SignalRegistry::discover(&mut sim, &topology).unwrap();
        let ids: Vec<_> = registry.signals().iter().map(|s| s.id.as_str()).collect();

        assert_eq!(ids, vec!["C1", "C2"]);
        assert_eq!(registry.signals()[1].green_phases, vec![0, 2]);
        assert_eq!(registry.signals()[1].program_len, 0);
        assert_eq!(registry.action_dims().len(), 2);
    }
}
