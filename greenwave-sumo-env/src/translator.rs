//! Translation of agent actions into phase commands.
use crate::{FailSoft, Signal, Simulator};
use log::trace;

/// Switching state of a single signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalState {
    /// The signal holds the phase the simulator reports.
    Holding,

    /// The signal shows the transitional phase and switches to `to` at `ready_at`.
    Switching {
        /// Phase before the switch.
        from: usize,
        /// Target phase.
        to: usize,
        /// Simulated time at which the target phase is applied.
        ready_at: f64,
    },
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    state: SignalState,
    last_switch: f64,
}

impl Default for Timer {
    fn default() -> Self {
        Self {
            state: SignalState::Holding,
            last_switch: 0.0,
        }
    }
}

/// Maps per-signal choices to phases, enforcing the minimum dwell time.
///
/// A choice `k` selects the `k`-th green phase of the signal; a choice out of range
/// selects the first one. A switch is accepted only if the target differs from the
/// current phase and the signal has held its phase for at least `min_phase_time`
/// simulated seconds. Rejections are silent.
///
/// With a transition time, an accepted switch first commands the phase after the
/// current one, assumed to be its yellow phase, and the target is applied by
/// [`ActionTranslator::poll`] once the transition time has elapsed. The dwell timer
/// restarts only when the target is applied.
#[derive(Debug, Clone)]
pub struct ActionTranslator {
    min_phase_time: f64,
    transition_time: Option<f64>,
    timers: Vec<Timer>,
}

impl ActionTranslator {
    /// Creates a translator for `n_signals` signals.
    pub fn new(min_phase_time: f64, transition_time: Option<f64>, n_signals: usize) -> Self {
        Self {
            min_phase_time,
            transition_time,
            timers: vec![Timer::default(); n_signals],
        }
    }

    /// Puts every signal back into [`SignalState::Holding`] with its last switch at time 0.
    pub fn reset(&mut self) {
        self.timers.iter_mut().for_each(|t| *t = Timer::default());
    }

    /// Index into the green phases of a signal selected by a choice.
    pub fn clamp(signal: &Signal, choice: usize) -> usize {
        if choice < signal.green_phases.len() {
            choice
        } else {
            0
        }
    }

    /// State of the `ix`-th signal.
    pub fn state(&self, ix: usize) -> Option<SignalState> {
        self.timers.get(ix).map(|t| t.state)
    }

    /// Simulated time of the last applied switch of the `ix`-th signal.
    pub fn last_switch(&self, ix: usize) -> Option<f64> {
        self.timers.get(ix).map(|t| t.last_switch)
    }

    /// Returns `true` if the `ix`-th signal would accept a switch at `now`.
    pub fn dwell_ready(&self, ix: usize, now: f64) -> bool {
        match self.timers.get(ix) {
            Some(t) => {
                t.state == SignalState::Holding && now - t.last_switch >= self.min_phase_time
            }
            None => false,
        }
    }

    /// Applies one choice per signal at simulated time `now`.
    ///
    /// Returns the number of accepted switches. Simulator failures are counted in
    /// `fs` and leave the signal unchanged; the other signals are still processed.
    pub fn apply<S: Simulator>(
        &mut self,
        sim: &mut S,
        signals: &[Signal],
        choices: &[usize],
        now: f64,
        fs: &mut FailSoft,
    ) -> usize {
        let mut accepted = 0;

        for (ix, (signal, &choice)) in signals.iter().zip(choices.iter()).enumerate() {
            if !self.dwell_ready(ix, now) {
                continue;
            }
            let target = signal.green_phases[Self::clamp(signal, choice)];
            let current = match fs.ok(sim.phase(&signal.id)) {
                Some(p) => p,
                None => continue,
            };
            if target == current {
                continue;
            }

            match self.transition(signal, current, target) {
                Some((yellow, duration)) => {
                    if fs.ok(sim.set_phase(&signal.id, yellow)).is_some() {
                        trace!("{}: {} -> {} via {}", signal.id, current, target, yellow);
                        self.timers[ix].state = SignalState::Switching {
                            from: current,
                            to: target,
                            ready_at: now + duration,
                        };
                        accepted += 1;
                    }
                }
                None => {
                    if fs.ok(sim.set_phase(&signal.id, target)).is_some() {
                        trace!("{}: {} -> {}", signal.id, current, target);
                        self.timers[ix].last_switch = now;
                        accepted += 1;
                    }
                }
            }
        }

        accepted
    }

    /// Transitional phase and its duration, if a transition is inserted.
    fn transition(&self, signal: &Signal, current: usize, target: usize) -> Option<(usize, f64)> {
        let duration = self.transition_time?;
        if signal.program_len == 0 {
            return None;
        }
        let yellow = (current + 1) % signal.program_len;
        if yellow == target {
            None
        } else {
            Some((yellow, duration))
        }
    }

    /// Applies the target phase of every signal whose transition has elapsed at `now`.
    ///
    /// Called after every simulator tick. A failed command is retried on the next call.
    pub fn poll<S: Simulator>(
        &mut self,
        sim: &mut S,
        signals: &[Signal],
        now: f64,
        fs: &mut FailSoft,
    ) {
        for (timer, signal) in self.timers.iter_mut().zip(signals.iter()) {
            if let SignalState::Switching { to, ready_at, .. } = timer.state {
                if now >= ready_at && fs.ok(sim.set_phase(&signal.id, to)).is_some() {
                    trace!("{}: transition to {} done", signal.id, to);
                    timer.state = SignalState::Holding;
                    timer.last_switch = now;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        util::mock::{MockWorld, SAMPLE_NET},
        SignalRegistry, Topology,
    };
    use proptest::prelude::*;

    fn setup() -> (
        std::rc::Rc<std::cell::RefCell<MockWorld>>,
        crate::util::mock::MockSimulator,
        SignalRegistry,
    ) {
        let topology = Topology::parse(SAMPLE_NET).unwrap();
        let world = MockWorld::sample();
        let mut sim = MockWorld::simulator(&world);
        let registry = SignalRegistry::discover(&mut sim, &topology).unwrap();
        (world, sim, registry)
    }

    #[test]
    fn test_dwell_time_blocks_early_switch() {
        let (world, mut sim, registry) = setup();
        let mut tr = ActionTranslator::new(8.0, None, registry.len());
        let mut fs = FailSoft::new();

        // C1 green phases are [0, 2]; choice 1 selects phase 2.
        assert_eq!(tr.apply(&mut sim, registry.signals(), &[1, 0], 4.0, &mut fs), 0);
        assert_eq!(tr.apply(&mut sim, registry.signals(), &[1, 0], 8.0, &mut fs), 1);
        assert_eq!(world.borrow().phase_of("C1"), Some(2));
        assert_eq!(tr.last_switch(0), Some(8.0));

        // Back to phase 0 is rejected until 16 s.
        assert_eq!(tr.apply(&mut sim, registry.signals(), &[0, 0], 15.6, &mut fs), 0);
        assert_eq!(tr.apply(&mut sim, registry.signals(), &[0, 0], 16.0, &mut fs), 1);
        assert_eq!(world.borrow().phase_of("C1"), Some(0));
        assert_eq!(fs.failures(), 0);
    }

    #[test]
    fn test_same_phase_is_not_a_switch() {
        let (world, mut sim, registry) = setup();
        let mut tr = ActionTranslator::new(0.0, None, registry.len());
        let mut fs = FailSoft::new();

        assert_eq!(tr.apply(&mut sim, registry.signals(), &[0, 0], 10.0, &mut fs), 0);
        assert!(world.borrow().phase_log().is_empty());
    }

    #[test]
    fn test_out_of_range_choice_selects_first_green_phase() {
        let (world, mut sim, registry) = setup();
        let mut tr = ActionTranslator::new(0.0, None, registry.len());
        let mut fs = FailSoft::new();

        world.borrow_mut().set_phase_of("C2", 4);
        assert_eq!(tr.apply(&mut sim, registry.signals(), &[0, 99], 1.0, &mut fs), 1);
        assert_eq!(world.borrow().phase_of("C2"), Some(0));
    }

    #[test]
    fn test_transition_inserts_yellow_phase() {
        let (world, mut sim, registry) = setup();
        let mut tr = ActionTranslator::new(10.0, Some(3.0), registry.len());
        let mut fs = FailSoft::new();

        assert_eq!(tr.apply(&mut sim, registry.signals(), &[1, 0], 10.0, &mut fs), 1);
        assert_eq!(world.borrow().phase_of("C1"), Some(1));
        assert_eq!(
            tr.state(0),
            Some(SignalState::Switching {
                from: 0,
                to: 2,
                ready_at: 13.0
            })
        );
        assert!(!tr.dwell_ready(0, 12.0));

        tr.poll(&mut sim, registry.signals(), 12.0, &mut fs);
        assert_eq!(world.borrow().phase_of("C1"), Some(1));
        tr.poll(&mut sim, registry.signals(), 13.0, &mut fs);
        assert_eq!(world.borrow().phase_of("C1"), Some(2));
        assert_eq!(tr.state(0), Some(SignalState::Holding));
        assert_eq!(tr.last_switch(0), Some(13.0));
        assert!(!tr.dwell_ready(0, 22.0));
        assert!(tr.dwell_ready(0, 23.0));
    }

    #[test]
    fn test_failure_is_isolated_to_its_signal() {
        let (world, mut sim, registry) = setup();
        let mut tr = ActionTranslator::new(0.0, None, registry.len());
        let mut fs = FailSoft::new();

        world.borrow_mut().fail_signal("C1");
        assert_eq!(tr.apply(&mut sim, registry.signals(), &[1, 1], 1.0, &mut fs), 1);
        assert_eq!(world.borrow().phase_of("C1"), Some(0));
        assert_eq!(world.borrow().phase_of("C2"), Some(2));
        assert_eq!(fs.failures(), 1);
    }

    #[test]
    fn test_reset() {
        let (_world, mut sim, registry) = setup();
        let mut tr = ActionTranslator::new(8.0, Some(2.0), registry.len());
        let mut fs = FailSoft::new();

        tr.apply(&mut sim, registry.signals(), &[1, 1], 9.0, &mut fs);
        tr.reset();
        assert_eq!(tr.state(0), Some(SignalState::Holding));
        assert_eq!(tr.last_switch(1), Some(0.0));
    }

    proptest! {
        #[test]
        fn prop_applied_phases_respect_dwell_time(
            choices in prop::collection::vec((0usize..5, 0usize..5), 1..120),
            transition in prop::option::of(1usize..4),
        ) {
            let (world, mut sim, registry) = setup();
            let step_length = world.borrow().step_length();
            let min_phase_time = 8.0;
            let transition_time = transition.map(|n| n as f64 * step_length);
            let mut tr = ActionTranslator::new(min_phase_time, transition_time, registry.len());
            let mut fs = FailSoft::new();

            for (a, b) in choices {
                let now = world.borrow().time();
                tr.apply(&mut sim, registry.signals(), &[a, b], now, &mut fs);
                for _ in 0..5 {
                    sim.simulation_step().unwrap();
                    let now = world.borrow().time();
                    tr.poll(&mut sim, registry.signals(), now, &mut fs);
                }
            }

            for signal in registry.signals() {
                let times: Vec<f64> = world
                    .borrow()
                    .phase_log()
                    .iter()
                    .filter(|c| c.signal == signal.id && signal.green_phases.contains(&c.phase))
                    .map(|c| c.time)
                    .collect();
                // The dwell timer starts at 0 when the episode starts.
                let mut prev = 0.0;
                for t in times {
                    prop_assert!(t - prev >= min_phase_time, "{} switched at {} after {}", signal.id, t, prev);
                    prev = t;
                }
            }
        }
    }
}
