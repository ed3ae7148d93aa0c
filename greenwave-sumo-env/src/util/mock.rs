//! Scripted in-memory simulator.
//!
//! [`MockWorld`] holds the state of a fake simulation; [`MockSimulator`] and
//! [`MockLauncher`] give access to it through the same traits as a SUMO process.
//! The world is shared, so a test can change traffic or inject faults while an
//! environment is running.
use crate::{Launcher, SimError, SimResult, Simulator, SumoEnvConfig};
use anyhow::{bail, Result};
use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    rc::Rc,
};

/// A corridor with two signalized intersections, `C1` (four approaches) and `C2`
/// (three approaches).
pub const SAMPLE_NET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<net version="1.16">
    <edge id=":C1_0" function="internal">
        <lane id=":C1_0_0" index="0" speed="13.89" length="9.03"/>
    </edge>
    <edge id="W_C1" from="W" to="C1" priority="1">
        <lane id="W_C1_0" index="0" speed="13.89" length="200.00"/>
    </edge>
    <edge id="N1_C1" from="N1" to="C1" priority="1">
        <lane id="N1_C1_0" index="0" speed="13.89" length="200.00"/>
    </edge>
    <edge id="S1_C1" from="S1" to="C1" priority="1">
        <lane id="S1_C1_0" index="0" speed="13.89" length="200.00"/>
    </edge>
    <edge id="C2_C1" from="C2" to="C1" priority="1">
        <lane id="C2_C1_0" index="0" speed="13.89" length="300.00"/>
    </edge>
    <edge id="C1_C2" from="C1" to="C2" priority="1">
        <lane id="C1_C2_0" index="0" speed="13.89" length="300.00"/>
    </edge>
    <edge id="N2_C2" from="N2" to="C2" priority="1">
        <lane id="N2_C2_0" index="0" speed="13.89" length="200.00"/>
    </edge>
    <edge id="E_C2" from="E" to="C2" priority="1">
        <lane id="E_C2_0" index="0" speed="13.89" length="200.00"/>
    </edge>
    <edge id="C2_E" from="C2" to="E" priority="1">
        <lane id="C2_E_0" index="0" speed="13.89" length="200.00"/>
    </edge>
    <junction id="C1" type="traffic_light" incLanes="W_C1_0 N1_C1_0 S1_C1_0 C2_C1_0 :C1_0_0" intLanes=":C1_0_0"/>
    <junction id="C2" type="traffic_light" incLanes="C1_C2_0 N2_C2_0 E_C2_0" intLanes=""/>
    <junction id="W" type="dead_end" incLanes=""/>
    <junction id="N1" type="dead_end" incLanes=""/>
    <junction id="S1" type="dead_end" incLanes=""/>
    <junction id="N2" type="dead_end" incLanes=""/>
    <junction id="E" type="dead_end" incLanes="C2_E_0"/>
    <junction id=":C1_w0" type="internal" incLanes=":C1_0_0"/>
</net>"#;

/// A traffic light of the mock world.
#[derive(Debug, Clone)]
pub struct MockSignal {
    /// Id.
    pub id: String,
    /// Phase states of the program.
    pub states: Vec<String>,
    /// Controlled lanes.
    pub lanes: Vec<String>,
    /// Current phase.
    pub phase: usize,
}

/// A phase command received by the mock world.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseChange {
    /// Tick at which the command arrived.
    pub tick: usize,
    /// Simulated time at which the command arrived.
    pub time: f64,
    /// Traffic light.
    pub signal: String,
    /// New phase.
    pub phase: usize,
}

/// State of a fake simulation.
#[derive(Debug, Clone)]
pub struct MockWorld {
    step_length: f64,
    tick: usize,
    signals: Vec<MockSignal>,
    edges: HashMap<String, (u32, f64)>,
    // (first tick, count), sorted by tick
    vehicles: Vec<(usize, usize)>,
    failing_signals: HashSet<String>,
    failing_edges: HashSet<String>,
    all_edges_fail: bool,
    vehicle_count_fails: bool,
    launch_fails: bool,
    phase_log: Vec<PhaseChange>,
    launches: usize,
    closes: usize,
    open: bool,
}

fn strings(s: &[&str]) -> Vec<String> {
    s.iter().map(|s| s.to_string()).collect()
}

impl MockWorld {
    /// Creates an empty world with one tick of `step_length` seconds.
    pub fn new(step_length: f64) -> Self {
        Self {
            step_length,
            tick: 0,
            signals: vec![],
            edges: HashMap::new(),
            vehicles: vec![(0, 100)],
            failing_signals: HashSet::new(),
            failing_edges: HashSet::new(),
            all_edges_fail: false,
            vehicle_count_fails: false,
            launch_fails: false,
            phase_log: vec![],
            launches: 0,
            closes: 0,
            open: true,
        }
    }

    /// The world of [`SAMPLE_NET`], shared.
    ///
    /// `C1` has program `GGrr yyrr rrGG rryy` (green phases 0 and 2), `C2` has six
    /// phases with green phases 0, 2 and 4. 100 vehicles are in the network.
    pub fn sample() -> Rc<RefCell<Self>> {
        let mut world = Self::new(0.4);
        world.add_signal(
            "C1",
            &["GGrr", "yyrr", "rrGG", "rryy"],
            &["W_C1_0", "N1_C1_0", "S1_C1_0", "C2_C1_0"],
        );
        world.add_signal(
            "C2",
            &["GGrrr", "yyrrr", "rrGGr", "rryyr", "rrrrG", "rrrry"],
            &["C1_C2_0", "N2_C2_0", "E_C2_0"],
        );
        for e in &["W_C1", "N1_C1", "S1_C1", "C2_C1", "C1_C2", "N2_C2", "E_C2", "C2_E"] {
            world.set_edge(e, 0, 0.0);
        }
        Rc::new(RefCell::new(world))
    }

    /// Connection to a shared world.
    pub fn simulator(world: &Rc<RefCell<Self>>) -> MockSimulator {
        MockSimulator {
            world: world.clone(),
            open: true,
        }
    }

    /// Adds a traffic light starting in phase 0.
    pub fn add_signal(&mut self, id: &str, states: &[&str], lanes: &[&str]) {
        self.signals.push(MockSignal {
            id: id.to_string(),
            states: strings(states),
            lanes: strings(lanes),
            phase: 0,
        });
    }

    /// Sets the halted vehicles and the waiting time of an edge.
    pub fn set_edge(&mut self, id: &str, halting: u32, waiting: f64) {
        self.edges.insert(id.to_string(), (halting, waiting));
    }

    /// Sets the number of vehicles from now on, for every tick.
    pub fn set_vehicles(&mut self, n: usize) {
        self.vehicles = vec![(0, n)];
    }

    /// Sets the number of vehicles from tick `tick` of each run on.
    pub fn set_vehicles_from(&mut self, tick: usize, n: usize) {
        self.vehicles.retain(|&(t, _)| t < tick);
        self.vehicles.push((tick, n));
    }

    /// Makes every query and command on a traffic light fail.
    pub fn fail_signal(&mut self, id: &str) {
        self.failing_signals.insert(id.to_string());
    }

    /// Makes every query on an edge fail.
    pub fn fail_edge(&mut self, id: &str) {
        self.failing_edges.insert(id.to_string());
    }

    /// Makes every edge query fail.
    pub fn fail_all_edges(&mut self, v: bool) {
        self.all_edges_fail = v;
    }

    /// Makes the vehicle count query fail.
    pub fn fail_vehicle_count(&mut self, v: bool) {
        self.vehicle_count_fails = v;
    }

    /// Makes [`MockLauncher::launch`] fail.
    pub fn fail_launch(&mut self, v: bool) {
        self.launch_fails = v;
    }

    /// Seconds per tick.
    pub fn step_length(&self) -> f64 {
        self.step_length
    }

    /// Ticks since the last launch.
    pub fn tick(&self) -> usize {
        self.tick
    }

    /// Simulated time since the last launch.
    pub fn time(&self) -> f64 {
        self.tick as f64 * self.step_length
    }

    /// Current phase of a traffic light.
    pub fn phase_of(&self, id: &str) -> Option<usize> {
        self.signals.iter().find(|s| s.id == id).map(|s| s.phase)
    }

    /// Sets the current phase of a traffic light without logging it.
    pub fn set_phase_of(&mut self, id: &str, phase: usize) {
        if let Some(s) = self.signals.iter_mut().find(|s| s.id == id) {
            s.phase = phase;
        }
    }

    /// Phase commands received since the world was created.
    pub fn phase_log(&self) -> &[PhaseChange] {
        &self.phase_log
    }

    /// Number of launches.
    pub fn launches(&self) -> usize {
        self.launches
    }

    /// Number of connections closed.
    pub fn closes(&self) -> usize {
        self.closes
    }

    /// Returns `true` while the last launched simulation is connected.
    pub fn is_open(&self) -> bool {
        self.open
    }

    fn relaunch(&mut self) {
        self.tick = 0;
        self.launches += 1;
        self.open = true;
        self.signals.iter_mut().for_each(|s| s.phase = 0);
    }

    fn vehicle_count(&self) -> usize {
        self.vehicles
            .iter()
            .rev()
            .find(|&&(t, _)| t <= self.tick)
            .map(|&(_, n)| n)
            .unwrap_or(0)
    }

    fn signal(&mut self, id: &str) -> SimResult<&mut MockSignal> {
        if self.failing_signals.contains(id) {
            return Err(unknown("traffic light", id));
        }
        self.signals
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| unknown("traffic light", id))
    }

    fn edge(&self, id: &str) -> SimResult<(u32, f64)> {
        if self.all_edges_fail || self.failing_edges.contains(id) {
            return Err(unknown("edge", id));
        }
        self.edges
            .get(id)
            .copied()
            .ok_or_else(|| unknown("edge", id))
    }
}

fn unknown(kind: &str, id: &str) -> SimError {
    SimError::Command {
        command: 0,
        description: format!("{} '{}' is not known", kind, id),
    }
}

/// Connection to a [`MockWorld`].
pub struct MockSimulator {
    world: Rc<RefCell<MockWorld>>,
    open: bool,
}

impl MockSimulator {
    fn world(&self) -> SimResult<std::cell::RefMut<'_, MockWorld>> {
        if self.open {
            Ok(self.world.borrow_mut())
        } else {
            Err(SimError::Closed)
        }
    }
}

impl Simulator for MockSimulator {
    fn simulation_step(&mut self) -> SimResult<()> {
        self.world()?.tick += 1;
        Ok(())
    }

    fn traffic_light_ids(&mut self) -> SimResult<Vec<String>> {
        Ok(self.world()?.signals.iter().map(|s| s.id.clone()).collect())
    }

    fn controlled_lanes(&mut self, tls_id: &str) -> SimResult<Vec<String>> {
        Ok(self.world()?.signal(tls_id)?.lanes.clone())
    }

    fn program_states(&mut self, tls_id: &str) -> SimResult<Vec<String>> {
        Ok(self.world()?.signal(tls_id)?.states.clone())
    }

    fn phase(&mut self, tls_id: &str) -> SimResult<usize> {
        Ok(self.world()?.signal(tls_id)?.phase)
    }

    fn set_phase(&mut self, tls_id: &str, phase: usize) -> SimResult<()> {
        let mut world = self.world()?;
        let (tick, time) = (world.tick, world.time());
        let signal = world.signal(tls_id)?;
        if phase >= signal.states.len() {
            return Err(SimError::Command {
                command: 0,
                description: format!("phase {} out of range for {}", phase, tls_id),
            });
        }
        signal.phase = phase;
        world.phase_log.push(PhaseChange {
            tick,
            time,
            signal: tls_id.to_string(),
            phase,
        });
        Ok(())
    }

    fn edge_halting_number(&mut self, edge_id: &str) -> SimResult<u32> {
        Ok(self.world()?.edge(edge_id)?.0)
    }

    fn edge_waiting_time(&mut self, edge_id: &str) -> SimResult<f64> {
        Ok(self.world()?.edge(edge_id)?.1)
    }

    fn vehicle_count(&mut self) -> SimResult<usize> {
        let world = self.world()?;
        if world.vehicle_count_fails {
            return Err(SimError::Protocol("vehicle count unavailable".to_string()));
        }
        Ok(world.vehicle_count())
    }

    fn close(&mut self) -> SimResult<()> {
        if self.open {
            self.open = false;
            let mut world = self.world.borrow_mut();
            world.open = false;
            world.closes += 1;
        }
        Ok(())
    }
}

/// Launches connections to a shared [`MockWorld`].
///
/// Every launch restarts the world at tick 0 with all signals in phase 0.
pub struct MockLauncher {
    world: Rc<RefCell<MockWorld>>,
    labels: Vec<(String, Option<i64>)>,
}

impl MockLauncher {
    /// Creates a launcher for `world`.
    pub fn new(world: &Rc<RefCell<MockWorld>>) -> Self {
        Self {
            world: world.clone(),
            labels: vec![],
        }
    }

    /// Labels and seeds of all launches.
    pub fn launched(&self) -> &[(String, Option<i64>)] {
        &self.labels
    }
}

impl Launcher for MockLauncher {
    type Sim = MockSimulator;

    fn build(_config: &SumoEnvConfig) -> Result<Self> {
        Ok(Self::new(&MockWorld::sample()))
    }

    fn launch(&mut self, label: &str, seed: Option<i64>) -> Result<MockSimulator> {
        if self.world.borrow().launch_fails {
            bail!("{}: mock launch failure", label);
        }
        self.world.borrow_mut().relaunch();
        self.labels.push((label.to_string(), seed));
        Ok(MockWorld::simulator(&self.world))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_connection() {
        let world = MockWorld::sample();
        let mut sim = MockWorld::simulator(&world);

        sim.simulation_step().unwrap();
        sim.close().unwrap();
        sim.close().unwrap();
        assert!(matches!(sim.vehicle_count(), Err(SimError::Closed)));
        assert_eq!(world.borrow().closes(), 1);
    }

    #[test]
    fn test_vehicle_schedule() {
        let world = MockWorld::sample();
        let mut sim = MockWorld::simulator(&world);
        world.borrow_mut().set_vehicles_from(2, 3);

        assert_eq!(sim.vehicle_count().unwrap(), 100);
        sim.simulation_step().unwrap();
        sim.simulation_step().unwrap();
        assert_eq!(sim.vehicle_count().unwrap(), 3);
    }
}
