//! SUMO processes and their TraCI connections.
use crate::{
    traci::TraciClient, Launcher, SimResult, Simulator, SumoEnvConfig, SumoEnvError,
};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::{
    net::{TcpListener, TcpStream},
    path::PathBuf,
    process::{Child, Command, Stdio},
    thread::sleep,
    time::Duration,
};

const CONNECT_INTERVAL: Duration = Duration::from_millis(100);

/// Asks the OS for a free local port.
fn free_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Launches `sumo` (or `sumo-gui`) as a child process and connects to it.
pub struct SumoLauncher {
    binary: String,
    sumocfg: PathBuf,
    step_length: f64,
    gui_delay: Option<Duration>,
    connect_retries: usize,
}

impl Launcher for SumoLauncher {
    type Sim = SumoProcess;

    fn build(config: &SumoEnvConfig) -> Result<Self> {
        config.profile.validate()?;
        let gui_delay = if config.gui && config.gui_delay > 0.0 {
            Some(Duration::from_secs_f64(config.gui_delay))
        } else {
            None
        };

        Ok(Self {
            binary: config.binary().to_string(),
            sumocfg: config.sumocfg_path()?.to_path_buf(),
            step_length: config.profile.step_length,
            gui_delay,
            connect_retries: config.connect_retries.max(1),
        })
    }

    fn launch(&mut self, label: &str, seed: Option<i64>) -> Result<SumoProcess> {
        let port = free_port()?;
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-c")
            .arg(&self.sumocfg)
            .args(&["--start", "--quit-on-end"])
            .arg("--step-length")
            .arg(self.step_length.to_string())
            .arg("--remote-port")
            .arg(port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null());
        if let Some(seed) = seed {
            cmd.arg("--seed").arg(seed.to_string());
        }

        debug!("{}: {:?}", label, cmd);
        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to start {}", self.binary))?;

        let stream = match self.connect(port, &mut child) {
            Ok(stream) => stream,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        };
        stream.set_nodelay(true)?;

        let mut client = TraciClient::new(stream);
        let (api, version) = client
            .version()
            .with_context(|| format!("{}: TraCI handshake failed", label))?;
        info!(
            "{}: connected to {} on port {} (TraCI API {})",
            label, version, port, api
        );

        Ok(SumoProcess {
            label: label.to_string(),
            client,
            child: Some(child),
            gui_delay: self.gui_delay,
        })
    }
}

impl SumoLauncher {
    fn connect(&self, port: u16, child: &mut Child) -> Result<TcpStream> {
        for _ in 0..self.connect_retries {
            if let Some(status) = child.try_wait()? {
                anyhow::bail!("{} exited before accepting a connection: {}", self.binary, status);
            }
            match TcpStream::connect(("127.0.0.1", port)) {
                Ok(stream) => return Ok(stream),
                Err(_) => sleep(CONNECT_INTERVAL),
            }
        }
        Err(SumoEnvError::ConnectTimeout {
            port,
            attempts: self.connect_retries,
        }
        .into())
    }
}

/// A running SUMO process and its connection.
///
/// The process is killed when the connection is closed or the value is dropped.
pub struct SumoProcess {
    label: String,
    client: TraciClient<TcpStream>,
    child: Option<Child>,
    gui_delay: Option<Duration>,
}

impl SumoProcess {
    fn reap(&mut self) {
        if let Some(mut child) = self.child.take() {
            // SUMO usually exits by itself after the close command
            if let Ok(None) = child.try_wait() {
                if let Err(e) = child.kill() {
                    warn!("{}: failed to kill the simulator: {}", self.label, e);
                }
            }
            let _ = child.wait();
        }
    }
}

impl Simulator for SumoProcess {
    fn simulation_step(&mut self) -> SimResult<()> {
        self.client.simulation_step()?;
        if let Some(delay) = self.gui_delay {
            sleep(delay);
        }
        Ok(())
    }

    fn traffic_light_ids(&mut self) -> SimResult<Vec<String>> {
        self.client.traffic_light_ids()
    }

    fn controlled_lanes(&mut self, tls_id: &str) -> SimResult<Vec<String>> {
        self.client.controlled_lanes(tls_id)
    }

    fn program_states(&mut self, tls_id: &str) -> SimResult<Vec<String>> {
        self.client.program_states(tls_id)
    }

    fn phase(&mut self, tls_id: &str) -> SimResult<usize> {
        self.client.phase(tls_id)
    }

    fn set_phase(&mut self, tls_id: &str, phase: usize) -> SimResult<()> {
        self.client.set_phase(tls_id, phase)
    }

    fn edge_halting_number(&mut self, edge_id: &str) -> SimResult<u32> {
        self.client.edge_halting_number(edge_id)
    }

    fn edge_waiting_time(&mut self, edge_id: &str) -> SimResult<f64> {
        self.client.edge_waiting_time(edge_id)
    }

    fn vehicle_count(&mut self) -> SimResult<usize> {
        self.client.vehicle_count()
    }

    fn close(&mut self) -> SimResult<()> {
        let result = self.client.close();
        self.reap();
        result
    }
}

impl Drop for SumoProcess {
    fn drop(&mut self) {
        let _ = self.client.close();
        self.reap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_port() {
        let port = free_port().unwrap();
        assert!(port > 0);
        // The port is released again.
        TcpListener::bind(("127.0.0.1", port)).unwrap();
    }

    #[test]
    fn test_launch_missing_binary_fails() {
        let config = SumoEnvConfig::default()
            .sumocfg("simulation.sumocfg")
            .sumo_binary("greenwave-no-such-sumo-binary");
        let mut launcher = SumoLauncher::build(&config).unwrap();
        assert!(launcher.launch("test", None).is_err());
    }

    #[test]
    fn test_build_requires_sumocfg() {
        assert!(SumoLauncher::build(&SumoEnvConfig::default()).is_err());
    }
}
