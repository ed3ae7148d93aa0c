//! Blocking TraCI client.
use super::{
    constants::*,
    storage::{encode_message, Command, Storage, TraciValue},
};
use crate::{SimError, SimResult, Simulator};
use log::trace;
use std::io::{Read, Write};

fn result_name(code: u8) -> &'static str {
    match code {
        RTYPE_NOTIMPLEMENTED => "not implemented",
        RTYPE_ERR => "error",
        _ => "unknown result",
    }
}

/// A TraCI connection over any byte stream, typically a `TcpStream`.
///
/// Each call sends one command and blocks until its response has been read.
pub struct TraciClient<S: Read + Write> {
    stream: Option<S>,
}

impl<S: Read + Write> TraciClient<S> {
    /// Wraps a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    /// Returns `true` until the connection has been closed.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Sends a command and returns the response with the status part consumed.
    fn exchange(&mut self, command: Command) -> SimResult<Storage> {
        let stream = self.stream.as_mut().ok_or(SimError::Closed)?;
        trace!("TraCI command 0x{:02x}", command.id());

        stream.write_all(&encode_message(std::slice::from_ref(&command)))?;
        stream.flush()?;

        let mut header = [0u8; 4];
        stream.read_exact(&mut header)?;
        let total = u32::from_be_bytes(header) as usize;
        if total < 4 {
            return Err(SimError::Protocol(format!("message length {}", total)));
        }
        let mut body = vec![0u8; total - 4];
        stream.read_exact(&mut body)?;

        let mut storage = Storage::new(body);
        storage.read_length()?;
        let id = storage.read_u8()?;
        let result = storage.read_u8()?;
        let description = storage.read_string()?;

        if id != command.id() {
            return Err(SimError::Protocol(format!(
                "status for command 0x{:02x} received for 0x{:02x}",
                id,
                command.id()
            )));
        }
        if result != RTYPE_OK {
            let description = if description.is_empty() {
                result_name(result).to_string()
            } else {
                description
            };
            return Err(SimError::Command {
                command: id,
                description,
            });
        }

        Ok(storage)
    }

    /// Reads a variable of an object.
    fn get(&mut self, command: u8, var: u8, object_id: &str) -> SimResult<TraciValue> {
        let mut storage = self.exchange(Command::new(command).u8(var).string(object_id))?;
        storage.read_length()?;
        let response = storage.read_u8()?;
        let var_ = storage.read_u8()?;
        let object_id_ = storage.read_string()?;

        if response != command.wrapping_add(RESPONSE_OFFSET) || var_ != var || object_id_ != object_id
        {
            return Err(SimError::Protocol(format!(
                "response 0x{:02x}/0x{:02x}/{:?} does not match request 0x{:02x}/0x{:02x}/{:?}",
                response, var_, object_id_, command, var, object_id
            )));
        }
        storage.read_value()
    }

    /// Returns the TraCI API version and the simulator's version string.
    pub fn version(&mut self) -> SimResult<(i32, String)> {
        let mut storage = self.exchange(Command::new(CMD_GETVERSION))?;
        storage.read_length()?;
        let _id = storage.read_u8()?;
        let api = storage.read_i32()?;
        let version = storage.read_string()?;
        Ok((api, version))
    }
}

/// Extracts the phase states of the program `program_id` (or of the first
/// program if it is not listed) from a complete RYG definition.
pub(crate) fn program_states_from_logics(
    logics: &TraciValue,
    program_id: Option<&str>,
) -> SimResult<Vec<String>> {
    let logics = logics.as_compound()?;
    let mut selected = None;
    for logic in logics {
        let fields = logic.as_compound()?;
        let id = fields
            .first()
            .ok_or_else(|| SimError::Protocol("empty program definition".to_string()))?
            .as_str()?;
        if selected.is_none() || Some(id) == program_id {
            selected = Some(fields);
        }
        if Some(id) == program_id {
            break;
        }
    }

    let fields = selected.ok_or_else(|| SimError::Protocol("no program defined".to_string()))?;
    let phases = fields
        .get(3)
        .ok_or_else(|| SimError::Protocol("program without phases".to_string()))?
        .as_compound()?;
    phases
        .iter()
        .map(|phase| {
            phase
                .as_compound()?
                .get(1)
                .ok_or_else(|| SimError::Protocol("phase without state".to_string()))?
                .as_str()
                .map(str::to_string)
        })
        .collect()
}

impl<S: Read + Write> Simulator for TraciClient<S> {
    fn simulation_step(&mut self) -> SimResult<()> {
        let mut storage = self.exchange(Command::new(CMD_SIMSTEP).f64(0.0))?;
        let n_subscriptions = storage.read_i32()?;
        if n_subscriptions != 0 {
            trace!("Ignoring {} subscription results", n_subscriptions);
        }
        Ok(())
    }

    fn traffic_light_ids(&mut self) -> SimResult<Vec<String>> {
        self.get(CMD_GET_TL_VARIABLE, TRACI_ID_LIST, "")?
            .into_string_list()
    }

    fn controlled_lanes(&mut self, tls_id: &str) -> SimResult<Vec<String>> {
        self.get(CMD_GET_TL_VARIABLE, TL_CONTROLLED_LANES, tls_id)?
            .into_string_list()
    }

    fn program_states(&mut self, tls_id: &str) -> SimResult<Vec<String>> {
        let current = self.get(CMD_GET_TL_VARIABLE, TL_CURRENT_PROGRAM, tls_id)?;
        let logics = self.get(CMD_GET_TL_VARIABLE, TL_COMPLETE_DEFINITION_RYG, tls_id)?;
        program_states_from_logics(&logics, current.as_str().ok())
    }

    fn phase(&mut self, tls_id: &str) -> SimResult<usize> {
        let phase = self
            .get(CMD_GET_TL_VARIABLE, TL_CURRENT_PHASE, tls_id)?
            .as_int()?;
        Ok(phase.max(0) as usize)
    }

    fn set_phase(&mut self, tls_id: &str, phase: usize) -> SimResult<()> {
        self.exchange(
            Command::new(CMD_SET_TL_VARIABLE)
                .u8(TL_PHASE_INDEX)
                .string(tls_id)
                .typed_i32(phase as i32),
        )?;
        Ok(())
    }

    fn edge_halting_number(&mut self, edge_id: &str) -> SimResult<u32> {
        let n = self
            .get(CMD_GET_EDGE_VARIABLE, LAST_STEP_VEHICLE_HALTING_NUMBER, edge_id)?
            .as_int()?;
        Ok(n.max(0) as u32)
    }

    fn edge_waiting_time(&mut self, edge_id: &str) -> SimResult<f64> {
        self.get(CMD_GET_EDGE_VARIABLE, VAR_WAITING_TIME, edge_id)?
            .as_double()
    }

    fn vehicle_count(&mut self) -> SimResult<usize> {
        let n = self
            .get(CMD_GET_VEHICLE_VARIABLE, ID_COUNT, "")?
            .as_int()?;
        Ok(n.max(0) as usize)
    }

    fn close(&mut self) -> SimResult<()> {
        if self.stream.is_none() {
            return Ok(());
        }
        let result = self.exchange(Command::new(CMD_CLOSE)).map(|_| ());
        self.stream = None;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traci::storage::tests::ResponseWriter;
    use std::io::{self, Cursor};

    /// Replays canned server bytes and keeps whatever the client sends.
    struct ScriptedStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn message(parts: Vec<Vec<u8>>) -> Vec<u8> {
        let body: Vec<u8> = parts.concat();
        let mut msg = ((body.len() + 4) as u32).to_be_bytes().to_vec();
        msg.extend(body);
        msg
    }

    fn status(command: u8, result: u8, description: &str) -> Vec<u8> {
        let w = ResponseWriter::default().u8(command).u8(result).string(description).0;
        let mut out = vec![(w.len() + 1) as u8];
        out.extend(w);
        out
    }

    fn response(command: u8, var: u8, object_id: &str, value: ResponseWriter) -> Vec<u8> {
        let w = ResponseWriter::default()
            .u8(command + RESPONSE_OFFSET)
            .u8(var)
            .string(object_id)
            .0;
        let mut body = w;
        body.extend(value.0);
        let mut out = vec![(body.len() + 1) as u8];
        out.extend(body);
        out
    }

    fn client(messages: Vec<Vec<u8>>) -> TraciClient<ScriptedStream> {
        TraciClient::new(ScriptedStream {
            input: Cursor::new(messages.concat()),
            output: vec![],
        })
    }

    #[test]
    fn test_get_phase() {
        let mut c = client(vec![message(vec![
            status(CMD_GET_TL_VARIABLE, RTYPE_OK, ""),
            response(
                CMD_GET_TL_VARIABLE,
                TL_CURRENT_PHASE,
                "C",
                ResponseWriter::default().typed_i32(2),
            ),
        ])]);

        assert_eq!(c.phase("C").unwrap(), 2);
        let sent = &c.stream.as_ref().unwrap().output;
        assert_eq!(
            sent,
            &vec![0, 0, 0, 12, 8, CMD_GET_TL_VARIABLE, TL_CURRENT_PHASE, 0, 0, 0, 1, b'C']
        );
    }

    #[test]
    fn test_error_status_is_command_error() {
        let mut c = client(vec![message(vec![status(
            CMD_GET_EDGE_VARIABLE,
            RTYPE_ERR,
            "Edge 'x' is not known",
        )])]);

        match c.edge_waiting_time("x") {
            Err(SimError::Command {
                command,
                description,
            }) => {
                assert_eq!(command, CMD_GET_EDGE_VARIABLE);
                assert!(description.contains("not known"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_simulation_step_and_close() {
        let mut c = client(vec![
            message(vec![
                status(CMD_SIMSTEP, RTYPE_OK, ""),
                ResponseWriter::default().i32(0).0,
            ]),
            message(vec![status(CMD_CLOSE, RTYPE_OK, "")]),
        ]);

        c.simulation_step().unwrap();
        c.close().unwrap();
        assert!(!c.is_open());
        // A closed connection stays closed without error.
        c.close().unwrap();
        assert!(matches!(c.simulation_step(), Err(SimError::Closed)));
    }

    #[test]
    fn test_eof_is_io_error() {
        let mut c = client(vec![]);
        assert!(matches!(c.vehicle_count(), Err(SimError::Io(_))));
    }

    #[test]
    fn test_program_states_from_logics() {
        // Two programs, "0" and "off"; each phase has duration, state, minDur, maxDur,
        // next and name.
        let phase = |w: ResponseWriter, state: &str| {
            w.compound(6)
                .typed_f64(30.0)
                .typed_string(state)
                .typed_f64(30.0)
                .typed_f64(30.0)
                .compound(0)
                .typed_string("")
        };
        let w = ResponseWriter::default().compound(2);
        let w = w
            .compound(5)
            .typed_string("0")
            .typed_i32(0)
            .typed_i32(0)
            .compound(2);
        let w = phase(w, "GGrr");
        let w = phase(w, "yyrr").compound(0);
        let w = w
            .compound(5)
            .typed_string("off")
            .typed_i32(0)
            .typed_i32(0)
            .compound(1);
        let w = phase(w, "OOOO").compound(0);
        let logics = Storage::new(w.0).read_value().unwrap();

        assert_eq!(
            program_states_from_logics(&logics, Some("0")).unwrap(),
            vec!["GGrr".to_string(), "yyrr".to_string()]
        );
        assert_eq!(
            program_states_from_logics(&logics, Some("off")).unwrap(),
            vec!["OOOO".to_string()]
        );
        assert_eq!(
            program_states_from_logics(&logics, None).unwrap(),
            vec!["GGrr".to_string(), "yyrr".to_string()]
        );
    }
}
