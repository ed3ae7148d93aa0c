//! Encoding of commands and decoding of responses.
//!
//! A message is a big-endian `u32` total length (including the length itself)
//! followed by commands. A command starts with a one-byte length; commands longer
//! than 255 bytes put `0` there and follow it with a `u32` length.
use super::constants::*;
use crate::{SimError, SimResult};

/// A command under construction.
#[derive(Debug, Clone)]
pub struct Command {
    id: u8,
    content: Vec<u8>,
}

impl Command {
    /// Starts a command with the given identifier.
    pub fn new(id: u8) -> Self {
        Self {
            id,
            content: vec![],
        }
    }

    /// Identifier of the command.
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Appends a byte.
    pub fn u8(mut self, v: u8) -> Self {
        self.content.push(v);
        self
    }

    /// Appends a 32-bit integer.
    pub fn i32(mut self, v: i32) -> Self {
        self.content.extend_from_slice(&v.to_be_bytes());
        self
    }

    /// Appends a double.
    pub fn f64(mut self, v: f64) -> Self {
        self.content.extend_from_slice(&v.to_be_bytes());
        self
    }

    /// Appends a length-prefixed string.
    pub fn string(mut self, v: &str) -> Self {
        self.content
            .extend_from_slice(&(v.len() as u32).to_be_bytes());
        self.content.extend_from_slice(v.as_bytes());
        self
    }

    /// Appends a typed integer.
    pub fn typed_i32(self, v: i32) -> Self {
        self.u8(TYPE_INTEGER).i32(v)
    }

    /// Writes the command, including its length header, to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        let short_len = 1 + 1 + self.content.len();
        if short_len <= u8::MAX as usize {
            out.push(short_len as u8);
        } else {
            out.push(0);
            out.extend_from_slice(&((short_len + 4) as u32).to_be_bytes());
        }
        out.push(self.id);
        out.extend_from_slice(&self.content);
    }
}

/// Builds a message containing the given commands.
pub fn encode_message(commands: &[Command]) -> Vec<u8> {
    let mut body = vec![];
    for c in commands {
        c.encode(&mut body);
    }
    let mut msg = Vec::with_capacity(body.len() + 4);
    msg.extend_from_slice(&((body.len() + 4) as u32).to_be_bytes());
    msg.extend_from_slice(&body);
    msg
}

/// A value in a response, tagged with its TraCI type.
#[derive(Debug, Clone, PartialEq)]
pub enum TraciValue {
    UByte(u8),
    Byte(i8),
    Int(i32),
    Double(f64),
    String(String),
    StringList(Vec<String>),
    DoubleList(Vec<f64>),
    Color([u8; 4]),
    Compound(Vec<TraciValue>),
}

fn type_error(expected: &str, got: &TraciValue) -> SimError {
    SimError::Protocol(format!("expected {}, got {:?}", expected, got))
}

impl TraciValue {
    pub fn as_int(&self) -> SimResult<i32> {
        match self {
            TraciValue::Int(v) => Ok(*v),
            v => Err(type_error("integer", v)),
        }
    }

    pub fn as_double(&self) -> SimResult<f64> {
        match self {
            TraciValue::Double(v) => Ok(*v),
            v => Err(type_error("double", v)),
        }
    }

    pub fn as_str(&self) -> SimResult<&str> {
        match self {
            TraciValue::String(v) => Ok(v),
            v => Err(type_error("string", v)),
        }
    }

    pub fn into_string_list(self) -> SimResult<Vec<String>> {
        match self {
            TraciValue::StringList(v) => Ok(v),
            v => Err(type_error("string list", &v)),
        }
    }

    pub fn as_compound(&self) -> SimResult<&[TraciValue]> {
        match self {
            TraciValue::Compound(v) => Ok(v),
            v => Err(type_error("compound", v)),
        }
    }
}

/// Read cursor over the body of a response message.
#[derive(Debug)]
pub struct Storage {
    data: Vec<u8>,
    pos: usize,
}

impl Storage {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    /// Number of bytes not read yet.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> SimResult<&[u8]> {
        if self.remaining() < n {
            return Err(SimError::Protocol(format!(
                "truncated response: wanted {} bytes at offset {}, {} left",
                n,
                self.pos,
                self.remaining()
            )));
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> SimResult<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> SimResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i32(&mut self) -> SimResult<i32> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    pub fn read_f64(&mut self) -> SimResult<f64> {
        Ok(f64::from_be_bytes(self.take_array()?))
    }

    fn read_count(&mut self) -> SimResult<usize> {
        let n = self.read_i32()?;
        if n < 0 {
            return Err(SimError::Protocol(format!("negative length {}", n)));
        }
        Ok(n as usize)
    }

    pub fn read_string(&mut self) -> SimResult<String> {
        let n = self.read_count()?;
        let bytes = self.take(n)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| SimError::Protocol(format!("invalid string: {}", e)))
    }

    pub fn read_string_list(&mut self) -> SimResult<Vec<String>> {
        let n = self.read_count()?;
        (0..n).map(|_| self.read_string()).collect()
    }

    /// Reads the length header of a command and returns the command length.
    pub fn read_length(&mut self) -> SimResult<usize> {
        match self.read_u8()? {
            0 => self.read_count(),
            n => Ok(n as usize),
        }
    }

    /// Reads a type tag followed by a value of that type.
    pub fn read_value(&mut self) -> SimResult<TraciValue> {
        let tag = self.read_u8()?;
        let value = match tag {
            TYPE_UBYTE => TraciValue::UByte(self.read_u8()?),
            TYPE_BYTE => TraciValue::Byte(self.read_u8()? as i8),
            TYPE_INTEGER => TraciValue::Int(self.read_i32()?),
            TYPE_DOUBLE => TraciValue::Double(self.read_f64()?),
            TYPE_STRING => TraciValue::String(self.read_string()?),
            TYPE_STRINGLIST => TraciValue::StringList(self.read_string_list()?),
            TYPE_DOUBLELIST => {
                let n = self.read_count()?;
                TraciValue::DoubleList((0..n).map(|_| self.read_f64()).collect::<SimResult<_>>()?)
            }
            TYPE_COLOR => TraciValue::Color(self.take_array()?),
            TYPE_COMPOUND => {
                let n = self.read_count()?;
                TraciValue::Compound((0..n).map(|_| self.read_value()).collect::<SimResult<_>>()?)
            }
            t => {
                return Err(SimError::Protocol(format!("unsupported value type 0x{:02x}", t)));
            }
        };
        Ok(value)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds response bodies in tests.
    #[derive(Default)]
    pub(crate) struct ResponseWriter(pub Vec<u8>);

    impl ResponseWriter {
        pub fn u8(mut self, v: u8) -> Self {
            self.0.push(v);
            self
        }

        pub fn i32(mut self, v: i32) -> Self {
            self.0.extend_from_slice(&v.to_be_bytes());
            self
        }

        pub fn f64(mut self, v: f64) -> Self {
            self.0.extend_from_slice(&v.to_be_bytes());
            self
        }

        pub fn string(mut self, v: &str) -> Self {
            self.0.extend_from_slice(&(v.len() as u32).to_be_bytes());
            self.0.extend_from_slice(v.as_bytes());
            self
        }

        pub fn typed_string(self, v: &str) -> Self {
            self.u8(TYPE_STRING).string(v)
        }

        pub fn typed_i32(self, v: i32) -> Self {
            self.u8(TYPE_INTEGER).i32(v)
        }

        pub fn typed_f64(self, v: f64) -> Self {
            self.u8(TYPE_DOUBLE).f64(v)
        }

        pub fn compound(self, n: i32) -> Self {
            self.u8(TYPE_COMPOUND).i32(n)
        }
    }

    #[test]
    fn test_encode_short_command() {
        let msg = encode_message(&[Command::new(CMD_GET_TL_VARIABLE)
            .u8(TL_CURRENT_PHASE)
            .string("C")]);

        assert_eq!(
            msg,
            vec![0, 0, 0, 12, 8, CMD_GET_TL_VARIABLE, TL_CURRENT_PHASE, 0, 0, 0, 1, b'C']
        );
    }

    #[test]
    fn test_encode_long_command() {
        let id = "x".repeat(300);
        let mut out = vec![];
        Command::new(CMD_GET_EDGE_VARIABLE)
            .u8(VAR_WAITING_TIME)
            .string(&id)
            .encode(&mut out);

        // 0 marker, u32 length, id, var, u32 string length, string
        assert_eq!(out[0], 0);
        assert_eq!(u32::from_be_bytes([out[1], out[2], out[3], out[4]]), 1 + 4 + 1 + 1 + 4 + 300);
        assert_eq!(out[5], CMD_GET_EDGE_VARIABLE);
        assert_eq!(out.len(), 1 + 4 + 1 + 1 + 4 + 300);
    }

    #[test]
    fn test_read_nested_compound() {
        let body = ResponseWriter::default()
            .compound(2)
            .typed_string("0")
            .compound(1)
            .typed_f64(31.0)
            .0;
        let mut storage = Storage::new(body);
        let value = storage.read_value().unwrap();

        assert_eq!(
            value,
            TraciValue::Compound(vec![
                TraciValue::String("0".to_string()),
                TraciValue::Compound(vec![TraciValue::Double(31.0)]),
            ])
        );
        assert_eq!(storage.remaining(), 0);
    }

    #[test]
    fn test_truncated_input_is_protocol_error() {
        let mut storage = Storage::new(vec![0, 0, 0, 5, b'a']);
        assert!(matches!(storage.read_string(), Err(SimError::Protocol(_))));
    }

    #[test]
    fn test_read_extended_length() {
        let mut storage = Storage::new(vec![0, 0, 0, 1, 44]);
        assert_eq!(storage.read_length().unwrap(), 300);
    }
}
