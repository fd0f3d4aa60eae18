//! TraCI message framing and value decoding
//!
//! Everything on the wire is big-endian. A message is a 4-byte total length
//! followed by commands; each command carries its own length prefix, a single
//! byte normally, or a zero byte plus a 4-byte length once it outgrows 255.

use anyhow::{bail, Context, Result};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use super::constants::*;
use crate::preemption::{NextSignal, TlsId};

/// Largest message body accepted from the server
const MAX_MESSAGE_LEN: usize = 64 * 1024 * 1024;

/// Smallest encoding of one next-TLS entry: four type bytes, an empty
/// string, the link index, the distance and the state byte
const NEXT_TLS_ENTRY_MIN_LEN: usize = 4 + 4 + 4 + 8 + 1;

/// One outgoing command
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    id: u8,
    payload: Vec<u8>,
}

impl Command {
    pub fn new(id: u8) -> Self {
        Self {
            id,
            payload: Vec::new(),
        }
    }

    /// A variable read: `variable` of object `object` in the domain `id`
    pub fn get(id: u8, variable: u8, object: &str) -> Self {
        let mut command = Self::new(id);
        command.put_u8(variable).put_string(object);
        command
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn put_u8(&mut self, value: u8) -> &mut Self {
        self.payload.push(value);
        self
    }

    pub fn put_i32(&mut self, value: i32) -> &mut Self {
        self.payload.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn put_f64(&mut self, value: f64) -> &mut Self {
        self.payload.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn put_string(&mut self, value: &str) -> &mut Self {
        self.put_i32(value.len() as i32);
        self.payload.extend_from_slice(value.as_bytes());
        self
    }

    pub fn put_typed_double(&mut self, value: f64) -> &mut Self {
        self.put_u8(TYPE_DOUBLE).put_f64(value)
    }

    /// Append the length-prefixed command to `out`
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        let short_len = 1 + 1 + self.payload.len();
        if short_len <= u8::MAX as usize {
            out.push(short_len as u8);
        } else {
            out.push(0);
            out.extend_from_slice(&((short_len + 4) as i32).to_be_bytes());
        }
        out.push(self.id);
        out.extend_from_slice(&self.payload);
    }
}

/// Frame commands into a single message
pub fn encode_message(commands: &[Command]) -> Vec<u8> {
    let mut body = Vec::new();
    for command in commands {
        command.encode_into(&mut body);
    }

    let mut message = Vec::with_capacity(body.len() + 4);
    message.extend_from_slice(&((body.len() + 4) as i32).to_be_bytes());
    message.extend_from_slice(&body);
    message
}

/// Read one framed message body (without the total length) from `reader`
pub fn read_message<R: Read>(reader: &mut R) -> Result<Response> {
    let total = reader
        .read_i32::<BigEndian>()
        .context("Failed to read TraCI message length")?;
    if total < 4 || total as usize - 4 > MAX_MESSAGE_LEN {
        bail!("Invalid TraCI message length {}", total);
    }

    let mut body = vec![0; total as usize - 4];
    reader
        .read_exact(&mut body)
        .context("Connection closed mid-message")?;
    Ok(Response::new(body))
}

/// Cursor over a received message body
#[derive(Debug)]
pub struct Response {
    cursor: Cursor<Vec<u8>>,
}

impl Response {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            cursor: Cursor::new(body),
        }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        let len = self.cursor.get_ref().len() as u64;
        len.saturating_sub(self.cursor.position()) as usize
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.cursor.read_u8().context("Truncated TraCI response")
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.cursor
            .read_i32::<BigEndian>()
            .context("Truncated TraCI response")
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.cursor
            .read_f64::<BigEndian>()
            .context("Truncated TraCI response")
    }

    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_i32()?;
        if len < 0 || len as usize > self.remaining() {
            bail!("Invalid TraCI string length {}", len);
        }
        let mut bytes = vec![0; len as usize];
        self.cursor
            .read_exact(&mut bytes)
            .context("Truncated TraCI response")?;
        String::from_utf8(bytes).context("TraCI string is not valid UTF-8")
    }

    pub fn read_string_list(&mut self) -> Result<Vec<String>> {
        let count = self.read_i32()?;
        // Each entry carries at least its own length prefix
        if count < 0 || count as usize > self.remaining() / 4 {
            bail!("Invalid TraCI list length {}", count);
        }
        (0..count).map(|_| self.read_string()).collect()
    }

    /// Command length prefix: one byte, or zero followed by an `i32`
    pub fn read_length(&mut self) -> Result<usize> {
        let short = self.read_u8()?;
        if short != 0 {
            return Ok(short as usize);
        }
        let long = self.read_i32()?;
        if long < 0 {
            bail!("Invalid TraCI command length {}", long);
        }
        Ok(long as usize)
    }

    /// Consume the status block answering `command_id`. A failed result or
    /// any description text is an error.
    pub fn check_status(&mut self, command_id: u8) -> Result<()> {
        self.read_length()?;
        let id = self.read_u8()?;
        let result = self.read_u8()?;
        let description = self.read_string()?;

        if id != command_id {
            bail!(
                "Status for command {:#04x} while expecting {:#04x}",
                id,
                command_id
            );
        }

        match result {
            RTYPE_OK if description.is_empty() => Ok(()),
            RTYPE_OK => bail!("Command {:#04x}: {}", command_id, description),
            RTYPE_NOTIMPLEMENTED => {
                bail!("Command {:#04x} not implemented: {}", command_id, description)
            }
            RTYPE_ERR => bail!("Command {:#04x} failed: {}", command_id, description),
            other => bail!(
                "Command {:#04x} returned unknown result {:#04x}: {}",
                command_id,
                other,
                description
            ),
        }
    }

    /// Consume the header of a get response and return its value type
    pub fn read_get_header(&mut self, command_id: u8, variable: u8, object: &str) -> Result<u8> {
        self.read_length()?;
        let response_id = self.read_u8()?;
        let response_variable = self.read_u8()?;
        let response_object = self.read_string()?;

        if response_id != command_id.wrapping_add(RESPONSE_OFFSET)
            || response_variable != variable
            || response_object != object
        {
            bail!(
                "Mismatched response {:#04x}/{:#04x}/{} for {:#04x}/{:#04x}/{}",
                response_id,
                response_variable,
                response_object,
                command_id,
                variable,
                object
            );
        }

        self.read_u8()
    }

    fn expect_type(&mut self, expected: u8) -> Result<()> {
        let found = self.read_u8()?;
        if found != expected {
            bail!("Expected TraCI type {:#04x}, found {:#04x}", expected, found);
        }
        Ok(())
    }

    /// Next-TLS compound: item count, then `n` entries of typed
    /// id, link index, distance and state
    pub fn read_next_tls(&mut self) -> Result<Vec<NextSignal>> {
        self.read_i32()?;
        self.expect_type(TYPE_INTEGER)?;
        let count = self.read_i32()?;
        if count < 0 || count as usize > self.remaining() / NEXT_TLS_ENTRY_MIN_LEN {
            bail!("Invalid next-TLS count {}", count);
        }

        let mut signals = Vec::with_capacity(count as usize);
        for _ in 0..count {
            self.expect_type(TYPE_STRING)?;
            let tls_id = TlsId::new(self.read_string()?);
            self.expect_type(TYPE_INTEGER)?;
            let link_index = self.read_i32()?;
            self.expect_type(TYPE_DOUBLE)?;
            let distance = self.read_f64()?;
            self.expect_type(TYPE_BYTE)?;
            let state = self.read_u8()? as char;

            signals.push(NextSignal {
                tls_id,
                link_index,
                distance,
                state,
            });
        }
        Ok(signals)
    }
}

/// Check a decoded value type against the one a variable is known to carry
pub fn ensure_type(found: u8, expected: u8, what: &str) -> Result<()> {
    if found != expected {
        bail!(
            "{} has TraCI type {:#04x}, expected {:#04x}",
            what,
            found,
            expected
        );
    }
    Ok(())
}
