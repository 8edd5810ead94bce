//! Line-oriented wire format: one line in, one parsed [`Decoded`] value out,
//! and the reverse for anything that needs to go back out over the wire.

use kv_types::{Command, CommandKind, ControlMessage};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("empty line")]
    EmptyLine,

    #[error("SET requires a value")]
    MissingValue,

    #[error("command requires a key")]
    MissingKey,

    #[error("malformed control message: {0}")]
    Control(String),
}

/// The result of decoding one line: either a data command or a control
/// message destined for another node.
#[derive(Debug, Clone)]
pub enum Decoded {
    Data(Command),
    Control(ControlMessage),
}

/// Marker substring that discriminates a JSON control message from a data
/// command on the same line-oriented connection.
const CONTROL_MARKER: &str = "COMM:";

/// Parses one newline-stripped line into a [`Decoded`] value.
///
/// Lines containing `COMM:` are parsed as control messages; everything
/// else is split on whitespace into a data command. Unrecognized verbs
/// still decode, as `CommandKind::Unknown` — rejecting them is the
/// router's job, not the codec's.
pub fn decode_line(line: &str) -> Result<Decoded, CodecError> {
    let line = line.trim_end_matches(['\r', '\n']);

    if line.contains(CONTROL_MARKER) {
        let message: ControlMessage =
            serde_json::from_str(line).map_err(|e| CodecError::Control(e.to_string()))?;
        return Ok(Decoded::Control(message));
    }

    let mut tokens = line.split_ascii_whitespace();
    let verb = tokens.next().ok_or(CodecError::EmptyLine)?;
    let kind = CommandKind::from_verb(verb);
    let rest: Vec<&str> = tokens.collect();

    let (key, value) = match kind {
        CommandKind::Set => {
            let key = rest.first().copied().unwrap_or_default().to_string();
            if rest.len() < 2 {
                return Err(CodecError::MissingValue);
            }
            (key, Some(rest[1..].join(" ")))
        }
        CommandKind::Get | CommandKind::Delete => {
            if rest.is_empty() {
                return Err(CodecError::MissingKey);
            }
            (rest[0].to_string(), None)
        }
        CommandKind::Unknown => {
            let key = rest.first().copied().unwrap_or_default().to_string();
            (key, None)
        }
    };

    Ok(Decoded::Data(Command::new(kind, key, value)))
}

/// Renders a [`Decoded`] value back to its wire form, trailing newline
/// included. Data commands round-trip as `<verb> <key> [value]`; control
/// messages round-trip as their JSON line.
pub fn encode_response(decoded: &Decoded) -> Vec<u8> {
    match decoded {
        Decoded::Data(command) => {
            let mut line = String::from(command.kind.verb());
            if !command.key.is_empty() {
                line.push(' ');
                line.push_str(&command.key);
            }
            if let Some(value) = &command.value {
                line.push(' ');
                line.push_str(value);
            }
            line.push('\n');
            line.into_bytes()
        }
        Decoded::Control(message) => {
            let mut line = serde_json::to_vec(message).unwrap_or_default();
            line.push(b'\n');
            line
        }
    }
}
