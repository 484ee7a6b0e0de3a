//! Line protocol spoken by the sequencer microcontroller.
//!
//! Text commands (whitespace-separated, case-sensitive keyword):
//!
//! | Line                    | Effect                                   |
//! |-------------------------|------------------------------------------|
//! | `BEAT <beat> <value>`   | set value, move cursor (when coupled)    |
//! | `BEAT <beat>`           | move cursor only                         |
//! | `TONE <beat> <value>`   | set value, cursor untouched              |
//! | `TEMPO <ms>`            | informational, no state change           |
//! | `BIN <bbbbvvv>`         | binary frame with explicit marker        |
//! | `bbbbvvv`               | bare binary frame: 4-bit beat, 3-bit value, MSB first |
//!
//! Anything else is UART noise and is dropped without error.

use crate::sequencer::SequencerState;
use crate::types::{BeatEvent, BINARY_FRAME_LEN, VALUE_BITS};
use log::trace;

/// One recognised line. Numeric fields are kept signed so that a negative
/// index reaches the model's range check instead of failing the parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Beat { beat: i64, value: Option<i64> },
    Tone { beat: i64, tone: i64 },
    Tempo { ms: i64 },
    Binary { beat: u8, value: u8 },
}

/// Classify a single line. Returns `None` for anything not in the grammar,
/// including known keywords with unparseable fields.
pub fn parse_line(line: &str) -> Option<Command> {
    let line = line.trim();
    if let Some(frame) = decode_binary_frame(line) {
        return Some(frame);
    }

    let mut tokens = line.split_whitespace();
    match tokens.next()? {
        "BEAT" => {
            let beat = parse_int(tokens.next()?)?;
            let value = match tokens.next() {
                Some(tok) => Some(parse_int(tok)?),
                None => None,
            };
            Some(Command::Beat { beat, value })
        }
        "TONE" => {
            let beat = parse_int(tokens.next()?)?;
            let tone = parse_int(tokens.next()?)?;
            Some(Command::Tone { beat, tone })
        }
        "TEMPO" => {
            let ms = parse_int(tokens.next()?)?;
            Some(Command::Tempo { ms })
        }
        "BIN" => decode_binary_frame(tokens.next()?),
        _ => None,
    }
}

/// Decode a 7-character string of `0`/`1`: high 4 bits beat, low 3 bits value.
pub fn decode_binary_frame(s: &str) -> Option<Command> {
    if s.len() != BINARY_FRAME_LEN || !s.bytes().all(|b| b == b'0' || b == b'1') {
        return None;
    }
    let bits = u8::from_str_radix(s, 2).ok()?;
    let mask = (1u8 << VALUE_BITS) - 1;
    Some(Command::Binary {
        beat: bits >> VALUE_BITS,
        value: bits & mask,
    })
}

/// Render a beat/value pair as a bare binary frame.
pub fn encode_binary_frame(beat: u8, value: u8) -> String {
    format!(
        "{:04b}{:0width$b}",
        beat & 0x0F,
        value & ((1 << VALUE_BITS) - 1),
        width = VALUE_BITS as usize
    )
}

fn parse_int(tok: &str) -> Option<i64> {
    tok.parse::<i64>().ok()
}

/// Applies decoded lines to a `SequencerState`. Holds no stream state.
pub struct ProtocolDecoder {
    couple_cursor: bool,
}

impl ProtocolDecoder {
    pub fn new() -> Self {
        Self {
            couple_cursor: true,
        }
    }

    /// Whether `BEAT <beat> <value>` also moves the cursor to `beat`.
    pub fn with_cursor_coupling(mut self, enabled: bool) -> Self {
        self.couple_cursor = enabled;
        self
    }

    /// Decode `line` and apply it to `state`. Returns the command that was
    /// recognised, whether or not the model accepted its values.
    pub fn decode(&self, line: &str, state: &mut SequencerState) -> Option<Command> {
        let cmd = parse_line(line);
        match cmd {
            Some(Command::Beat { beat, value }) => {
                if let Some(value) = value {
                    apply_value(state, beat, value);
                    if self.couple_cursor {
                        apply_cursor(state, beat);
                    }
                } else {
                    apply_cursor(state, beat);
                }
            }
            Some(Command::Tone { beat, tone }) => apply_value(state, beat, tone),
            Some(Command::Binary { beat, value }) => {
                state.set_beat_value(beat as usize, value as u32);
            }
            Some(Command::Tempo { .. }) => {}
            None => trace!("Ignoring line: {:?}", line),
        }
        cmd
    }

    /// Event carried by a command that the state does not raise itself.
    pub fn informational(cmd: &Command) -> Option<BeatEvent> {
        match *cmd {
            Command::Tempo { ms } => u32::try_from(ms)
                .ok()
                .map(|ms| BeatEvent::Tempo { ms }),
            _ => None,
        }
    }
}

impl Default for ProtocolDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_value(state: &mut SequencerState, beat: i64, value: i64) {
    if let (Ok(beat), Ok(value)) = (usize::try_from(beat), u32::try_from(value)) {
        state.set_beat_value(beat, value);
    }
}

fn apply_cursor(state: &mut SequencerState, beat: i64) {
    if let Ok(beat) = usize::try_from(beat) {
        state.set_current_beat(beat);
    }
}
