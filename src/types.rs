use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

// ─── Events pushed to display consumers ─────────────────────────────────────

/// Something observable happened to the sequencer.
/// Serializes with a `"type"` tag so JSONL logs stay self-describing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BeatEvent {
    /// The cursor moved to `beat`.
    BeatChanged { beat: usize },
    /// The stored value of `beat` was written.
    ValueChanged { beat: usize, value: u8 },
    /// A `TEMPO` line arrived. Informational only, the state never changes.
    Tempo { ms: u32 },
}

impl fmt::Display for BeatEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeatEvent::BeatChanged { beat } => write!(f, "cursor → beat {}", beat),
            BeatEvent::ValueChanged { beat, value } => {
                write!(f, "beat {:>2} → value {}", beat, value)
            }
            BeatEvent::Tempo { ms } => write!(f, "tempo {} ms", ms),
        }
    }
}

/// A `BeatEvent` stamped with the session time it was produced at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimedEvent {
    pub t: u64,
    #[serde(flatten)]
    pub event: BeatEvent,
}

// ─── Inter-thread messages ──────────────────────────────────────────────────

/// What byte sources hand to the monitor loop.
#[derive(Debug, Clone)]
pub enum InputEvent {
    /// An arbitrary chunk of the wire stream. May split lines anywhere.
    Bytes(Vec<u8>),
}

// ─── Session clock ──────────────────────────────────────────────────────────

/// Monotonic clock for the monitoring session.
#[derive(Clone)]
pub struct SessionClock {
    start: Instant,
}

impl SessionClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Constants ──────────────────────────────────────────────────────────────

/// Beats in one sequence (4×4 keypad on the microcontroller side).
pub const DEFAULT_BEATS: usize = 16;

/// Width of the value field on the wire. Every value must fit in it.
pub const VALUE_BITS: u32 = 3;

/// Largest storable value: 0 = rest, 1..=7 = pitch/tone.
pub const MAX_VALUE: u8 = (1 << VALUE_BITS) - 1;

/// Width of the beat index field of a binary frame.
pub const BEAT_BITS: u32 = 4;

/// Length of a binary frame in characters.
pub const BINARY_FRAME_LEN: usize = (BEAT_BITS + VALUE_BITS) as usize;

/// Longest line the framer will buffer before dropping and resyncing.
pub const MAX_LINE_LEN: usize = 256;

/// Local clock period: 16 beats over 4 seconds.
pub const MS_PER_BEAT: u64 = 250;
