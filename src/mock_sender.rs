use crate::shutdown::ShutdownToken;
use crate::types::*;
use crossbeam_channel::Sender;
use log::{info, warn};
use std::io::BufRead;
use std::thread;
use std::time::Duration;

/// Tone pattern the demo sets up before playing.
pub const DEMO_TONES: [(usize, u8); 8] = [
    (0, 3),
    (2, 5),
    (4, 7),
    (6, 2),
    (8, 4),
    (10, 6),
    (12, 1),
    (14, 3),
];

/// Stands in for the microcontroller: writes the same protocol lines the
/// board would, as raw bytes, so the whole pipeline runs without hardware.
pub struct MockSender {
    tx: Sender<InputEvent>,
    beats: usize,
    loops: usize,
    beat_delay: Duration,
    shutdown: Option<ShutdownToken>,
}

impl MockSender {
    pub fn new(tx: Sender<InputEvent>, beats: usize, beat_delay: Duration) -> Self {
        Self {
            tx,
            beats: beats.max(1),
            loops: 2,
            beat_delay,
            shutdown: None,
        }
    }

    pub fn with_loops(mut self, loops: usize) -> Self {
        self.loops = loops;
        self
    }

    pub fn with_shutdown(mut self, token: ShutdownToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// The demo script: tone setup, a pause, then the cursor walks the
    /// sequence `loops` times.
    pub fn script(&self) -> Vec<String> {
        let mut lines: Vec<String> = DEMO_TONES
            .iter()
            .filter(|(beat, _)| *beat < self.beats)
            .map(|(beat, tone)| format!("TONE {} {}", beat, tone))
            .collect();
        for i in 0..self.beats * self.loops {
            lines.push(format!("BEAT {}", i % self.beats));
        }
        lines
    }

    /// Play the script. Blocks the calling thread.
    pub fn run(&self) {
        info!("Mock sender: simulating sequencer output");
        if self.play() {
            info!("Mock sender: sequence complete");
        }
    }

    /// Forward typed lines as if the board had sent them. `play` replays the
    /// demo script; `quit`, `exit` or EOF stops.
    pub fn run_interactive<R: BufRead>(&self, input: R) {
        info!("Mock sender: interactive (BEAT/TONE/TEMPO lines, 'play', 'quit')");
        for line in input.lines() {
            if self.cancelled() {
                return;
            }
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    warn!("Mock sender: read error: {}", e);
                    return;
                }
            };
            let ok = match line.trim() {
                "" => true,
                "quit" | "exit" => return,
                "play" => self.play(),
                cmd => self.send_line(cmd),
            };
            if !ok {
                return;
            }
        }
        info!("Mock sender: input closed");
    }

    /// Returns `false` if interrupted by shutdown or a closed channel.
    fn play(&self) -> bool {
        let script = self.script();
        let tone_lines = script.iter().take_while(|l| l.starts_with("TONE")).count();

        for (i, line) in script.iter().enumerate() {
            if self.cancelled() || !self.send_line(line) {
                return false;
            }
            if i + 1 == tone_lines {
                thread::sleep(self.beat_delay * 2);
            } else if i >= tone_lines {
                thread::sleep(self.beat_delay);
            }
        }
        true
    }

    fn send_line(&self, line: &str) -> bool {
        let mut bytes = line.as_bytes().to_vec();
        bytes.push(b'\n');
        self.tx.send(InputEvent::Bytes(bytes)).is_ok()
    }

    fn cancelled(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|t| t.is_cancelled())
    }
}
