use crate::sequencer::SequencerState;
use crate::types::*;
use crossbeam_channel::Receiver;
use log::{debug, info};

/// Headless stand-in for the display: mirrors the state from events and
/// logs what a GUI would repaint.
pub struct EventLogger {
    rx: Receiver<TimedEvent>,
    mirror: SequencerState,
}

impl EventLogger {
    pub fn new(rx: Receiver<TimedEvent>, beats: usize) -> Self {
        Self {
            rx,
            mirror: SequencerState::new(beats),
        }
    }

    pub fn run(&mut self) {
        for timed in self.rx.iter() {
            self.mirror.apply(&timed.event);
            let secs = timed.t as f64 / 1_000_000.0;
            match timed.event {
                BeatEvent::BeatChanged { .. } => {
                    debug!("[{:>8.3}s] {}", secs, timed.event);
                    info!("{}", render_row(&self.mirror));
                }
                _ => info!("[{:>8.3}s] {}", secs, timed.event),
            }
        }
    }
}

/// One line per sequence: values as digits, `.` for rests, current beat bracketed.
pub fn render_row(state: &SequencerState) -> String {
    let mut row = String::with_capacity(state.beat_count() * 3);
    for beat in 0..state.beat_count() {
        let cell = match state.get_beat_value(beat) {
            0 => '.',
            v => char::from_digit(v as u32, 36).unwrap_or('?'),
        };
        if beat == state.current_beat() {
            row.push('[');
            row.push(cell);
            row.push(']');
        } else {
            row.push(' ');
            row.push(cell);
            row.push(' ');
        }
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_row() {
        let mut s = SequencerState::new(4);
        s.set_beat_value(0, 3);
        s.set_beat_value(3, 7);
        s.set_current_beat(1);
        assert_eq!(render_row(&s), " 3 [.] .  7 ");
    }
}
