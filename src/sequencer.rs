use crate::types::{BeatEvent, DEFAULT_BEATS, MAX_VALUE, VALUE_BITS};
use crossbeam_channel::{Sender, TrySendError};
use log::debug;
use std::fmt::Write as _;

/// Anything that wants to hear about state changes: display, loggers, tests.
pub trait StateObserver: Send {
    fn on_event(&mut self, event: &BeatEvent);
}

/// Forwards events down a channel. Never blocks the decoder: when the
/// consumer is full or gone the event is skipped for that consumer.
impl StateObserver for Sender<BeatEvent> {
    fn on_event(&mut self, event: &BeatEvent) {
        match self.try_send(*event) {
            Ok(()) => {}
            Err(TrySendError::Full(ev)) => debug!("Observer channel full, dropping {}", ev),
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Passive per-beat state: received over the wire, never computed here.
///
/// Out-of-range indices read as 0 and are ignored on write. Values above the
/// ceiling are rejected and the previous value stays.
pub struct SequencerState {
    values: Vec<u8>,
    current: usize,
    max_value: u8,
    observers: Vec<Box<dyn StateObserver>>,
}

impl SequencerState {
    /// `beats` is fixed for the lifetime of the state. Zero is bumped to one.
    pub fn new(beats: usize) -> Self {
        Self::with_max_value(beats, MAX_VALUE)
    }

    pub fn with_max_value(beats: usize, max_value: u8) -> Self {
        Self {
            values: vec![0; beats.max(1)],
            current: 0,
            max_value,
            observers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, observer: Box<dyn StateObserver>) {
        self.observers.push(observer);
    }

    pub fn beat_count(&self) -> usize {
        self.values.len()
    }

    pub fn current_beat(&self) -> usize {
        self.current
    }

    pub fn max_value(&self) -> u8 {
        self.max_value
    }

    pub fn values(&self) -> &[u8] {
        &self.values
    }

    pub fn get_beat_value(&self, beat: usize) -> u8 {
        self.values.get(beat).copied().unwrap_or(0)
    }

    pub fn is_beat_active(&self, beat: usize) -> bool {
        self.get_beat_value(beat) != 0
    }

    pub fn active_beats(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.beat_count()).filter(|&b| self.is_beat_active(b))
    }

    /// Store `value` for `beat` and notify. Returns the raised event, or
    /// `None` if the index or value was out of range.
    pub fn set_beat_value(&mut self, beat: usize, value: u32) -> Option<BeatEvent> {
        if beat >= self.values.len() || value > self.max_value as u32 {
            return None;
        }
        let value = value as u8;
        self.values[beat] = value;
        Some(self.notify(BeatEvent::ValueChanged { beat, value }))
    }

    /// Move the cursor and notify. Returns `None` if `beat` is out of range.
    pub fn set_current_beat(&mut self, beat: usize) -> Option<BeatEvent> {
        if beat >= self.values.len() {
            return None;
        }
        self.current = beat;
        Some(self.notify(BeatEvent::BeatChanged { beat }))
    }

    /// Cursor step used by the free-running local clock.
    pub fn advance(&mut self) -> Option<BeatEvent> {
        let next = (self.current + 1) % self.values.len();
        self.set_current_beat(next)
    }

    /// Apply an event received from elsewhere, e.g. to mirror a live state.
    pub fn apply(&mut self, event: &BeatEvent) -> Option<BeatEvent> {
        match *event {
            BeatEvent::BeatChanged { beat } => self.set_current_beat(beat),
            BeatEvent::ValueChanged { beat, value } => self.set_beat_value(beat, value as u32),
            BeatEvent::Tempo { .. } => None,
        }
    }

    /// Plain-text dump: every beat with its value and binary rendering,
    /// followed by the active beats.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "beats: {}", self.beat_count());
        let _ = writeln!(out, "current: {}", self.current);
        for (beat, &value) in self.values.iter().enumerate() {
            let _ = writeln!(
                out,
                "beat {:>2}: {} ({:0width$b})",
                beat,
                value,
                value,
                width = VALUE_BITS as usize
            );
        }
        let active: Vec<String> = self.active_beats().map(|b| b.to_string()).collect();
        let _ = writeln!(out, "active: {}", active.join(" "));
        out
    }

    fn notify(&mut self, event: BeatEvent) -> BeatEvent {
        for obs in &mut self.observers {
            obs.on_event(&event);
        }
        event
    }
}

impl Default for SequencerState {
    fn default() -> Self {
        Self::new(DEFAULT_BEATS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{bounded, unbounded};
    use std::sync::{Arc, Mutex};

    struct Recorder(Arc<Mutex<Vec<BeatEvent>>>);

    impl StateObserver for Recorder {
        fn on_event(&mut self, event: &BeatEvent) {
            self.0.lock().unwrap().push(*event);
        }
    }

    #[test]
    fn test_value_storage() {
        let mut m = SequencerState::new(16);
        m.set_beat_value(0, 3);
        assert_eq!(m.get_beat_value(0), 3);
        m.set_beat_value(5, 7);
        assert_eq!(m.get_beat_value(5), 7);

        // Out of bounds is safe
        assert_eq!(m.set_beat_value(99, 5), None);
        assert_eq!(m.get_beat_value(99), 0);

        // Above the 3-bit ceiling is rejected
        assert_eq!(m.set_beat_value(0, 10), None);
        assert_eq!(m.get_beat_value(0), 3);
    }

    #[test]
    fn test_every_valid_value_round_trips() {
        let mut m = SequencerState::default();
        for b in 0..m.beat_count() {
            for v in 0..=MAX_VALUE as u32 {
                assert!(m.set_beat_value(b, v).is_some());
                assert_eq!(m.get_beat_value(b) as u32, v);
                assert_eq!(m.is_beat_active(b), v != 0);
            }
        }
    }

    #[test]
    fn test_out_of_range_write_leaves_others() {
        let mut m = SequencerState::new(16);
        m.set_beat_value(15, 2);
        m.set_beat_value(16, 7);
        m.set_beat_value(usize::MAX, 7);
        assert_eq!(m.get_beat_value(15), 2);
        assert_eq!(m.active_beats().collect::<Vec<_>>(), vec![15]);
    }

    #[test]
    fn test_beat_active() {
        let mut m = SequencerState::new(16);
        assert!(!m.is_beat_active(0));
        m.set_beat_value(0, 5);
        assert!(m.is_beat_active(0));
        m.set_beat_value(0, 0);
        assert!(!m.is_beat_active(0));
        assert!(!m.is_beat_active(200));
    }

    #[test]
    fn test_current_beat() {
        let mut m = SequencerState::new(16);
        assert_eq!(m.current_beat(), 0);
        m.set_current_beat(5);
        assert_eq!(m.current_beat(), 5);
        m.set_current_beat(15);
        assert_eq!(m.current_beat(), 15);
        assert_eq!(m.set_current_beat(16), None);
        assert_eq!(m.current_beat(), 15);
    }

    #[test]
    fn test_advance_wraps() {
        let mut m = SequencerState::new(4);
        m.set_current_beat(3);
        assert_eq!(m.advance(), Some(BeatEvent::BeatChanged { beat: 0 }));
        assert_eq!(m.advance(), Some(BeatEvent::BeatChanged { beat: 1 }));
    }

    #[test]
    fn test_custom_ceiling() {
        let mut m = SequencerState::with_max_value(16, 8);
        assert!(m.set_beat_value(1, 8).is_some());
        assert!(m.set_beat_value(1, 9).is_none());
        assert_eq!(m.max_value(), 8);
    }

    #[test]
    fn test_zero_beats_bumped() {
        let m = SequencerState::new(0);
        assert_eq!(m.beat_count(), 1);
    }

    #[test]
    fn test_observers_all_notified() {
        let mut m = SequencerState::new(16);
        let (tx, rx) = unbounded();
        let log = Arc::new(Mutex::new(Vec::new()));
        m.subscribe(Box::new(tx));
        m.subscribe(Box::new(Recorder(log.clone())));

        m.set_beat_value(2, 5);
        m.set_current_beat(2);
        m.set_beat_value(2, 99);

        let expected = vec![
            BeatEvent::ValueChanged { beat: 2, value: 5 },
            BeatEvent::BeatChanged { beat: 2 },
        ];
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), expected);
        assert_eq!(*log.lock().unwrap(), expected);
    }

    #[test]
    fn test_full_or_closed_observer_does_not_block() {
        let mut m = SequencerState::new(16);
        let (tx_full, _rx_full) = bounded(1);
        let (tx_closed, rx_closed) = bounded(1);
        drop(rx_closed);
        m.subscribe(Box::new(tx_full));
        m.subscribe(Box::new(tx_closed));
        for b in 0..16 {
            m.set_current_beat(b);
        }
        assert_eq!(m.current_beat(), 15);
    }

    #[test]
    fn test_apply_mirrors_events() {
        let mut live = SequencerState::new(16);
        let (tx, rx) = unbounded();
        live.subscribe(Box::new(tx));
        live.set_beat_value(1, 4);
        live.set_beat_value(3, 2);
        live.set_current_beat(3);

        let mut mirror = SequencerState::new(16);
        for ev in rx.try_iter() {
            mirror.apply(&ev);
        }
        assert_eq!(mirror.values(), live.values());
        assert_eq!(mirror.current_beat(), 3);
        assert_eq!(mirror.apply(&BeatEvent::Tempo { ms: 100 }), None);
    }

    #[test]
    fn test_dump() {
        let mut m = SequencerState::new(4);
        m.set_beat_value(0, 3);
        m.set_beat_value(2, 5);
        m.set_current_beat(2);
        let expected = "beats: 4\n\
                        current: 2\n\
                        beat  0: 3 (011)\n\
                        beat  1: 0 (000)\n\
                        beat  2: 5 (101)\n\
                        beat  3: 0 (000)\n\
                        active: 0 2\n";
        assert_eq!(m.dump(), expected);
    }
}
