use crate::line_framer::LineFramer;
use crate::protocol::ProtocolDecoder;
use crate::sequencer::{SequencerState, StateObserver};
use crate::shutdown::ShutdownToken;
use crate::types::*;
use crossbeam_channel::{never, select, tick, unbounded, Receiver, Sender};
use log::{debug, info, trace};
use std::time::Duration;

/// The monitor receives raw bytes from whichever source is armed, frames
/// them into lines, decodes each line into the sequencer state and fans the
/// resulting events out to downstream consumers (logger, OSC, display).
///
/// Everything runs on the monitor thread. Consumers only ever see events,
/// never the state itself.
///
/// # Local clock
///
/// Normally the microcontroller owns timing and the cursor only moves on
/// `BEAT` lines. With a local clock the monitor also advances the cursor by
/// one beat every period, wrapping at the end of the sequence.
pub struct Monitor {
    input_rx: Receiver<InputEvent>,
    event_txs: Vec<Sender<TimedEvent>>,
    framer: LineFramer,
    decoder: ProtocolDecoder,
    state: SequencerState,
    state_rx: Receiver<BeatEvent>,
    clock: SessionClock,
    local_clock: Option<Duration>,
    shutdown: Option<ShutdownToken>,
    lines_seen: u64,
    lines_ignored: u64,
}

impl Monitor {
    pub fn new(
        input_rx: Receiver<InputEvent>,
        event_txs: Vec<Sender<TimedEvent>>,
        mut state: SequencerState,
        clock: SessionClock,
    ) -> Self {
        let (state_tx, state_rx) = unbounded();
        state.subscribe(Box::new(state_tx));
        Self {
            input_rx,
            event_txs,
            framer: LineFramer::new(),
            decoder: ProtocolDecoder::new(),
            state,
            state_rx,
            clock,
            local_clock: None,
            shutdown: None,
            lines_seen: 0,
            lines_ignored: 0,
        }
    }

    pub fn with_framer(mut self, framer: LineFramer) -> Self {
        self.framer = framer;
        self
    }

    pub fn with_decoder(mut self, decoder: ProtocolDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Free-run the cursor, one beat per `period`.
    pub fn with_local_clock(mut self, period: Option<Duration>) -> Self {
        self.local_clock = period;
        self
    }

    pub fn with_shutdown(mut self, token: ShutdownToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Extra observer notified synchronously from inside the mutators.
    pub fn subscribe(&mut self, observer: Box<dyn StateObserver>) {
        self.state.subscribe(observer);
    }

    pub fn state(&self) -> &SequencerState {
        &self.state
    }

    pub fn framer(&self) -> &LineFramer {
        &self.framer
    }

    pub fn into_state(self) -> SequencerState {
        self.state
    }

    /// Run until every byte source has hung up or shutdown is requested.
    pub fn run(&mut self) {
        info!(
            "Monitor running ({} beats, ceiling {}, local clock: {})",
            self.state.beat_count(),
            self.state.max_value(),
            match self.local_clock {
                Some(p) => format!("{} ms/beat", p.as_millis()),
                None => "OFF (remote timing)".into(),
            }
        );

        let input_rx = self.input_rx.clone();
        let ticker = match self.local_clock {
            Some(period) if !period.is_zero() => tick(period),
            _ => never(),
        };
        let cancel = match &self.shutdown {
            Some(token) => token.receiver().clone(),
            None => never(),
        };

        loop {
            select! {
                recv(input_rx) -> msg => match msg {
                    Ok(InputEvent::Bytes(bytes)) => self.handle_bytes(&bytes),
                    Err(_) => {
                        debug!("All byte sources closed");
                        break;
                    }
                },
                recv(ticker) -> _ => {
                    self.state.advance();
                    self.forward_state_events();
                },
                recv(cancel) -> _ => {
                    debug!("Shutdown requested");
                    break;
                },
            }
        }

        if self.framer.pending() > 0 {
            debug!("Discarding {} bytes of unterminated input", self.framer.pending());
        }
        info!(
            "Monitor shutting down after {} lines ({} ignored, {} overflowed)",
            self.lines_seen,
            self.lines_ignored,
            self.framer.overflow_count()
        );
    }

    /// Frame, decode and apply one chunk of input.
    pub fn handle_bytes(&mut self, bytes: &[u8]) {
        let lines: Vec<String> = self.framer.feed(bytes).collect();
        for line in lines {
            self.lines_seen += 1;
            trace!("Parsing: {}", line);
            match self.decoder.decode(&line, &mut self.state) {
                Some(cmd) => {
                    if let Some(ev) = ProtocolDecoder::informational(&cmd) {
                        self.emit(ev);
                    }
                }
                None => self.lines_ignored += 1,
            }
            self.forward_state_events();
        }
    }

    fn forward_state_events(&mut self) {
        while let Ok(ev) = self.state_rx.try_recv() {
            self.emit(ev);
        }
    }

    fn emit(&self, event: BeatEvent) {
        let timed = TimedEvent {
            t: self.clock.now_us(),
            event,
        };
        for tx in &self.event_txs {
            let _ = tx.send(timed);
        }
    }
}
