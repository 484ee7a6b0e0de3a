use beat_monitor::data_logger;
use beat_monitor::event_logger;
use beat_monitor::line_framer::LineFramer;
use beat_monitor::mock_sender;
use beat_monitor::monitor;
use beat_monitor::osc_sender;
use beat_monitor::protocol::ProtocolDecoder;
use beat_monitor::sequencer::SequencerState;
#[cfg(feature = "hardware")]
use beat_monitor::serial_reader;
use beat_monitor::shutdown;
use beat_monitor::stdin_reader;
use beat_monitor::types::*;

use clap::Parser;
use crossbeam_channel::bounded;
use log::{error, info};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "beat-monitor")]
#[command(about = "Visualizes beats and pitch values streamed from a sequencer microcontroller")]
struct Cli {
    /// Read from a serial port instead of stdin (e.g. /dev/ttyUSB0)
    #[arg(long)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(long, default_value_t = 115200)]
    baud: u32,

    /// Play the built-in demo sequence instead of reading any input
    #[arg(long)]
    demo: bool,

    /// Type protocol lines on stdin as the microcontroller ('play' runs the demo)
    #[arg(long)]
    interactive: bool,

    /// Delay between demo beats (ms)
    #[arg(long, default_value_t = 500)]
    demo_delay_ms: u64,

    /// Number of beats in the sequence
    #[arg(long, default_value_t = DEFAULT_BEATS)]
    beats: usize,

    /// Longest accepted line before the framer drops and resyncs
    #[arg(long, default_value_t = MAX_LINE_LEN)]
    max_line_len: usize,

    /// Do not move the cursor on `BEAT <beat> <value>`
    #[arg(long)]
    no_cursor_coupling: bool,

    /// Free-run the cursor locally instead of waiting for BEAT lines
    #[arg(long)]
    local_clock: bool,

    /// Local clock period (ms per beat)
    #[arg(long, default_value_t = MS_PER_BEAT)]
    ms_per_beat: u64,

    /// Enable OSC output
    #[arg(long)]
    osc: bool,

    /// OSC target address
    #[arg(long, default_value = "127.0.0.1:9000")]
    osc_target: String,

    /// Record events and a final state dump
    #[arg(long)]
    log_data: bool,

    /// Output directory for recorded sessions
    #[arg(long, default_value = "./sessions")]
    output_dir: PathBuf,

    /// Stop after this many seconds
    #[arg(long)]
    duration_secs: Option<u64>,
}

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .init();

    let cli = Cli::parse();
    let clock = SessionClock::new();
    let (trigger, token) = shutdown::channel();

    let source = if cli.interactive {
        "INTERACTIVE".to_string()
    } else if cli.demo {
        "DEMO".to_string()
    } else if let Some(port) = &cli.port {
        format!("SERIAL {} @ {}", port, cli.baud)
    } else {
        "STDIN".to_string()
    };

    info!("═══════════════════════════════════════════════");
    info!("  BEAT MONITOR v{}", env!("CARGO_PKG_VERSION"));
    info!("  Beats: {}  (values 0-{})", cli.beats, MAX_VALUE);
    info!("  Source: {}", source);
    info!("  Protocol: BEAT <beat> [value] | TONE <beat> <tone> | TEMPO <ms> | 7-bit frame");
    if cli.osc { info!("  Output: OSC → {}", cli.osc_target); }
    if cli.log_data { info!("  Output: session log in {:?}", cli.output_dir); }
    info!("═══════════════════════════════════════════════");

    // Channel: byte sources → monitor
    let (input_tx, input_rx) = bounded::<InputEvent>(1024);

    // Channels: monitor → consumers
    let mut event_txs: Vec<crossbeam_channel::Sender<TimedEvent>> = Vec::new();
    let mut handles = Vec::new();

    // ─── Event log (headless display) ───────────────────────────────
    {
        let (tx, rx) = bounded::<TimedEvent>(256);
        event_txs.push(tx);
        let beats = cli.beats;
        handles.push(thread::Builder::new().name("display".into()).spawn(move || {
            event_logger::EventLogger::new(rx, beats).run();
        }).unwrap());
    }

    // ─── OSC sender ─────────────────────────────────────────────────
    if cli.osc {
        let (tx, rx) = bounded::<TimedEvent>(1024);
        event_txs.push(tx);
        let target = cli.osc_target.clone();
        handles.push(thread::Builder::new().name("osc".into()).spawn(move || {
            osc_sender::OscSender::new(rx, target).run();
        }).unwrap());
    }

    // ─── Data logger ────────────────────────────────────────────────
    if cli.log_data {
        let (tx, rx) = bounded::<TimedEvent>(4096);
        match data_logger::DataLogger::new(rx, &cli.output_dir, SequencerState::new(cli.beats)) {
            Ok(mut logger) => {
                event_txs.push(tx);
                handles.push(thread::Builder::new().name("logger".into()).spawn(move || {
                    logger.run();
                }).unwrap());
            }
            Err(e) => error!("Data logging disabled: {}", e),
        }
    }

    // ─── Monitor ────────────────────────────────────────────────────
    let local_clock = cli.local_clock.then(|| Duration::from_millis(cli.ms_per_beat));
    let decoder = ProtocolDecoder::new().with_cursor_coupling(!cli.no_cursor_coupling);
    let framer = LineFramer::with_max_line_len(cli.max_line_len);
    let state = SequencerState::new(cli.beats);
    let mon_token = token.clone();
    let mon_clock = clock.clone();
    // Disconnects when the monitor thread returns.
    let (done_tx, done_rx) = bounded::<()>(0);
    handles.push(thread::Builder::new().name("monitor".into()).spawn(move || {
        let _done = done_tx;
        let mut mon = monitor::Monitor::new(input_rx, event_txs, state, mon_clock)
            .with_framer(framer)
            .with_decoder(decoder)
            .with_local_clock(local_clock)
            .with_shutdown(mon_token);
        mon.run();
    }).unwrap());

    // ─── Input source ───────────────────────────────────────────────
    if cli.interactive {
        let tx = input_tx.clone();
        let src_token = token.clone();
        let beats = cli.beats;
        let delay = Duration::from_millis(cli.demo_delay_ms);
        // Detached for the same reason as the stdin reader.
        let spawned = thread::Builder::new().name("mock-sender".into()).spawn(move || {
            mock_sender::MockSender::new(tx, beats, delay)
                .with_shutdown(src_token)
                .run_interactive(std::io::stdin().lock());
        });
        if let Err(e) = spawned {
            error!("Failed to start interactive sender: {}", e);
        }
    } else if cli.demo {
        let tx = input_tx.clone();
        let src_token = token.clone();
        let beats = cli.beats;
        let delay = Duration::from_millis(cli.demo_delay_ms);
        handles.push(thread::Builder::new().name("mock-sender".into()).spawn(move || {
            mock_sender::MockSender::new(tx, beats, delay)
                .with_shutdown(src_token)
                .run();
        }).unwrap());
    } else if let Some(port) = cli.port.clone() {
        #[cfg(feature = "hardware")]
        {
            let tx = input_tx.clone();
            let src_token = token.clone();
            let baud = cli.baud;
            handles.push(thread::Builder::new().name("serial".into()).spawn(move || {
                serial_reader::SerialReader::new(port, tx)
                    .with_baud(baud)
                    .with_shutdown(src_token)
                    .run();
            }).unwrap());
        }
        #[cfg(not(feature = "hardware"))]
        {
            error!("Serial port {} requires the 'hardware' feature. Reading stdin instead.", port);
            spawn_stdin(input_tx.clone());
        }
    } else {
        spawn_stdin(input_tx.clone());
    }
    // Sources own the only senders now; the monitor stops once they finish.
    drop(input_tx);

    // Held until every joined thread is done; dropping it cancels them all.
    let _trigger = match cli.duration_secs {
        Some(secs) => {
            if trigger.fire_after(Duration::from_secs(secs), &done_rx) {
                info!("Duration elapsed, shutting down");
            }
            None
        }
        None => Some(trigger),
    };

    for h in handles {
        let _ = h.join();
    }
}

/// Stdin reads block, so this thread is detached rather than joined: on
/// shutdown the process exits without waiting for the next chunk.
fn spawn_stdin(tx: crossbeam_channel::Sender<InputEvent>) {
    let spawned = thread::Builder::new().name("stdin".into()).spawn(move || {
        stdin_reader::StdinReader::stdin(tx).run();
    });
    if let Err(e) = spawned {
        error!("Failed to start stdin reader: {}", e);
    }
}
