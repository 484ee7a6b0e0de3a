use crate::error::MonitorError;
use crate::sequencer::SequencerState;
use crate::types::*;
use crossbeam_channel::Receiver;
use log::{error, info};
use serde_json::json;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Records a session: every event as a JSONL line, plus a textual dump of
/// the final state when the event stream ends.
///
/// Layout of `<output_dir>/session_<unix_secs>/`:
/// - `manifest.json` — beat count, value ceiling
/// - `events.jsonl`  — `{"t":…,"type":…,…}` per event
/// - `state.txt`     — `SequencerState::dump` of the mirrored state
pub struct DataLogger {
    rx: Receiver<TimedEvent>,
    session_dir: PathBuf,
    mirror: SequencerState,
}

impl DataLogger {
    pub fn new(
        rx: Receiver<TimedEvent>,
        output_dir: &Path,
        mirror: SequencerState,
    ) -> Result<Self, MonitorError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let session_dir = output_dir.join(format!("session_{}", timestamp));
        fs::create_dir_all(&session_dir).map_err(|source| MonitorError::SessionFile {
            path: session_dir.clone(),
            source,
        })?;

        Ok(Self {
            rx,
            session_dir,
            mirror,
        })
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Run the logger. Blocks the calling thread until the event channel closes.
    pub fn run(&mut self) {
        info!("Data logger → {:?}", self.session_dir);
        if let Err(e) = self.record() {
            error!("Data logger stopped: {}", e);
        }
    }

    fn record(&mut self) -> Result<(), MonitorError> {
        self.write_manifest()?;

        let events_path = self.session_dir.join("events.jsonl");
        let file = File::create(&events_path).map_err(|source| MonitorError::SessionFile {
            path: events_path.clone(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        let mut event_count: u64 = 0;

        for timed in self.rx.iter() {
            self.mirror.apply(&timed.event);
            let line = serde_json::to_string(&timed)?;
            writeln!(writer, "{}", line)?;
            event_count += 1;
            if event_count % 100 == 0 {
                writer.flush()?;
            }
        }
        writer.flush()?;

        let dump_path = self.session_dir.join("state.txt");
        fs::write(&dump_path, self.mirror.dump()).map_err(|source| {
            MonitorError::SessionFile {
                path: dump_path.clone(),
                source,
            }
        })?;

        info!(
            "Session saved: {} events → {:?}",
            event_count, self.session_dir
        );
        Ok(())
    }

    fn write_manifest(&self) -> Result<(), MonitorError> {
        let manifest = json!({
            "version": env!("CARGO_PKG_VERSION"),
            "system": "beat-monitor",
            "beats": self.mirror.beat_count(),
            "max_value": self.mirror.max_value(),
            "value_bits": VALUE_BITS,
        });
        let path = self.session_dir.join("manifest.json");
        fs::write(&path, serde_json::to_string_pretty(&manifest)?)
            .map_err(|source| MonitorError::SessionFile { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_session_files_written() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = unbounded();
        let mut logger = DataLogger::new(rx, dir.path(), SequencerState::new(4)).unwrap();

        for (t, event) in [
            BeatEvent::ValueChanged { beat: 1, value: 6 },
            BeatEvent::Tempo { ms: 300 },
            BeatEvent::BeatChanged { beat: 1 },
        ]
        .into_iter()
        .enumerate()
        {
            tx.send(TimedEvent { t: t as u64, event }).unwrap();
        }
        drop(tx);
        logger.run();

        let session = logger.session_dir().to_path_buf();
        let events = fs::read_to_string(session.join("events.jsonl")).unwrap();
        let lines: Vec<&str> = events.lines().collect();
        assert_eq!(lines.len(), 3);
        let first: TimedEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.event, BeatEvent::ValueChanged { beat: 1, value: 6 });

        let dump = fs::read_to_string(session.join("state.txt")).unwrap();
        assert!(dump.contains("current: 1"));
        assert!(dump.contains("beat  1: 6 (110)"));
        assert!(dump.ends_with("active: 1\n"));

        let manifest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(session.join("manifest.json")).unwrap())
                .unwrap();
        assert_eq!(manifest["beats"], 4);
        assert_eq!(manifest["max_value"], 7);
    }
}
