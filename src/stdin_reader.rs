use crate::shutdown::ShutdownToken;
use crate::types::InputEvent;
use crossbeam_channel::Sender;
use log::{info, warn};
use std::io::{self, Read};

/// Pipes any `Read` (normally standard input) into the monitor as raw chunks.
/// Framing is the monitor's job; chunks are forwarded exactly as read.
pub struct StdinReader<R: Read> {
    reader: R,
    tx: Sender<InputEvent>,
    shutdown: Option<ShutdownToken>,
}

impl StdinReader<io::Stdin> {
    pub fn stdin(tx: Sender<InputEvent>) -> Self {
        Self::new(io::stdin(), tx)
    }
}

impl<R: Read> StdinReader<R> {
    pub fn new(reader: R, tx: Sender<InputEvent>) -> Self {
        Self {
            reader,
            tx,
            shutdown: None,
        }
    }

    pub fn with_shutdown(mut self, token: ShutdownToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Blocks until EOF, a read error, the monitor hanging up, or shutdown.
    /// Returns the number of bytes forwarded.
    pub fn run(&mut self) -> u64 {
        info!("Listening for UART messages on stdin");
        let mut buf = [0u8; 256];
        let mut total: u64 = 0;

        loop {
            if self.shutdown.as_ref().is_some_and(|t| t.is_cancelled()) {
                break;
            }
            match self.reader.read(&mut buf) {
                Ok(0) => {
                    info!("Input stream closed after {} bytes", total);
                    break;
                }
                Ok(n) => {
                    total += n as u64;
                    if self.tx.send(InputEvent::Bytes(buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Input read error: {}", e);
                    break;
                }
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::io::Cursor;

    #[test]
    fn test_forwards_all_bytes_then_stops() {
        let (tx, rx) = unbounded();
        let data = b"TONE 0 3\nBEAT 1\n".to_vec();
        let n = StdinReader::new(Cursor::new(data.clone()), tx).run();
        assert_eq!(n, data.len() as u64);

        let mut got = Vec::new();
        for InputEvent::Bytes(chunk) in rx.try_iter() {
            got.extend(chunk);
        }
        assert_eq!(got, data);
    }

    #[test]
    fn test_stops_when_monitor_gone() {
        let (tx, rx) = unbounded();
        drop(rx);
        let n = StdinReader::new(Cursor::new(b"BEAT 1\n".to_vec()), tx).run();
        assert_eq!(n, 7);
    }

    #[test]
    fn test_cancelled_before_reading() {
        let (tx, rx) = unbounded();
        let (trigger, token) = crate::shutdown::channel();
        trigger.fire();
        let n = StdinReader::new(Cursor::new(b"BEAT 1\n".to_vec()), tx)
            .with_shutdown(token)
            .run();
        assert_eq!(n, 0);
        assert!(rx.try_recv().is_err());
    }
}
