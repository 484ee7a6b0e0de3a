use crate::error::MonitorError;
use crate::shutdown::ShutdownToken;
use crate::types::*;
use crossbeam_channel::Sender;
use log::{debug, error, info, warn};
use std::io::{self, Read};
use std::time::Duration;

/// Default UART speed of the sequencer board.
pub const DEFAULT_BAUD: u32 = 115200;

/// Reads the microcontroller's UART link and forwards raw chunks to the
/// monitor. Line framing and decoding happen downstream.
pub struct SerialReader {
    port_name: String,
    baud_rate: u32,
    tx: Sender<InputEvent>,
    shutdown: Option<ShutdownToken>,
}

impl SerialReader {
    pub fn new(port_name: String, tx: Sender<InputEvent>) -> Self {
        Self {
            port_name,
            baud_rate: DEFAULT_BAUD,
            tx,
            shutdown: None,
        }
    }

    pub fn with_baud(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_shutdown(mut self, token: ShutdownToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Run the serial reader loop. Blocks the calling thread.
    pub fn run(&self) {
        if let Err(e) = self.read_loop() {
            error!("{}", e);
            error!("Is the board connected? Run with --demo for dev mode.");
        }
    }

    fn read_loop(&self) -> Result<(), MonitorError> {
        info!("Opening serial port: {} @ {}", self.port_name, self.baud_rate);

        let mut port = serialport::new(&self.port_name, self.baud_rate)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| MonitorError::SerialOpen {
                port: self.port_name.clone(),
                reason: e.to_string(),
            })?;

        info!("Serial port opened. Reading...");
        let mut buf = [0u8; 256];
        let mut byte_count: u64 = 0;
        let mut chunk_count: u64 = 0;

        loop {
            if self.shutdown.as_ref().is_some_and(|t| t.is_cancelled()) {
                debug!("Serial reader cancelled");
                break;
            }
            match port.read(&mut buf) {
                Ok(0) => continue,
                Ok(n) => {
                    byte_count += n as u64;
                    chunk_count += 1;
                    if self.tx.send(InputEvent::Bytes(buf[..n].to_vec())).is_err() {
                        break;
                    }
                    if chunk_count.is_multiple_of(1000) {
                        debug!("Serial: {} bytes in {} reads", byte_count, chunk_count);
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => continue,
                Err(e) => {
                    warn!("Serial read error: {}", e);
                    std::thread::sleep(Duration::from_millis(100));
                }
            }
        }

        info!("Serial reader closed after {} bytes", byte_count);
        Ok(())
    }
}
