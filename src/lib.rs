pub mod data_logger;
pub mod error;
pub mod event_logger;
pub mod line_framer;
pub mod mock_sender;
pub mod monitor;
pub mod osc_sender;
pub mod protocol;
pub mod sequencer;
pub mod shutdown;
pub mod stdin_reader;
pub mod types;

#[cfg(feature = "hardware")]
pub mod serial_reader;
