use crate::error::MonitorError;
use crate::types::*;
use crossbeam_channel::Receiver;
use log::{debug, error, info};
use rosc::{OscMessage, OscPacket, OscType};
use std::net::UdpSocket;

/// Forwards sequencer events as OSC so an external visualizer (or synth)
/// can follow along.
///
/// | Address        | Args            |
/// |----------------|-----------------|
/// | `/beat/current`| `i beat`        |
/// | `/beat/value`  | `i beat, i value` |
/// | `/beat/tempo`  | `i ms`          |
pub struct OscSender {
    rx: Receiver<TimedEvent>,
    target: String,
}

impl OscSender {
    pub fn new(rx: Receiver<TimedEvent>, target: String) -> Self {
        Self { rx, target }
    }

    /// Run the OSC sender loop. Blocks the calling thread.
    pub fn run(&self) {
        let socket = match UdpSocket::bind("0.0.0.0:0").map_err(MonitorError::Socket) {
            Ok(s) => s,
            Err(e) => {
                error!("{}", e);
                return;
            }
        };
        info!("OSC sender → {}", self.target);

        for timed in self.rx.iter() {
            if let Err(e) = self.send_event(&socket, &timed.event) {
                debug!("OSC send error: {}", e);
            }
        }
        info!("OSC sender shutting down");
    }

    fn send_event(&self, socket: &UdpSocket, event: &BeatEvent) -> Result<(), MonitorError> {
        let buf = encode_event(event)?;
        socket.send_to(&buf, &self.target)?;
        Ok(())
    }
}

pub fn event_message(event: &BeatEvent) -> OscMessage {
    let (addr, args) = match *event {
        BeatEvent::BeatChanged { beat } => ("/beat/current", vec![OscType::Int(beat as i32)]),
        BeatEvent::ValueChanged { beat, value } => (
            "/beat/value",
            vec![OscType::Int(beat as i32), OscType::Int(value as i32)],
        ),
        BeatEvent::Tempo { ms } => ("/beat/tempo", vec![OscType::Int(ms as i32)]),
    };
    OscMessage {
        addr: addr.to_string(),
        args,
    }
}

pub fn encode_event(event: &BeatEvent) -> Result<Vec<u8>, MonitorError> {
    let packet = OscPacket::Message(event_message(event));
    rosc::encoder::encode(&packet).map_err(|e| MonitorError::OscEncode(format!("{:?}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_message() {
        let msg = event_message(&BeatEvent::ValueChanged { beat: 2, value: 5 });
        assert_eq!(msg.addr, "/beat/value");
        assert_eq!(msg.args, vec![OscType::Int(2), OscType::Int(5)]);
    }

    #[test]
    fn test_encoded_packet_decodes() {
        let buf = encode_event(&BeatEvent::BeatChanged { beat: 7 }).unwrap();
        let (_, packet) = rosc::decoder::decode_udp(&buf).unwrap();
        match packet {
            OscPacket::Message(m) => {
                assert_eq!(m.addr, "/beat/current");
                assert_eq!(m.args, vec![OscType::Int(7)]);
            }
            other => panic!("expected message, got {:?}", other),
        }
    }

    #[test]
    fn test_sends_over_udp() {
        let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
        listener
            .set_read_timeout(Some(std::time::Duration::from_secs(2)))
            .unwrap();
        let target = listener.local_addr().unwrap().to_string();

        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(TimedEvent {
            t: 0,
            event: BeatEvent::Tempo { ms: 250 },
        })
        .unwrap();
        drop(tx);
        OscSender::new(rx, target).run();

        let mut buf = [0u8; 256];
        let n = listener.recv(&mut buf).unwrap();
        let (_, packet) = rosc::decoder::decode_udp(&buf[..n]).unwrap();
        match packet {
            OscPacket::Message(m) => assert_eq!(m.addr, "/beat/tempo"),
            other => panic!("expected message, got {:?}", other),
        }
    }
}
