// Serial GPIO/PWM bridge
//
// The motor driver IC hangs off a small bridge MCU that owns the LEDC/PWM
// peripheral and the direction GPIOs. The host talks to it over a serial link.
// Packet format: [0xFF, 0xFF, Op, Length, Params..., Checksum]
// Length counts params + checksum. Writes are unacknowledged.

use serialport::{self, SerialPort};
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Serial write timeout
pub const DEFAULT_TIMEOUT_MS: u64 = 50;

/// Packet header bytes
const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Bridge operations
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    AttachPwm = 0x10, // channel, pin, freq_lo, freq_mid, freq_hi, bits
    SetDuty = 0x11,   // channel, duty
    SetLevel = 0x12,  // pin, level
}

/// Error types for bridge communication
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Pin backend that forwards every write to the bridge MCU
pub struct SerialPins {
    port: Box<dyn SerialPort>,
    failed_writes: u32,
}

impl SerialPins {
    /// Open the bridge's serial port
    pub fn open(port_name: &str, baudrate: u32) -> Result<Self> {
        info!("Opening GPIO bridge on {} @ {} baud", port_name, baudrate);
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self {
            port,
            failed_writes: 0,
        })
    }

    /// Calculate checksum for a packet (excluding header)
    fn checksum(data: &[u8]) -> u8 {
        let sum: u16 = data.iter().map(|&b| b as u16).sum();
        (!sum & 0xFF) as u8
    }

    /// Build a packet with header and checksum
    fn build_packet(op: Op, params: &[u8]) -> Vec<u8> {
        let length = (params.len() + 1) as u8; // params + checksum
        let mut packet = Vec::with_capacity(5 + params.len());

        packet.extend_from_slice(&HEADER);
        packet.push(op as u8);
        packet.push(length);
        packet.extend_from_slice(params);

        let checksum_data = &packet[2..]; // skip header
        packet.push(Self::checksum(checksum_data));

        packet
    }

    fn try_send(&mut self, packet: &[u8]) -> Result<()> {
        self.port.write_all(packet)?;
        self.port.flush()?;
        Ok(())
    }

    /// Send a packet; failures are logged and otherwise dropped
    fn send(&mut self, op: Op, params: &[u8]) {
        let packet = Self::build_packet(op, params);
        debug!("bridge {:?} {:02X?}", op, params);

        if let Err(e) = self.try_send(&packet) {
            self.failed_writes = self.failed_writes.wrapping_add(1);
            // Log the first failure and every 100th after it
            if self.failed_writes % 100 == 1 {
                warn!(
                    "Bridge write {:?} failed ({} failures so far): {}",
                    op, self.failed_writes, e
                );
            }
        }
    }
}

impl super::OutputPins for SerialPins {
    fn configure_pwm(&mut self, channel: u8, pin: u8, freq_hz: u32, resolution_bits: u8) {
        let [f0, f1, f2, _] = freq_hz.to_le_bytes();
        self.send(Op::AttachPwm, &[channel, pin, f0, f1, f2, resolution_bits]);
    }

    fn set_duty(&mut self, channel: u8, duty: u8) {
        self.send(Op::SetDuty, &[channel, duty]);
    }

    fn set_level(&mut self, pin: u8, high: bool) {
        self.send(Op::SetLevel, &[pin, high as u8]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum() {
        // Op=SetDuty, Length=3, channel=1, duty=200
        let data = [0x11u8, 3, 1, 200];
        // ~(17+3+1+200) = ~221 = 34
        assert_eq!(SerialPins::checksum(&data), 34);
    }

    #[test]
    fn test_build_level_packet() {
        let packet = SerialPins::build_packet(Op::SetLevel, &[16, 1]);
        // Header (2) + Op (1) + Length (1) + Params (2) + Checksum (1)
        assert_eq!(packet.len(), 7);
        assert_eq!(&packet[..2], &HEADER);
        assert_eq!(packet[2], 0x12);
        assert_eq!(packet[3], 3); // params + checksum
        assert_eq!(packet[4], 16);
        assert_eq!(packet[5], 1);
        assert_eq!(packet[6], SerialPins::checksum(&packet[2..6]));
    }

    #[test]
    fn test_build_attach_packet_encodes_frequency() {
        let [f0, f1, f2, _] = 20_000u32.to_le_bytes();
        let packet = SerialPins::build_packet(Op::AttachPwm, &[0, 18, f0, f1, f2, 8]);
        assert_eq!(packet[3], 7);
        assert_eq!(&packet[4..10], &[0, 18, 0x20, 0x4E, 0x00, 8]);
    }
}
