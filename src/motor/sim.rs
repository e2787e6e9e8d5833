// In-memory pin backend
//
// Stands in for the hardware when no bridge is attached (`--simulate`) and
// lets tests observe exactly which writes the driver issued.

use std::collections::HashMap;

use tracing::debug;

use super::driver::OutputPins;

/// Oldest half of the write log is dropped once it holds this many entries
pub const WRITE_LOG_CAPACITY: usize = 1024;

/// One write issued to the pins, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinWrite {
    Duty { channel: u8, duty: u8 },
    Level { pin: u8, high: bool },
}

#[derive(Debug, Default)]
pub struct SimPins {
    pwm_pins: HashMap<u8, u8>,
    duties: HashMap<u8, u8>,
    levels: HashMap<u8, bool>,
    writes: Vec<PinWrite>,
}

impl SimPins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last duty written to a channel
    pub fn duty(&self, channel: u8) -> Option<u8> {
        self.duties.get(&channel).copied()
    }

    /// Last level written to a pin
    pub fn level(&self, pin: u8) -> Option<bool> {
        self.levels.get(&pin).copied()
    }

    /// Pin attached to a PWM channel
    pub fn pwm_pin(&self, channel: u8) -> Option<u8> {
        self.pwm_pins.get(&channel).copied()
    }

    /// Most recent writes since the last `clear_writes`, at most `WRITE_LOG_CAPACITY`
    pub fn writes(&self) -> &[PinWrite] {
        &self.writes
    }

    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }

    fn record(&mut self, write: PinWrite) {
        if self.writes.len() >= WRITE_LOG_CAPACITY {
            self.writes.drain(..WRITE_LOG_CAPACITY / 2);
        }
        self.writes.push(write);
    }
}

impl OutputPins for SimPins {
    fn configure_pwm(&mut self, channel: u8, pin: u8, freq_hz: u32, resolution_bits: u8) {
        debug!(
            "sim: attach pin {} to channel {} ({} Hz, {} bit)",
            pin, channel, freq_hz, resolution_bits
        );
        self.pwm_pins.insert(channel, pin);
    }

    fn set_duty(&mut self, channel: u8, duty: u8) {
        self.duties.insert(channel, duty);
        self.record(PinWrite::Duty { channel, duty });
    }

    fn set_level(&mut self, pin: u8, high: bool) {
        self.levels.insert(pin, high);
        self.record(PinWrite::Level { pin, high });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_log_is_bounded() {
        let mut pins = SimPins::new();
        for i in 0..10_000u32 {
            pins.set_duty(0, (i % 256) as u8);
            pins.set_level(16, i % 2 == 0);
        }

        assert!(pins.writes().len() <= WRITE_LOG_CAPACITY);
        // Newest write is kept
        assert_eq!(
            pins.writes().last(),
            Some(&PinWrite::Level {
                pin: 16,
                high: false
            })
        );
        assert_eq!(pins.duty(0), Some((9_999 % 256) as u8));
    }
}
