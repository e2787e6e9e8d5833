// Motor control module for the robot arm
//
// Provides:
// - Per-motor wiring and runtime state types
// - H-bridge output driver (PWM duty + two direction pins per motor)
// - Pin backends: serial GPIO bridge and an in-memory simulation

pub mod bridge;
mod driver;
pub mod sim;

pub use bridge::{BridgeError, SerialPins};
pub use driver::{MotorOutputDriver, OutputPins};
pub use sim::{PinWrite, SimPins};

use serde::{Deserialize, Serialize};

/// Maximum PWM duty, which is also the maximum commanded speed
pub const MAX_SPEED: u8 = 255;

/// Static wiring of one motor's H-bridge half
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorSpec {
    pub pwm_channel: u8,
    pub pwm_pin: u8,
    pub in1_pin: u8,
    pub in2_pin: u8,
}

impl MotorSpec {
    pub const fn new(pwm_channel: u8, pwm_pin: u8, in1_pin: u8, in2_pin: u8) -> Self {
        Self {
            pwm_channel,
            pwm_pin,
            in1_pin,
            in2_pin,
        }
    }
}

/// Physical rotation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

impl Direction {
    /// Direction pin levels (in1, in2) for a running motor
    pub fn pin_levels(self) -> (bool, bool) {
        match self {
            Direction::Forward => (true, false),
            Direction::Reverse => (false, true),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Reverse => "reverse",
        }
    }
}

/// Commanded state of one motor
///
/// Timestamps are wrapping millisecond ticks; compare them with `wrapping_sub`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotorState {
    pub speed: u8,
    pub direction: Direction,
    pub started_at: u32,
    pub expiry_ms: Option<u32>,
}

impl MotorState {
    pub fn is_running(&self) -> bool {
        self.speed > 0
    }

    /// True once a timed run has reached its deadline
    pub fn is_expired(&self, now: u32) -> bool {
        match self.expiry_ms {
            Some(expiry) if self.is_running() => now.wrapping_sub(self.started_at) >= expiry,
            _ => false,
        }
    }

    /// Drop to the stopped state, keeping the last direction
    pub fn stop(&mut self) {
        self.speed = 0;
        self.expiry_ms = None;
    }
}
