// H-bridge output driver for the arm motors
//
// Maps (motor, speed, direction) onto the three physical signals of each
// H-bridge half: PWM duty plus the IN1/IN2 direction pins.
//
// | IN1 | IN2 | Motor state                  |
// |-----|-----|------------------------------|
// | 1   | 0   | Forward (speed = PWM duty)   |
// | 0   | 1   | Reverse (speed = PWM duty)   |
// | 0   | 0   | Stopped, no braking current  |

use tracing::{debug, info};

use super::{Direction, MotorSpec};
use crate::config::{PWM_FREQ_HZ, PWM_RESOLUTION_BITS};

/// Raw pin/PWM access
///
/// Writes are fire-and-forget: a backend that fails to reach the hardware
/// reports it through its own logs, never to the caller.
pub trait OutputPins {
    /// Attach `pin` to PWM `channel`
    fn configure_pwm(&mut self, channel: u8, pin: u8, freq_hz: u32, resolution_bits: u8);

    /// Set duty on a PWM channel (0..=255)
    fn set_duty(&mut self, channel: u8, duty: u8);

    /// Drive a digital output
    fn set_level(&mut self, pin: u8, high: bool);
}

impl<P: OutputPins + ?Sized> OutputPins for Box<P> {
    fn configure_pwm(&mut self, channel: u8, pin: u8, freq_hz: u32, resolution_bits: u8) {
        (**self).configure_pwm(channel, pin, freq_hz, resolution_bits)
    }

    fn set_duty(&mut self, channel: u8, duty: u8) {
        (**self).set_duty(channel, duty)
    }

    fn set_level(&mut self, pin: u8, high: bool) {
        (**self).set_level(pin, high)
    }
}

/// Drives every motor of the arm through a pin backend
pub struct MotorOutputDriver<P> {
    pins: P,
    specs: Vec<MotorSpec>,
    standby_pin: Option<u8>,
}

impl<P: OutputPins> MotorOutputDriver<P> {
    pub fn new(pins: P, specs: Vec<MotorSpec>) -> Self {
        Self {
            pins,
            specs,
            standby_pin: None,
        }
    }

    /// Hold the driver IC's standby pin high once initialized
    pub fn with_standby_pin(mut self, pin: u8) -> Self {
        self.standby_pin = Some(pin);
        self
    }

    /// Attach PWM channels, enable the driver IC, and leave every motor stopped
    pub fn init(&mut self) {
        info!("Initializing {} motor outputs", self.specs.len());

        for spec in &self.specs {
            self.pins.configure_pwm(
                spec.pwm_channel,
                spec.pwm_pin,
                PWM_FREQ_HZ,
                PWM_RESOLUTION_BITS,
            );
        }

        if let Some(pin) = self.standby_pin {
            self.pins.set_level(pin, true);
        }

        for motor in 0..self.specs.len() {
            self.drive(motor, 0, Direction::Forward);
        }
    }

    /// Apply speed and direction to one motor
    ///
    /// `speed == 0` pulls both direction pins low regardless of `direction`.
    pub fn drive(&mut self, motor: usize, speed: u8, direction: Direction) {
        let Some(spec) = self.specs.get(motor) else {
            debug!("Ignoring drive for unknown motor {}", motor);
            return;
        };

        let (in1, in2) = if speed == 0 {
            (false, false)
        } else {
            direction.pin_levels()
        };

        self.pins.set_duty(spec.pwm_channel, speed);
        self.pins.set_level(spec.in1_pin, in1);
        self.pins.set_level(spec.in2_pin, in2);
    }

    /// Number of motors wired to this driver
    pub fn motor_count(&self) -> usize {
        self.specs.len()
    }

    pub fn pins(&self) -> &P {
        &self.pins
    }

    #[cfg(test)]
    pub fn pins_mut(&mut self) -> &mut P {
        &mut self.pins
    }
}
