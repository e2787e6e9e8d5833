// Motor command & state-update engine
//
// Owns the per-motor state, the output driver and the calibration workflow.
// Every mutation goes through `&mut self`, so callers must serialize access
// (the runtime does this by running everything on one task).

use tracing::{info, warn};

use crate::calibration::{CalibrationSession, CalibrationStore};
use crate::config::CALIBRATION_DISPLAY_WINDOW;
use crate::display::{DisplayFrame, MotorLine};
use crate::error::CommandError;
use crate::messages::{CommandAction, MotorCommand};
use crate::motor::{Direction, MAX_SPEED, MotorOutputDriver, MotorState, OutputPins};

pub struct MotorController<P> {
    driver: MotorOutputDriver<P>,
    motors: Vec<MotorState>,
    calibration: CalibrationStore,
    session: CalibrationSession,
    connected: bool,
    display_pending: bool,
    display_window_ms: u32,
}

impl<P: OutputPins> MotorController<P> {
    /// One stopped motor per driver output
    pub fn new(driver: MotorOutputDriver<P>, calibration: CalibrationStore) -> Self {
        let motors = vec![MotorState::default(); driver.motor_count()];
        Self {
            driver,
            motors,
            calibration,
            session: CalibrationSession::Idle,
            connected: false,
            display_pending: true,
            display_window_ms: CALIBRATION_DISPLAY_WINDOW.as_millis() as u32,
        }
    }

    /// Bring up the hardware with every motor stopped
    pub fn init(&mut self) {
        self.driver.init();
        self.display_pending = true;
    }

    fn check_motor(&self, motor: i64) -> Result<usize, CommandError> {
        match usize::try_from(motor) {
            Ok(index) if index < self.motors.len() => Ok(index),
            _ => Err(CommandError::OutOfRange {
                field: "motor",
                value: motor,
                max: self.motors.len() as i64 - 1,
            }),
        }
    }

    fn check_speed(speed: i64) -> Result<u8, CommandError> {
        u8::try_from(speed).map_err(|_| CommandError::OutOfRange {
            field: "speed",
            value: speed,
            max: MAX_SPEED as i64,
        })
    }

    fn check_duration(duration_ms: Option<u64>) -> Result<Option<u32>, CommandError> {
        duration_ms
            .map(|ms| {
                u32::try_from(ms).map_err(|_| CommandError::OutOfRange {
                    field: "duration_ms",
                    value: i64::try_from(ms).unwrap_or(i64::MAX),
                    max: u32::MAX as i64,
                })
            })
            .transpose()
    }

    /// Resolve a logical reverse flag against the stored calibration.
    /// Motors that were never calibrated are treated as calibrated `true`.
    pub fn physical_direction(&self, motor: usize, reverse: bool) -> Direction {
        let calibration = self.calibration.get(motor).unwrap_or(true);
        if reverse ^ calibration {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }

    /// Validate a command and apply it to the state store and the hardware
    ///
    /// Nothing is mutated unless every field validates.
    pub fn apply_command(
        &mut self,
        cmd: &MotorCommand,
        now: u32,
    ) -> Result<MotorState, CommandError> {
        let motor = self.check_motor(cmd.motor)?;

        let (speed, direction, expiry_ms) = match cmd.action()? {
            CommandAction::Stop => (0, self.motors[motor].direction, None),
            CommandAction::Run(token_direction) => {
                let speed = cmd
                    .speed
                    .ok_or_else(|| CommandError::MalformedPayload("missing speed".into()))?;
                let speed = Self::check_speed(speed)?;
                let expiry_ms = Self::check_duration(cmd.duration_ms)?;
                let direction = match cmd.reverse {
                    Some(reverse) => self.physical_direction(motor, reverse),
                    None => token_direction,
                };
                (speed, direction, expiry_ms)
            }
        };

        Ok(self.set_motor(motor, speed, direction, expiry_ms, now))
    }

    /// Write a motor's state and drive it right away
    fn set_motor(
        &mut self,
        motor: usize,
        speed: u8,
        direction: Direction,
        expiry_ms: Option<u32>,
        now: u32,
    ) -> MotorState {
        let state = &mut self.motors[motor];
        if speed == 0 {
            state.stop();
            info!("Motor {} stopped", motor);
        } else {
            state.speed = speed;
            state.direction = direction;
            state.started_at = now;
            state.expiry_ms = expiry_ms;
            match expiry_ms {
                Some(ms) => info!(
                    "Motor {} set to {} speed {} for {}ms",
                    motor,
                    direction.as_str(),
                    speed,
                    ms
                ),
                None => info!(
                    "Motor {} set to {} speed {}",
                    motor,
                    direction.as_str(),
                    speed
                ),
            }
        }

        let state = *state;
        self.driver.drive(motor, state.speed, state.direction);
        self.display_pending = true;
        state
    }

    /// Periodic synchronization: expire timed runs, re-assert every output,
    /// and retire a finished calibration banner.
    pub fn tick(&mut self, now: u32) {
        for (motor, state) in self.motors.iter_mut().enumerate() {
            if state.is_expired(now) {
                let duration = state.expiry_ms.unwrap_or_default();
                state.stop();
                info!("Motor {} stopped after {}ms", motor, duration);
                self.display_pending = true;
            }
            self.driver.drive(motor, state.speed, state.direction);
        }

        if self.session.banner_elapsed(now, self.display_window_ms) {
            self.session = CalibrationSession::Idle;
            self.display_pending = true;
        }
    }

    pub fn stop_all(&mut self) {
        for (motor, state) in self.motors.iter_mut().enumerate() {
            state.stop();
            self.driver.drive(motor, 0, state.direction);
        }
        self.display_pending = true;
        info!("All motors stopped");
    }

    /// Track the command link. Losing it stops every motor and abandons a
    /// calibration in progress without saving a result.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
        if !connected {
            self.stop_all();
            if let Some(motor) = self.session.testing_motor() {
                warn!("Calibration on motor {} aborted, link lost", motor);
                self.session = CalibrationSession::Idle;
            }
        }
        self.display_pending = true;
    }

    /// Drive `motor` forward at `speed`, ignoring stored calibration
    pub fn start_calibration(
        &mut self,
        motor: i64,
        speed: i64,
        now: u32,
    ) -> Result<(usize, u8), CommandError> {
        if let Some(active) = self.session.testing_motor() {
            return Err(CommandError::AlreadyActive { motor: active });
        }
        let motor = self.check_motor(motor)?;
        let speed = Self::check_speed(speed)?;

        self.set_motor(motor, speed, Direction::Forward, None, now);
        self.session = CalibrationSession::Testing { motor };
        info!("Calibration started on motor {} at speed {}", motor, speed);
        Ok((motor, speed))
    }

    /// Stop the motor under test and persist whether it moved the right way
    pub fn stop_calibration(
        &mut self,
        is_direction_correct: bool,
        now: u32,
    ) -> Result<usize, CommandError> {
        let motor = self
            .session
            .testing_motor()
            .ok_or(CommandError::NotActive)?;

        let direction = self.motors[motor].direction;
        self.set_motor(motor, 0, direction, None, now);

        if let Err(e) = self.calibration.set(motor, is_direction_correct) {
            warn!("Failed to persist calibration for motor {}: {}", motor, e);
        }

        self.session = CalibrationSession::JustFinished {
            motor,
            is_direction_correct,
            finished_at: now,
        };
        info!(
            "Calibration finished on motor {}: direction {}",
            motor,
            if is_direction_correct { "correct" } else { "inverted" }
        );
        Ok(motor)
    }

    /// Stored calibration for `motor`, `None` if never calibrated
    pub fn calibration_status(&mut self, motor: i64) -> Result<Option<bool>, CommandError> {
        let motor = self.check_motor(motor)?;
        self.display_pending = true;
        Ok(self.calibration.get(motor))
    }

    /// What the display should show right now
    pub fn display_frame(&self) -> DisplayFrame {
        match self.session {
            CalibrationSession::Testing { motor } => DisplayFrame::Calibrating { motor },
            CalibrationSession::JustFinished {
                motor,
                is_direction_correct,
                ..
            } => DisplayFrame::CalibrationFinished {
                motor,
                is_direction_correct,
            },
            CalibrationSession::Idle => DisplayFrame::Status {
                connected: self.connected,
                motors: self.motors.iter().map(MotorLine::from).collect(),
            },
        }
    }

    /// Frame to render if a refresh was requested since the last call
    pub fn take_display_frame(&mut self) -> Option<DisplayFrame> {
        if !self.display_pending {
            return None;
        }
        self.display_pending = false;
        Some(self.display_frame())
    }

    pub fn motor(&self, motor: usize) -> Option<&MotorState> {
        self.motors.get(motor)
    }

    pub fn motors(&self) -> &[MotorState] {
        &self.motors
    }

    pub fn motor_count(&self) -> usize {
        self.motors.len()
    }

    pub fn session(&self) -> CalibrationSession {
        self.session
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn calibration(&self) -> &CalibrationStore {
        &self.calibration
    }

    pub fn pins(&self) -> &P {
        self.driver.pins()
    }

    #[cfg(test)]
    pub fn pins_mut(&mut self) -> &mut P {
        self.driver.pins_mut()
    }
}
