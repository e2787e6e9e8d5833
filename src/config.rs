// Loop timing, topics, pin map, CLI
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::motor::MotorSpec;

// Synchronizer frequency (50 ms tick)
pub const LOOP_HZ: u64 = 20;

// How long the "calibration finished" banner stays up
pub const CALIBRATION_DISPLAY_WINDOW: Duration = Duration::from_secs(3);

// Zenoh key expressions
pub const TOPIC_CMD: &str = "roboarm/cmd/**"; // all incoming requests
pub const TOPIC_CMD_MOTOR: &str = "roboarm/cmd/motor";
pub const TOPIC_CMD_CAL_START: &str = "roboarm/cmd/calibration/start";
pub const TOPIC_CMD_CAL_STOP: &str = "roboarm/cmd/calibration/stop";
pub const TOPIC_CMD_CAL_STATUS: &str = "roboarm/cmd/calibration/status";
pub const TOPIC_REPLY: &str = "roboarm/state/reply"; // status replies
pub const TOPIC_CLIENTS: &str = "roboarm/client/**"; // liveliness of teleop clients
pub const TOPIC_CLIENT_PREFIX: &str = "roboarm/client";

// PWM setup for the driver IC: 20 kHz, 8-bit duty (0..255)
pub const PWM_FREQ_HZ: u32 = 20_000;
pub const PWM_RESOLUTION_BITS: u8 = 8;

// Driver IC standby pin, held high while running
pub const STANDBY_PIN: u8 = 27;

// Serial bridge defaults
pub const DEFAULT_BAUDRATE: u32 = 115_200;

pub const DEFAULT_CALIBRATION_FILE: &str = "roboarm-calibration.json";

/// Reference wiring. Channel N drives motor N.
pub const ARM_MOTORS: [MotorSpec; 4] = [
    MotorSpec::new(0, 18, 16, 17), // base rotation
    MotorSpec::new(1, 19, 21, 22), // shoulder
    MotorSpec::new(2, 23, 25, 26), // elbow
    MotorSpec::new(3, 13, 32, 33), // gripper
];

/// Command-line options for the runtime binary
#[derive(Debug, Clone, Parser)]
#[command(name = "roboarm-runtime", about = "Motor command runtime for the robot arm")]
pub struct Args {
    /// Serial device of the GPIO/PWM bridge (omit to run against simulated pins)
    #[arg(long)]
    pub port: Option<String>,

    /// Serial baud rate of the bridge
    #[arg(long, default_value_t = DEFAULT_BAUDRATE)]
    pub baud: u32,

    /// Number of motors on the arm
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u8).range(3..=4))]
    pub motors: u8,

    /// Where per-motor direction calibration is persisted
    #[arg(long, default_value = DEFAULT_CALIBRATION_FILE)]
    pub calibration_file: PathBuf,

    /// Synchronizer tick rate
    #[arg(long, default_value_t = LOOP_HZ, value_parser = clap::value_parser!(u64).range(1..=1000))]
    pub loop_hz: u64,
}

impl Args {
    /// Motor specs for the configured motor count
    pub fn motor_specs(&self) -> Vec<MotorSpec> {
        ARM_MOTORS[..self.motors as usize].to_vec()
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(1000 / self.loop_hz)
    }
}
