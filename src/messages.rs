// Wire records exchanged with remote clients

use serde::{Deserialize, Serialize};

use crate::error::{CommandError, ErrorKind};
use crate::motor::Direction;

// Motor command from teleop/scripts -> runtime
// Integers are decoded wide so that out-of-range values are reported as such
// instead of as parse failures. A missing command token means "on".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorCommand {
    pub motor: i64,
    #[serde(default, alias = "direction")]
    pub command: Option<String>,
    #[serde(default)]
    pub speed: Option<i64>,
    #[serde(default, alias = "duration")]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub reverse: Option<bool>,
}

/// Decoded meaning of a command token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    Run(Direction),
    Stop,
}

impl MotorCommand {
    pub fn action(&self) -> Result<CommandAction, CommandError> {
        CommandAction::parse(self.command.as_deref().unwrap_or("on"))
    }
}

impl CommandAction {
    pub fn parse(token: &str) -> Result<Self, CommandError> {
        match token {
            "on" | "forward" => Ok(CommandAction::Run(Direction::Forward)),
            "backward" | "reverse" => Ok(CommandAction::Run(Direction::Reverse)),
            "off" | "stop" => Ok(CommandAction::Stop),
            other => Err(CommandError::MalformedPayload(format!(
                "unknown command '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartCalibration {
    pub motor: i64,
    pub speed: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopCalibration {
    pub is_direction_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationStatusQuery {
    pub motor: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Ok,
    Error,
}

/// Fields echoed back after an operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReplyDetail {
    Motor {
        motor: usize,
        speed: u8,
        direction: Direction,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u32>,
    },
    CalibrationStarted {
        motor: usize,
        speed: u8,
    },
    CalibrationStopped {
        motor: usize,
        is_direction_correct: bool,
    },
    // `calibration: null` means never calibrated
    CalibrationStatus {
        motor: usize,
        calibration: Option<bool>,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

// Status reply from runtime -> client
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub status: ReplyStatus,
    #[serde(flatten)]
    pub detail: ReplyDetail,
}

impl Reply {
    pub fn ok(detail: ReplyDetail) -> Self {
        Self {
            status: ReplyStatus::Ok,
            detail,
        }
    }
}

impl From<&CommandError> for Reply {
    fn from(e: &CommandError) -> Self {
        Self {
            status: ReplyStatus::Error,
            detail: ReplyDetail::Error {
                kind: e.kind(),
                message: e.to_string(),
            },
        }
    }
}
