// Status display
//
// Either the normal status page (link + one line per motor) or a calibration
// banner, never both.

use tracing::info;

use crate::motor::{Direction, MotorState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorLine {
    Stopped,
    Running { speed: u8, direction: Direction },
}

impl From<&MotorState> for MotorLine {
    fn from(state: &MotorState) -> Self {
        if state.is_running() {
            MotorLine::Running {
                speed: state.speed,
                direction: state.direction,
            }
        } else {
            MotorLine::Stopped
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayFrame {
    Status {
        connected: bool,
        motors: Vec<MotorLine>,
    },
    Calibrating {
        motor: usize,
    },
    CalibrationFinished {
        motor: usize,
        is_direction_correct: bool,
    },
}

impl DisplayFrame {
    /// Text lines, top to bottom
    pub fn lines(&self) -> Vec<String> {
        match self {
            DisplayFrame::Status { connected, motors } => {
                let mut lines = Vec::with_capacity(motors.len() + 1);
                lines.push(if *connected {
                    "Link: connected".to_string()
                } else {
                    "Link: waiting".to_string()
                });
                for (i, line) in motors.iter().enumerate() {
                    lines.push(match line {
                        MotorLine::Stopped => format!("M{}: stopped", i + 1),
                        MotorLine::Running { speed, direction } => {
                            format!("M{}: {} {}", i + 1, speed, direction.as_str())
                        }
                    });
                }
                lines
            }
            DisplayFrame::Calibrating { motor } => vec![
                "CALIBRATING".to_string(),
                format!("Motor M{}", motor + 1),
                "Is it moving forward?".to_string(),
            ],
            DisplayFrame::CalibrationFinished {
                motor,
                is_direction_correct,
            } => vec![
                "CALIBRATION SAVED".to_string(),
                format!("Motor M{}", motor + 1),
                if *is_direction_correct {
                    "Direction: normal".to_string()
                } else {
                    "Direction: inverted".to_string()
                },
            ],
        }
    }
}

/// Something that can show a frame
pub trait StatusDisplay {
    fn render(&mut self, frame: &DisplayFrame);
}

/// Renders frames into the log
#[derive(Debug, Default)]
pub struct LogDisplay;

impl StatusDisplay for LogDisplay {
    fn render(&mut self, frame: &DisplayFrame) {
        info!("display: {}", frame.lines().join(" | "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lines() {
        let frame = DisplayFrame::Status {
            connected: true,
            motors: vec![
                MotorLine::Stopped,
                MotorLine::Running {
                    speed: 200,
                    direction: Direction::Reverse,
                },
            ],
        };
        assert_eq!(
            frame.lines(),
            vec!["Link: connected", "M1: stopped", "M2: 200 reverse"]
        );
    }

    #[test]
    fn test_calibration_banner() {
        let frame = DisplayFrame::CalibrationFinished {
            motor: 2,
            is_direction_correct: false,
        };
        let lines = frame.lines();
        assert_eq!(lines[1], "Motor M3");
        assert_eq!(lines[2], "Direction: inverted");
    }
}
