// Keyboard teleop for the arm:
//   1-4 select motor, W/S run forward/backward, T run forward for 1s, SPACE stop,
//   R/F speed, C start calibration, Y/N finish it, ? calibration status, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use serde_json::json;
use std::time::Duration;
use tracing::info;

use roboarm_runtime::config::{
    TOPIC_CLIENT_PREFIX, TOPIC_CMD_CAL_START, TOPIC_CMD_CAL_STATUS, TOPIC_CMD_CAL_STOP,
    TOPIC_CMD_MOTOR,
};

const SPEEDS: [u8; 3] = [80, 160, 255];
const TIMED_RUN_MS: u64 = 1000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    // Holding the token tells the runtime a client is connected
    let token_key = format!("{}/teleop-{}", TOPIC_CLIENT_PREFIX, std::process::id());
    let _token = session.liveliness().declare_token(token_key).await?;

    info!("Controls: 1-4=motor, W/S=run, T=timed run, SPACE=stop, R/F=speed");
    info!("Calibration: C=start, Y/N=direction correct?, ?=status, Q=quit");

    enable_raw_mode()?;
    let result = run_teleop(&session).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    session: &zenoh::Session,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut motor: u8 = 0;
    let mut speed_idx: usize = 0;

    loop {
        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let Event::Key(KeyEvent { code, kind, .. }) = event::read()? else {
            continue;
        };
        if kind != KeyEventKind::Press {
            continue;
        }

        let speed = SPEEDS[speed_idx];
        let (topic, payload) = match code {
            KeyCode::Char(c @ '1'..='4') => {
                motor = c as u8 - b'1';
                info!("Motor: M{}", motor + 1);
                continue;
            }

            KeyCode::Char('w') => (
                TOPIC_CMD_MOTOR,
                json!({"motor": motor, "command": "forward", "speed": speed}),
            ),
            KeyCode::Char('s') => (
                TOPIC_CMD_MOTOR,
                json!({"motor": motor, "command": "backward", "speed": speed}),
            ),
            KeyCode::Char('t') => (
                TOPIC_CMD_MOTOR,
                json!({"motor": motor, "command": "on", "speed": speed, "duration_ms": TIMED_RUN_MS}),
            ),
            KeyCode::Char(' ') => (TOPIC_CMD_MOTOR, json!({"motor": motor, "command": "off"})),

            // Speed control
            KeyCode::Char('r') => {
                speed_idx = (speed_idx + 1).min(SPEEDS.len() - 1);
                info!("Speed: {}", SPEEDS[speed_idx]);
                continue;
            }
            KeyCode::Char('f') => {
                speed_idx = speed_idx.saturating_sub(1);
                info!("Speed: {}", SPEEDS[speed_idx]);
                continue;
            }

            // Calibration
            KeyCode::Char('c') => (
                TOPIC_CMD_CAL_START,
                json!({"motor": motor, "speed": speed}),
            ),
            KeyCode::Char('y') => (TOPIC_CMD_CAL_STOP, json!({"is_direction_correct": true})),
            KeyCode::Char('n') => (TOPIC_CMD_CAL_STOP, json!({"is_direction_correct": false})),
            KeyCode::Char('?') => (TOPIC_CMD_CAL_STATUS, json!({"motor": motor})),

            KeyCode::Char('q') | KeyCode::Esc => break,

            _ => continue,
        };

        session.put(topic, payload.to_string()).await?;
    }

    // Leave the arm stopped
    for m in 0..4u8 {
        let stop = json!({"motor": m, "command": "off"});
        session.put(TOPIC_CMD_MOTOR, stop.to_string()).await?;
    }

    Ok(())
}
