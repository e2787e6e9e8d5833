// Event loop: one task owns the controller and serializes every event into it
// (synchronizer ticks, command samples, client presence changes).

use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{debug, info, warn};
use zenoh::sample::SampleKind;

use crate::calibration::CalibrationStore;
use crate::config::{
    Args, STANDBY_PIN, TOPIC_CLIENTS, TOPIC_CMD, TOPIC_CMD_CAL_START, TOPIC_CMD_CAL_STATUS,
    TOPIC_CMD_CAL_STOP, TOPIC_CMD_MOTOR, TOPIC_REPLY,
};
use crate::controller::MotorController;
use crate::display::{LogDisplay, StatusDisplay};
use crate::error::CommandError;
use crate::messages::{
    CalibrationStatusQuery, MotorCommand, Reply, ReplyDetail, StartCalibration, StopCalibration,
};
use crate::motor::{MotorOutputDriver, OutputPins, SerialPins, SimPins};

/// Which operation a command payload is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Motor,
    StartCalibration,
    StopCalibration,
    CalibrationStatus,
}

impl RequestKind {
    /// Map a command key expression to its request kind
    pub fn from_topic(topic: &str) -> Option<Self> {
        match topic {
            TOPIC_CMD_MOTOR => Some(RequestKind::Motor),
            TOPIC_CMD_CAL_START => Some(RequestKind::StartCalibration),
            TOPIC_CMD_CAL_STOP => Some(RequestKind::StopCalibration),
            TOPIC_CMD_CAL_STATUS => Some(RequestKind::CalibrationStatus),
            _ => None,
        }
    }
}

/// Everything the transport can tell the core
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connected,
    Disconnected,
    CommandReceived { kind: RequestKind, payload: Vec<u8> },
}

/// Counts live client tokens and turns the first arrival and the last
/// departure into link events
#[derive(Debug, Default)]
pub struct ClientPresence {
    live: usize,
}

impl ClientPresence {
    pub fn on_token(&mut self, alive: bool) -> Option<Event> {
        if alive {
            self.live += 1;
            (self.live == 1).then_some(Event::Connected)
        } else if self.live > 0 {
            self.live -= 1;
            (self.live == 0).then_some(Event::Disconnected)
        } else {
            None
        }
    }
}

/// Feed one event to the controller. Commands produce a reply; link changes don't.
pub fn dispatch<P: OutputPins>(
    controller: &mut MotorController<P>,
    event: Event,
    now: u32,
) -> Option<Reply> {
    match event {
        Event::Connected => {
            info!("Client connected");
            controller.set_connected(true);
            None
        }
        Event::Disconnected => {
            info!("Client disconnected, stopping all motors");
            controller.set_connected(false);
            None
        }
        Event::CommandReceived { kind, payload } => {
            let reply = match handle_request(controller, kind, &payload, now) {
                Ok(detail) => Reply::ok(detail),
                Err(e) => {
                    warn!("Dropping {:?} request: {}", kind, e);
                    Reply::from(&e)
                }
            };
            Some(reply)
        }
    }
}

fn handle_request<P: OutputPins>(
    controller: &mut MotorController<P>,
    kind: RequestKind,
    payload: &[u8],
    now: u32,
) -> Result<ReplyDetail, CommandError> {
    match kind {
        RequestKind::Motor => {
            let cmd: MotorCommand = serde_json::from_slice(payload)?;
            debug!("Received command: {:?}", &cmd);
            let state = controller.apply_command(&cmd, now)?;
            Ok(ReplyDetail::Motor {
                motor: cmd.motor as usize,
                speed: state.speed,
                direction: state.direction,
                duration_ms: state.expiry_ms,
            })
        }
        RequestKind::StartCalibration => {
            let req: StartCalibration = serde_json::from_slice(payload)?;
            let (motor, speed) = controller.start_calibration(req.motor, req.speed, now)?;
            Ok(ReplyDetail::CalibrationStarted { motor, speed })
        }
        RequestKind::StopCalibration => {
            let req: StopCalibration = serde_json::from_slice(payload)?;
            let motor = controller.stop_calibration(req.is_direction_correct, now)?;
            Ok(ReplyDetail::CalibrationStopped {
                motor,
                is_direction_correct: req.is_direction_correct,
            })
        }
        RequestKind::CalibrationStatus => {
            let req: CalibrationStatusQuery = serde_json::from_slice(payload)?;
            let calibration = controller.calibration_status(req.motor)?;
            Ok(ReplyDetail::CalibrationStatus {
                motor: req.motor as usize,
                calibration,
            })
        }
    }
}

/// Wrapping millisecond tick since `start`
fn millis_since(start: Instant) -> u32 {
    start.elapsed().as_millis() as u32
}

fn render_pending<P: OutputPins>(
    controller: &mut MotorController<P>,
    display: &mut dyn StatusDisplay,
) {
    if let Some(frame) = controller.take_display_frame() {
        display.render(&frame);
    }
}

pub async fn run(args: Args) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let pins: Box<dyn OutputPins + Send> = match &args.port {
        Some(port) => Box::new(SerialPins::open(port, args.baud)?),
        None => {
            warn!("No bridge port given, driving simulated pins");
            Box::new(SimPins::new())
        }
    };

    let driver = MotorOutputDriver::new(pins, args.motor_specs()).with_standby_pin(STANDBY_PIN);
    let calibration = CalibrationStore::open(&args.calibration_file);
    let mut controller = MotorController::new(driver, calibration);
    controller.init();

    let mut display = LogDisplay;

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let commands = session.declare_subscriber(TOPIC_CMD).await?;
    // history: clients that were already up before we started count too
    let clients = session
        .liveliness()
        .declare_subscriber(TOPIC_CLIENTS)
        .history(true)
        .await?;
    let pub_reply = session.declare_publisher(TOPIC_REPLY).await?;

    let start = Instant::now();
    let tick_period = args.tick_period();
    let mut tick = interval(tick_period);
    let mut presence = ClientPresence::default();

    info!(
        "Runtime started: {} motors, {}ms tick",
        controller.motor_count(),
        tick_period.as_millis()
    );
    info!("Subscribed to: {}, {}", TOPIC_CMD, TOPIC_CLIENTS);
    info!("Publishing to: {}", TOPIC_REPLY);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                controller.tick(millis_since(start));
            }
            sample = commands.recv_async() => {
                let sample = sample?;
                let topic = sample.key_expr().as_str();
                let Some(kind) = RequestKind::from_topic(topic) else {
                    warn!("Ignoring command on unknown topic {}", topic);
                    continue;
                };
                let payload = sample.payload().to_bytes().to_vec();
                let event = Event::CommandReceived { kind, payload };
                if let Some(reply) = dispatch(&mut controller, event, millis_since(start)) {
                    let reply_json = serde_json::to_string(&reply)?;
                    pub_reply.put(reply_json).await?;
                }
            }
            token = clients.recv_async() => {
                let token = token?;
                // The link counts as up while any client holds a token
                let alive = matches!(token.kind(), SampleKind::Put);
                if let Some(event) = presence.on_token(alive) {
                    dispatch(&mut controller, event, millis_since(start));
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                dispatch(&mut controller, Event::Disconnected, millis_since(start));
                render_pending(&mut controller, &mut display);
                break;
            }
        }

        render_pending(&mut controller, &mut display);
    }

    // Give the last pin writes a moment to leave the serial buffer
    tokio::time::sleep(Duration::from_millis(20)).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ARM_MOTORS;
    use crate::error::ErrorKind;
    use crate::messages::ReplyStatus;
    use crate::motor::Direction;

    fn controller() -> MotorController<SimPins> {
        let driver = MotorOutputDriver::new(SimPins::new(), ARM_MOTORS.to_vec());
        let mut controller = MotorController::new(driver, CalibrationStore::in_memory());
        controller.init();
        controller
    }

    fn command(kind: RequestKind, json: &str) -> Event {
        Event::CommandReceived {
            kind,
            payload: json.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_topic_routing() {
        assert_eq!(
            RequestKind::from_topic("roboarm/cmd/motor"),
            Some(RequestKind::Motor)
        );
        assert_eq!(
            RequestKind::from_topic("roboarm/cmd/calibration/stop"),
            Some(RequestKind::StopCalibration)
        );
        assert_eq!(RequestKind::from_topic("roboarm/cmd/dance"), None);
    }

    #[test]
    fn test_motor_command_reply() {
        let mut c = controller();
        let reply = dispatch(
            &mut c,
            command(
                RequestKind::Motor,
                r#"{"motor":1,"command":"on","speed":200,"duration_ms":1000}"#,
            ),
            0,
        )
        .unwrap();

        assert_eq!(
            reply,
            Reply::ok(ReplyDetail::Motor {
                motor: 1,
                speed: 200,
                direction: Direction::Forward,
                duration_ms: Some(1000),
            })
        );
        assert_eq!(c.pins().duty(1), Some(200));
    }

    #[test]
    fn test_malformed_payload_reply() {
        let mut c = controller();
        for payload in [r#"{"motor":"one","speed":3}"#, "not json", r#"{"speed":3}"#] {
            let reply = dispatch(&mut c, command(RequestKind::Motor, payload), 0).unwrap();
            assert_eq!(reply.status, ReplyStatus::Error);
            assert!(matches!(
                reply.detail,
                ReplyDetail::Error {
                    kind: ErrorKind::MalformedPayload,
                    ..
                }
            ));
        }
        assert!(c.motors().iter().all(|m| !m.is_running()));
    }

    #[test]
    fn test_calibration_round_trip_over_events() {
        let mut c = controller();
        let started = dispatch(
            &mut c,
            command(RequestKind::StartCalibration, r#"{"motor":2,"speed":150}"#),
            0,
        )
        .unwrap();
        assert_eq!(started.status, ReplyStatus::Ok);

        let again = dispatch(
            &mut c,
            command(RequestKind::StartCalibration, r#"{"motor":0,"speed":150}"#),
            10,
        )
        .unwrap();
        assert!(matches!(
            again.detail,
            ReplyDetail::Error {
                kind: ErrorKind::AlreadyActive,
                ..
            }
        ));

        let stopped = dispatch(
            &mut c,
            command(
                RequestKind::StopCalibration,
                r#"{"is_direction_correct":false}"#,
            ),
            20,
        )
        .unwrap();
        assert_eq!(
            stopped,
            Reply::ok(ReplyDetail::CalibrationStopped {
                motor: 2,
                is_direction_correct: false,
            })
        );

        let status = dispatch(
            &mut c,
            command(RequestKind::CalibrationStatus, r#"{"motor":2}"#),
            30,
        )
        .unwrap();
        assert_eq!(
            status,
            Reply::ok(ReplyDetail::CalibrationStatus {
                motor: 2,
                calibration: Some(false),
            })
        );
    }

    #[test]
    fn test_presence_counts_clients() {
        let mut presence = ClientPresence::default();
        // A client already alive at startup is replayed as a token arrival
        assert_eq!(presence.on_token(true), Some(Event::Connected));
        assert_eq!(presence.on_token(true), None);
        assert_eq!(presence.on_token(false), None);
        assert_eq!(presence.on_token(false), Some(Event::Disconnected));
        assert_eq!(presence.on_token(false), None);
        assert_eq!(presence.on_token(true), Some(Event::Connected));
    }

    #[test]
    fn test_link_events() {
        let mut c = controller();
        assert_eq!(dispatch(&mut c, Event::Connected, 0), None);
        assert!(c.is_connected());

        dispatch(
            &mut c,
            command(RequestKind::Motor, r#"{"motor":0,"command":"forward","speed":90}"#),
            0,
        );
        assert_eq!(dispatch(&mut c, Event::Disconnected, 10), None);
        assert!(!c.is_connected());
        assert_eq!(c.motor(0).unwrap().speed, 0);
    }
}
