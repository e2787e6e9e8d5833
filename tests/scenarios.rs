// End-to-end scenarios through the public event API

use roboarm_runtime::calibration::CalibrationStore;
use roboarm_runtime::config::ARM_MOTORS;
use roboarm_runtime::controller::MotorController;
use roboarm_runtime::error::ErrorKind;
use roboarm_runtime::messages::{ReplyDetail, ReplyStatus};
use roboarm_runtime::motor::{Direction, MotorOutputDriver, SimPins};
use roboarm_runtime::runtime::{Event, RequestKind, dispatch};

fn arm() -> MotorController<SimPins> {
    let driver = MotorOutputDriver::new(SimPins::new(), ARM_MOTORS.to_vec()).with_standby_pin(27);
    let mut arm = MotorController::new(driver, CalibrationStore::in_memory());
    arm.init();
    arm
}

fn send(arm: &mut MotorController<SimPins>, kind: RequestKind, json: &str, now: u32) -> ReplyStatus {
    let event = Event::CommandReceived {
        kind,
        payload: json.as_bytes().to_vec(),
    };
    dispatch(arm, event, now).expect("commands always get a reply").status
}

/// Run the 50 ms synchronizer from `from` up to and including `to`
fn run_ticks(arm: &mut MotorController<SimPins>, from: u32, to: u32) {
    let mut now = from;
    while now <= to {
        arm.tick(now);
        now += 50;
    }
}

#[test]
fn timed_run_stops_at_deadline() {
    let mut arm = arm();
    let status = send(
        &mut arm,
        RequestKind::Motor,
        r#"{"motor":1,"command":"on","speed":200,"duration_ms":1000}"#,
        0,
    );
    assert_eq!(status, ReplyStatus::Ok);

    assert_eq!(arm.pins().duty(1), Some(200));
    assert_eq!(arm.pins().level(21), Some(true));
    assert_eq!(arm.pins().level(22), Some(false));

    run_ticks(&mut arm, 50, 950);
    assert_eq!(arm.motor(1).unwrap().speed, 200);

    arm.tick(1000);
    assert_eq!(arm.pins().duty(1), Some(0));
    assert_eq!(arm.pins().level(21), Some(false));
    assert_eq!(arm.pins().level(22), Some(false));
}

#[test]
fn motor_index_past_end_is_rejected() {
    let mut arm = arm();
    let before = arm.motors().to_vec();

    let event = Event::CommandReceived {
        kind: RequestKind::Motor,
        payload: br#"{"motor":5,"speed":100}"#.to_vec(),
    };
    let reply = dispatch(&mut arm, event, 0).unwrap();

    assert_eq!(reply.status, ReplyStatus::Error);
    let ReplyDetail::Error { kind, .. } = reply.detail else {
        panic!("expected an error reply");
    };
    assert_eq!(kind, ErrorKind::OutOfRange);
    assert_eq!(arm.motors(), before.as_slice());
}

#[test]
fn inverted_calibration_flips_reverse_flag() {
    let mut arm = arm();

    send(&mut arm, RequestKind::StartCalibration, r#"{"motor":2,"speed":150}"#, 0);
    assert_eq!(arm.pins().duty(2), Some(150));
    assert_eq!(arm.motor(2).unwrap().direction, Direction::Forward);

    send(
        &mut arm,
        RequestKind::StopCalibration,
        r#"{"is_direction_correct":false}"#,
        2000,
    );
    assert_eq!(arm.calibration().get(2), Some(false));
    assert_eq!(arm.pins().duty(2), Some(0));

    // false XOR false: physical reverse
    send(
        &mut arm,
        RequestKind::Motor,
        r#"{"motor":2,"speed":100,"reverse":false}"#,
        2100,
    );
    assert_eq!(arm.motor(2).unwrap().direction, Direction::Reverse);
    assert_eq!(arm.pins().level(25), Some(false));
    assert_eq!(arm.pins().level(26), Some(true));
}

#[test]
fn new_command_overwrites_running_motor() {
    let mut arm = arm();
    send(
        &mut arm,
        RequestKind::Motor,
        r#"{"motor":0,"command":"forward","speed":100,"duration_ms":300}"#,
        0,
    );
    send(
        &mut arm,
        RequestKind::Motor,
        r#"{"motor":0,"command":"backward","speed":60}"#,
        100,
    );

    // Last write wins, including the dropped deadline
    run_ticks(&mut arm, 150, 1000);
    let state = arm.motor(0).unwrap();
    assert_eq!(state.speed, 60);
    assert_eq!(state.direction, Direction::Reverse);
    assert_eq!(state.expiry_ms, None);
}
