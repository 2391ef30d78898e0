//! Connection lifecycle over the mock transport, on paused time.

use std::sync::Arc;
use std::time::Duration;

use cwc_robots::ev3::constants::{callback, reply};
use cwc_robots::ev3::Ev3Protocol;
use cwc_robots::makeblock::MBotProtocol;
use cwc_robots::sphero::constants::ble;
use cwc_robots::sphero::SpheroProtocol;
use cwc_robots::{
    ActiveInterval, Connection, ConnectionEvent, ConnectionSettings, ConnectionState, Params,
    RobotEvent, RobotProtocol, SensorKind,
};
use cwc_transport::MockDevice;
use tokio::sync::broadcast::error::RecvError;

fn quiet() -> ConnectionSettings {
    ConnectionSettings {
        monitor: false,
        ..ConnectionSettings::default()
    }
}

fn mbot(device: &Arc<MockDevice>, settings: ConnectionSettings) -> Connection<MBotProtocol> {
    Connection::with_device(MBotProtocol, device.clone(), settings)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

// ── connect ──

#[tokio::test(start_paused = true)]
async fn double_connect_opens_transport_once() {
    let device = Arc::new(MockDevice::new("Makeblock"));
    device.set_connect_delay(Duration::from_millis(200));
    let conn = mbot(&device, quiet());

    let (first, second) = tokio::join!(conn.connect(), conn.connect());
    assert!(first);
    assert!(!second);
    assert_eq!(device.connect_calls(), 1);

    // connecting again once connected is a no-op
    assert!(conn.connect().await);
    assert_eq!(device.connect_calls(), 1);
    conn.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn connect_reports_numbered_steps() {
    let device = Arc::new(MockDevice::new("Makeblock"));
    let conn = mbot(&device, quiet());
    let mut events = conn.subscribe_connection();

    assert!(conn.connect().await);

    let mut steps = Vec::new();
    let mut states = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            ConnectionEvent::Step { step, .. } => steps.push(step),
            ConnectionEvent::StateChanged(state) => states.push(state),
            ConnectionEvent::Error { message, .. } => panic!("unexpected error: {message}"),
        }
    }
    assert_eq!(steps, vec![1, 2, 3, 4]);
    assert_eq!(
        states,
        vec![ConnectionState::Connecting, ConnectionState::Connected]
    );
    conn.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn prepare_frames_are_sent_in_order() {
    let device = Arc::new(MockDevice::new("Makeblock"));
    let conn = mbot(&device, quiet());
    assert!(conn.connect().await);
    settle().await;

    let prepare = MBotProtocol.prepare(&mut ()).unwrap();
    let expected: Vec<Vec<u8>> = prepare.iter().map(|f| f.bytes().to_vec()).collect();
    assert_eq!(device.take_sent(), expected);

    conn.exec("movePower", &Params::new().with("power", 100)).unwrap();
    settle().await;
    assert_eq!(device.take_sent().len(), 2);
    conn.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn sphero_v1_runs_gatt_handshake() {
    let device = Arc::new(MockDevice::new_ble("BB-8 1234"));
    let conn = Connection::with_device(SpheroProtocol::v1(), device.clone(), quiet());
    assert!(conn.connect().await);

    assert_eq!(
        device.characteristic_writes(),
        vec![
            (ble::ANTI_DOS, b"011i3".to_vec()),
            (ble::TX_POWER, vec![0x07]),
            (ble::WAKE, vec![0x01]),
        ]
    );
    assert_eq!(device.listened(), vec![ble::RESPONSE]);
    conn.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn gatt_steps_fail_on_serial_transport() {
    let device = Arc::new(MockDevice::new("BB-8 on a tty"));
    let conn = Connection::with_device(SpheroProtocol::v1(), device.clone(), quiet());
    let mut events = conn.subscribe_connection();

    assert!(!conn.connect().await);
    assert_eq!(conn.state(), ConnectionState::Discovering);
    assert!(!device.has_data_handler());

    let errors: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
        .filter_map(|e| match e {
            ConnectionEvent::Error { step, .. } => Some(step),
            _ => None,
        })
        .collect();
    assert_eq!(errors, vec![3]);
}

// ── telemetry ──

#[tokio::test(start_paused = true)]
async fn inbound_bytes_become_robot_events() {
    let device = Arc::new(MockDevice::new("Makeblock"));
    let conn = mbot(&device, quiet());
    let mut robot = conn.subscribe_robot();
    assert!(conn.connect().await);

    // version reply split across two chunks, footer included
    assert!(device.inject(&[0xFF, 0x55, 0x20, 0x04]));
    assert!(device.inject(b"09.01.016\r\n"));
    settle().await;

    assert_eq!(
        robot.recv().await.unwrap(),
        RobotEvent::Firmware("09.01.016".into())
    );
    conn.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn monitoring_polls_while_connected() {
    let device = Arc::new(MockDevice::new("Makeblock"));
    let conn = mbot(&device, ConnectionSettings::default());
    assert!(conn.connect().await);
    assert!(conn.monitoring().is_started());
    assert_eq!(conn.monitoring().active_intervals().len(), 3);

    settle().await;
    device.take_sent();
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert!(!device.take_sent().is_empty());

    conn.monitor(false);
    assert!(!conn.monitoring().is_started());
    conn.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn ev3_device_name_reply_restarts_monitoring_once() {
    let device = Arc::new(MockDevice::new("EV3"));
    let conn = Connection::with_device(Ev3Protocol, device.clone(), ConnectionSettings::default());
    assert!(conn.connect().await);
    settle().await;
    assert!(conn.monitoring().is_started());
    assert!(conn.monitoring().active_intervals().is_empty());

    // DEVICE_NAME reply for input port 0
    let name = b"TOUCH\0";
    let mut frame = ((name.len() + 3) as u16).to_le_bytes().to_vec();
    frame.extend_from_slice(&[callback::DEVICE_NAME, 0x00, reply::OK]);
    frame.extend_from_slice(name);
    assert!(device.inject(&frame));
    settle().await;

    assert_eq!(conn.monitoring().restart_count(), 1);
    assert_eq!(
        conn.monitoring().active_intervals(),
        vec![ActiveInterval {
            port: 0,
            kind: SensorKind::Touch,
            interval: Duration::from_millis(500),
        }]
    );

    // the same answer again is not a change
    assert!(device.inject(&frame));
    settle().await;
    assert_eq!(conn.monitoring().restart_count(), 1);
    conn.disconnect().await;
}

// ── lost sessions ──

#[tokio::test(start_paused = true)]
async fn dropped_link_reconnects_on_timer() {
    let device = Arc::new(MockDevice::new("Makeblock"));
    let conn = mbot(&device, quiet());
    conn.init();
    settle().await;
    assert!(conn.is_connected());
    assert_eq!(device.connect_calls(), 1);

    device.simulate_drop();
    settle().await;
    assert_eq!(conn.state(), ConnectionState::Reconnecting);

    tokio::time::sleep(Duration::from_millis(5000)).await;
    assert!(conn.is_connected());
    assert_eq!(device.connect_calls(), 2);
    conn.clean_up().await;
}

#[tokio::test(start_paused = true)]
async fn send_failure_ends_session() {
    let device = Arc::new(MockDevice::new("Makeblock"));
    let conn = mbot(&device, quiet());
    assert!(conn.connect().await);
    settle().await;

    device.set_failing_sends(true);
    conn.exec("stop", &Params::new()).unwrap();
    settle().await;
    assert_eq!(conn.state(), ConnectionState::Reconnecting);
    assert!(!device.has_data_handler());
    assert!(conn.exec("stop", &Params::new()).is_err());
}

#[tokio::test(start_paused = true)]
async fn reset_drops_queued_roll_ticks() {
    let device = Arc::new(MockDevice::new("Sphero"));
    let conn = Connection::with_device(SpheroProtocol::classic(), device.clone(), quiet());
    assert!(conn.connect().await);
    settle().await;
    device.take_sent();

    // ten ticks, 500 ms apart
    conn.exec("rollTime", &Params::new().with("time", 5).with("speed", 80))
        .unwrap();
    settle().await;
    assert_eq!(device.take_sent().len(), 1);

    conn.reset().await.unwrap();
    assert_eq!(device.reset_calls(), 1);
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(device.take_sent().is_empty());
    conn.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn reset_keeps_frames_queued_after_it() {
    let device = Arc::new(MockDevice::new("Sphero"));
    let conn = Connection::with_device(SpheroProtocol::classic(), device.clone(), quiet());
    assert!(conn.connect().await);
    settle().await;
    device.take_sent();
    device.set_send_delay(Duration::from_millis(100));

    let red = |value: i64| Params::new().with("red", value);
    conn.exec("setRGB", &red(1)).unwrap();
    conn.exec("setRGB", &red(2)).unwrap();
    // writer is inside the first send
    settle().await;

    conn.reset().await.unwrap();
    conn.exec("setRGB", &red(3)).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let reds: Vec<u8> = device.take_sent().iter().map(|f| f[6]).collect();
    assert_eq!(reds, vec![1, 3]);
    conn.disconnect().await;
}

// ── clean up ──

#[tokio::test(start_paused = true)]
async fn clean_up_is_safe_when_never_connected() {
    let device = Arc::new(MockDevice::new("Makeblock"));
    let conn = mbot(&device, quiet());
    conn.clean_up().await;
    conn.clean_up().await;
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert_eq!(device.disconnect_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn clean_up_halts_and_releases_once() {
    let device = Arc::new(MockDevice::new("Makeblock"));
    let conn = mbot(&device, ConnectionSettings::default());
    conn.init();
    settle().await;
    assert!(conn.is_connected());
    let mut events = conn.subscribe_connection();
    device.take_sent();

    conn.clean_up().await;
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert!(!conn.monitoring().is_started());
    assert!(!device.has_data_handler());
    assert_eq!(device.disconnect_calls(), 1);

    // best-effort stop went out before the link closed
    let sent = device.take_sent();
    assert_eq!(sent.last().unwrap(), &vec![0xFF, 0x55, 0x02, 0x00, 0x04]);

    assert_eq!(
        events.recv().await.unwrap(),
        ConnectionEvent::StateChanged(ConnectionState::Disconnected)
    );
    assert!(matches!(events.recv().await, Err(RecvError::Closed)));

    // the timer is gone: nothing reconnects
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(device.connect_calls(), 1);

    conn.clean_up().await;
    assert_eq!(device.disconnect_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn clean_up_cancels_connect_in_flight() {
    let device = Arc::new(MockDevice::new("Makeblock"));
    device.set_connect_delay(Duration::from_millis(200));
    let conn = mbot(&device, quiet());

    let attempt = tokio::spawn({
        let conn = conn.clone();
        async move { conn.connect().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(conn.state(), ConnectionState::Connecting);

    conn.clean_up().await;
    assert_eq!(conn.state(), ConnectionState::Disconnected);

    assert!(!attempt.await.unwrap());
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert!(!device.has_data_handler());
    assert!(device.sent_frames().is_empty());
    assert!(conn.exec("stop", &Params::new()).is_err());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert_eq!(device.connect_calls(), 1);
}
