//! Monitoring scheduler against the EV3 cadence table, on paused time.

use std::sync::Arc;
use std::time::Duration;

use cwc_robots::ev3::Ev3Protocol;
use cwc_robots::monitoring::Planner;
use cwc_robots::{
    frame_queue, Frame, FrameQueue, Monitoring, PortDevice, RobotProtocol, SensorKind, Topology,
};

fn ev3_monitoring() -> Monitoring {
    let planner: Planner = Arc::new(|topology: &Topology| Ev3Protocol.monitor_plan(topology));
    Monitoring::new("ev3", planner)
}

fn touch_and_gyro() -> Topology {
    Topology::from_ports([
        (1, PortDevice::new(SensorKind::Touch, 0)),
        (2, PortDevice::new(SensorKind::GyroAngle, 0)),
    ])
}

fn drain(queue: &mut FrameQueue) -> Vec<Frame> {
    std::iter::from_fn(|| queue.try_recv()).collect()
}

#[tokio::test(start_paused = true)]
async fn touch_and_gyro_get_their_own_cadence() {
    let monitoring = ev3_monitoring();
    let (tx, mut rx) = frame_queue();
    monitoring.start(tx, touch_and_gyro());

    let cadences: Vec<_> = monitoring
        .active_intervals()
        .iter()
        .map(|a| (a.port, a.kind, a.interval.as_millis()))
        .collect();
    assert_eq!(
        cadences,
        vec![(1, SensorKind::Touch, 500), (2, SensorKind::GyroAngle, 150)]
    );

    tokio::time::sleep(Duration::from_millis(1010)).await;

    let plan = Ev3Protocol.monitor_plan(&touch_and_gyro());
    let frames = drain(&mut rx);
    let touch = frames.iter().filter(|f| **f == plan[0].frame).count();
    let gyro = frames.iter().filter(|f| **f == plan[1].frame).count();
    // ticks at 0/500/1000 and every 150 ms up to 900
    assert_eq!(touch, 3);
    assert_eq!(gyro, 7);
}

#[tokio::test(start_paused = true)]
async fn stop_clears_every_interval() {
    let monitoring = ev3_monitoring();
    let (tx, mut rx) = frame_queue();
    monitoring.start(tx, touch_and_gyro());
    assert_eq!(monitoring.active_intervals().len(), 2);

    tokio::time::sleep(Duration::from_millis(10)).await;
    monitoring.stop();
    assert!(monitoring.active_intervals().is_empty());
    assert!(!monitoring.is_started());

    drain(&mut rx);
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn topology_change_restarts_exactly_once() {
    let monitoring = ev3_monitoring();
    let (tx, _rx) = frame_queue();
    let touch_only = Topology::from_ports([(1, PortDevice::new(SensorKind::Touch, 0))]);
    monitoring.start(tx, touch_only.clone());
    assert_eq!(monitoring.active_intervals().len(), 1);

    let grown = touch_only.with_port(2, Some(PortDevice::new(SensorKind::GyroAngle, 0)));
    assert!(monitoring.update_topology(grown.clone()));
    assert_eq!(monitoring.restart_count(), 1);
    assert_eq!(monitoring.active_intervals().len(), 2);

    // same snapshot again is not a change
    assert!(!monitoring.update_topology(grown));
    assert_eq!(monitoring.restart_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn ports_without_cadence_are_not_polled() {
    let monitoring = ev3_monitoring();
    let (tx, _rx) = frame_queue();
    monitoring.start(
        tx,
        Topology::from_ports([
            (1, PortDevice::new(SensorKind::Touch, 0)),
            (5, PortDevice::new(SensorKind::Location, 0)),
        ]),
    );
    assert_eq!(monitoring.active_intervals().len(), 1);
}
