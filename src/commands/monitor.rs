//! Live event output.

use std::time::Duration;

use crossterm::style::Stylize;
use cwc_robots::{ConnectionEvent, Family, RobotEvent, RobotProtocol};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use super::{open, with_protocol, CommandResult, DeviceOptions};

pub fn format_event(event: &RobotEvent) -> String {
    match event {
        RobotEvent::SensorValue { port, kind, value } => {
            format!("{:<12} port {:<3} {}", kind.label(), port, value)
        }
        RobotEvent::ChangedDevices(topology) => {
            let ports: Vec<String> = topology
                .iter()
                .map(|(port, device)| format!("{port}:{}", device.kind))
                .collect();
            format!("devices     {}", ports.join(" "))
        }
        RobotEvent::Firmware(version) => format!("firmware    {version}"),
        RobotEvent::Battery(level) => format!("battery     {level}"),
        RobotEvent::Position {
            x,
            y,
            vx,
            vy,
            speed,
        } => format!("position    x={x} y={y} vx={vx} vy={vy} speed={speed}"),
        RobotEvent::Collision {
            x, y, z, speed, ..
        } => format!("collision   x={x} y={y} z={z} speed={speed}"),
        RobotEvent::LineFollower { left, right, .. } => {
            format!("line        left={left} right={right}")
        }
        RobotEvent::LightSensors { light1, light2 } => {
            format!("light       {light1} / {light2}")
        }
        RobotEvent::ButtonPressed(state) => format!("button      {state}"),
        RobotEvent::Rgb { r, g, b } => format!("rgb         #{r:02X}{g:02X}{b:02X}"),
        RobotEvent::Version(raw) => format!("version     {raw:02X?}"),
        RobotEvent::PreSleep => "pre-sleep".to_string(),
    }
}

fn print_connection(event: &ConnectionEvent) {
    match event {
        ConnectionEvent::Step { message, step } => {
            println!("{}", format!("[{step}] {message}").dim());
        }
        ConnectionEvent::StateChanged(state) => {
            println!("{}", format!("state: {state:?}").cyan());
        }
        ConnectionEvent::Error { message, step } => {
            println!("{}", format!("[{step}] {message}").red());
        }
    }
}

/// Keep a robot connected and print everything it reports
pub async fn monitor(
    robot: Family,
    seconds: Option<u64>,
    options: &DeviceOptions,
) -> CommandResult {
    with_protocol!(robot, protocol => monitor_with(protocol, seconds, options).await)
}

async fn monitor_with<P: RobotProtocol>(
    protocol: P,
    seconds: Option<u64>,
    options: &DeviceOptions,
) -> CommandResult {
    let conn = open(protocol, options, true).await?;
    let mut connection = conn.subscribe_connection();
    let mut robot = conn.subscribe_robot();
    conn.init();

    let deadline = async {
        match seconds {
            Some(s) => tokio::time::sleep(Duration::from_secs(s)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    println!("Monitoring {} (Ctrl-C to stop)", conn.family().to_string().bold());
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => break,
            event = connection.recv() => match event {
                Ok(event) => print_connection(&event),
                Err(RecvError::Lagged(n)) => warn!("Dropped {} connection events", n),
                Err(RecvError::Closed) => break,
            },
            event = robot.recv() => match event {
                Ok(event) => println!("{}", format_event(&event)),
                Err(RecvError::Lagged(n)) => warn!("Dropped {} robot events", n),
                Err(RecvError::Closed) => break,
            },
        }
    }

    conn.clean_up().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cwc_robots::SensorKind;

    #[test]
    fn test_format_sensor_value() {
        let line = format_event(&RobotEvent::SensorValue {
            port: 2,
            kind: SensorKind::Ultrasonic,
            value: 12.5,
        });
        assert!(line.contains("port 2"));
        assert!(line.ends_with("12.5"));
    }

    #[test]
    fn test_format_rgb() {
        assert_eq!(
            format_event(&RobotEvent::Rgb { r: 255, g: 0, b: 16 }),
            "rgb         #FF0010"
        );
    }
}
