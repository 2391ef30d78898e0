//! One-shot command execution.

use cwc_robots::{Family, RobotProtocol};
use tracing::info;

use super::{connect_once, drain_time, open, with_protocol, CommandResult, DeviceOptions, SETTLE};
use cwc_driver::args::parse_params;

/// Connect, queue `command`, wait for it to go out, then clean up
pub async fn run(
    robot: Family,
    command: &str,
    params: &[String],
    options: &DeviceOptions,
) -> CommandResult {
    with_protocol!(robot, protocol => run_with(protocol, command, params, options).await)
}

async fn run_with<P: RobotProtocol>(
    protocol: P,
    command: &str,
    params: &[String],
    options: &DeviceOptions,
) -> CommandResult {
    let params = parse_params(params)?;
    // reject bad commands before touching hardware
    let frames = protocol.family().encode(command, &params)?;

    let conn = open(protocol, options, false).await?;
    if let Err(e) = connect_once(&conn).await {
        conn.clean_up().await;
        return Err(e);
    }
    // let the prepare sequence go out first
    tokio::time::sleep(SETTLE).await;

    info!("Sending {} ({} frame(s))", command, frames.len());
    let result = conn.exec(command, &params);
    if result.is_ok() {
        tokio::time::sleep(drain_time(frames.iter().map(|f| f.delay_after()))).await;
    }
    conn.clean_up().await;
    result?;
    println!("{} {}: done", conn.family(), command);
    Ok(())
}
