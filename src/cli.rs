// CLI definitions using clap

use clap::{Parser, Subcommand};
use cwc_robots::Family;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cwc_driver")]
#[command(author, version, about = "Driver for LEGO EV3, Sphero and Makeblock robots")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Serial or RFCOMM device (e.g. /dev/ttyUSB0, /dev/rfcomm0)
    #[arg(long, global = true, value_name = "PATH")]
    pub port: Option<String>,

    /// Scan for Bluetooth LE robots instead of serial ports
    #[arg(long, global = true)]
    pub ble: bool,

    /// Talk to an in-memory robot instead of real hardware
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Print all traffic to and from the robot
    #[arg(long, global = true)]
    pub monitor: bool,

    /// Show raw hex dump of monitored traffic
    #[arg(long, global = true)]
    pub hex: bool,

    /// Traffic direction to print (all, out, in)
    #[arg(long, global = true)]
    pub filter: Option<String>,

    /// Config file (default: ~/.config/cwc-driver/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG wins
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List serial ports and Bluetooth LE robots
    #[command(visible_aliases = ["ls", "l"])]
    List,

    /// Show the commands a robot family understands
    #[command(visible_aliases = ["cmds", "c"])]
    Commands {
        /// Robot family (ev3, sphero, sphero-v1, mbot, mbot-ranger)
        robot: Family,
    },

    /// Print the frames of a command as hex, no robot needed
    #[command(visible_aliases = ["enc", "e"])]
    Encode {
        robot: Family,
        /// Command name (e.g. movePower, setRGB)
        command: String,
        /// Parameters as key=value (e.g. power=50 persistent=true)
        params: Vec<String>,
    },

    /// Connect, run one command and disconnect
    #[command(visible_aliases = ["exec", "r"])]
    Run {
        robot: Family,
        command: String,
        params: Vec<String>,
    },

    /// Connect and print sensor events until interrupted
    #[command(visible_aliases = ["watch", "m"])]
    Monitor {
        /// Robot family; falls back to `default_robot` from the config
        robot: Option<Family>,
        /// Stop after this many seconds
        #[arg(short, long)]
        seconds: Option<u64>,
    },

    /// Show or initialize the config file
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write the current configuration to the config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
