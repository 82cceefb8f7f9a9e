use crate::defaults;
use clap::{Parser, Subcommand};
use std::time::Duration;

/// pmq - create, inspect and exchange messages on POSIX message queues
#[derive(Parser, Debug)]
#[clap(name = "pmq", version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    /// Print results as JSON
    #[clap(long, global = true, default_value_t = false)]
    pub json: bool,

    /// Verbose output
    #[clap(short = 'v', long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Create a queue (or open it if it already exists)
    Create {
        /// Queue name, e.g. /orders
        name: String,

        /// Maximum number of messages held by the queue
        #[clap(long, default_value_t = defaults::MAX_MESSAGES)]
        max_messages: usize,

        /// Maximum size of one message in bytes
        #[clap(long, default_value_t = defaults::MESSAGE_SIZE)]
        message_size: usize,

        /// Permission bits in octal
        #[clap(long, value_parser = parse_mode, default_value = "600")]
        mode: u32,

        /// Fail if the queue already exists
        #[clap(long, default_value_t = false)]
        exclusive: bool,
    },

    /// Send one message
    Send {
        name: String,

        message: String,

        /// Message priority (higher is received first)
        #[clap(short = 'p', long, default_value_t = defaults::PRIORITY)]
        priority: u32,

        /// Give up after this long (e.g. 500ms, 2s)
        #[clap(short = 't', long, value_parser = parse_duration)]
        timeout: Option<Duration>,

        /// Fail immediately if the queue is full
        #[clap(long, default_value_t = false)]
        non_blocking: bool,
    },

    /// Receive one message
    Receive {
        name: String,

        /// Give up after this long (e.g. 500ms, 2s)
        #[clap(short = 't', long, value_parser = parse_duration)]
        timeout: Option<Duration>,

        /// Fail immediately if the queue is empty
        #[clap(long, default_value_t = false)]
        non_blocking: bool,
    },

    /// Show queue attributes
    Info { name: String },

    /// Remove a queue name
    Unlink { name: String },
}

/// Parse duration from string (e.g., "10s", "5m", "1h", "500ms")
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    let (num_str, unit) = if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, "ms")
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, "s")
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, "m")
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, "h")
    } else {
        (s, "s")
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number in duration: {}", num_str))?;
    if !num.is_finite() || num < 0.0 {
        return Err(format!("Duration must be a non-negative number: {}", s));
    }

    let seconds = match unit {
        "ms" => num / 1000.0,
        "s" => num,
        "m" => num * 60.0,
        "h" => num * 3600.0,
        _ => return Err(format!("Invalid duration unit: {}", unit)),
    };

    Duration::try_from_secs_f64(seconds).map_err(|_| format!("Duration out of range: {}", s))
}

/// Parse octal permission bits such as "644" or "0o600"
pub fn parse_mode(s: &str) -> Result<u32, String> {
    let digits = s.trim().trim_start_matches("0o");
    let mode = u32::from_str_radix(digits, 8).map_err(|_| format!("Invalid octal mode: {}", s))?;
    if mode > 0o7777 {
        return Err(format!("Mode out of range: {}", s));
    }
    Ok(mode)
}
