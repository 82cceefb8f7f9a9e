//! # pmq - POSIX Message Queue Tool
//!
//! Command-line front end for the `pmq_client` library. Each subcommand opens
//! the named queue, performs one operation and closes it again:
//!
//! - `create`: create a queue with a given capacity and permission bits
//! - `send` / `receive`: move one message, optionally bounded by `--timeout`
//! - `info`: show the queue attributes
//! - `unlink`: remove the queue name
//!
//! ## Error Handling
//!
//! Library failures arrive as typed `QueueError`s and are wrapped with
//! `anyhow` context naming the queue, so the process exits non-zero with
//! a message such as `receive from '/jobs': timed out: ...`.

use anyhow::{Context, Result};
use clap::Parser;
use pmq_client::cli::{Args, Command};
use tracing::info;

#[cfg(target_os = "linux")]
fn main() -> Result<()> {
    let args = Args::parse();
    pmq_client::logging::init(args.verbose);
    info!("pmq {} starting: {:?}", pmq_client::VERSION, args.command);
    run(&args)
}

#[cfg(not(target_os = "linux"))]
fn main() -> Result<()> {
    let args = Args::parse();
    pmq_client::logging::init(args.verbose);
    info!("pmq {}: {:?}", pmq_client::VERSION, args.command);
    anyhow::bail!("POSIX message queues are only supported on Linux")
}

#[cfg(target_os = "linux")]
fn run(args: &Args) -> Result<()> {
    use pmq_client::{CreateMode, Deadline, OpenFlags, QueueAttributes, QueueClient};
    use serde_json::json;
    use tracing::warn;

    let client = QueueClient::native();

    match &args.command {
        Command::Create {
            name,
            max_messages,
            message_size,
            mode,
            exclusive,
        } => {
            let mut flags = OpenFlags::READ_WRITE;
            if *exclusive {
                flags |= OpenFlags::EXCLUSIVE_CREATE;
            }
            let attributes = QueueAttributes::new(*max_messages, *message_size);
            if !client.limits().within_ceilings(&attributes) {
                warn!(
                    "{} messages x {} bytes exceeds the unprivileged limits ({} x {})",
                    max_messages,
                    message_size,
                    client.limits().max_messages_ceiling,
                    client.limits().message_size_ceiling
                );
            }
            let mut queue = client
                .open_or_create(name, flags, CreateMode::new(*mode), Some(attributes))
                .with_context(|| format!("create '{}'", name))?;
            let actual = queue.get_attributes()?;
            queue.close()?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&actual)?);
            } else {
                println!(
                    "{}: {} messages x {} bytes",
                    name, actual.max_messages, actual.message_size
                );
            }
        }
        Command::Send {
            name,
            message,
            priority,
            timeout,
            non_blocking,
        } => {
            let mut flags = OpenFlags::WRITE_ONLY;
            if *non_blocking {
                flags |= OpenFlags::NON_BLOCKING;
            }
            let mut queue = client
                .open(name, flags)
                .with_context(|| format!("open '{}'", name))?;
            let sent = match timeout {
                Some(timeout) => {
                    queue.timed_send(message.as_bytes(), *priority, Deadline::after(*timeout))
                }
                None => queue.send_str(message, *priority),
            };
            sent.with_context(|| format!("send to '{}'", name))?;
            queue.close()?;
            if args.json {
                println!(
                    "{}",
                    json!({ "queue": name, "bytes": message.len(), "priority": priority })
                );
            }
        }
        Command::Receive {
            name,
            timeout,
            non_blocking,
        } => {
            let mut flags = OpenFlags::READ_ONLY;
            if *non_blocking {
                flags |= OpenFlags::NON_BLOCKING;
            }
            let mut queue = client
                .open(name, flags)
                .with_context(|| format!("open '{}'", name))?;
            let message = match timeout {
                Some(timeout) => queue.timed_receive(Deadline::after(*timeout)),
                None => queue.receive(),
            }
            .with_context(|| format!("receive from '{}'", name))?;
            queue.close()?;
            if args.json {
                println!(
                    "{}",
                    json!({
                        "queue": name,
                        "priority": message.priority,
                        "bytes": message.len(),
                        "text": message.text(),
                    })
                );
            } else {
                println!("[{}] {}", message.priority, message.text());
            }
        }
        Command::Info { name } => {
            let mut queue = client
                .open(name, OpenFlags::READ_ONLY | OpenFlags::NON_BLOCKING)
                .with_context(|| format!("open '{}'", name))?;
            let attributes = queue.get_attributes()?;
            queue.close()?;
            let limits = client.limits();
            if args.json {
                let report = json!({ "attributes": attributes, "limits": limits });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("queue:            {}", name);
                println!("max messages:     {}", attributes.max_messages);
                println!("message size:     {}", attributes.message_size);
                println!("current messages: {}", attributes.current_messages);
                println!("priority max:     {}", limits.priority_max);
                println!(
                    "platform default: {} x {} bytes",
                    limits.default_max_messages, limits.default_message_size
                );
                println!(
                    "platform ceiling: {} x {} bytes",
                    limits.max_messages_ceiling, limits.message_size_ceiling
                );
            }
        }
        Command::Unlink { name } => {
            client
                .unlink(name)
                .with_context(|| format!("unlink '{}'", name))?;
            if args.json {
                println!("{}", json!({ "queue": name, "unlinked": true }));
            }
        }
    }

    info!("pmq finished");
    Ok(())
}
