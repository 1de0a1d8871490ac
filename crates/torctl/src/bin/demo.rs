//! Small CLI for exercising a live controller connection by hand.
//!
//! Not part of the library's public contract; `torctl::Controller` never
//! initializes a logger itself, so that remains this binary's job, the way
//! `commands/daemon.rs` / `commands/attach.rs` do it for their own
//! subsystems.

use anyhow::{Context, Result};
use clap::Parser;
use torctl::Controller;

#[derive(Debug, Parser)]
#[command(author, version, about = "Send one command to a Tor control port and print the reply")]
struct Cli {
  /// Control port host.
  #[arg(long, default_value = "127.0.0.1")]
  host: String,

  /// Control port TCP port.
  #[arg(long, default_value_t = 9051)]
  port: u16,

  /// Command to send, e.g. "GETINFO version".
  command: String,
}

fn main() -> Result<()> {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
    .format_timestamp_secs()
    .init();

  let cli = Cli::parse();

  let controller =
    Controller::from_port(&cli.host, cli.port).context("failed to open control connection")?;
  controller.add_status_listener(
    |_controller, event, _timestamp| {
      log::info!("status: {event:?}");
    },
    false,
  );
  controller.connect().context("failed to connect")?;

  let reply = controller.send(&cli.command).context("command failed")?;
  println!("{reply}");

  controller.close().context("failed to close")?;
  Ok(())
}
