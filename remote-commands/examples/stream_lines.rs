//! Pull output lines from a session as a `Stream`.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example stream_lines -- servers.json web1
//! ```

use std::env;

use futures_util::TryStreamExt;
use remote_commands::{Connector, ServerRegistry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = env::args().skip(1);
    let (Some(config), Some(server)) = (args.next(), args.next()) else {
        eprintln!("usage: stream_lines <servers.json> <server>");
        std::process::exit(1);
    };

    let session = Connector::new(ServerRegistry::from_path(config)?)
        .connect(&server)
        .await?;

    let lines = session.into_lines(["whoami", "cd /tmp", "pwd", "ls -1"]);
    futures_util::pin_mut!(lines);

    while let Some(line) = lines.try_next().await? {
        println!("{:>8} | {}", line.command, line.text);
    }

    println!("Done!");
    Ok(())
}
