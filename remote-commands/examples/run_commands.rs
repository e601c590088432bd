//! Run a batch of commands on a named server and print each output line.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example run_commands -- --config servers.json --server web1 "cd /var/log" "ls -1"
//! ```
//!
//! `servers.json` looks like:
//!
//! ```json
//! {
//!   "servers": {
//!     "web1": {
//!       "host": "web1.example.com",
//!       "username": "deploy",
//!       "auth_type": "password",
//!       "password": "secret"
//!     }
//!   }
//! }
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use remote_commands::{Connector, ServerRegistry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let registry = ServerRegistry::from_path(&args.config)?;
    let connector = Connector::new(registry).connect_timeout(Duration::from_secs(args.timeout));

    println!("Connecting to {}...", args.server);
    let session = connector.connect(&args.server).await?;
    println!("Connected!");
    println!("{}", "-".repeat(50));

    let mut count = 0usize;
    session
        .run(&args.commands, |line| {
            count += 1;
            println!("{line}");
        })
        .await?;

    println!("{}", "-".repeat(50));
    println!("{} lines from {} commands", count, args.commands.len());

    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    config: PathBuf,
    server: String,
    timeout: u64,
    commands: Vec<String>,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut config = PathBuf::from("servers.json");
        let mut server = None;
        let mut timeout = 30u64;
        let mut commands = Vec::new();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    i += 1;
                    if i < args.len() {
                        config = PathBuf::from(&args[i]);
                    }
                }
                "--server" | "-s" => {
                    i += 1;
                    if i < args.len() {
                        server = Some(args[i].clone());
                    }
                }
                "--timeout" | "-t" => {
                    i += 1;
                    if i < args.len() {
                        timeout = args[i].parse().unwrap_or(30);
                    }
                }
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                other => commands.push(other.to_string()),
            }
            i += 1;
        }

        let Some(server) = server else {
            eprintln!("Error: --server is required");
            std::process::exit(1);
        };
        if commands.is_empty() {
            commands.push("uname -a".to_string());
        }

        Self {
            config,
            server,
            timeout,
            commands,
        }
    }

    fn print_help() {
        println!(
            r#"remote-commands run_commands example

USAGE:
    cargo run --example run_commands -- [OPTIONS] [COMMAND]...

OPTIONS:
    -c, --config <PATH>      Server registry file [default: servers.json]
    -s, --server <NAME>      Server name in the registry
    -t, --timeout <SECS>     Connection timeout [default: 30]
    --help                   Print this help message

Commands run in order in one shell; `uname -a` runs if none are given.
"#
        );
    }
}
