//! syncctl — command-line interface for sync-serverd's admin API.

use anyhow::{Context, Result};

mod cmd;

const DEFAULT_PORT: u16 = 7421;

fn print_usage() {
    println!("Usage: syncctl [--port <port>] <command>");
    println!();
    println!("Daemon");
    println!("  status                                    Uptime and per-Kind object counts");
    println!("  shutdown                                   Gracefully shut down the server");
    println!();
    println!("Replica");
    println!("  replica list <group> <version> <resource>              List tracked keys");
    println!("  replica get <group> <version> <resource> <ns> <name>   Show one object");
    println!();
    println!("Options:\n  --port <port>                             API port (default: {DEFAULT_PORT})");
    println!();
    println!("Examples:");
    println!("  syncctl status");
    println!("  syncctl replica list apps v1 widgets");
    println!("  syncctl replica get apps v1 widgets default my-widget");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<String> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args.get(i).context("--port requires a value")?.parse().context("--port must be a number")?;
        } else {
            remaining.push(args[i].clone());
        }
        i += 1;
    }

    let remaining_refs: Vec<&str> = remaining.iter().map(|s| s.as_str()).collect();

    match remaining_refs.as_slice() {
        ["status"] | [] => cmd::status::cmd_status(port).await,
        ["shutdown"] => cmd::status::cmd_shutdown(port).await,
        ["replica", "list", group, version, resource] => cmd::replica::cmd_replica_list(port, group, version, resource).await,
        ["replica", "get", group, version, resource, ns, name] => {
            cmd::replica::cmd_replica_get(port, group, version, resource, ns, name).await
        }
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
