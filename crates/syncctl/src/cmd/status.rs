//! `status` and `shutdown` commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json, post_json};

#[derive(Deserialize)]
struct StatusResponse {
    uptime_secs: u64,
    kinds: Vec<KindSummary>,
}

#[derive(Deserialize)]
struct KindSummary {
    kind: String,
    objects: usize,
}

#[derive(Deserialize)]
struct ShutdownResponse {
    message: String,
}

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  Sync Server Status");
    println!("═══════════════════════════════════════");
    println!("  Uptime  : {}s", resp.uptime_secs);
    println!("  Kinds   : {}", resp.kinds.len());
    for kind in resp.kinds {
        println!("    {:<40} {} objects", kind.kind, kind.objects);
    }
    println!("═══════════════════════════════════════");
    Ok(())
}

pub async fn cmd_shutdown(port: u16) -> Result<()> {
    let resp: ShutdownResponse = post_json(&format!("{}/shutdown", base_url(port))).await?;
    println!("{}", resp.message);
    Ok(())
}
