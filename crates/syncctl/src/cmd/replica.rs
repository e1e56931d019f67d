//! `replica list` and `replica get` commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

#[derive(Deserialize)]
struct ReplicaEntry {
    key: String,
    hash: String,
}

#[derive(Deserialize)]
struct ReplicaListResponse {
    entries: Vec<ReplicaEntry>,
}

pub async fn cmd_replica_list(port: u16, group: &str, version: &str, resource: &str) -> Result<()> {
    let url = format!("{}/replica/{}/{}/{}", base_url(port), group, version, resource);
    let resp: ReplicaListResponse = get_json(&url).await?;
    if resp.entries.is_empty() {
        println!("no objects tracked for {group}/{version}/{resource}");
        return Ok(());
    }
    for entry in resp.entries {
        println!("{}  {}", entry.key, entry.hash);
    }
    Ok(())
}

pub async fn cmd_replica_get(port: u16, group: &str, version: &str, resource: &str, namespace: &str, name: &str) -> Result<()> {
    let url = format!("{}/replica/{}/{}/{}/{}/{}", base_url(port), group, version, resource, namespace, name);
    let resp: serde_json::Value = get_json(&url).await?;
    println!("{}", serde_json::to_string_pretty(&resp)?);
    Ok(())
}
