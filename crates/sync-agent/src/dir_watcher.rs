//! Reference [`Watcher`]: a directory of `<namespace>__<name>.json` files,
//! polled on an interval. Good enough to drive the integration tests and
//! to demonstrate the trait; a real deployment would tail a CRD informer
//! or a database change feed instead.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sync_core::kind::{make_key, split_key, Key};
use tokio::sync::{mpsc, Mutex};

use crate::watcher::{ResourceVersion, WatchError, WatchEvent, Watcher};

pub struct DirWatcher {
    dir: PathBuf,
    poll_interval: Duration,
    snapshot: Mutex<HashMap<Key, Vec<u8>>>,
}

impl DirWatcher {
    pub fn new(dir: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            dir: dir.into(),
            poll_interval,
            snapshot: Mutex::new(HashMap::new()),
        }
    }

    fn path_for(&self, key: &Key) -> Option<PathBuf> {
        let (namespace, name) = split_key(key)?;
        Some(self.dir.join(format!("{namespace}__{name}.json")))
    }

    async fn scan(dir: &Path) -> Result<HashMap<Key, Vec<u8>>, WatchError> {
        let mut entries = HashMap::new();
        let mut read_dir = match tokio::fs::read_dir(dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            let Some(file_name) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some((namespace, name)) = file_name.split_once("__") else { continue };
            let bytes = tokio::fs::read(&path).await?;
            entries.insert(make_key(namespace, name), bytes);
        }
        Ok(entries)
    }
}

#[async_trait]
impl Watcher for DirWatcher {
    async fn list(&self) -> Result<(ResourceVersion, Vec<(Key, Vec<u8>)>), WatchError> {
        let entries = Self::scan(&self.dir).await?;
        let snapshot_entries: Vec<(Key, Vec<u8>)> = entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        *self.snapshot.lock().await = entries;
        Ok((0, snapshot_entries))
    }

    async fn watch(&self, _from: ResourceVersion) -> Result<mpsc::Receiver<Result<WatchEvent, WatchError>>, WatchError> {
        let (tx, rx) = mpsc::channel(64);
        let dir = self.dir.clone();
        let poll_interval = self.poll_interval;
        let mut previous = self.snapshot.lock().await.clone();

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(poll_interval).await;
                let current = match Self::scan(&dir).await {
                    Ok(current) => current,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                };

                for (key, bytes) in &current {
                    let event = match previous.get(key) {
                        None => Some(WatchEvent::Added(key.clone(), bytes.clone())),
                        Some(prev_bytes) if prev_bytes != bytes => Some(WatchEvent::Modified(key.clone(), bytes.clone())),
                        Some(_) => None,
                    };
                    if let Some(event) = event {
                        if tx.send(Ok(event)).await.is_err() {
                            return;
                        }
                    }
                }
                for key in previous.keys() {
                    if !current.contains_key(key) {
                        if tx.send(Ok(WatchEvent::Deleted(key.clone()))).await.is_err() {
                            return;
                        }
                    }
                }

                previous = current;
            }
        });

        Ok(rx)
    }

    async fn get(&self, key: &Key) -> Result<Option<Vec<u8>>, WatchError> {
        let Some(path) = self.path_for(key) else { return Ok(None) };
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
