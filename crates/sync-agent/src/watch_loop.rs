//! Glues one [`Watcher`] to one [`Reconciler`]: translates source events
//! into reconciliation, and server pushes back into re-reads of the
//! source. One `WatchLoop` runs per configured Kind.

use std::sync::Arc;
use sync_core::kind::Kind;
use sync_core::message::Message;
use sync_core::reconciler::{Reconciler, SourceEvent};
use sync_core::transport::Transport;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::watcher::{WatchEvent, Watcher};

pub struct WatchLoop<W: Watcher> {
    watcher: Arc<W>,
    reconciler: Reconciler,
    kind: Kind,
    cancel: CancellationToken,
}

impl<W: Watcher + 'static> WatchLoop<W> {
    pub fn new(watcher: Arc<W>, reconciler: Reconciler, kind: Kind, cancel: CancellationToken) -> Self {
        Self { watcher, reconciler, kind, cancel }
    }

    pub async fn run(mut self, transport: Arc<dyn Transport>) {
        let mut push_rx: mpsc::Receiver<Message> = transport.subscribe(self.kind.clone());

        let (version, initial) = match self.watcher.list().await {
            Ok(v) => v,
            Err(err) => {
                tracing::error!(kind = %self.kind, error = %err, "initial list failed, watch loop exiting");
                return;
            }
        };
        tracing::info!(kind = %self.kind, count = initial.len(), "listed initial source objects");
        for (key, bytes) in initial {
            self.reconciler.handle_source_event(SourceEvent::Added(key, bytes)).await;
        }

        let mut events = match self.watcher.watch(version).await {
            Ok(rx) => rx,
            Err(err) => {
                tracing::error!(kind = %self.kind, error = %err, "failed to open watch stream, watch loop exiting");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!(kind = %self.kind, "watch loop cancelled");
                    return;
                }
                maybe_event = events.recv() => {
                    match maybe_event {
                        Some(Ok(WatchEvent::Added(key, bytes))) => {
                            self.reconciler.handle_source_event(SourceEvent::Added(key, bytes)).await;
                        }
                        Some(Ok(WatchEvent::Modified(key, bytes))) => {
                            self.reconciler.handle_source_event(SourceEvent::Modified(key, bytes)).await;
                        }
                        Some(Ok(WatchEvent::Deleted(key))) => {
                            self.reconciler.handle_source_event(SourceEvent::Deleted(key)).await;
                        }
                        Some(Err(err)) => {
                            tracing::error!(kind = %self.kind, error = %err, "watch stream reported an error, watch loop exiting");
                            return;
                        }
                        None => {
                            tracing::info!(kind = %self.kind, "watch stream closed, watch loop exiting");
                            return;
                        }
                    }
                }
                maybe_push = push_rx.recv() => {
                    match maybe_push {
                        Some(msg) => self.handle_push(msg).await,
                        None => {
                            tracing::info!(kind = %self.kind, "push channel closed, watch loop exiting");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn handle_push(&mut self, msg: Message) {
        let Some(retrieve) = self.reconciler.handle_server_event(msg).await else { return };
        match self.watcher.get(&retrieve.key).await {
            Ok(Some(bytes)) => {
                self.reconciler.handle_source_event(SourceEvent::Added(retrieve.key, bytes)).await;
            }
            Ok(None) => {
                self.reconciler.handle_source_event(SourceEvent::Deleted(retrieve.key)).await;
            }
            Err(err) => {
                tracing::warn!(kind = %self.kind, key = %retrieve.key, error = %err, "retrieve re-read failed");
            }
        }
    }
}
