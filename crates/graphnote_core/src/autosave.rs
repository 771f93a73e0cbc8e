//! Debounced content autosave.
//!
//! # Responsibility
//! - Coalesce bursts of note edits into one write per pause in typing.
//! - Report per-node save status (`Typing` → `Saving` → `Saved`/`SaveFailed`).
//!
//! # Invariants
//! - Each node has at most one armed timer; a new edit cancels the old one.
//! - Each node has at most one write in flight. Content that becomes due
//!   meanwhile is written right after it, so the newest content lands last.
//! - Only the latest content of a node is ever written.
//! - Timers are per node: opening another node never cancels a pending save.
//! - Failed content stays queued until a retry or a newer edit succeeds.

use crate::model::node::{NodeId, WorkspaceId};
use crate::store::RowStore;
use crate::sync::controller::{SyncController, SyncError};
use async_trait::async_trait;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default pause before a pending edit is written.
pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    /// Edit pending, timer armed.
    Typing,
    /// Write in flight.
    Saving,
    Saved,
    /// Write failed; content kept for retry.
    SaveFailed,
}

impl SaveState {
    /// Status-line text for the editor.
    pub fn label(self) -> &'static str {
        match self {
            Self::Typing => "Typing...",
            Self::Saving => "Saving...",
            Self::Saved => "All changes saved",
            Self::SaveFailed => "Save failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveStatus {
    pub node: NodeId,
    pub state: SaveState,
}

/// Destination of autosave writes.
#[async_trait]
pub trait ContentSink: Send + Sync + 'static {
    async fn write_content(
        &self,
        workspace_id: WorkspaceId,
        id: NodeId,
        content: &str,
    ) -> Result<(), SyncError>;
}

#[async_trait]
impl<S: RowStore + 'static> ContentSink for SyncController<S> {
    async fn write_content(
        &self,
        workspace_id: WorkspaceId,
        id: NodeId,
        content: &str,
    ) -> Result<(), SyncError> {
        self.persist_content_update(workspace_id, id, content).await
    }
}

#[derive(Debug)]
struct Slot {
    workspace_id: WorkspaceId,
    content: String,
    generation: u64,
    state: SaveState,
    /// Content newer than the last confirmed write.
    dirty: bool,
    timer: Option<CancellationToken>,
    /// Generation of the write currently in flight.
    writing: Option<u64>,
    /// A newer generation became due while `writing` was set.
    resave: bool,
}

struct Shared {
    slots: Mutex<HashMap<NodeId, Slot>>,
    status: watch::Sender<Option<SaveStatus>>,
}

impl Shared {
    fn slots(&self) -> MutexGuard<'_, HashMap<NodeId, Slot>> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, node: NodeId, state: SaveState) {
        self.status.send_replace(Some(SaveStatus { node, state }));
    }
}

pub struct AutosavePipeline {
    delay: Duration,
    sink: Arc<dyn ContentSink>,
    shared: Arc<Shared>,
    tasks: Vec<JoinHandle<()>>,
}

impl AutosavePipeline {
    pub fn new(sink: Arc<dyn ContentSink>, delay: Duration) -> Self {
        let (status, _) = watch::channel(None);
        Self {
            delay,
            sink,
            shared: Arc::new(Shared {
                slots: Mutex::new(HashMap::new()),
                status,
            }),
            tasks: Vec::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Every status change, latest value first.
    pub fn subscribe(&self) -> watch::Receiver<Option<SaveStatus>> {
        self.shared.status.subscribe()
    }

    pub fn state(&self, node: NodeId) -> Option<SaveState> {
        self.shared.slots().get(&node).map(|slot| slot.state)
    }

    /// Unconfirmed content for `node`, if any.
    pub fn pending_content(&self, node: NodeId) -> Option<String> {
        self.shared
            .slots()
            .get(&node)
            .filter(|slot| slot.dirty)
            .map(|slot| slot.content.clone())
    }

    pub fn has_pending(&self) -> bool {
        self.shared.slots().values().any(|slot| slot.dirty)
    }

    /// Records an edit and (re)arms the node's timer.
    ///
    /// Must be called inside a tokio runtime.
    pub fn edit(&mut self, workspace_id: WorkspaceId, node: NodeId, content: impl Into<String>) {
        let token = CancellationToken::new();
        let generation = {
            let mut slots = self.shared.slots();
            let slot = slots.entry(node).or_insert_with(|| Slot {
                workspace_id,
                content: String::new(),
                generation: 0,
                state: SaveState::Typing,
                dirty: false,
                timer: None,
                writing: None,
                resave: false,
            });
            if let Some(previous) = slot.timer.replace(token.clone()) {
                previous.cancel();
            }
            slot.workspace_id = workspace_id;
            slot.content = content.into();
            slot.generation += 1;
            slot.state = SaveState::Typing;
            slot.dirty = true;
            slot.generation
        };
        self.shared.publish(node, SaveState::Typing);

        self.tasks.retain(|task| !task.is_finished());
        let shared = Arc::clone(&self.shared);
        let sink = Arc::clone(&self.sink);
        let delay = self.delay;
        self.tasks.push(tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            save_generation(&shared, sink.as_ref(), node, generation).await;
        }));
    }

    /// Writes `node` now instead of waiting for its timer.
    pub async fn flush(&mut self, node: NodeId) -> Option<SaveState> {
        let generation = {
            let mut slots = self.shared.slots();
            let slot = slots.get_mut(&node)?;
            if let Some(timer) = slot.timer.take() {
                timer.cancel();
            }
            if !slot.dirty {
                return Some(slot.state);
            }
            if let Some(writing) = slot.writing {
                // The in-flight write picks the latest content up when it lands.
                slot.resave |= writing != slot.generation;
                return Some(slot.state);
            }
            slot.generation
        };
        save_generation(&self.shared, self.sink.as_ref(), node, generation).await;
        self.state(node)
    }

    /// Flushes every node with unconfirmed content.
    pub async fn flush_all(&mut self) {
        let dirty: Vec<NodeId> = self
            .shared
            .slots()
            .iter()
            .filter(|(_, slot)| slot.dirty)
            .map(|(id, _)| *id)
            .collect();
        for node in dirty {
            self.flush(node).await;
        }
    }

    /// Re-writes every node whose last save failed. Returns how many
    /// nodes are still failing afterwards.
    pub async fn retry_failed(&mut self) -> usize {
        let failed: Vec<NodeId> = self
            .shared
            .slots()
            .iter()
            .filter(|(_, slot)| slot.state == SaveState::SaveFailed)
            .map(|(id, _)| *id)
            .collect();
        for node in &failed {
            self.flush(*node).await;
        }
        failed
            .iter()
            .filter(|node| self.state(**node) == Some(SaveState::SaveFailed))
            .count()
    }

    /// Waits for every armed timer and in-flight write to finish.
    pub async fn wait_idle(&mut self) {
        for task in self.tasks.drain(..) {
            if let Err(err) = task.await {
                warn!("event=autosave_task module=autosave status=error error={err}");
            }
        }
    }

    /// Drops the slot of a node that no longer exists. Its timer is
    /// cancelled and an in-flight write is left to finish unrecorded.
    pub fn forget(&mut self, node: NodeId) {
        if let Some(slot) = self.shared.slots().remove(&node) {
            if let Some(timer) = slot.timer {
                timer.cancel();
            }
            debug!("event=autosave_forget module=autosave status=ok node={node} dirty={}", slot.dirty);
        }
    }

    /// Drops all slots. Armed timers are cancelled; unsaved content is lost,
    /// so callers flush first.
    pub fn clear(&mut self) {
        for (_, slot) in self.shared.slots().drain() {
            if let Some(timer) = slot.timer {
                timer.cancel();
            }
        }
    }
}

impl Drop for AutosavePipeline {
    fn drop(&mut self) {
        let pending = self
            .shared
            .slots()
            .values()
            .filter(|slot| slot.dirty)
            .count();
        if pending > 0 {
            warn!("event=autosave_drop module=autosave status=warn pending_nodes={pending}");
        }
    }
}

async fn save_generation(
    shared: &Shared,
    sink: &dyn ContentSink,
    node: NodeId,
    mut generation: u64,
) {
    loop {
        let (workspace_id, content) = {
            let mut slots = shared.slots();
            let Some(slot) = slots.get_mut(&node) else {
                return;
            };
            if slot.generation != generation || !slot.dirty {
                return;
            }
            slot.timer = None;
            if let Some(writing) = slot.writing {
                slot.resave |= writing != generation;
                return;
            }
            slot.writing = Some(generation);
            slot.resave = false;
            slot.state = SaveState::Saving;
            (slot.workspace_id, slot.content.clone())
        };
        shared.publish(node, SaveState::Saving);

        let result = sink.write_content(workspace_id, node, &content).await;
        match &result {
            Ok(()) => debug!("event=autosave module=autosave status=ok node={node} generation={generation}"),
            Err(err) => warn!(
                "event=autosave module=autosave status=error node={node} generation={generation} error={err}"
            ),
        }

        let state = {
            let mut slots = shared.slots();
            let Some(slot) = slots.get_mut(&node) else {
                return;
            };
            slot.writing = None;
            if slot.resave {
                // Newer content came due while this write was in flight.
                generation = slot.generation;
                continue;
            }
            if slot.generation != generation {
                // The newer edit's own timer is still armed.
                return;
            }
            match &result {
                Ok(()) => {
                    slot.dirty = false;
                    slot.state = SaveState::Saved;
                }
                Err(_) => slot.state = SaveState::SaveFailed,
            }
            slot.state
        };
        shared.publish(node, state);
        return;
    }
}
