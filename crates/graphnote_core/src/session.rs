//! Session orchestration for one signed-in user.
//!
//! # Responsibility
//! - Own the graph model, interaction mode, autosave pipeline and active
//!   workspace for the embedding UI.
//! - Run the effects emitted by the interaction machine against the model
//!   and the sync controller.
//! - Keep the status line the UI shows under the graph.
//!
//! # Invariants
//! - Additive operations reach the model only after the store confirms them.
//! - Deletes are applied to the model first and reconciled by reload on failure.
//! - Pending note content is flushed before the workspace changes.
//! - Every snapshot handed to the view is complete.

use crate::auth::AuthProvider;
use crate::autosave::{AutosavePipeline, ContentSink, SaveState, SaveStatus};
use crate::config::EngineConfig;
use crate::graph::model::{GraphModel, GraphSnapshot, ModelError};
use crate::interaction::{Effect, InteractionMachine, Mode};
use crate::model::node::{Category, Node, NodeDraft, NodeId, ValidationError, Workspace};
use crate::search::index::{SearchIndex, SearchOutcome};
use crate::store::RowStore;
use crate::sync::controller::{CascadeReport, LoadOutcome, SyncController, SyncError};
use crate::view::GraphView;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug)]
pub enum SessionError {
    /// No signed-in user; the login screen should be shown.
    NotAuthenticated,
    /// Operation needs a loaded workspace.
    NoActiveWorkspace,
    /// Operation needs an open editor.
    NotEditing,
    Model(ModelError),
    Sync(SyncError),
}

impl SessionError {
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Model(err) => err.is_validation(),
            Self::Sync(err) => err.is_validation(),
            _ => false,
        }
    }
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAuthenticated => write!(f, "not signed in"),
            Self::NoActiveWorkspace => write!(f, "no workspace loaded"),
            Self::NotEditing => write!(f, "no note is open"),
            Self::Model(err) => write!(f, "{err}"),
            Self::Sync(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Model(err) => Some(err),
            Self::Sync(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ModelError> for SessionError {
    fn from(value: ModelError) -> Self {
        Self::Model(value)
    }
}

impl From<ValidationError> for SessionError {
    fn from(value: ValidationError) -> Self {
        Self::Model(value.into())
    }
}

impl From<SyncError> for SessionError {
    fn from(value: SyncError) -> Self {
        Self::Sync(value)
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Text shown under the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub text: String,
    pub is_error: bool,
}

impl StatusLine {
    fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

pub struct WorkspaceSession<S: RowStore + 'static> {
    config: EngineConfig,
    controller: Arc<SyncController<S>>,
    model: GraphModel,
    machine: InteractionMachine,
    autosave: AutosavePipeline,
    search: SearchIndex,
    workspace: Option<Workspace>,
    status: Option<StatusLine>,
    view: Option<Box<dyn GraphView>>,
}

impl<S: RowStore + 'static> WorkspaceSession<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        let controller = Arc::new(SyncController::new(store));
        let sink: Arc<dyn ContentSink> = controller.clone();
        Self {
            autosave: AutosavePipeline::new(sink, config.autosave_delay),
            search: SearchIndex::new(config.search_limit),
            config,
            controller,
            model: GraphModel::new(),
            machine: InteractionMachine::new(),
            workspace: None,
            status: None,
            view: None,
        }
    }

    /// Attaches a renderer and shows it the current graph.
    pub fn attach_view(&mut self, view: Box<dyn GraphView>) {
        self.view = Some(view);
        self.publish();
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn controller(&self) -> &Arc<SyncController<S>> {
        &self.controller
    }

    pub fn model(&self) -> &GraphModel {
        &self.model
    }

    pub fn snapshot(&self) -> Arc<GraphSnapshot> {
        self.model.snapshot()
    }

    pub fn mode(&self) -> Mode {
        self.machine.mode()
    }

    pub fn workspace(&self) -> Option<&Workspace> {
        self.workspace.as_ref()
    }

    pub fn status(&self) -> Option<&StatusLine> {
        self.status.as_ref()
    }

    pub fn save_state(&self, node: NodeId) -> Option<SaveState> {
        self.autosave.state(node)
    }

    pub fn subscribe_saves(&self) -> watch::Receiver<Option<SaveStatus>> {
        self.autosave.subscribe()
    }

    /// Loads the configured default workspace if a user is signed in.
    pub async fn start(&mut self, auth: &dyn AuthProvider) -> SessionResult<LoadOutcome> {
        let Some(user) = auth.current_session().await else {
            info!("event=session_start module=session status=unauthenticated");
            return Err(SessionError::NotAuthenticated);
        };
        info!(
            "event=session_start module=session status=ok user={}",
            user.user_id
        );
        let name = self.config.default_workspace.clone();
        self.select_workspace(&name).await
    }

    /// Switches to the workspace called `name`.
    ///
    /// Pending edits are flushed and the editor is closed first. If the load
    /// fails, the previous workspace and graph stay in place.
    pub async fn select_workspace(&mut self, name: &str) -> SessionResult<LoadOutcome> {
        let effects = self.machine.reset();
        self.run_effects(effects).await?;
        self.autosave.flush_all().await;
        if self.autosave.has_pending() {
            warn!("event=workspace_switch module=session status=warn pending_saves=true");
        }

        let workspace = match self.controller.resolve_workspace(name).await {
            Ok(workspace) => workspace,
            Err(err) => return Err(self.fail(err)),
        };
        let outcome = match self.controller.load_workspace(&mut self.model, workspace.id).await {
            Ok(outcome) => outcome,
            Err(err) => return Err(self.fail(err)),
        };
        if let LoadOutcome::Applied { nodes, .. } = outcome {
            self.status = Some(StatusLine::info(format!(
                "Workspace {}: {nodes} notes",
                workspace.name
            )));
            self.workspace = Some(workspace);
            self.publish();
        }
        Ok(outcome)
    }

    /// Re-reads the active workspace from the store.
    pub async fn reload(&mut self) -> SessionResult<LoadOutcome> {
        let workspace_id = self.active_workspace()?.id;
        let outcome = match self.controller.load_workspace(&mut self.model, workspace_id).await {
            Ok(outcome) => outcome,
            Err(err) => return Err(self.fail(err)),
        };
        self.publish();
        Ok(outcome)
    }

    /// Creates a node. Blank names are rejected without a remote call.
    pub async fn add_node(&mut self, draft: NodeDraft) -> SessionResult<Node> {
        let workspace_id = self.active_workspace()?.id;
        let draft = match self.model.validate_draft(&draft) {
            Ok(draft) => draft,
            Err(err) => return Err(self.fail(err)),
        };
        let node = match self.controller.persist_new_node(&draft, workspace_id).await {
            Ok(node) => node,
            Err(err) => return Err(self.fail(err)),
        };
        self.model.add_node(node.clone())?;
        self.status = Some(StatusLine::info(format!("Added {}", node.name)));
        self.publish();
        Ok(node)
    }

    pub async fn node_clicked(&mut self, id: NodeId) -> SessionResult<()> {
        let effects = self.machine.node_clicked(id);
        self.run_effects(effects).await
    }

    pub async fn toggle_connect(&mut self) -> SessionResult<()> {
        let effects = self.machine.toggle_connect();
        self.run_effects(effects).await
    }

    pub async fn cancel(&mut self) -> SessionResult<()> {
        let effects = self.machine.cancel();
        self.run_effects(effects).await
    }

    pub async fn close_editor(&mut self) -> SessionResult<()> {
        let effects = self.machine.close_editor();
        self.run_effects(effects).await
    }

    /// Flips markdown preview for the open editor.
    pub fn toggle_preview(&mut self) -> SessionResult<bool> {
        self.machine.toggle_preview().ok_or(SessionError::NotEditing)
    }

    /// Records an edit to the open note and arms its autosave timer.
    pub fn edit_content(&mut self, content: impl Into<String>) -> SessionResult<()> {
        let node = self.machine.editing().ok_or(SessionError::NotEditing)?;
        let workspace_id = self.active_workspace()?.id;
        let content = content.into();
        self.model.update_content(node, content.clone())?;
        self.autosave.edit(workspace_id, node, content);
        Ok(())
    }

    /// Changes the open note's category.
    pub async fn set_category(&mut self, category: Category) -> SessionResult<()> {
        let node = self.machine.editing().ok_or(SessionError::NotEditing)?;
        let workspace_id = self.active_workspace()?.id;
        if let Err(err) = self
            .controller
            .persist_category_update(workspace_id, node, &category)
            .await
        {
            return Err(self.fail(err));
        }
        self.model.set_category(node, category)?;
        self.publish();
        Ok(())
    }

    /// Deletes a node and its links.
    ///
    /// The node disappears from the graph immediately; if the store does not
    /// confirm the whole cascade the workspace is reloaded.
    pub async fn delete_node(&mut self, id: NodeId) -> SessionResult<CascadeReport> {
        let workspace_id = self.active_workspace()?.id;
        if self.model.find_by_id(id).is_none() {
            return Err(ModelError::NodeNotFound(id).into());
        }
        if self.machine.editing() == Some(id) {
            let effects = self.machine.close_editor();
            self.run_effects(effects).await?;
        }

        self.model.remove_node(id);
        self.publish();

        match self.controller.delete_node_cascade(workspace_id, id).await {
            Ok(report) => {
                self.autosave.forget(id);
                self.status = Some(StatusLine::info(format!(
                    "Deleted note and {} links",
                    report.links_removed
                )));
                Ok(report)
            }
            Err(err) => {
                let err = self.fail(err);
                if let Err(reload_err) = self.reload().await {
                    warn!(
                        "event=node_delete module=session status=error node={id} reload_error={reload_err}"
                    );
                }
                Err(err)
            }
        }
    }

    pub fn search(&self, text: &str) -> SearchOutcome {
        self.search.query(&self.model, text)
    }

    /// Recenters the view on `id` and opens its editor.
    pub async fn teleport(&mut self, id: NodeId) -> SessionResult<()> {
        if self.model.find_by_id(id).is_none() {
            return Err(ModelError::NodeNotFound(id).into());
        }
        if let Some(view) = self.view.as_mut() {
            if !view.center_on(id) {
                info!("event=teleport module=session status=unplaced node={id}");
            }
        }
        let effects = self.machine.open(id);
        self.run_effects(effects).await
    }

    /// Flushes pending edits and drops all workspace state. Content that
    /// still fails to save is lost.
    pub async fn sign_out(&mut self) -> usize {
        let effects = self.machine.reset();
        if let Err(err) = self.run_effects(effects).await {
            warn!("event=session_end module=session status=error error={err}");
        }
        let failed = self.flush().await;
        if failed > 0 {
            warn!("event=session_end module=session status=warn unsaved_nodes={failed}");
        }
        self.autosave.clear();
        self.model.clear();
        self.workspace = None;
        self.status = None;
        self.publish();
        info!("event=session_end module=session status=ok");
        failed
    }

    /// Writes every pending edit now. Returns how many nodes still failed.
    pub async fn flush(&mut self) -> usize {
        self.autosave.flush_all().await;
        self.autosave.wait_idle().await;
        self.autosave.retry_failed().await
    }

    /// Retries failed content saves. Returns how many are still failing.
    pub async fn retry_failed_saves(&mut self) -> usize {
        self.autosave.retry_failed().await
    }

    async fn run_effects(&mut self, effects: Vec<Effect>) -> SessionResult<()> {
        for effect in effects {
            match effect {
                Effect::OpenEditor(id) => self.open_editor(id).await,
                Effect::CloseEditor(id) => {
                    if self.autosave.flush(id).await == Some(SaveState::SaveFailed) {
                        self.status = Some(StatusLine::error(format!(
                            "{}: {}",
                            self.node_label(id),
                            SaveState::SaveFailed.label()
                        )));
                    }
                }
                Effect::CreateLink { source, target } => self.create_link(source, target).await?,
                Effect::PromptSource => {
                    self.status = Some(StatusLine::info("Connect: pick a source note"));
                }
                Effect::SourceChosen(id) => {
                    self.status = Some(StatusLine::info(format!(
                        "Connect {} to: pick a target note",
                        self.node_label(id)
                    )));
                }
                Effect::SelfLinkRejected(id) => {
                    return Err(self.fail(ValidationError::SelfLink(id)));
                }
                Effect::ClearStatus => self.status = None,
            }
        }
        Ok(())
    }

    /// Loads the authoritative copy of a node before editing. Unconfirmed
    /// local content wins over the stored copy.
    async fn open_editor(&mut self, id: NodeId) {
        let Some(workspace_id) = self.workspace.as_ref().map(|ws| ws.id) else {
            return;
        };
        match self.controller.fetch_node(workspace_id, id).await {
            Ok(mut fresh) => {
                if let Some(pending) = self.autosave.pending_content(id) {
                    fresh.content = pending;
                }
                if let Err(err) = self.model.refresh_node(fresh) {
                    warn!("event=editor_open module=session status=error node={id} error={err}");
                }
            }
            Err(err) => {
                self.fail(err);
            }
        }
    }

    async fn create_link(&mut self, source: NodeId, target: NodeId) -> SessionResult<()> {
        let workspace_id = self.active_workspace()?.id;
        if let Err(err) = self.model.check_link(source, target) {
            return Err(self.fail(err));
        }
        let link = match self.controller.persist_link(source, target, workspace_id).await {
            Ok(link) => link,
            Err(err) => return Err(self.fail(err)),
        };
        self.model.add_link(link)?;
        self.status = Some(StatusLine::info(format!(
            "Linked {} to {}",
            self.node_label(source),
            self.node_label(target)
        )));
        self.publish();
        Ok(())
    }

    fn active_workspace(&self) -> SessionResult<&Workspace> {
        self.workspace.as_ref().ok_or(SessionError::NoActiveWorkspace)
    }

    fn node_label(&self, id: NodeId) -> String {
        self.model
            .find_by_id(id)
            .map(|node| node.name.clone())
            .unwrap_or_else(|| format!("#{id}"))
    }

    /// Puts `err` on the status line and hands it back.
    fn fail(&mut self, err: impl Into<SessionError>) -> SessionError {
        let err = err.into();
        warn!("event=session_op module=session status=error error={err}");
        self.status = Some(StatusLine::error(err.to_string()));
        err
    }

    fn publish(&mut self) {
        if let Some(view) = self.view.as_mut() {
            view.show(self.model.snapshot());
        }
    }
}
