use async_trait::async_trait;
use graphnote_core::store::NodePatch;
use graphnote_core::{
    AuthProvider, Category, EngineConfig, GraphSnapshot, GraphView, LocalAuth, MemoryRowStore,
    Mode, Node, NodeDraft, NodeId, RowStore, SaveState, SessionError, StoreOp, SyncError,
    UserSession, Workspace, WorkspaceSession,
};
use std::sync::{Arc, Mutex};

struct SignedOut;

#[async_trait]
impl AuthProvider for SignedOut {
    async fn current_session(&self) -> Option<UserSession> {
        None
    }
}

#[derive(Default)]
struct Recorded {
    shown: Vec<usize>,
    centered: Vec<NodeId>,
}

struct RecordingView(Arc<Mutex<Recorded>>);

impl GraphView for RecordingView {
    fn show(&mut self, snapshot: Arc<GraphSnapshot>) {
        self.0.lock().unwrap().shown.push(snapshot.nodes.len());
    }

    fn center_on(&mut self, id: NodeId) -> bool {
        self.0.lock().unwrap().centered.push(id);
        true
    }
}

struct Fixture {
    store: Arc<MemoryRowStore>,
    workspace: Workspace,
    algebra: Node,
    session: WorkspaceSession<MemoryRowStore>,
}

async fn personal_session() -> Fixture {
    let store = Arc::new(MemoryRowStore::new());
    let workspace = store.create_workspace("Personal").await;
    let algebra = store.seed_node(workspace.id, "Algebra", "").await;
    let mut session = WorkspaceSession::new(Arc::clone(&store), EngineConfig::default());
    session.start(&LocalAuth::new("tester")).await.unwrap();
    Fixture {
        store,
        workspace,
        algebra,
        session,
    }
}

fn names(session: &WorkspaceSession<MemoryRowStore>) -> Vec<String> {
    session
        .model()
        .nodes()
        .iter()
        .map(|node| node.name.clone())
        .collect()
}

#[tokio::test]
async fn start_requires_a_signed_in_user() {
    let store = Arc::new(MemoryRowStore::new());
    store.create_workspace("Personal").await;
    let mut session = WorkspaceSession::new(store, EngineConfig::default());

    let err = session.start(&SignedOut).await.unwrap_err();

    assert!(matches!(err, SessionError::NotAuthenticated));
    assert!(session.workspace().is_none());
    assert!(session.snapshot().is_empty());
}

#[tokio::test]
async fn add_link_and_remove_scenario() {
    let Fixture {
        store,
        algebra,
        mut session,
        ..
    } = personal_session().await;
    assert_eq!(session.workspace().unwrap().name, "Personal");
    assert_eq!(names(&session), vec!["Algebra"]);

    let geometry = session.add_node(NodeDraft::new("Geometry")).await.unwrap();
    assert_eq!(geometry.id, NodeId(2));

    session.toggle_connect().await.unwrap();
    session.node_clicked(algebra.id).await.unwrap();
    assert!(session.status().unwrap().text.contains("Algebra"));
    session.node_clicked(geometry.id).await.unwrap();
    assert_eq!(session.mode(), Mode::Browsing);
    assert_eq!(session.model().link_count(), 1);

    let report = session.delete_node(algebra.id).await.unwrap();

    assert_eq!(report.links_removed, 1);
    assert_eq!(names(&session), vec!["Geometry"]);
    assert_eq!(session.model().link_count(), 0);
    assert!(store.stored_links().await.is_empty());
    assert!(store.stored_node(algebra.id).await.is_none());
}

#[tokio::test]
async fn self_link_keeps_source_pending() {
    let Fixture {
        algebra,
        mut session,
        ..
    } = personal_session().await;
    let geometry = session.add_node(NodeDraft::new("Geometry")).await.unwrap();

    session.toggle_connect().await.unwrap();
    session.node_clicked(algebra.id).await.unwrap();
    let err = session.node_clicked(algebra.id).await.unwrap_err();

    assert!(err.is_validation());
    assert!(session.status().unwrap().is_error);
    assert_eq!(
        session.mode(),
        Mode::Connecting {
            source: Some(algebra.id)
        }
    );
    assert_eq!(session.model().link_count(), 0);

    session.node_clicked(geometry.id).await.unwrap();
    assert_eq!(session.model().link_count(), 1);
}

#[tokio::test]
async fn reversed_duplicate_link_is_rejected_locally() {
    let Fixture {
        store,
        algebra,
        mut session,
        ..
    } = personal_session().await;
    let geometry = session.add_node(NodeDraft::new("Geometry")).await.unwrap();
    session.toggle_connect().await.unwrap();
    session.node_clicked(algebra.id).await.unwrap();
    session.node_clicked(geometry.id).await.unwrap();

    session.toggle_connect().await.unwrap();
    session.node_clicked(geometry.id).await.unwrap();
    let err = session.node_clicked(algebra.id).await.unwrap_err();

    assert!(err.is_validation());
    assert_eq!(session.mode(), Mode::Browsing);
    assert_eq!(session.model().link_count(), 1);
    assert_eq!(store.stored_links().await.len(), 1);
}

#[tokio::test]
async fn link_to_unknown_target_returns_to_browsing() {
    let Fixture {
        store,
        algebra,
        mut session,
        ..
    } = personal_session().await;

    session.toggle_connect().await.unwrap();
    session.node_clicked(algebra.id).await.unwrap();
    let err = session.node_clicked(NodeId(99)).await.unwrap_err();

    assert!(err.is_validation());
    assert!(session.status().unwrap().is_error);
    assert_eq!(session.mode(), Mode::Browsing);
    assert_eq!(session.model().link_count(), 0);
    assert!(store.stored_links().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn connect_while_editing_closes_and_saves_editor() {
    let Fixture {
        store,
        algebra,
        mut session,
        ..
    } = personal_session().await;

    session.node_clicked(algebra.id).await.unwrap();
    session.edit_content("half a thought").unwrap();
    session.toggle_connect().await.unwrap();

    assert_eq!(session.mode(), Mode::Connecting { source: None });
    assert_eq!(
        store.stored_node(algebra.id).await.unwrap().content,
        "half a thought"
    );
    assert_eq!(session.save_state(algebra.id), Some(SaveState::Saved));
    assert_eq!(
        session.status().unwrap().text,
        "Connect: pick a source note"
    );
}

#[tokio::test]
async fn blank_node_name_is_rejected_without_store_call() {
    let Fixture {
        store,
        mut session,
        ..
    } = personal_session().await;

    let err = session.add_node(NodeDraft::new("   ")).await.unwrap_err();

    assert!(err.is_validation());
    assert!(session.status().unwrap().is_error);
    assert!(store.stored_node(NodeId(2)).await.is_none());
    assert_eq!(session.model().node_count(), 1);
}

#[tokio::test]
async fn failed_insert_is_not_applied() {
    let Fixture {
        store,
        mut session,
        ..
    } = personal_session().await;
    store.fail_on(StoreOp::InsertNode).await;

    let err = session.add_node(NodeDraft::new("Geometry")).await.unwrap_err();

    assert!(matches!(err, SessionError::Sync(SyncError::Store { .. })));
    assert_eq!(names(&session), vec!["Algebra"]);
}

#[tokio::test]
async fn opening_editor_refetches_content() {
    let Fixture {
        store,
        workspace,
        algebra,
        mut session,
    } = personal_session().await;
    store
        .update_node(workspace.id, algebra.id, NodePatch::content("edited elsewhere"))
        .await
        .unwrap();

    session.node_clicked(algebra.id).await.unwrap();

    assert_eq!(
        session.mode(),
        Mode::Editing {
            node: algebra.id,
            preview: false
        }
    );
    let node = session.model().find_by_id(algebra.id).unwrap();
    assert_eq!(node.content, "edited elsewhere");
}

#[tokio::test(start_paused = true)]
async fn switching_editor_flushes_pending_edit() {
    let Fixture {
        store,
        algebra,
        mut session,
        ..
    } = personal_session().await;
    let geometry = session.add_node(NodeDraft::new("Geometry")).await.unwrap();

    session.node_clicked(algebra.id).await.unwrap();
    session.edit_content("# Groups").unwrap();
    session.node_clicked(geometry.id).await.unwrap();

    assert_eq!(
        store.stored_node(algebra.id).await.unwrap().content,
        "# Groups"
    );
    assert_eq!(session.save_state(algebra.id), Some(SaveState::Saved));
    assert_eq!(
        session.mode(),
        Mode::Editing {
            node: geometry.id,
            preview: false
        }
    );
}

#[tokio::test(start_paused = true)]
async fn failed_save_never_rolls_back_local_content() {
    let Fixture {
        store,
        algebra,
        mut session,
        ..
    } = personal_session().await;
    store.fail_on(StoreOp::UpdateNode).await;

    session.node_clicked(algebra.id).await.unwrap();
    session.edit_content("unsaved lemma").unwrap();
    session.close_editor().await.unwrap();

    assert_eq!(session.save_state(algebra.id), Some(SaveState::SaveFailed));
    assert!(session.status().unwrap().is_error);
    assert_eq!(
        session.model().find_by_id(algebra.id).unwrap().content,
        "unsaved lemma"
    );

    store.clear_failure(StoreOp::UpdateNode).await;
    assert_eq!(session.retry_failed_saves().await, 0);
    assert_eq!(
        store.stored_node(algebra.id).await.unwrap().content,
        "unsaved lemma"
    );
}

#[tokio::test(start_paused = true)]
async fn reopening_before_save_keeps_local_edit() {
    let Fixture {
        store,
        algebra,
        mut session,
        ..
    } = personal_session().await;
    store.fail_on(StoreOp::UpdateNode).await;

    session.node_clicked(algebra.id).await.unwrap();
    session.edit_content("still local").unwrap();
    session.close_editor().await.unwrap();
    session.node_clicked(algebra.id).await.unwrap();

    assert_eq!(
        session.model().find_by_id(algebra.id).unwrap().content,
        "still local"
    );
}

#[tokio::test(start_paused = true)]
async fn deleted_node_leaves_no_failed_save_behind() {
    let Fixture {
        store,
        algebra,
        mut session,
        ..
    } = personal_session().await;
    store.fail_on(StoreOp::UpdateNode).await;
    session.node_clicked(algebra.id).await.unwrap();
    session.edit_content("doomed draft").unwrap();
    session.close_editor().await.unwrap();
    assert_eq!(session.save_state(algebra.id), Some(SaveState::SaveFailed));
    store.clear_failure(StoreOp::UpdateNode).await;

    session.delete_node(algebra.id).await.unwrap();

    assert_eq!(session.flush().await, 0);
    assert_eq!(session.retry_failed_saves().await, 0);
    assert_eq!(session.save_state(algebra.id), None);
    assert_eq!(session.sign_out().await, 0);
}

#[tokio::test]
async fn partial_cascade_failure_reloads_workspace() {
    let Fixture {
        store,
        algebra,
        mut session,
        ..
    } = personal_session().await;
    let geometry = session.add_node(NodeDraft::new("Geometry")).await.unwrap();
    session.toggle_connect().await.unwrap();
    session.node_clicked(algebra.id).await.unwrap();
    session.node_clicked(geometry.id).await.unwrap();
    store.fail_on(StoreOp::DeleteNode).await;

    let err = session.delete_node(algebra.id).await.unwrap_err();

    assert!(matches!(
        err,
        SessionError::Sync(SyncError::PartialCascadeFailure { .. })
    ));
    // Reload shows what the store really holds: node kept, link gone.
    assert_eq!(names(&session), vec!["Algebra", "Geometry"]);
    assert_eq!(session.model().link_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn workspace_switch_flushes_and_replaces_graph() {
    let Fixture {
        store,
        algebra,
        mut session,
        ..
    } = personal_session().await;
    let work = store.create_workspace("Work").await;
    store.seed_node(work.id, "Roadmap", "").await;

    session.node_clicked(algebra.id).await.unwrap();
    session.edit_content("pending proof").unwrap();
    session.select_workspace("Work").await.unwrap();

    assert_eq!(
        store.stored_node(algebra.id).await.unwrap().content,
        "pending proof"
    );
    assert_eq!(session.workspace().unwrap().name, "Work");
    assert_eq!(session.mode(), Mode::Browsing);
    assert_eq!(names(&session), vec!["Roadmap"]);
}

#[tokio::test]
async fn failed_workspace_load_keeps_previous_graph() {
    let Fixture {
        store,
        mut session,
        ..
    } = personal_session().await;
    let work = store.create_workspace("Work").await;
    store.seed_node(work.id, "Roadmap", "").await;
    store.fail_on(StoreOp::SelectNodes).await;

    let err = session.select_workspace("Work").await.unwrap_err();

    assert!(matches!(err, SessionError::Sync(_)));
    assert_eq!(session.workspace().unwrap().name, "Personal");
    assert_eq!(names(&session), vec!["Algebra"]);
    assert!(session.status().unwrap().is_error);
}

#[tokio::test]
async fn search_then_teleport_opens_the_hit() {
    let Fixture {
        algebra,
        mut session,
        ..
    } = personal_session().await;
    session.add_node(NodeDraft::new("Geometry")).await.unwrap();
    session.add_node(NodeDraft::new("Algorithms")).await.unwrap();
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    session.attach_view(Box::new(RecordingView(Arc::clone(&recorded))));

    let outcome = session.search("alg");
    let hit_names: Vec<&str> = outcome.hits().iter().map(|hit| hit.name.as_str()).collect();
    assert_eq!(hit_names, vec!["Algebra", "Algorithms"]);
    assert!(session.search("  ").is_hidden());

    session.toggle_connect().await.unwrap();
    session.teleport(algebra.id).await.unwrap();

    assert_eq!(recorded.lock().unwrap().centered, vec![algebra.id]);
    assert_eq!(recorded.lock().unwrap().shown, vec![3]);
    assert_eq!(
        session.mode(),
        Mode::Editing {
            node: algebra.id,
            preview: false
        }
    );
}

#[tokio::test]
async fn preview_toggle_requires_open_editor() {
    let Fixture {
        algebra,
        mut session,
        ..
    } = personal_session().await;

    assert!(matches!(
        session.toggle_preview(),
        Err(SessionError::NotEditing)
    ));

    session.node_clicked(algebra.id).await.unwrap();
    assert!(session.toggle_preview().unwrap());
    assert!(!session.toggle_preview().unwrap());
}

#[tokio::test]
async fn category_change_is_persisted() {
    let Fixture {
        store,
        algebra,
        mut session,
        ..
    } = personal_session().await;

    session.node_clicked(algebra.id).await.unwrap();
    session.set_category(Category::Math).await.unwrap();

    assert_eq!(
        session.model().find_by_id(algebra.id).unwrap().category,
        Category::Math
    );
    assert_eq!(
        store.stored_node(algebra.id).await.unwrap().category,
        Category::Math
    );
}

#[tokio::test(start_paused = true)]
async fn sign_out_saves_and_clears_state() {
    let Fixture {
        store,
        algebra,
        mut session,
        ..
    } = personal_session().await;
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    session.attach_view(Box::new(RecordingView(Arc::clone(&recorded))));

    session.node_clicked(algebra.id).await.unwrap();
    session.edit_content("last words").unwrap();
    assert_eq!(session.sign_out().await, 0);

    assert_eq!(
        store.stored_node(algebra.id).await.unwrap().content,
        "last words"
    );
    assert!(session.workspace().is_none());
    assert!(session.snapshot().is_empty());
    assert_eq!(session.mode(), Mode::Browsing);
    assert_eq!(recorded.lock().unwrap().shown, vec![1, 0]);
}
