use graphnote_core::{
    Category, GraphModel, Link, ModelError, Node, NodeDraft, NodeId, ValidationError, WorkspaceId,
};

fn node(ws: WorkspaceId, id: i64, name: &str) -> Node {
    Node {
        id: NodeId(id),
        name: name.to_string(),
        content: String::new(),
        category: Category::General,
        workspace_id: ws,
    }
}

fn link(ws: WorkspaceId, source: i64, target: i64) -> Link {
    Link {
        source: NodeId(source),
        target: NodeId(target),
        workspace_id: ws,
    }
}

fn model_with(ws: WorkspaceId, names: &[&str]) -> GraphModel {
    let mut model = GraphModel::new();
    let nodes = names
        .iter()
        .enumerate()
        .map(|(index, name)| node(ws, index as i64 + 1, name))
        .collect();
    model.replace_all(nodes, Vec::new());
    model
}

#[test]
fn remove_node_cascades_to_links() {
    let ws = WorkspaceId::generate();
    let mut model = model_with(ws, &["Algebra", "Geometry", "Topology"]);
    model.add_link(link(ws, 1, 2)).unwrap();
    model.add_link(link(ws, 3, 1)).unwrap();
    model.add_link(link(ws, 2, 3)).unwrap();
    assert_eq!(model.links_of(NodeId(1)).count(), 2);

    let removed = model.remove_node(NodeId(1)).unwrap();

    assert_eq!(removed.node.name, "Algebra");
    assert_eq!(removed.links.len(), 2);
    assert!(model.links().iter().all(|link| !link.touches(NodeId(1))));
    assert_eq!(model.link_count(), 1);
    assert!(model.find_by_id(NodeId(1)).is_none());
}

#[test]
fn remove_missing_node_is_none() {
    let ws = WorkspaceId::generate();
    let mut model = model_with(ws, &["Algebra"]);
    assert!(model.remove_node(NodeId(42)).is_none());
    assert_eq!(model.node_count(), 1);
}

#[test]
fn self_link_is_rejected_without_mutation() {
    let ws = WorkspaceId::generate();
    let mut model = model_with(ws, &["Algebra"]);

    let err = model.add_link(link(ws, 1, 1)).unwrap_err();

    assert!(matches!(
        err,
        ModelError::Validation(ValidationError::SelfLink(NodeId(1)))
    ));
    assert_eq!(model.link_count(), 0);
}

#[test]
fn self_link_on_unknown_node_still_reports_self_link() {
    let model = GraphModel::new();
    let err = model.check_link(NodeId(7), NodeId(7)).unwrap_err();
    assert!(matches!(
        err,
        ModelError::Validation(ValidationError::SelfLink(NodeId(7)))
    ));
}

#[test]
fn duplicate_link_is_rejected_in_both_directions() {
    let ws = WorkspaceId::generate();
    let mut model = model_with(ws, &["Algebra", "Geometry"]);
    model.add_link(link(ws, 1, 2)).unwrap();

    for (source, target) in [(1, 2), (2, 1)] {
        let err = model.add_link(link(ws, source, target)).unwrap_err();
        assert!(matches!(
            err,
            ModelError::Validation(ValidationError::DuplicateLink { .. })
        ));
    }
    assert_eq!(model.link_count(), 1);
}

#[test]
fn link_to_missing_endpoint_is_rejected() {
    let ws = WorkspaceId::generate();
    let mut model = model_with(ws, &["Algebra"]);

    let err = model.add_link(link(ws, 1, 9)).unwrap_err();

    assert!(matches!(
        err,
        ModelError::Validation(ValidationError::InvalidEndpoint(NodeId(9)))
    ));
}

#[test]
fn blank_draft_is_rejected_and_valid_draft_is_trimmed() {
    let model = GraphModel::new();

    let err = model.validate_draft(&NodeDraft::new("   ")).unwrap_err();
    assert!(err.is_validation());

    let draft = model.validate_draft(&NodeDraft::new("  Geometry ")).unwrap();
    assert_eq!(draft.name, "Geometry");
    assert_eq!(draft.category, Some(Category::General));
}

#[test]
fn add_node_rejects_duplicate_id() {
    let ws = WorkspaceId::generate();
    let mut model = model_with(ws, &["Algebra"]);

    let err = model.add_node(node(ws, 1, "Other")).unwrap_err();

    assert!(matches!(err, ModelError::DuplicateNode(NodeId(1))));
    assert_eq!(model.node_count(), 1);
}

#[test]
fn name_filter_is_case_insensitive_and_ordered() {
    let ws = WorkspaceId::generate();
    let model = model_with(ws, &["Algebra", "Geometry", "Algorithms", "LINEAR ALGEBRA"]);

    let names: Vec<&str> = model
        .find_by_name_substring("alg")
        .map(|node| node.name.as_str())
        .collect();

    assert_eq!(names, vec!["Algebra", "Algorithms", "LINEAR ALGEBRA"]);
}

#[test]
fn replace_all_discards_previous_graph() {
    let ws = WorkspaceId::generate();
    let mut model = model_with(ws, &["Algebra", "Geometry"]);
    model.add_link(link(ws, 1, 2)).unwrap();

    let other = WorkspaceId::generate();
    let dropped = model.replace_all(vec![node(other, 10, "Rust")], Vec::new());

    assert_eq!(dropped, 0);
    assert_eq!(model.node_count(), 1);
    assert_eq!(model.link_count(), 0);
    assert_eq!(model.nodes()[0].workspace_id, other);
}

#[test]
fn category_and_content_updates_apply_in_place() {
    let ws = WorkspaceId::generate();
    let mut model = model_with(ws, &["Algebra"]);

    model.set_category(NodeId(1), Category::Math).unwrap();
    model.update_content(NodeId(1), "# Groups").unwrap();

    let stored = model.find_by_id(NodeId(1)).unwrap();
    assert_eq!(stored.category, Category::Math);
    assert_eq!(stored.content, "# Groups");
    assert!(matches!(
        model.update_content(NodeId(5), "x"),
        Err(ModelError::NodeNotFound(NodeId(5)))
    ));
}
