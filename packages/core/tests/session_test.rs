//! Session Integration Tests
//!
//! Exercises the graph session end to end against the in-memory repository:
//! identity map, lazy population, change tracking and dirty detection.

use anyhow::Result;
use repograph_core::config::RepositoryConfig;
use repograph_core::models::{NodeRef, PropertyValue};
use repograph_core::operations::{BatchBuilder, GraphError, Uploader};
use repograph_core::remote::memory::names;
use repograph_core::remote::InMemoryRepository;
use repograph_core::session::Session;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const CM: &str = "http://www.alfresco.org/model/content/1.0";

fn cm(local: &str) -> String {
    format!("{{{}}}{}", CM, local)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn create_session() -> (Arc<InMemoryRepository>, Session) {
    init_tracing();
    let repository = Arc::new(InMemoryRepository::new());
    let config = RepositoryConfig::default().with_ticket("TICKET_1");
    let session = Session::new(config, repository.clone()).with_transport(repository.clone());
    (repository, session)
}

/// Seed `name` under the root and return its live handle
async fn seeded(
    repository: &InMemoryRepository,
    session: &mut Session,
    name: &str,
) -> Result<NodeRef> {
    let identity = repository
        .seed_child(&repository.root(), names::FOLDER, name)
        .await?;
    Ok(session.get(&identity))
}

/// Number of statements a save of `nodes` would send right now
async fn pending_statements(
    session: &Session,
    repository: &InMemoryRepository,
    nodes: &[NodeRef],
) -> Result<usize> {
    let batch = BatchBuilder::new(
        session.registry(),
        Uploader::new(repository, session.config()),
    )
    .build(nodes)
    .await?;
    Ok(batch.statements().len())
}

// =========================================================================
// Identity Map
// =========================================================================

#[tokio::test]
async fn test_identity_map_returns_same_node() -> Result<()> {
    let (repository, mut session) = create_session();
    let identity = repository
        .seed_child(&repository.root(), names::FOLDER, "shared")
        .await?;

    let first = session.get(&identity);
    let second = session.get(&identity.clone());
    assert_eq!(first, second);

    session.set_property(first, "cm:title", "Shared folder").await?;
    let title = session.get_property(second, "cm:title").await?.cloned();
    assert_eq!(title, Some(PropertyValue::from("Shared folder")));
    assert_eq!(repository.call_count("read_node").await, 1);
    Ok(())
}

#[tokio::test]
async fn test_get_by_id_uses_default_store() -> Result<()> {
    let (repository, mut session) = create_session();
    let identity = repository
        .seed_child(&repository.root(), names::FOLDER, "by-id")
        .await?;

    let by_identity = session.get(&identity);
    let by_id = session.get_by_id(&identity.id);
    assert_eq!(by_identity, by_id);
    Ok(())
}

#[tokio::test]
async fn test_related_nodes_resolve_through_identity_map() -> Result<()> {
    let (repository, mut session) = create_session();
    let folder = seeded(&repository, &mut session, "parent").await?;
    let folder_id = session.identity(folder)?.clone();
    let child_id = repository.seed_child(&folder_id, names::FOLDER, "child").await?;

    let children = session.children(folder).await?;
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].child(), session.get(&child_id));

    let parents = session.parents(children[0].child()).await?;
    assert_eq!(parents.len(), 1);
    assert_eq!(parents[0].parent(), folder);
    assert!(parents[0].is_primary());
    Ok(())
}

// =========================================================================
// Lazy Population
// =========================================================================

#[tokio::test]
async fn test_each_relation_kind_populates_once() -> Result<()> {
    let (repository, mut session) = create_session();
    let node = seeded(&repository, &mut session, "lazy").await?;
    repository.reset_calls().await;

    for _ in 0..3 {
        session.properties(node).await?;
        session.children(node).await?;
        session.parents(node).await?;
        session.associations(node).await?;
        session.aspects(node).await?;
    }

    assert_eq!(repository.call_count("read_node").await, 1);
    assert_eq!(repository.call_count("query_children").await, 1);
    assert_eq!(repository.call_count("query_parents").await, 1);
    assert_eq!(repository.call_count("query_associated").await, 1);
    Ok(())
}

#[tokio::test]
async fn test_relation_kinds_populate_independently() -> Result<()> {
    let (repository, mut session) = create_session();
    let node = seeded(&repository, &mut session, "independent").await?;
    repository.reset_calls().await;

    session.children(node).await?;
    assert_eq!(repository.call_count("query_children").await, 1);
    assert_eq!(repository.call_count("read_node").await, 0);
    assert_eq!(repository.call_count("query_parents").await, 0);
    Ok(())
}

#[tokio::test]
async fn test_failed_read_leaves_node_unpopulated() -> Result<()> {
    let (repository, mut session) = create_session();
    let node = seeded(&repository, &mut session, "flaky").await?;

    repository.fail_reads(true).await;
    let err = session.properties(node).await.unwrap_err();
    assert!(err.is_remote());
    assert!(!session.node(node)?.has_properties());

    repository.fail_reads(false).await;
    let name = session.get_property(node, "cm:name").await?.cloned();
    assert_eq!(name, Some(PropertyValue::from("flaky")));
    assert_eq!(repository.call_count("read_node").await, 2);
    Ok(())
}

#[tokio::test]
async fn test_population_reports_type_path_and_aspects() -> Result<()> {
    let (repository, mut session) = create_session();
    let node = seeded(&repository, &mut session, "described").await?;

    assert_eq!(session.node_type(node).await?.as_deref(), Some(names::FOLDER));
    assert_eq!(session.path(node).await?, Some(format!("/{}", cm("described"))));
    assert!(session.has_aspect(node, "cm:auditable").await?);
    assert!(session.has_aspect(node, names::AUDITABLE).await?);
    Ok(())
}

#[tokio::test]
async fn test_new_nodes_never_fetch() -> Result<()> {
    let (repository, mut session) = create_session();
    let root = session.get(&repository.root());
    let child = session.create_child(root, "cm:folder", "cm:contains", "cm:fresh")?;
    repository.reset_calls().await;

    assert!(session.properties(child).await?.is_empty());
    assert!(session.children(child).await?.is_empty());
    assert!(session.associations(child).await?.is_empty());
    assert_eq!(session.primary_parent(child).await?, Some(root));

    assert_eq!(repository.call_count("read_node").await, 0);
    assert_eq!(repository.call_count("query_children").await, 0);
    assert_eq!(repository.call_count("query_associated").await, 0);
    Ok(())
}

// =========================================================================
// Change Tracking
// =========================================================================

#[tokio::test]
async fn test_untouched_node_contributes_no_statements() -> Result<()> {
    let (repository, mut session) = create_session();
    let node = seeded(&repository, &mut session, "untouched").await?;

    session.properties(node).await?;
    session.children(node).await?;
    session.parents(node).await?;
    session.associations(node).await?;
    assert!(!session.is_dirty(node)?);
    assert_eq!(pending_statements(&session, &repository, &[node]).await?, 0);

    let report = session.save().await?;
    assert_eq!(report.statement_count, 0);
    assert_eq!(repository.call_count("submit_batch").await, 0);
    Ok(())
}

#[tokio::test]
async fn test_modified_properties_delta() -> Result<()> {
    let (repository, mut session) = create_session();
    let node = seeded(&repository, &mut session, "delta").await?;
    let identity = session.identity(node)?.clone();
    repository.seed_property(&identity, &cm("a"), json!(1)).await?;
    repository.seed_property(&identity, &cm("b"), json!(2)).await?;

    session.set_property(node, "cm:a", 1i64).await?;
    session.set_property(node, "cm:b", 3i64).await?;
    session.set_property(node, "cm:c", 4i64).await?;
    session
        .update_content(node, "cm:content", "text/plain", None, Some(b"x".to_vec()))
        .await?;

    let delta = session.modified_properties(node)?;
    let expected: BTreeMap<String, serde_json::Value> =
        [(cm("b"), json!(3)), (cm("c"), json!(4))].into_iter().collect();
    assert_eq!(delta, expected);
    Ok(())
}

#[tokio::test]
async fn test_is_dirty_for_each_kind_of_edit() -> Result<()> {
    let (repository, mut session) = create_session();
    let root = session.get(&repository.root());

    let property = seeded(&repository, &mut session, "property").await?;
    session.set_property(property, "cm:title", "changed").await?;
    assert!(session.is_dirty(property)?);

    let aspect = seeded(&repository, &mut session, "aspect").await?;
    session.add_aspect(aspect, "cm:titled", None).await?;
    assert!(session.is_dirty(aspect)?);

    let removed = seeded(&repository, &mut session, "removed-aspect").await?;
    session.remove_aspect(removed, "cm:auditable").await?;
    assert!(session.is_dirty(removed)?);

    let parent = seeded(&repository, &mut session, "parent").await?;
    let linked = seeded(&repository, &mut session, "linked").await?;
    session.add_child(parent, linked, "cm:contains", "cm:linked").await?;
    assert!(session.is_dirty(parent)?);
    assert!(!session.is_dirty(linked)?);

    let source = seeded(&repository, &mut session, "source").await?;
    session.add_association(source, linked, "cm:references").await?;
    assert!(session.is_dirty(source)?);

    let content = seeded(&repository, &mut session, "content").await?;
    let content_id = session.identity(content)?.clone();
    repository
        .seed_content(&content_id, &cm("content"), b"old", "text/plain", None)
        .await?;
    assert!(!session.is_dirty(content)?);
    session.set_content(content, "cm:content", b"new".to_vec()).await?;
    assert!(session.is_dirty(content)?);

    let created = session.create_child(root, "cm:folder", "cm:contains", "cm:created")?;
    assert!(session.is_dirty(created)?);

    let clean = seeded(&repository, &mut session, "clean").await?;
    session.properties(clean).await?;
    assert!(!session.is_dirty(clean)?);
    Ok(())
}

#[tokio::test]
async fn test_setting_same_value_stays_clean() -> Result<()> {
    let (repository, mut session) = create_session();
    let node = seeded(&repository, &mut session, "same").await?;

    session.set_property(node, "cm:name", "same").await?;
    assert!(!session.is_dirty(node)?);
    Ok(())
}

#[tokio::test]
async fn test_add_then_remove_aspect_restores_node() -> Result<()> {
    let (repository, mut session) = create_session();
    let node = seeded(&repository, &mut session, "aspects").await?;
    let before = session.aspects(node).await?;

    session.add_aspect(node, "cm:titled", None).await?;
    assert!(session.has_aspect(node, "cm:titled").await?);
    session.remove_aspect(node, "cm:titled").await?;

    assert_eq!(session.aspects(node).await?, before);
    assert!(session.node(node)?.added_aspects().is_empty());
    assert!(session.node(node)?.removed_aspects().is_empty());
    assert!(!session.is_dirty(node)?);
    assert_eq!(pending_statements(&session, &repository, &[node]).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_add_aspect_with_properties() -> Result<()> {
    let (repository, mut session) = create_session();
    let node = seeded(&repository, &mut session, "titled").await?;

    let mut properties = BTreeMap::new();
    properties.insert("cm:title".to_string(), PropertyValue::from("A title"));
    session.add_aspect(node, "cm:titled", Some(properties)).await?;
    session.save().await?;

    let identity = session.identity(node)?.clone();
    let stored = repository.stored_record(&identity).await.unwrap();
    assert!(stored.aspects.contains(&cm("titled")));
    assert!(stored
        .properties
        .iter()
        .any(|p| p.name == cm("title") && p.value == json!("A title")));
    assert!(!session.is_dirty(node)?);
    Ok(())
}

#[tokio::test]
async fn test_set_properties_overwrites_per_key() -> Result<()> {
    let (repository, mut session) = create_session();
    let node = seeded(&repository, &mut session, "bulk").await?;

    session
        .set_properties(node, [("cm:title", "T"), ("cm:description", "D")])
        .await?;
    assert_eq!(
        session.get_property(node, "cm:name").await?.cloned(),
        Some(PropertyValue::from("bulk"))
    );
    assert_eq!(
        session.get_property(node, "cm:title").await?.cloned(),
        Some(PropertyValue::from("T"))
    );
    Ok(())
}

#[tokio::test]
async fn test_replace_properties_swaps_whole_map() -> Result<()> {
    let (repository, mut session) = create_session();
    let node = seeded(&repository, &mut session, "replaced").await?;

    session
        .replace_properties(node, [("cm:name", "renamed")])
        .await?;
    assert_eq!(session.properties(node).await?.len(), 1);
    assert_eq!(
        session.modified_properties(node)?,
        [(cm("name"), json!("renamed"))].into_iter().collect()
    );
    Ok(())
}

#[tokio::test]
async fn test_short_and_full_names_are_interchangeable() -> Result<()> {
    let (repository, mut session) = create_session();
    let node = seeded(&repository, &mut session, "names").await?;

    let by_short = session.get_property(node, "cm:name").await?.cloned();
    let by_full = session.get_property(node, names::NAME).await?.cloned();
    assert_eq!(by_short, by_full);
    assert!(by_short.is_some());
    assert!(session.get_property(node, "cm:missing").await?.is_none());
    Ok(())
}

// =========================================================================
// Relations
// =========================================================================

#[tokio::test]
async fn test_remove_pending_child_purges_both_sides() -> Result<()> {
    let (repository, mut session) = create_session();
    let parent = seeded(&repository, &mut session, "parent").await?;
    let child = seeded(&repository, &mut session, "child").await?;

    let edge = session.add_child(parent, child, "cm:contains", "cm:child").await?;
    assert_eq!(session.children(parent).await?.len(), 1);
    assert_eq!(session.node(child)?.added_parents().len(), 1);

    session.remove_child(&edge).await?;
    assert!(session.children(parent).await?.is_empty());
    assert!(session.node(child)?.added_parents().is_empty());
    assert!(!session.is_dirty(parent)?);

    let report = session.save().await?;
    assert_eq!(report.statement_count, 0);
    Ok(())
}

#[tokio::test]
async fn test_created_child_keeps_its_primary_edge() -> Result<()> {
    let (repository, mut session) = create_session();
    let root = session.get(&repository.root());
    session.children(root).await?;
    let child = session.create_child(root, "cm:folder", "cm:contains", "cm:drafts")?;
    let edge = session
        .children(root)
        .await?
        .into_iter()
        .find(|edge| edge.child() == child)
        .unwrap();
    assert!(edge.is_primary());

    let err = session.remove_child(&edge).await.unwrap_err();
    assert!(err.is_precondition());
    assert_eq!(session.primary_parent(child).await?, Some(root));
    assert_eq!(session.children(root).await?.len(), 1);

    // unrelated edits still save, together with the new child
    session.set_property(root, "cm:title", "x").await?;
    let report = session.save().await?;
    assert_eq!(report.reassigned.len(), 1);
    assert!(!session.is_dirty(child)?);
    assert!(!session.is_dirty(root)?);
    Ok(())
}

#[tokio::test]
async fn test_secondary_child_round_trip() -> Result<()> {
    let (repository, mut session) = create_session();
    let parent = seeded(&repository, &mut session, "category").await?;
    let child = seeded(&repository, &mut session, "document").await?;
    session.parents(child).await?;

    session.add_child(parent, child, "cm:contains", "cm:document").await?;
    let report = session.save().await?;
    assert_eq!(report.statement_count, 1);

    let parents = session.parents(child).await?;
    assert_eq!(parents.len(), 2);
    assert!(parents.iter().any(|edge| edge.parent() == parent && !edge.is_primary()));
    assert!(session.node(child)?.added_parents().is_empty());

    // a fresh session sees the edge server-side
    let mut fresh = Session::new(RepositoryConfig::default(), repository.clone());
    let fresh_parent = fresh.get(session.identity(parent)?);
    assert_eq!(fresh.children(fresh_parent).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_remove_persisted_child() -> Result<()> {
    let (repository, mut session) = create_session();
    let parent = seeded(&repository, &mut session, "holder").await?;
    let child = seeded(&repository, &mut session, "held").await?;
    let parent_id = session.identity(parent)?.clone();
    let child_id = session.identity(child)?.clone();
    repository
        .seed_child_edge(&parent_id, &child_id, names::CONTAINS, &cm("held"))
        .await?;

    assert_eq!(session.parents(child).await?.len(), 2);
    let edge = session.children(parent).await?.remove(0);
    session.remove_child(&edge).await?;
    assert!(session.children(parent).await?.is_empty());
    assert!(session.is_dirty(parent)?);

    let report = session.save().await?;
    assert_eq!(report.statement_count, 1);
    assert!(session.children(parent).await?.is_empty());
    assert_eq!(session.parents(child).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_remove_unknown_child_is_not_found() -> Result<()> {
    let (repository, mut session) = create_session();
    let parent = seeded(&repository, &mut session, "empty").await?;
    let stranger = seeded(&repository, &mut session, "stranger").await?;

    let edge = repograph_core::models::ChildAssociation::new(
        parent,
        stranger,
        cm("contains"),
        cm("stranger"),
        false,
    );
    let err = session.remove_child(&edge).await.unwrap_err();
    assert!(matches!(err, GraphError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn test_association_lifecycle() -> Result<()> {
    let (repository, mut session) = create_session();
    let source = seeded(&repository, &mut session, "source").await?;
    let target = seeded(&repository, &mut session, "target").await?;

    let association = session.add_association(source, target, "cm:references").await?;
    session.add_association(source, target, "cm:references").await?;
    assert_eq!(session.associations(source).await?.len(), 1);

    let report = session.save().await?;
    assert_eq!(report.statement_count, 1);
    assert_eq!(session.associations(source).await?.len(), 1);

    // persisted associations cannot be removed
    let err = session.remove_association(&association).await.unwrap_err();
    assert!(matches!(err, GraphError::Unsupported(_)));
    assert!(!session.is_dirty(source)?);

    let mut fresh = Session::new(RepositoryConfig::default(), repository.clone());
    let fresh_source = fresh.get(session.identity(source)?);
    let associations = fresh.associations(fresh_source).await?;
    assert_eq!(associations.len(), 1);
    assert_eq!(associations[0].association_type(), cm("references"));
    Ok(())
}

#[tokio::test]
async fn test_remove_pending_association_purges() -> Result<()> {
    let (repository, mut session) = create_session();
    let source = seeded(&repository, &mut session, "from").await?;
    let target = seeded(&repository, &mut session, "to").await?;

    let association = session.add_association(source, target, "cm:references").await?;
    session.remove_association(&association).await?;
    assert!(session.associations(source).await?.is_empty());
    assert!(!session.is_dirty(source)?);

    let err = session.remove_association(&association).await.unwrap_err();
    assert!(matches!(err, GraphError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn test_unknown_node_ref_is_not_found() -> Result<()> {
    let (repository, mut session) = create_session();
    let mut other = Session::new(RepositoryConfig::default(), repository.clone());
    let foreign_root = other.get(&repository.root());
    let foreign = other.create_child(foreign_root, "cm:folder", "cm:contains", "cm:a")?;

    // the same slots are occupied here too
    let root = session.get(&repository.root());
    let local = session.create_child(root, "cm:folder", "cm:contains", "cm:b")?;
    assert_eq!(local.index(), foreign.index());

    let err = session.properties(foreign).await.unwrap_err();
    assert!(matches!(err, GraphError::NotFound(_)));
    let err = session.set_property(foreign_root, "cm:title", "x").await.unwrap_err();
    assert!(matches!(err, GraphError::NotFound(_)));
    assert!(!session.is_dirty(root)?);
    Ok(())
}
