//! Performance benchmarks for repograph core operations
//!
//! Run with: `cargo bench -p repograph-core`
//!
//! These benchmarks measure the client-side hot paths of a save:
//! - Modified-properties delta over wide property maps
//! - Batch building for many pending creates
//! - A full save round trip against the in-memory repository

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use repograph_core::config::RepositoryConfig;
use repograph_core::models::NodeRef;
use repograph_core::operations::{BatchBuilder, Uploader};
use repograph_core::remote::memory::names;
use repograph_core::remote::InMemoryRepository;
use repograph_core::session::Session;
use serde_json::json;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn setup_session() -> (Arc<InMemoryRepository>, Session) {
    let repository = Arc::new(InMemoryRepository::new());
    let session = Session::new(RepositoryConfig::default(), repository.clone())
        .with_transport(repository.clone());
    (repository, session)
}

/// Seeded node with `width` properties, half of them modified locally
async fn wide_node(width: usize) -> (Session, NodeRef) {
    let (repository, mut session) = setup_session();
    let identity = repository
        .seed_child(&repository.root(), names::FOLDER, "wide")
        .await
        .unwrap();
    for i in 0..width {
        repository
            .seed_property(&identity, &format!("{{urn:bench}}p{}", i), json!(i))
            .await
            .unwrap();
    }

    let node = session.get(&identity);
    for i in (0..width).step_by(2) {
        session
            .set_property(node, &format!("{{urn:bench}}p{}", i), json!(i + 1))
            .await
            .unwrap();
    }
    (session, node)
}

/// Session with `count` pending folders under the root
fn pending_creates(count: usize) -> (Arc<InMemoryRepository>, Session) {
    let (repository, mut session) = setup_session();
    let root = session.get(&repository.root());
    for i in 0..count {
        session
            .create_child(root, "cm:folder", "cm:contains", &format!("cm:folder-{}", i))
            .unwrap();
    }
    (repository, session)
}

fn bench_modified_properties(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("modified_properties");

    for width in [10, 100, 1000] {
        let (session, node) = rt.block_on(wide_node(width));
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, _| {
            b.iter(|| black_box(session.modified_properties(node).unwrap()));
        });
    }
    group.finish();
}

fn bench_build_batch(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("build_batch");

    for count in [10, 100, 1000] {
        let (repository, session) = pending_creates(count);
        let dirty: Vec<NodeRef> = session
            .registry()
            .nodes()
            .filter(|state| state.is_dirty())
            .map(|state| state.handle())
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    let batch = BatchBuilder::new(
                        session.registry(),
                        Uploader::new(repository.as_ref(), session.config()),
                    )
                    .build(&dirty)
                    .await
                    .unwrap();
                    black_box(batch.statements().len())
                })
            });
        });
    }
    group.finish();
}

fn bench_save_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("save_100_creates", |b| {
        b.iter_batched(
            || pending_creates(100),
            |(_repository, mut session)| {
                rt.block_on(async {
                    let report = session.save().await.unwrap();
                    black_box(report.reassigned.len())
                })
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_modified_properties,
    bench_build_batch,
    bench_save_round_trip
);
criterion_main!(benches);
