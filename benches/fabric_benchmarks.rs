// Copyright 2025 Cowboy AI, LLC.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use knowledge_fabric::clock::SystemClock;
use knowledge_fabric::context::Deadline;
use knowledge_fabric::embedding::NoopEmbeddingProvider;
use knowledge_fabric::entity::EntityId;
use knowledge_fabric::gal::{GraphStore, InMemoryStore};
use knowledge_fabric::memory::{AssociativeMemory, MemoryType};
use knowledge_fabric::model::{Component, Domain};
use knowledge_fabric::repositories::{ComponentRepo, DomainRepo, Repository};
use knowledge_fabric::schema::relationship_types::DEPENDS_ON;
use knowledge_fabric::schema::SchemaRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn setup_runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn domain_repo() -> DomainRepo {
    Repository::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(SchemaRegistry::with_core_schema()),
        Arc::new(SystemClock),
    )
}

fn seed_domain(rt: &Runtime, repo: &DomainRepo) -> EntityId<knowledge_fabric::entity::DomainMarker> {
    let now = chrono::Utc::now();
    rt.block_on(repo.create(
        &Deadline::none(),
        Domain {
            id: EntityId::new(),
            name: "bench-domain".to_string(),
            description: String::new(),
            created_at: now,
            updated_at: now,
        },
    ))
    .unwrap()
    .id
}

fn benchmark_repository_create(c: &mut Criterion) {
    let rt = setup_runtime();
    let repo = domain_repo();

    c.bench_function("domain_repository_create", |b| {
        b.iter(|| {
            let now = chrono::Utc::now();
            rt.block_on(repo.create(
                &Deadline::none(),
                Domain {
                    id: EntityId::new(),
                    name: "bench-domain".to_string(),
                    description: String::new(),
                    created_at: now,
                    updated_at: now,
                },
            ))
            .unwrap()
        });
    });
}

fn benchmark_repository_find_by_id(c: &mut Criterion) {
    let rt = setup_runtime();
    let repo = domain_repo();
    let id = seed_domain(&rt, &repo);

    c.bench_function("domain_repository_find_by_id", |b| {
        b.iter(|| {
            let found = rt.block_on(repo.find_by_id(&Deadline::none(), id)).unwrap();
            black_box(found)
        });
    });
}

fn benchmark_relationship_cycle_check(c: &mut Criterion) {
    let rt = setup_runtime();
    let store: Arc<dyn GraphStore> = Arc::new(InMemoryStore::new());
    let schema = Arc::new(SchemaRegistry::with_core_schema());
    let clock = Arc::new(SystemClock);
    let components: ComponentRepo = Repository::new(store.clone(), schema.clone(), clock.clone());
    let relationships =
        knowledge_fabric::repositories::RelationshipRepo::new(store.clone(), schema.clone());

    let mut group = c.benchmark_group("dependency_chain_cycle_check");
    for chain_len in [4usize, 16, 64].iter() {
        let now = chrono::Utc::now();
        let ids: Vec<_> = (0..*chain_len)
            .map(|i| {
                rt.block_on(components.create(
                    &Deadline::none(),
                    Component {
                        id: EntityId::new(),
                        project_id: EntityId::new(),
                        name: format!("component-{i}"),
                        component_type: "service".to_string(),
                        status: "active".to_string(),
                        created_at: now,
                        updated_at: now,
                    },
                ))
                .unwrap()
                .id
            })
            .collect();

        // A -> B -> C -> ... chain of DEPENDS_ON edges.
        for pair in ids.windows(2) {
            rt.block_on(relationships.create(
                &Deadline::none(),
                "Component",
                &pair[0].as_uuid().to_string(),
                "Component",
                &pair[1].as_uuid().to_string(),
                DEPENDS_ON,
                Default::default(),
            ))
            .unwrap();
        }

        let head = ids[0].as_uuid().to_string();
        let tail = ids[ids.len() - 1].as_uuid().to_string();

        group.bench_with_input(BenchmarkId::from_parameter(chain_len), chain_len, |b, _| {
            b.iter(|| {
                // Attempting to close the chain into a cycle forces a full
                // BFS walk from the candidate target back to the source.
                let result = rt.block_on(relationships.create(
                    &Deadline::none(),
                    "Component",
                    &tail,
                    "Component",
                    &head,
                    DEPENDS_ON,
                    Default::default(),
                ));
                black_box(result.is_err())
            });
        });
    }
    group.finish();
}

fn benchmark_memory_recall_by_context(c: &mut Criterion) {
    let rt = setup_runtime();
    let store: Arc<dyn GraphStore> = Arc::new(InMemoryStore::new());
    let memory = AssociativeMemory::new(
        store,
        Arc::new(SystemClock),
        Arc::new(NoopEmbeddingProvider),
        knowledge_fabric::config::MemoryConfig::default(),
    );

    let mut group = c.benchmark_group("memory_recall_by_context");
    for count in [10usize, 100, 1_000].iter() {
        for i in 0..*count {
            let mut context = HashMap::new();
            context.insert("project".to_string(), format!("P{}", i % 8));
            context.insert("topic".to_string(), "auth".to_string());
            rt.block_on(memory.store(
                &Deadline::none(),
                format!("note {i}"),
                context,
                MemoryType::Semantic,
                0.5,
            ))
            .unwrap();
        }

        let mut query = HashMap::new();
        query.insert("project".to_string(), "P3".to_string());

        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| {
                let found = rt
                    .block_on(memory.recall_by_context(&Deadline::none(), &query, 10))
                    .unwrap();
                black_box(found)
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_repository_create,
    benchmark_repository_find_by_id,
    benchmark_relationship_cycle_check,
    benchmark_memory_recall_by_context,
);

criterion_main!(benches);
