//! End-to-end properties of scanning, merging and persisting stores.

use std::collections::BTreeSet;
use std::sync::Arc;

use metascan_ops::test_fixtures::{write_jar, ClassFileWriter, ElementValue};
use metascan_ops::{
    ClassDescriptor, ConfigurationBuilder, DiagnosticKind, FilterBuilder, InMemoryAdapter,
    InputFilter, JsonSerializer, MetadataIndex, ScanOrchestrator, Serializer, Store,
    SubTypeScanner, TypeAnnotationScanner, XmlSerializer, SUB_TYPES, TYPE_ANNOTATIONS,
};
use metascan_ops::{AnnotationDescriptor, Scanner};
use tempfile::TempDir;

fn set(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Three inputs with overlapping hierarchies.
fn adapter() -> InMemoryAdapter {
    InMemoryAdapter::new()
        .with_location(
            "core.jar",
            vec![
                ClassDescriptor::new("core.Api"),
                ClassDescriptor::new("core.Base")
                    .extends("java.lang.Object")
                    .implements("core.Api")
                    .annotated(AnnotationDescriptor::new("core.Component")),
            ],
        )
        .with_location(
            "app.jar",
            vec![
                ClassDescriptor::new("app.Impl")
                    .extends("core.Base")
                    .annotated(AnnotationDescriptor::new("core.Component")),
                ClassDescriptor::new("app.internal.Hidden").extends("core.Base"),
            ],
        )
        .with_location(
            "plugin.jar",
            vec![ClassDescriptor::new("plugin.Extra")
                .implements("core.Api")
                .annotated(AnnotationDescriptor::new("plugin.Marker"))],
        )
}

fn scan(builder: ConfigurationBuilder, locations: &[&str]) -> metascan_ops::ScanOutcome {
    let config = builder
        .set_metadata_adapter(Arc::new(adapter()))
        .set_locations(locations.iter().copied())
        .build()
        .unwrap();
    ScanOrchestrator::new(config).scan().unwrap()
}

const ALL: &[&str] = &["core.jar", "app.jar", "plugin.jar"];

#[test]
fn test_entries_respect_both_filters() {
    let outcome = scan(
        ConfigurationBuilder::new()
            .set_scanners(vec![
                Arc::new(SubTypeScanner::new()) as Arc<dyn Scanner>,
                Arc::new(
                    TypeAnnotationScanner::new()
                        .filter_results_by(FilterBuilder::new().include_package("core").build()),
                ),
            ])
            .filter_inputs_by(FilterBuilder::new().exclude_package("app.internal").build()),
        ALL,
    );
    let store = &outcome.store;

    assert_eq!(store.get(SUB_TYPES, "core.Base"), set(&["app.Impl"]));
    assert_eq!(store.get(SUB_TYPES, "core.Api"), set(&["core.Base", "plugin.Extra"]));
    assert!(store.get(SUB_TYPES, "java.lang.Object").is_empty());
    assert_eq!(
        store.get(TYPE_ANNOTATIONS, "core.Component"),
        set(&["app.Impl", "core.Base"])
    );
    assert!(store.get(TYPE_ANNOTATIONS, "plugin.Marker").is_empty());
    assert!(outcome.is_complete());
}

#[test]
fn test_custom_predicate_filter() {
    let outcome = scan(
        ConfigurationBuilder::new().filter_inputs_by(InputFilter::new(|name| name.starts_with("core."))),
        ALL,
    );
    assert_eq!(outcome.store.get(SUB_TYPES, "core.Api"), set(&["core.Base"]));
    assert!(outcome.store.get(SUB_TYPES, "core.Base").is_empty());
}

#[test]
fn test_merge_is_commutative_and_associative() {
    let a = scan(ConfigurationBuilder::new(), &["core.jar"]).store;
    let b = scan(ConfigurationBuilder::new(), &["app.jar"]).store;
    let c = scan(ConfigurationBuilder::new(), &["plugin.jar"]).store;

    assert_eq!(a.clone().merged(&b), b.clone().merged(&a));
    assert_eq!(
        a.clone().merged(&b).merged(&c),
        a.clone().merged(&b.clone().merged(&c))
    );
    assert_eq!(
        a.merged(&b).merged(&c),
        scan(ConfigurationBuilder::new(), ALL).store
    );
}

#[test]
fn test_serializer_round_trip_preserves_lookups() {
    let store = scan(ConfigurationBuilder::new(), ALL).store;
    let serializers: [&dyn Serializer; 2] = [&XmlSerializer, &JsonSerializer];

    for serializer in serializers {
        let restored = serializer.decode(&serializer.encode(&store).unwrap()).unwrap();
        for (scanner, index) in store.iter() {
            for key in index.keys() {
                assert_eq!(
                    restored.get(scanner, key),
                    store.get(scanner, key),
                    "{} lost {}/{}",
                    serializer.name(),
                    scanner,
                    key
                );
            }
        }
        assert_eq!(restored, store);
    }
}

#[test]
fn test_transitive_closure_over_cycle() {
    let mut store = Store::new();
    store.insert(SUB_TYPES, "A", "B");
    store.insert(SUB_TYPES, "B", "A");
    assert_eq!(store.get_transitive_closure(SUB_TYPES, "A"), set(&["A", "B"]));
}

#[test]
fn test_one_unreadable_input_of_three() {
    let config = ConfigurationBuilder::new()
        .set_metadata_adapter(Arc::new(adapter().with_unreadable("app.jar", "truncated archive")))
        .set_locations(ALL.iter().copied())
        .build()
        .unwrap();
    let outcome = ScanOrchestrator::new(config).scan().unwrap();

    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::InputUnreadable);
    assert_eq!(outcome.diagnostics[0].location.to_string(), "app.jar");

    let expected = scan(ConfigurationBuilder::new(), &["core.jar", "plugin.jar"]).store;
    assert_eq!(outcome.store, expected);
}

#[test]
fn test_rescanning_is_idempotent() {
    let once = scan(ConfigurationBuilder::new(), ALL).store;
    let twice = once
        .clone()
        .merged(&scan(ConfigurationBuilder::new(), ALL).store);
    assert_eq!(once, twice);
    assert_eq!(once.value_count(), twice.value_count());
}

#[test]
fn test_sequential_and_parallel_serialize_identically() {
    let sequential = scan(ConfigurationBuilder::new(), ALL).store;
    let parallel = scan(ConfigurationBuilder::new().use_parallel_executor(4), ALL).store;

    assert_eq!(
        XmlSerializer.encode(&sequential).unwrap(),
        XmlSerializer.encode(&parallel).unwrap()
    );
    assert_eq!(
        JsonSerializer.encode(&sequential).unwrap(),
        JsonSerializer.encode(&parallel).unwrap()
    );
}

#[test]
fn test_scan_real_class_files() {
    let dir = TempDir::new().unwrap();
    let classes = dir.path().join("classes");
    ClassFileWriter::new("com/acme/Service")
        .access_flags(0x0601)
        .write_to_dir(&classes)
        .unwrap();
    ClassFileWriter::new("com/acme/OrderService")
        .interface("com/acme/Service")
        .annotation(
            "com/acme/Component",
            vec![
                ("value", ElementValue::Str("orders".into())),
                ("scope", ElementValue::Enum("com/acme/Scope".into(), "SINGLETON".into())),
            ],
        )
        .write_to_dir(&classes)
        .unwrap();

    let jar = dir.path().join("ext.jar");
    write_jar(
        &jar,
        &[ClassFileWriter::new("ext/FastOrderService")
            .superclass("com/acme/OrderService")
            .invisible_annotation("ext/Generated")],
        &[],
    )
    .unwrap();
    std::fs::write(dir.path().join("corrupt.jar"), b"PK not really").unwrap();

    let config = ConfigurationBuilder::new()
        .set_locations([classes.clone(), jar.clone(), dir.path().join("corrupt.jar")])
        .use_parallel_executor(2)
        .build()
        .unwrap();
    let orchestrator = ScanOrchestrator::new(config);
    let outcome = orchestrator.scan().unwrap();

    assert_eq!(outcome.diagnostics_of(DiagnosticKind::InputUnreadable).count(), 1);
    assert_eq!(outcome.stats.classes, 3);

    let index = MetadataIndex::new(&outcome.store);
    assert_eq!(
        index.subtypes_of("com.acme.Service"),
        set(&["com.acme.OrderService", "ext.FastOrderService"])
    );
    assert_eq!(
        index.types_annotated_with("com.acme.Component", false),
        set(&["com.acme.OrderService", "ext.FastOrderService"])
    );
    assert_eq!(
        index.types_annotated_with("ext.Generated", true),
        set(&["ext.FastOrderService"])
    );

    let saved = dir.path().join("out/metascan.xml");
    orchestrator.save(&outcome.store, &saved).unwrap();
    assert_eq!(orchestrator.collect(&saved).unwrap(), outcome.store);
}
