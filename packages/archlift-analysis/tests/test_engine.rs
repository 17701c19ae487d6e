//! End-to-end analysis runs over small on-disk projects.

use archlift_analysis::{AnalysisEngine, AnalysisOptions};
use archlift_graph::{keys, NodeType, PackageNode, SqliteGraphStore};
use std::path::Path;

fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn engine_for(project: &Path, db_dir: &Path) -> AnalysisEngine {
    let db = SqliteGraphStore::open(db_dir.join("graph")).unwrap();
    let options = AnalysisOptions {
        parallelism: 1,
        ..Default::default()
    };
    AnalysisEngine::open(project, db, options).unwrap()
}

#[test]
fn minimal_collect_produces_class_and_package_nodes() {
    let project = tempfile::tempdir().unwrap();
    let db_dir = tempfile::tempdir().unwrap();
    write_file(project.path(), "src/a/b/C.java", "package a.b;\nclass C {}\n");

    let engine = engine_for(project.path(), db_dir.path());
    engine.run().unwrap();

    let classes = engine.graph().find_by_node_type(NodeType::JavaClass);
    assert_eq!(classes.len(), 1);
    let class = &classes[0];
    assert_eq!(class.id, "a.b.C");
    assert_eq!(class.property_str(keys::CLASS_TYPE), Some("class"));
    assert_eq!(class.property_str(keys::SOURCE_TYPE), Some("source"));
    assert_eq!(
        class.property_str(keys::SOURCE_FILE_PATH),
        Some("src/a/b/C.java")
    );

    let packages = engine.graph().find_by_node_type(NodeType::Package);
    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0].id, "a.b");
    let pkg = PackageNode(packages[0].clone());
    assert_eq!(pkg.class_ids(), vec!["a.b.C"]);
}

#[test]
fn second_run_on_unchanged_project_skips_collection() {
    let project = tempfile::tempdir().unwrap();
    let db_dir = tempfile::tempdir().unwrap();
    write_file(project.path(), "src/a/X.java", "package a;\nclass X {}\n");
    write_file(
        project.path(),
        "src/a/Y.java",
        "package a;\ninterface Y {}\n",
    );

    let first_report = {
        let engine = engine_for(project.path(), db_dir.path());
        let report = engine.run().unwrap();
        assert_eq!(report.phases[1].processed, 2);
        engine.graph().all_nodes()
    };

    // Fresh engine over the same database: everything is already known.
    let engine = engine_for(project.path(), db_dir.path());
    let report = engine.run().unwrap();

    let collection = &report.phases[1];
    assert_eq!(collection.name, "class-collection");
    assert_eq!(collection.processed, 0);
    assert_eq!(collection.skipped, 2);

    // Identical graph contents after the second run.
    let second = engine.graph().all_nodes();
    assert_eq!(first_report.len(), second.len());
    for (a, b) in first_report.iter().zip(second.iter()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.properties, b.properties);
        assert_eq!(a.tags, b.tags);
        assert_eq!(a.metrics, b.metrics);
    }
}

#[test]
fn inspectors_converge_and_tag_classes() {
    let project = tempfile::tempdir().unwrap();
    let db_dir = tempfile::tempdir().unwrap();
    write_file(
        project.path(),
        "src/a/Service.java",
        "package a;\npublic class Service implements Worker {}\ninterface Worker {}\n",
    );

    let engine = engine_for(project.path(), db_dir.path());
    let report = engine.run().unwrap();

    // Class phase converged: the pass after the last mutation touches nothing.
    let class_profile = report
        .profiles
        .iter()
        .find(|p| p.phase_name == "javaclass-analysis")
        .unwrap();
    assert!(class_profile.passes.last().unwrap().items_touched == 0);

    let tagged = engine.graph().find_by_tag("java.interface");
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].id, "a.Worker");

    let service = engine.graph().get_node("a.Service").unwrap();
    assert_eq!(service.metric(keys::COUPLING_CE), Some(1.0));
    let worker = engine.graph().get_node("a.Worker").unwrap();
    assert_eq!(worker.metric(keys::COUPLING_CA), Some(1.0));
}

#[test]
fn parse_error_in_one_file_does_not_abort_collection() {
    let project = tempfile::tempdir().unwrap();
    let db_dir = tempfile::tempdir().unwrap();
    write_file(project.path(), "src/Good.java", "class Good {}\n");
    // Invalid UTF-8 bytes in a .java file force a collector error.
    std::fs::write(project.path().join("src/Bad.java"), [0xFF, 0xFE, 0x01]).unwrap();

    let engine = engine_for(project.path(), db_dir.path());
    let report = engine.run().unwrap();

    let collection = &report.phases[1];
    assert_eq!(collection.processed, 1);
    assert_eq!(collection.errors, 1);
    assert!(engine.graph().get_node("Good").is_some());
}

#[test]
fn reset_clears_graph_and_tracking() {
    let project = tempfile::tempdir().unwrap();
    let db_dir = tempfile::tempdir().unwrap();
    write_file(project.path(), "src/a/C.java", "package a;\nclass C {}\n");

    let engine = engine_for(project.path(), db_dir.path());
    engine.run().unwrap();
    assert!(engine.graph().node_count() > 0);

    engine.reset().unwrap();
    assert_eq!(engine.graph().node_count(), 0);

    // A run after reset rebuilds from scratch.
    let report = engine.run().unwrap();
    assert_eq!(report.phases[1].processed, 1);
    assert!(engine.graph().get_node("a.C").is_some());
}
