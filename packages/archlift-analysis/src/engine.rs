//! Four-phase analysis engine.
//!
//! discover -> collect class nodes -> file inspectors -> class inspectors.
//! The graph is flushed to SQLite between phases, so a mid-run crash leaves
//! the last fully-persisted phase intact. Phase 2 honors the file-level
//! skip contract; phases 3 and 4 skip per (node, inspector) through the
//! tracker.

use crate::classify::FileKind;
use crate::collect::{default_collectors, ClassCollector};
use crate::error::Result;
use crate::executor::{MultiPassConfig, MultiPassExecutor};
use crate::inspector::{run_inspectors, touched_set, Inspector, InspectorTracker};
use crate::inspectors::default_class_inspectors;
use crate::package_cache::PackageNodeCache;
use crate::profile::ExecutionProfile;
use crate::resource::{FsResourceResolver, ResourceResolver};
use archlift_graph::{
    keys, split_fqn, Edge, EdgeType, GraphStore, JavaClassNode, NodeType, NodeTypeRegistry,
    ProjectFile, SqliteGraphStore,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub skip_existing_nodes: bool,
    pub max_passes: usize,
    pub parallelism: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            skip_existing_nodes: true,
            max_passes: 10,
            parallelism: num_cpus::get(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub name: String,
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub phases: Vec<PhaseReport>,
    pub profiles: Vec<ExecutionProfile>,
}

pub struct AnalysisEngine {
    project_root: PathBuf,
    graph: Arc<GraphStore>,
    db: SqliteGraphStore,
    resolver: Arc<FsResourceResolver>,
    tracker: InspectorTracker,
    collectors: Vec<Box<dyn ClassCollector>>,
    file_inspectors: Vec<Box<dyn Inspector>>,
    class_inspectors: Vec<Box<dyn Inspector>>,
    options: AnalysisOptions,
}

impl AnalysisEngine {
    /// Open the engine over a project. Any previously persisted graph and
    /// inspector tracking are loaded so re-runs are incremental.
    pub fn open(
        project_root: impl Into<PathBuf>,
        db: SqliteGraphStore,
        options: AnalysisOptions,
    ) -> Result<Self> {
        let project_root = project_root.into();
        let registry = NodeTypeRegistry::with_defaults();
        let graph = Arc::new(db.load(&registry, &Default::default())?);
        let tracker = InspectorTracker::new();
        tracker.import_rows(db.load_inspector_runs()?);
        let resolver = Arc::new(FsResourceResolver::new(project_root.clone()));

        Ok(Self {
            project_root,
            graph,
            db,
            resolver,
            tracker,
            collectors: default_collectors(),
            file_inspectors: Vec::new(),
            class_inspectors: default_class_inspectors(),
            options,
        })
    }

    pub fn with_file_inspectors(mut self, inspectors: Vec<Box<dyn Inspector>>) -> Self {
        self.file_inspectors = inspectors;
        self
    }

    pub fn with_class_inspectors(mut self, inspectors: Vec<Box<dyn Inspector>>) -> Self {
        self.class_inspectors = inspectors;
        self
    }

    pub fn graph(&self) -> &Arc<GraphStore> {
        &self.graph
    }

    pub fn db(&self) -> &SqliteGraphStore {
        &self.db
    }

    /// Drop everything and start from an empty graph (explicit re-scan).
    pub fn reset(&self) -> Result<()> {
        self.graph.clear();
        self.tracker.clear();
        self.db.clear_inspector_runs()?;
        self.db.save(&self.graph)?;
        Ok(())
    }

    pub fn run(&self) -> Result<AnalysisReport> {
        let mut report = AnalysisReport {
            phases: Vec::new(),
            profiles: Vec::new(),
        };

        report.phases.push(self.discover()?);
        self.flush()?;

        report.phases.push(self.collect_classes()?);
        self.flush()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.parallelism.max(1))
            .build()
            .map_err(|e| crate::error::AnalysisError::Config(e.to_string()))?;

        let (phase, profile) = pool.install(|| {
            self.run_inspector_phase(
                "projectfile-analysis",
                NodeType::ProjectFile,
                &self.file_inspectors,
            )
        });
        report.phases.push(phase);
        report.profiles.push(profile);
        self.flush()?;

        let (phase, profile) = pool.install(|| {
            self.run_inspector_phase(
                "javaclass-analysis",
                NodeType::JavaClass,
                &self.class_inspectors,
            )
        });
        report.phases.push(phase);
        report.profiles.push(profile);
        self.flush()?;

        self.graph.validate_edges()?;
        Ok(report)
    }

    // ─── Phase 1: discovery ───────────────────────────────────────────────

    fn discover(&self) -> Result<PhaseReport> {
        let start = Instant::now();
        let mut processed = 0;
        let mut skipped = 0;
        let mut errors = 0;

        for entry in WalkDir::new(&self.project_root)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()))
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Discovery: unreadable entry: {}", e);
                    errors += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = match relative_id(&self.project_root, entry.path()) {
                Some(r) => r,
                None => continue,
            };
            if self.graph.contains(&relative) {
                skipped += 1;
                continue;
            }

            let kind = FileKind::classify(entry.path());
            let ext = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_ascii_lowercase();

            let mut file = ProjectFile::new(relative.clone()).into_node();
            file.display_label = entry
                .path()
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(&relative)
                .to_string();
            file.set_property(keys::FILE_KIND, kind.as_str());
            if !ext.is_empty() {
                file.set_property(keys::FILE_EXT, ext);
            }
            self.graph.add_node(file)?;
            processed += 1;
        }

        info!(
            "Discovery: {} new files, {} already known",
            processed, skipped
        );
        Ok(PhaseReport {
            name: "discovery".to_string(),
            processed,
            skipped,
            errors,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    // ─── Phase 2: class collection ────────────────────────────────────────

    fn collect_classes(&self) -> Result<PhaseReport> {
        let start = Instant::now();
        let mut processed = 0;
        let mut skipped = 0;
        let mut errors = 0;

        let package_cache = PackageNodeCache::new(self.graph.clone());
        let class_sources: Vec<(String, String)> = self
            .graph
            .find_by_node_type(NodeType::JavaClass)
            .into_iter()
            .filter_map(|n| {
                n.property_str(keys::SOURCE_FILE_PATH)
                    .map(|p| (n.id.clone(), p.to_string()))
            })
            .collect();

        for file in self.graph.find_by_node_type(NodeType::ProjectFile) {
            let kind = match file.property_str(keys::FILE_KIND) {
                Some("java_source") => FileKind::JavaSource,
                Some("class_file") => FileKind::ClassFile,
                _ => continue,
            };

            // File-level skip: existing class nodes for this file mean the
            // collectors already ran in a previous run.
            if self.options.skip_existing_nodes
                && class_sources.iter().any(|(_, path)| path == &file.id)
            {
                skipped += 1;
                continue;
            }

            let content = match self.resolver.resolve(&file.id) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Collection failed for {}: {}", file.id, e);
                    errors += 1;
                    continue;
                }
            };

            let mut collected = Vec::new();
            let mut failed = false;
            for collector in &self.collectors {
                if !collector.supports(kind) {
                    continue;
                }
                match collector.collect(&file.id, &content) {
                    Ok(classes) => collected.extend(classes),
                    Err(e) => {
                        warn!("{}: {} failed: {}", file.id, collector.id(), e);
                        failed = true;
                    }
                }
            }
            if failed {
                errors += 1;
                continue;
            }

            for class in collected {
                self.register_class(&package_cache, &file.id, class);
            }
            processed += 1;
        }

        info!(
            "Collection: {} files processed, {} skipped, {} errors",
            processed, skipped, errors
        );
        Ok(PhaseReport {
            name: "class-collection".to_string(),
            processed,
            skipped,
            errors,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn register_class(
        &self,
        package_cache: &PackageNodeCache,
        file_id: &str,
        class: crate::collect::CollectedClass,
    ) {
        if self.graph.contains(&class.fqn) {
            // The node may be a bare placeholder created as an edge target;
            // fill in the collected attributes once.
            let _ = self.graph.with_node_mut(&class.fqn, |node| {
                if node.property_str(keys::CLASS_TYPE).is_none() {
                    let (package, simple) = split_fqn(&class.fqn);
                    node.display_label = simple.clone();
                    node.set_property(keys::SIMPLE_NAME, simple);
                    node.set_property(keys::PACKAGE_NAME, package);
                    node.set_property(keys::CLASS_TYPE, class.class_type.as_str());
                    node.set_property(keys::SOURCE_TYPE, class.source_type.as_str());
                }
                if node.property_str(keys::SOURCE_FILE_PATH).is_none() {
                    node.set_property(keys::SOURCE_FILE_PATH, file_id);
                }
            });
        } else {
            let mut node =
                JavaClassNode::new(&class.fqn, class.class_type, class.source_type).into_node();
            node.set_property(keys::SOURCE_FILE_PATH, file_id);
            if self.graph.add_node(node).is_err() {
                // Raced with another collector registering the same class.
                return;
            }
        }

        package_cache.get_or_create_and_attach(&class.package, &class.fqn, class.class_type);

        if let Some(super_name) = &class.super_name {
            self.graph.get_or_create_node(super_name, NodeType::JavaClass);
            self.graph
                .add_edge(Edge::new(&class.fqn, super_name, EdgeType::Extends));
        }
        for interface in &class.interfaces {
            self.graph.get_or_create_node(interface, NodeType::JavaClass);
            self.graph
                .add_edge(Edge::new(&class.fqn, interface, EdgeType::Implements));
        }
    }

    // ─── Phases 3 and 4: inspector execution ──────────────────────────────

    fn run_inspector_phase(
        &self,
        phase_name: &str,
        node_type: NodeType,
        inspectors: &[Box<dyn Inspector>],
    ) -> (PhaseReport, ExecutionProfile) {
        let start = Instant::now();
        let executor = MultiPassExecutor::new(self.options.parallelism > 1);
        let mut config = MultiPassConfig::new(phase_name, self.options.max_passes);
        config.phase_tag = Some(format!("analyzed.{}", node_type.as_str()));
        let phase_tag = config.phase_tag.clone();

        let outcome = executor.execute(
            &config,
            || self.graph.ids_by_type(node_type),
            |node_id: &String, pass_start, recorder, _pass| {
                let touched = run_inspectors(
                    &self.graph,
                    self.resolver.as_ref(),
                    &self.tracker,
                    inspectors,
                    node_id,
                    pass_start,
                    recorder,
                );
                if touched {
                    if let Some(tag) = &phase_tag {
                        let _ = self.graph.enable_tag(node_id, tag);
                    }
                }
                touched_set(node_id, touched)
            },
        );

        let report = PhaseReport {
            name: phase_name.to_string(),
            processed: outcome.total_items_processed,
            skipped: 0,
            errors: outcome
                .profile
                .inspector_stats
                .values()
                .map(|s| s.errors as usize)
                .sum(),
            duration_ms: start.elapsed().as_millis() as u64,
        };
        (report, outcome.profile)
    }

    fn flush(&self) -> Result<()> {
        self.db.save(&self.graph)?;
        self.db.save_inspector_runs(&self.tracker.export_rows())?;
        Ok(())
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.') && n.len() > 1)
        .unwrap_or(false)
}

fn relative_id(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        parts.push(component.as_os_str().to_str()?.to_string());
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
