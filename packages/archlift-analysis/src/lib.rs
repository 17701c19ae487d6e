//! archlift-analysis — multi-phase Java project analysis
//!
//! Builds the architectural knowledge graph in four sequential phases:
//! discovery, class collection, project-file inspection and class
//! inspection. The two inspection phases run through a generic multi-pass
//! executor that iterates until no inspector mutates anything.

pub mod classfile;
pub mod classify;
pub mod collect;
pub mod engine;
pub mod error;
pub mod executor;
pub mod inspector;
pub mod inspectors;
pub mod package_cache;
pub mod profile;
pub mod resource;

pub use classify::FileKind;
pub use collect::{ClassCollector, CollectedClass};
pub use engine::{AnalysisEngine, AnalysisOptions, AnalysisReport, PhaseReport};
pub use error::{AnalysisError, Result};
pub use executor::{MultiPassConfig, MultiPassExecutor, MultiPassOutcome};
pub use inspector::{InspectionContext, Inspector, InspectorTracker};
pub use package_cache::PackageNodeCache;
pub use profile::{ExecutionProfile, InspectorStats, PassProfile, ProfileRecorder};
pub use resource::{FsResourceResolver, ResourceResolver};
