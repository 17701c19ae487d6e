//! Phase-2 collectors: turn project files into `JavaClassNode`s.

mod bytecode;
mod source;

pub use bytecode::BytecodeCollector;
pub use source::SourceCollector;

use crate::classify::FileKind;
use crate::error::Result;
use archlift_graph::{ClassType, SourceType};

/// A class extracted from one artifact. Supertype names are dotted,
/// best-effort fully qualified.
#[derive(Debug, Clone)]
pub struct CollectedClass {
    pub fqn: String,
    pub package: String,
    pub class_type: ClassType,
    pub source_type: SourceType,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
}

pub trait ClassCollector: Send + Sync {
    fn id(&self) -> &'static str;
    fn supports(&self, kind: FileKind) -> bool;
    fn collect(&self, relative_path: &str, content: &[u8]) -> Result<Vec<CollectedClass>>;
}

/// The default collector pair: bytecode plus source.
pub fn default_collectors() -> Vec<Box<dyn ClassCollector>> {
    vec![
        Box::new(BytecodeCollector::new()),
        Box::new(SourceCollector::new()),
    ]
}
