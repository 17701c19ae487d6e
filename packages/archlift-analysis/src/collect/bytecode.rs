//! Class collection from compiled `.class` files.

use super::{ClassCollector, CollectedClass};
use crate::classfile::ClassSummary;
use crate::classify::FileKind;
use crate::error::Result;
use archlift_graph::{split_fqn, SourceType};

pub struct BytecodeCollector;

impl BytecodeCollector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BytecodeCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassCollector for BytecodeCollector {
    fn id(&self) -> &'static str {
        "bytecode-collector"
    }

    fn supports(&self, kind: FileKind) -> bool {
        kind == FileKind::ClassFile
    }

    fn collect(&self, _relative_path: &str, content: &[u8]) -> Result<Vec<CollectedClass>> {
        let summary = ClassSummary::parse(content)?;
        let (package, _) = split_fqn(&summary.fqn);
        let class_type = summary.class_type();

        // Object and Record supers carry no architectural signal.
        let super_name = summary.super_name.clone().filter(|s| {
            s != "java.lang.Object" && s != "java.lang.Record" && s != "java.lang.Enum"
        });

        Ok(vec![CollectedClass {
            fqn: summary.fqn,
            package,
            class_type,
            source_type: SourceType::Binary,
            super_name,
            interfaces: summary.interfaces,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archlift_graph::ClassType;

    // Reuses the classfile test builder shape: magic, version, 4-entry pool.
    fn class_bytes(this: &str, superclass: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&52u16.to_be_bytes());
        out.extend_from_slice(&5u16.to_be_bytes());
        out.push(1);
        out.extend_from_slice(&(this.len() as u16).to_be_bytes());
        out.extend_from_slice(this.as_bytes());
        out.push(7);
        out.extend_from_slice(&1u16.to_be_bytes());
        out.push(1);
        out.extend_from_slice(&(superclass.len() as u16).to_be_bytes());
        out.extend_from_slice(superclass.as_bytes());
        out.push(7);
        out.extend_from_slice(&3u16.to_be_bytes());
        out.extend_from_slice(&0x0021u16.to_be_bytes());
        out.extend_from_slice(&2u16.to_be_bytes());
        out.extend_from_slice(&4u16.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out
    }

    #[test]
    fn test_collect_from_bytecode() {
        let collector = BytecodeCollector::new();
        let classes = collector
            .collect("a/b/C.class", &class_bytes("a/b/C", "a/b/Base"))
            .unwrap();
        assert_eq!(classes.len(), 1);
        let c = &classes[0];
        assert_eq!(c.fqn, "a.b.C");
        assert_eq!(c.package, "a.b");
        assert_eq!(c.class_type, ClassType::Class);
        assert_eq!(c.source_type, SourceType::Binary);
        assert_eq!(c.super_name.as_deref(), Some("a.b.Base"));
    }

    #[test]
    fn test_object_super_is_dropped() {
        let collector = BytecodeCollector::new();
        let classes = collector
            .collect("a/b/C.class", &class_bytes("a/b/C", "java/lang/Object"))
            .unwrap();
        assert_eq!(classes[0].super_name, None);
    }

    #[test]
    fn test_malformed_bytes_error() {
        let collector = BytecodeCollector::new();
        assert!(collector.collect("x.class", b"garbage").is_err());
    }
}
