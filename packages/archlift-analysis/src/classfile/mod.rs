//! Minimal Java class-file reader.
//!
//! Parses only what class collection needs: constant pool, access flags,
//! this/super class and the interface list. Fields, methods and attributes
//! are never read.

mod constant_pool;
mod reader;

use crate::error::{AnalysisError, Result};
use archlift_graph::ClassType;
use constant_pool::ConstantPool;
use reader::ByteReader;

const MAGIC: u32 = 0xCAFE_BABE;

const ACC_INTERFACE: u16 = 0x0200;
const ACC_ANNOTATION: u16 = 0x2000;
const ACC_ENUM: u16 = 0x4000;

/// The slice of a class file this system cares about.
#[derive(Debug, Clone)]
pub struct ClassSummary {
    /// Dotted fully-qualified name (`com.x.Y`).
    pub fqn: String,
    /// Dotted superclass name; `None` for `java.lang.Object` itself.
    pub super_name: Option<String>,
    /// Dotted interface names.
    pub interfaces: Vec<String>,
    pub access_flags: u16,
    pub major_version: u16,
}

impl ClassSummary {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);

        let magic = reader.read_u4()?;
        if magic != MAGIC {
            return Err(AnalysisError::ClassFile(format!(
                "bad magic: 0x{:08X}",
                magic
            )));
        }
        let _minor = reader.read_u2()?;
        let major_version = reader.read_u2()?;

        let pool = ConstantPool::parse(&mut reader)?;

        let access_flags = reader.read_u2()?;
        let this_class = reader.read_u2()?;
        let super_class = reader.read_u2()?;

        let fqn = dotted(pool.class_name(this_class)?);
        let super_name = if super_class == 0 {
            None
        } else {
            Some(dotted(pool.class_name(super_class)?))
        };

        let interface_count = reader.read_u2()? as usize;
        let mut interfaces = Vec::with_capacity(interface_count);
        for _ in 0..interface_count {
            let index = reader.read_u2()?;
            interfaces.push(dotted(pool.class_name(index)?));
        }

        Ok(Self {
            fqn,
            super_name,
            interfaces,
            access_flags,
            major_version,
        })
    }

    /// Category from access flags; records are recognised by their fixed
    /// superclass since no flag marks them.
    pub fn class_type(&self) -> ClassType {
        if self.access_flags & ACC_ANNOTATION != 0 {
            ClassType::Annotation
        } else if self.access_flags & ACC_INTERFACE != 0 {
            ClassType::Interface
        } else if self.access_flags & ACC_ENUM != 0 {
            ClassType::Enum
        } else if self.super_name.as_deref() == Some("java.lang.Record") {
            ClassType::Record
        } else {
            ClassType::Class
        }
    }
}

fn dotted(binary_name: &str) -> String {
    binary_name.replace('/', ".")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-assembled class file: `package a.b; class C extends Object {}`.
    fn minimal_class(access_flags: u16, this: &str, superclass: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // minor
        out.extend_from_slice(&52u16.to_be_bytes()); // major (Java 8)

        // Pool: [1]=Utf8 this, [2]=Class(1), [3]=Utf8 super, [4]=Class(3)
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

        out.extend_from_slice(&access_flags.to_be_bytes());
        out.extend_from_slice(&2u16.to_be_bytes()); // this_class
        out.extend_from_slice(&4u16.to_be_bytes()); // super_class
        out.extend_from_slice(&0u16.to_be_bytes()); // interfaces_count
        out
    }

    #[test]
    fn test_parse_minimal_class() {
        let bytes = minimal_class(0x0021, "a/b/C", "java/lang/Object");
        let summary = ClassSummary::parse(&bytes).unwrap();
        assert_eq!(summary.fqn, "a.b.C");
        assert_eq!(summary.super_name.as_deref(), Some("java.lang.Object"));
        assert!(summary.interfaces.is_empty());
        assert_eq!(summary.class_type(), ClassType::Class);
    }

    #[test]
    fn test_interface_flag() {
        let bytes = minimal_class(0x0601, "a/I", "java/lang/Object");
        let summary = ClassSummary::parse(&bytes).unwrap();
        assert_eq!(summary.class_type(), ClassType::Interface);
    }

    #[test]
    fn test_record_by_superclass() {
        let bytes = minimal_class(0x0021, "a/R", "java/lang/Record");
        let summary = ClassSummary::parse(&bytes).unwrap();
        assert_eq!(summary.class_type(), ClassType::Record);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut bytes = minimal_class(0x0021, "a/b/C", "java/lang/Object");
        bytes[0] = 0x00;
        assert!(ClassSummary::parse(&bytes).is_err());
    }

    #[test]
    fn test_truncated_file_rejected() {
        let bytes = minimal_class(0x0021, "a/b/C", "java/lang/Object");
        assert!(ClassSummary::parse(&bytes[..20]).is_err());
    }
}
