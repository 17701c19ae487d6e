//! Constant-pool subset.
//!
//! Only `Utf8` and `Class` entries are materialised; every other tag is
//! skipped with its correct width so the reader stays aligned. `Long` and
//! `Double` occupy two slots per the class-file format.

use super::reader::ByteReader;
use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone)]
pub enum CpEntry {
    Utf8(String),
    Class { name_index: u16 },
    Skipped,
}

#[derive(Debug)]
pub struct ConstantPool {
    entries: Vec<Option<CpEntry>>,
}

impl ConstantPool {
    pub fn parse(reader: &mut ByteReader<'_>) -> Result<Self> {
        let count = reader.read_u2()? as usize;
        if count == 0 {
            return Err(AnalysisError::ClassFile(
                "constant_pool_count must be >= 1".into(),
            ));
        }

        let mut entries = vec![None; count];
        let mut i = 1usize;
        while i < count {
            let tag = reader.read_u1()?;
            let mut wide = false;
            let entry = match tag {
                1 => {
                    let len = reader.read_u2()? as usize;
                    let bytes = reader.read_bytes(len)?;
                    // Modified UTF-8; plain UTF-8 decoding covers the names
                    // this reader cares about.
                    CpEntry::Utf8(String::from_utf8_lossy(bytes).into_owned())
                }
                3 | 4 => {
                    reader.skip(4)?;
                    CpEntry::Skipped
                }
                5 | 6 => {
                    reader.skip(8)?;
                    wide = true;
                    CpEntry::Skipped
                }
                7 => CpEntry::Class {
                    name_index: reader.read_u2()?,
                },
                8 | 16 | 19 | 20 => {
                    reader.skip(2)?;
                    CpEntry::Skipped
                }
                9 | 10 | 11 | 12 | 17 | 18 => {
                    reader.skip(4)?;
                    CpEntry::Skipped
                }
                15 => {
                    reader.skip(3)?;
                    CpEntry::Skipped
                }
                other => {
                    return Err(AnalysisError::ClassFile(format!(
                        "unknown constant pool tag: {}",
                        other
                    )))
                }
            };
            entries[i] = Some(entry);
            i += if wide { 2 } else { 1 };
        }

        Ok(Self { entries })
    }

    pub fn utf8(&self, index: u16) -> Result<&str> {
        match self.entries.get(index as usize).and_then(Option::as_ref) {
            Some(CpEntry::Utf8(s)) => Ok(s),
            _ => Err(AnalysisError::ClassFile(format!(
                "constant pool index {} is not Utf8",
                index
            ))),
        }
    }

    /// Binary class name (`com/x/Y`) referenced by a `Class` entry.
    pub fn class_name(&self, index: u16) -> Result<&str> {
        match self.entries.get(index as usize).and_then(Option::as_ref) {
            Some(CpEntry::Class { name_index }) => self.utf8(*name_index),
            _ => Err(AnalysisError::ClassFile(format!(
                "constant pool index {} is not Class",
                index
            ))),
        }
    }
}
