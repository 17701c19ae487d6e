//! File classification for the discovery phase.

use std::path::Path;

/// Coarse artifact kind attached to every `ProjectFile` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    JavaSource,
    ClassFile,
    Descriptor,
    Build,
    Resource,
    Other,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::JavaSource => "java_source",
            FileKind::ClassFile => "class_file",
            FileKind::Descriptor => "descriptor",
            FileKind::Build => "build",
            FileKind::Resource => "resource",
            FileKind::Other => "other",
        }
    }

    pub fn classify(path: &Path) -> FileKind {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match file_name.as_str() {
            "pom.xml" | "build.gradle" | "build.gradle.kts" | "build.xml" | "settings.gradle" => {
                return FileKind::Build
            }
            _ => {}
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "java" => FileKind::JavaSource,
            "class" => FileKind::ClassFile,
            "xml" | "properties" | "yml" | "yaml" => FileKind::Descriptor,
            "jsp" | "html" | "css" | "js" | "sql" | "txt" | "md" | "jar" => FileKind::Resource,
            _ => FileKind::Other,
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
