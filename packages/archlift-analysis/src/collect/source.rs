//! Class collection from `.java` sources via tree-sitter.

use super::{ClassCollector, CollectedClass};
use crate::classify::FileKind;
use crate::error::{AnalysisError, Result};
use archlift_graph::{ClassType, SourceType};
use std::collections::HashMap;
use tree_sitter::{Node, Parser};

pub struct SourceCollector;

impl SourceCollector {
    pub fn new() -> Self {
        Self
    }

    fn parser() -> Result<Parser> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_java::language())
            .map_err(|e| AnalysisError::Parse(format!("Failed to set Java language: {}", e)))?;
        Ok(parser)
    }
}

impl Default for SourceCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassCollector for SourceCollector {
    fn id(&self) -> &'static str {
        "source-collector"
    }

    fn supports(&self, kind: FileKind) -> bool {
        kind == FileKind::JavaSource
    }

    fn collect(&self, relative_path: &str, content: &[u8]) -> Result<Vec<CollectedClass>> {
        let source = std::str::from_utf8(content)
            .map_err(|_| AnalysisError::Parse(format!("{}: not valid UTF-8", relative_path)))?;

        let mut parser = Self::parser()?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| AnalysisError::Parse(format!("{}: tree-sitter parse failed", relative_path)))?;

        let root = tree.root_node();
        let package = find_package(&root, source);
        let imports = collect_imports(&root, source);

        let mut classes = Vec::new();
        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            let class_type = match child.kind() {
                "class_declaration" => ClassType::Class,
                "interface_declaration" => ClassType::Interface,
                "enum_declaration" => ClassType::Enum,
                "record_declaration" => ClassType::Record,
                "annotation_type_declaration" => ClassType::Annotation,
                _ => continue,
            };

            let name = match child.child_by_field_name("name") {
                Some(n) => node_text(&n, source).to_string(),
                None => continue,
            };
            let fqn = if package.is_empty() {
                name.clone()
            } else {
                format!("{}.{}", package, name)
            };

            // Same suppression as the bytecode collector: Object/Record/Enum
            // supers carry no architectural signal.
            let super_name = child
                .child_by_field_name("superclass")
                .and_then(|sc| first_type_name(&sc, source))
                .map(|n| qualify(&n, &package, &imports))
                .filter(|s| {
                    s != "java.lang.Object" && s != "java.lang.Record" && s != "java.lang.Enum"
                });

            let mut interfaces = Vec::new();
            if let Some(node) = child.child_by_field_name("interfaces") {
                interfaces.extend(type_list_names(&node, source));
            }
            // interface_declaration puts its supertypes in `extends_interfaces`
            if let Some(node) = find_child_by_kind(&child, "extends_interfaces") {
                interfaces.extend(type_list_names(&node, source));
            }
            let interfaces = interfaces
                .into_iter()
                .map(|n| qualify(&n, &package, &imports))
                .collect();

            classes.push(CollectedClass {
                fqn,
                package: package.clone(),
                class_type,
                source_type: SourceType::Source,
                super_name,
                interfaces,
            });
        }

        Ok(classes)
    }
}

fn find_child_by_kind<'a>(node: &Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    let result = node.children(&mut cursor).find(|c| c.kind() == kind);
    result
}

fn node_text<'a>(node: &Node, source: &'a str) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}

fn find_package(root: &Node, source: &str) -> String {
    let Some(decl) = find_child_by_kind(root, "package_declaration") else {
        return String::new();
    };
    let mut cursor = decl.walk();
    for child in decl.children(&mut cursor) {
        if matches!(child.kind(), "scoped_identifier" | "identifier") {
            return node_text(&child, source).to_string();
        }
    }
    String::new()
}

/// Map of simple name to imported fully-qualified name.
fn collect_imports(root: &Node, source: &str) -> HashMap<String, String> {
    let mut imports = HashMap::new();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if child.kind() != "import_declaration" {
            continue;
        }
        let text = node_text(&child, source);
        let path = text
            .trim_start_matches("import")
            .trim_start_matches(char::is_whitespace)
            .trim_start_matches("static")
            .trim_end_matches(';')
            .trim();
        if path.ends_with(".*") || path.is_empty() {
            continue;
        }
        if let Some((_, simple)) = path.rsplit_once('.') {
            imports.insert(simple.to_string(), path.to_string());
        }
    }
    imports
}

/// First type name under a `superclass` node, generics stripped.
fn first_type_name(node: &Node, source: &str) -> Option<String> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if matches!(
            child.kind(),
            "type_identifier" | "scoped_type_identifier" | "generic_type"
        ) {
            return Some(strip_generics(node_text(&child, source)));
        }
    }
    None
}

/// Type names from a `super_interfaces` / `extends_interfaces` node.
fn type_list_names(node: &Node, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut stack = vec![*node];
    while let Some(current) = stack.pop() {
        if current.kind() == "type_list" {
            let mut cursor = current.walk();
            for child in current.children(&mut cursor) {
                if matches!(
                    child.kind(),
                    "type_identifier" | "scoped_type_identifier" | "generic_type"
                ) {
                    names.push(strip_generics(node_text(&child, source)));
                }
            }
            continue;
        }
        let mut cursor = current.walk();
        for child in current.children(&mut cursor) {
            stack.push(child);
        }
    }
    names.reverse();
    names
}

fn strip_generics(name: &str) -> String {
    match name.find('<') {
        Some(idx) => name[..idx].trim().to_string(),
        None => name.trim().to_string(),
    }
}

/// Best-effort qualification: already-dotted names pass through, imported
/// simple names resolve through the import table, anything else is assumed
/// to live in the current package.
fn qualify(name: &str, package: &str, imports: &HashMap<String, String>) -> String {
    if name.contains('.') {
        return name.to_string();
    }
    if let Some(fqn) = imports.get(name) {
        return fqn.clone();
    }
    if package.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", package, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(source: &str) -> Vec<CollectedClass> {
        SourceCollector::new()
            .collect("Test.java", source.as_bytes())
            .unwrap()
    }

    #[test]
    fn test_minimal_class() {
        let classes = collect("package a.b;\nclass C {}\n");
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].fqn, "a.b.C");
        assert_eq!(classes[0].package, "a.b");
        assert_eq!(classes[0].class_type, ClassType::Class);
        assert_eq!(classes[0].source_type, SourceType::Source);
    }

    #[test]
    fn test_default_package() {
        let classes = collect("class Lone {}\n");
        assert_eq!(classes[0].fqn, "Lone");
        assert_eq!(classes[0].package, "");
    }

    #[test]
    fn test_supertypes_qualified_via_imports() {
        let classes = collect(
            "package a;\nimport x.y.Base;\nimport x.y.Iface;\n\
             public class C extends Base implements Iface, Local {}\n",
        );
        let c = &classes[0];
        assert_eq!(c.super_name.as_deref(), Some("x.y.Base"));
        assert_eq!(c.interfaces, vec!["x.y.Iface", "a.Local"]);
    }

    #[test]
    fn test_interface_extends() {
        let classes = collect("package a;\ninterface I extends J {}\n");
        assert_eq!(classes[0].class_type, ClassType::Interface);
        assert_eq!(classes[0].interfaces, vec!["a.J"]);
    }

    #[test]
    fn test_all_kinds() {
        let classes = collect(
            "package k;\nclass A {}\ninterface B {}\nenum E { X }\nrecord R(int x) {}\n\
             @interface N {}\n",
        );
        let kinds: Vec<ClassType> = classes.iter().map(|c| c.class_type).collect();
        assert_eq!(
            kinds,
            vec![
                ClassType::Class,
                ClassType::Interface,
                ClassType::Enum,
                ClassType::Record,
                ClassType::Annotation
            ]
        );
    }

    #[test]
    fn test_object_super_is_dropped() {
        let classes = collect("package a;\nclass C extends java.lang.Object {}\n");
        assert_eq!(classes[0].super_name, None);
    }

    #[test]
    fn test_generic_supertype_stripped() {
        let classes = collect("package a;\nclass C extends Base<String> {}\n");
        assert_eq!(classes[0].super_name.as_deref(), Some("a.Base"));
    }

    #[test]
    fn test_invalid_utf8_is_an_error() {
        let collector = SourceCollector::new();
        assert!(collector.collect("X.java", &[0xFF, 0xFE, 0x00]).is_err());
    }
}
