//! Deterministic AST-rewrite recipes.
//!
//! A recipe is a pure source-to-source transformation registered under a
//! name; OPENREWRITE blocks look recipes up here. Returning `None` means
//! the file needs no change.

use crate::error::{MigrateError, Result};
use std::collections::BTreeMap;

pub trait RewriteRecipe: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;
    fn apply(&self, source: &str) -> Option<String>;
}

/// Function-backed recipe, convenient for registration and tests.
#[derive(Debug)]
pub struct FnRecipe {
    name: String,
    apply: fn(&str) -> Option<String>,
}

impl FnRecipe {
    pub fn new(name: impl Into<String>, apply: fn(&str) -> Option<String>) -> Self {
        Self {
            name: name.into(),
            apply,
        }
    }
}

impl RewriteRecipe for FnRecipe {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, source: &str) -> Option<String> {
        (self.apply)(source)
    }
}

#[derive(Default)]
pub struct RecipeRegistry {
    recipes: BTreeMap<String, Box<dyn RewriteRecipe>>,
}

impl RecipeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(FnRecipe::new(
            "remove-ejb-imports",
            remove_ejb_imports,
        )));
        registry.register(Box::new(FnRecipe::new(
            "stateless-to-service",
            stateless_to_service,
        )));
        registry
    }

    pub fn register(&mut self, recipe: Box<dyn RewriteRecipe>) {
        self.recipes.insert(recipe.name().to_string(), recipe);
    }

    pub fn resolve(&self, name: &str) -> Result<&dyn RewriteRecipe> {
        self.recipes.get(name).map(|r| r.as_ref()).ok_or_else(|| {
            MigrateError::Config(format!(
                "Unknown recipe '{}'; registered recipes: {}",
                name,
                self.names().join(", ")
            ))
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.recipes.keys().cloned().collect()
    }
}

/// Drop `import javax.ejb.*` style imports.
fn remove_ejb_imports(source: &str) -> Option<String> {
    let mut changed = false;
    let kept: Vec<&str> = source
        .lines()
        .filter(|line| {
            let is_ejb_import = line.trim_start().starts_with("import javax.ejb.")
                || line.trim_start().starts_with("import jakarta.ejb.");
            if is_ejb_import {
                changed = true;
            }
            !is_ejb_import
        })
        .collect();
    if !changed {
        return None;
    }
    let mut out = kept.join("\n");
    if source.ends_with('\n') {
        out.push('\n');
    }
    Some(out)
}

/// `@Stateless` session beans become Spring `@Service` components.
fn stateless_to_service(source: &str) -> Option<String> {
    if !source.contains("@Stateless") {
        return None;
    }
    let mut out = source.replace("@Stateless", "@Service");
    out = out.replace(
        "import javax.ejb.Stateless;",
        "import org.springframework.stereotype.Service;",
    );
    out = out.replace(
        "import jakarta.ejb.Stateless;",
        "import org.springframework.stereotype.Service;",
    );
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_unknown_lists_registered() {
        let registry = RecipeRegistry::with_builtins();
        let err = registry.resolve("nope").unwrap_err();
        assert!(err.to_string().contains("stateless-to-service"));
    }

    #[test]
    fn test_remove_ejb_imports() {
        let source = "import javax.ejb.Stateless;\nimport java.util.List;\nclass C {}\n";
        let rewritten = remove_ejb_imports(source).unwrap();
        assert!(!rewritten.contains("javax.ejb"));
        assert!(rewritten.contains("java.util.List"));
        assert!(rewritten.ends_with('\n'));

        assert!(remove_ejb_imports("class C {}\n").is_none());
    }

    #[test]
    fn test_stateless_to_service() {
        let source = "import javax.ejb.Stateless;\n@Stateless\npublic class CartBean {}\n";
        let rewritten = stateless_to_service(source).unwrap();
        assert!(rewritten.contains("org.springframework.stereotype.Service"));
        assert!(rewritten.contains("@Service"));
        assert!(!rewritten.contains("@Stateless"));
    }
}
