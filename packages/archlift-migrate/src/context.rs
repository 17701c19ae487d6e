//! The variable scope visible to template substitution during a run.

use crate::template::{Scope, TemplateEngine};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct MigrationContext {
    variables: Scope,
}

impl MigrationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_string_variables(vars: &BTreeMap<String, String>) -> Self {
        let mut ctx = Self::new();
        for (key, value) in vars {
            ctx.set_variable(key, value);
        }
        ctx
    }

    pub fn scope(&self) -> &Scope {
        &self.variables
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Set a string variable. If the string carries `${...}` placeholders an
    /// eager resolution is attempted; any failure stores the original string
    /// unchanged so foreign placeholder syntax survives storage.
    pub fn set_variable(&mut self, name: &str, value: &str) {
        let resolved = if value.contains("${") {
            TemplateEngine::render_lenient(value, &self.variables)
        } else {
            value.to_string()
        };
        self.variables
            .insert(name.to_string(), Value::String(resolved));
    }

    /// Set a structured value, deep-merging maps into an existing entry.
    pub fn set_value(&mut self, name: &str, value: Value) {
        match self.variables.get_mut(name) {
            Some(existing) => deep_merge(existing, value),
            None => {
                self.variables.insert(name.to_string(), value);
            }
        }
    }

    /// Deep-merge a whole map of outputs into scope (block output
    /// variables become visible to later blocks immediately).
    pub fn merge(&mut self, outputs: Scope) {
        for (key, value) in outputs {
            self.set_value(&key, value);
        }
    }

    /// The serialisable portion of scope (everything; values are JSON).
    pub fn snapshot(&self) -> Scope {
        self.variables.clone()
    }

    pub fn restore(&mut self, snapshot: Scope) {
        self.variables = snapshot;
    }

    // ─── Template conveniences ────────────────────────────────────────────

    pub fn render(&self, template: &str) -> crate::error::Result<String> {
        TemplateEngine::render(template, &self.variables)
    }

    pub fn render_lenient(&self, template: &str) -> String {
        TemplateEngine::render_lenient(template, &self.variables)
    }

    pub fn eval_predicate(&self, expr: &str) -> bool {
        TemplateEngine::eval_predicate(expr, &self.variables)
    }
}

fn deep_merge(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Object(old), Value::Object(new)) => {
            for (key, value) in new {
                match old.get_mut(&key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        old.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_variable_resolves_against_scope() {
        let mut ctx = MigrationContext::new();
        ctx.set_variable("base", "/opt/app");
        ctx.set_variable("config", "${base}/conf");
        assert_eq!(ctx.get("config").unwrap(), &json!("/opt/app/conf"));
    }

    #[test]
    fn test_set_variable_fallthrough_preserves_original() {
        let mut ctx = MigrationContext::new();
        ctx.set_variable("v", "${foo.bar}");
        assert_eq!(ctx.get("v").unwrap(), &json!("${foo.bar}"));
        // Later reads return it verbatim.
        assert_eq!(ctx.render_lenient("${v}"), "${foo.bar}");
    }

    #[test]
    fn test_deep_merge_of_outputs() {
        let mut ctx = MigrationContext::new();
        ctx.set_value("result", json!({"a": 1, "nested": {"x": 1}}));

        let mut outputs = Scope::new();
        outputs.insert("result".into(), json!({"b": 2, "nested": {"y": 2}}));
        ctx.merge(outputs);

        assert_eq!(
            ctx.get("result").unwrap(),
            &json!({"a": 1, "b": 2, "nested": {"x": 1, "y": 2}})
        );
    }

    #[test]
    fn test_snapshot_restore() {
        let mut ctx = MigrationContext::new();
        ctx.set_variable("a", "1");
        let snapshot = ctx.snapshot();

        let mut restored = MigrationContext::new();
        restored.restore(snapshot);
        assert_eq!(restored.get("a").unwrap(), &json!("1"));
    }
}
