//! Template substitution.
//!
//! One contract serves prompts, command strings, file contents and paths:
//! `${...}` placeholders resolve against the variable scope, `{% ... %}`
//! control flow is handed to tera for conditionals and iteration, and the
//! predicate sub-language used by `enable_if` evaluates to a boolean.
//!
//! Two rendering modes exist. Strict rendering fails on any unresolved
//! placeholder (prompts, command lines, paths). Lenient rendering preserves
//! the original string unchanged on any failure, so artefacts carrying
//! foreign placeholder syntax (a Maven `${project.version}` in a generated
//! POM) survive round-trip storage untouched.

use crate::error::{MigrateError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use tera::{Context, Tera};
use tracing::debug;

pub type Scope = BTreeMap<String, Value>;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());
static ENV_EXPR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^env\.([A-Za-z_][A-Za-z0-9_]*)(?::-(.*))?$").unwrap()
});
static PURE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]*(\.[A-Za-z0-9_\-]+)*$").unwrap());

pub struct TemplateEngine;

impl TemplateEngine {
    /// Strict render: every `${...}` must resolve and any tera control flow
    /// must evaluate.
    pub fn render(template: &str, scope: &Scope) -> Result<String> {
        let mut failure: Option<String> = None;
        let substituted = PLACEHOLDER.replace_all(template, |caps: &regex::Captures<'_>| {
            let expr = caps[1].trim();
            match resolve_placeholder(expr, scope) {
                Ok(text) => text,
                Err(e) => {
                    if failure.is_none() {
                        failure = Some(e);
                    }
                    caps[0].to_string()
                }
            }
        });
        if let Some(message) = failure {
            return Err(MigrateError::Template(message));
        }

        let substituted = substituted.into_owned();
        if substituted.contains("{%") || substituted.contains("{{") {
            let context = tera_context(scope);
            return Tera::one_off(&substituted, &context, false)
                .map_err(|e| MigrateError::Template(flatten_tera_error(&e)));
        }
        Ok(substituted)
    }

    /// Lenient render: any failure preserves the original string unchanged.
    pub fn render_lenient(template: &str, scope: &Scope) -> String {
        match Self::render(template, scope) {
            Ok(rendered) => rendered,
            Err(e) => {
                debug!("Lenient render kept original: {}", e);
                template.to_string()
            }
        }
    }

    /// Predicate evaluation for `enable_if`. Supports `&& || !`, equality
    /// and numeric comparisons over scope variables; any evaluation error
    /// yields `false`.
    pub fn eval_predicate(expr: &str, scope: &Scope) -> bool {
        let expr = expr.trim();
        if expr.is_empty() {
            return true;
        }
        let translated = translate_boolean_ops(expr);
        let template = format!("{{% if {} %}}true{{% else %}}false{{% endif %}}", translated);
        let context = tera_context(&coerce_for_predicates(scope));
        match Tera::one_off(&template, &context, false) {
            Ok(rendered) => rendered.trim() == "true",
            Err(e) => {
                debug!("Predicate '{}' evaluated to false: {}", expr, flatten_tera_error(&e));
                false
            }
        }
    }
}

/// Resolve one `${...}` expression to text.
fn resolve_placeholder(expr: &str, scope: &Scope) -> std::result::Result<String, String> {
    if let Some(caps) = ENV_EXPR.captures(expr) {
        let name = &caps[1];
        return match std::env::var(name) {
            Ok(value) => Ok(value),
            Err(_) => match caps.get(2) {
                Some(default) => Ok(default.as_str().to_string()),
                None => Err(format!("environment variable '{}' is not set", name)),
            },
        };
    }

    if PURE_PATH.is_match(expr) {
        return match resolve_path(scope, expr) {
            Some(value) => Ok(value_to_string(value)),
            None => Err(format!("unresolved template variable '{}'", expr)),
        };
    }

    // Anything richer goes through tera as an expression.
    let translated = translate_boolean_ops(expr);
    let context = tera_context(scope);
    Tera::one_off(&format!("{{{{ {} }}}}", translated), &context, false)
        .map_err(|e| flatten_tera_error(&e))
}

/// Look up a dotted path. Flat keys containing dots (`project.root`) win
/// over structural descent.
fn resolve_path<'a>(scope: &'a Scope, path: &str) -> Option<&'a Value> {
    if let Some(value) = scope.get(path) {
        return Some(value);
    }
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = scope.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Natural string form: strings verbatim, scalars via display, structured
/// values as JSON.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn tera_context(scope: &Scope) -> Context {
    let mut context = Context::new();
    for (key, value) in scope {
        // Dotted flat keys are served by resolve_path, not tera.
        if !key.contains('.') {
            context.insert(key, value);
        }
    }
    context
}

/// `&&`/`||`/`!` into tera's `and`/`or`/`not`, leaving `!=` intact.
fn translate_boolean_ops(expr: &str) -> String {
    let mut out = String::with_capacity(expr.len() + 8);
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '&' if chars.get(i + 1) == Some(&'&') => {
                out.push_str(" and ");
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                out.push_str(" or ");
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                out.push_str("!=");
                i += 2;
            }
            '!' => {
                out.push_str(" not ");
                i += 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Predicate scope: stringly-typed plan variables become booleans and
/// numbers where they parse as such, so `migrate_db && count > 3` works
/// over YAML string variables.
fn coerce_for_predicates(scope: &Scope) -> Scope {
    scope
        .iter()
        .map(|(key, value)| {
            let coerced = match value {
                Value::String(s) => match s.as_str() {
                    "true" => Value::Bool(true),
                    "false" => Value::Bool(false),
                    other => {
                        if let Ok(i) = other.parse::<i64>() {
                            Value::from(i)
                        } else if let Ok(f) = other.parse::<f64>() {
                            Value::from(f)
                        } else {
                            value.clone()
                        }
                    }
                },
                other => other.clone(),
            };
            (key.clone(), coerced)
        })
        .collect()
}

fn flatten_tera_error(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = std::error::Error::source(cause);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope(pairs: &[(&str, Value)]) -> Scope {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_simple_substitution() {
        let scope = scope(&[("name", json!("World"))]);
        assert_eq!(
            TemplateEngine::render("Hello ${name}!", &scope).unwrap(),
            "Hello World!"
        );
    }

    #[test]
    fn test_dotted_path_into_object() {
        let scope = scope(&[("current_item", json!({"simpleName": "CartBean"}))]);
        assert_eq!(
            TemplateEngine::render("class=${current_item.simpleName}", &scope).unwrap(),
            "class=CartBean"
        );
    }

    #[test]
    fn test_flat_dotted_key_wins() {
        let scope = scope(&[("project.root", json!("/work/app"))]);
        assert_eq!(
            TemplateEngine::render("${project.root}/pom.xml", &scope).unwrap(),
            "/work/app/pom.xml"
        );
    }

    #[test]
    fn test_strict_render_fails_on_unknown() {
        let scope = Scope::new();
        assert!(TemplateEngine::render("v=${missing}", &scope).is_err());
    }

    #[test]
    fn test_lenient_render_preserves_original() {
        let scope = Scope::new();
        let original = "version=${project.version}";
        assert_eq!(
            TemplateEngine::render_lenient(original, &scope),
            original
        );
    }

    #[test]
    fn test_list_renders_as_json() {
        let scope = scope(&[("ids", json!(["a.X", "a.Y"]))]);
        assert_eq!(
            TemplateEngine::render("${ids}", &scope).unwrap(),
            r#"["a.X","a.Y"]"#
        );
    }

    #[test]
    fn test_tera_iteration() {
        let scope = scope(&[("beans", json!([{"id": "a.X"}, {"id": "a.Y"}]))]);
        let rendered = TemplateEngine::render(
            "{% for bean in beans %}- {{ bean.id }}\n{% endfor %}",
            &scope,
        )
        .unwrap();
        assert_eq!(rendered, "- a.X\n- a.Y\n");
    }

    #[test]
    fn test_tera_conditional() {
        let scope = scope(&[("enabled", json!(true))]);
        let rendered =
            TemplateEngine::render("{% if enabled %}on{% else %}off{% endif %}", &scope).unwrap();
        assert_eq!(rendered, "on");
    }

    #[test]
    fn test_env_variable() {
        std::env::set_var("ARCHLIFT_TEST_ENV", "42");
        let scope = Scope::new();
        assert_eq!(
            TemplateEngine::render("${env.ARCHLIFT_TEST_ENV}", &scope).unwrap(),
            "42"
        );
        assert_eq!(
            TemplateEngine::render("${env.ARCHLIFT_UNSET:-fallback}", &scope).unwrap(),
            "fallback"
        );
        assert!(TemplateEngine::render("${env.ARCHLIFT_UNSET}", &scope).is_err());
    }

    #[test]
    fn test_predicates() {
        let scope = scope(&[
            ("migrate_db", json!("true")),
            ("backup_enabled", json!("false")),
            ("count", json!("5")),
        ]);
        assert!(TemplateEngine::eval_predicate("migrate_db", &scope));
        assert!(!TemplateEngine::eval_predicate(
            "migrate_db && backup_enabled",
            &scope
        ));
        assert!(TemplateEngine::eval_predicate(
            "migrate_db || backup_enabled",
            &scope
        ));
        assert!(TemplateEngine::eval_predicate("!backup_enabled", &scope));
        assert!(TemplateEngine::eval_predicate("(1==1)", &scope));
        assert!(TemplateEngine::eval_predicate("count > 3", &scope));
        assert!(!TemplateEngine::eval_predicate("count != 5", &scope));
    }

    #[test]
    fn test_predicate_error_is_false() {
        let scope = Scope::new();
        assert!(!TemplateEngine::eval_predicate("no_such_var", &scope));
        assert!(!TemplateEngine::eval_predicate("((broken", &scope));
    }

    #[test]
    fn test_translate_boolean_ops() {
        assert_eq!(translate_boolean_ops("a && b"), "a  and  b");
        assert_eq!(translate_boolean_ops("a || !b"), "a  or   not b");
        assert_eq!(translate_boolean_ops("a != b"), "a != b");
    }
}
