//! Variable substitution in node attributes.
//!
//! # Syntax
//! - `{N}`: capture N of the nearest result map
//! - `{key}`: named entry of the nearest result map (action results)
//! - `{../N}`, `{../../key}`: climb one enclosing map per `../`
//! - `{module:key}`: delegated to a registered input module
//! - `\{` and `\}` escape braces; any other backslash is kept verbatim
//!
//! # Design Decisions
//! - Templates are parsed and modules looked up once, at build time
//! - Substituted text is never re-scanned
//! - Absent values become `""` unless the attribute is mandatory

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::environment::Environment;
use crate::routing::context::ResultStack;
use crate::routing::types::{SitemapError, SitemapResult};

/// A named provider of values, e.g. request parameters or headers.
pub trait InputModule: Send + Sync + fmt::Debug {
    fn value(&self, key: &str, env: &dyn Environment) -> Option<String>;
}

/// `{request-param:name}`
#[derive(Debug, Default)]
pub struct RequestParamModule;

impl InputModule for RequestParamModule {
    fn value(&self, key: &str, env: &dyn Environment) -> Option<String> {
        env.parameter(key)
    }
}

/// `{header:name}`
#[derive(Debug, Default)]
pub struct HeaderModule;

impl InputModule for HeaderModule {
    fn value(&self, key: &str, env: &dyn Environment) -> Option<String> {
        env.header(key)
    }
}

/// `{attribute:name}`
#[derive(Debug, Default)]
pub struct AttributeModule;

impl InputModule for AttributeModule {
    fn value(&self, key: &str, env: &dyn Environment) -> Option<String> {
        env.attribute(key)
    }
}

/// `{env:NAME}`, the process environment.
#[derive(Debug, Default)]
pub struct ProcessEnvModule;

impl InputModule for ProcessEnvModule {
    fn value(&self, key: &str, _env: &dyn Environment) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Input modules by name. Consulted only while building the tree.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn InputModule>>,
}

impl ModuleRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `request-param`, `header`, `attribute` and `env`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("request-param", Arc::new(RequestParamModule));
        registry.register("header", Arc::new(HeaderModule));
        registry.register("attribute", Arc::new(AttributeModule));
        registry.register("env", Arc::new(ProcessEnvModule));
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, module: Arc<dyn InputModule>) {
        self.modules.insert(name.into(), module);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn InputModule>> {
        self.modules.get(name).cloned()
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Text(String),
    /// Entry `key` of the map `levels` above the nearest one.
    Stack { levels: usize, key: String, expr: String },
    Module {
        module: Arc<dyn InputModule>,
        key: String,
        expr: String,
    },
}

/// A compiled attribute template.
#[derive(Debug, Clone)]
pub struct VariableResolver {
    template: String,
    segments: Vec<Segment>,
    mandatory: bool,
}

impl VariableResolver {
    /// Parse `template`, binding `{module:key}` references against `modules`.
    pub fn compile(template: &str, modules: &ModuleRegistry) -> SitemapResult<Self> {
        let syntax = |reason: &str| SitemapError::PatternSyntax {
            pattern: template.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut text = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '\\' if matches!(chars.peek(), Some('{') | Some('}')) => {
                    if let Some(escaped) = chars.next() {
                        text.push(escaped);
                    }
                }
                '{' => {
                    let mut expr = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') => return Err(syntax("nested '{' in variable")),
                            Some(ch) => expr.push(ch),
                            None => return Err(syntax("unclosed '{'")),
                        }
                    }
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(Self::parse_expr(&expr, modules).map_err(|e| match e {
                        SitemapError::PatternSyntax { reason, .. } => syntax(&reason),
                        other => other,
                    })?);
                }
                '}' => return Err(syntax("unbalanced '}'")),
                other => text.push(other),
            }
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        Ok(Self {
            template: template.to_string(),
            segments,
            mandatory: false,
        })
    }

    fn parse_expr(expr: &str, modules: &ModuleRegistry) -> SitemapResult<Segment> {
        let syntax = |reason: &str| SitemapError::PatternSyntax {
            pattern: expr.to_string(),
            reason: reason.to_string(),
        };

        if let Some((name, key)) = expr.split_once(':') {
            if name.is_empty() {
                return Err(syntax("empty module name"));
            }
            let module = modules
                .get(name)
                .ok_or_else(|| SitemapError::UnresolvedModule(name.to_string()))?;
            return Ok(Segment::Module {
                module,
                key: key.to_string(),
                expr: expr.to_string(),
            });
        }

        let mut rest = expr;
        let mut levels = 0;
        while let Some(stripped) = rest.strip_prefix("../") {
            levels += 1;
            rest = stripped;
        }
        if rest.is_empty() {
            return Err(syntax("empty variable"));
        }
        Ok(Segment::Stack {
            levels,
            key: rest.to_string(),
            expr: expr.to_string(),
        })
    }

    /// A resolver that always yields `text`.
    pub fn literal(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            segments: vec![Segment::Text(text.clone())],
            template: text,
            mandatory: false,
        }
    }

    /// Fail with `MissingVariable` instead of substituting `""`.
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// True when no placeholder needs resolving.
    pub fn is_literal(&self) -> bool {
        self.segments.iter().all(|s| matches!(s, Segment::Text(_)))
    }

    /// The text with escapes removed, if no placeholder needs resolving.
    pub fn literal_text(&self) -> Option<String> {
        let mut out = String::with_capacity(self.template.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                _ => return None,
            }
        }
        Some(out)
    }

    pub fn resolve(&self, stack: &ResultStack, env: &dyn Environment) -> SitemapResult<String> {
        let mut out = String::with_capacity(self.template.len());
        for segment in &self.segments {
            let (value, expr) = match segment {
                Segment::Text(text) => {
                    out.push_str(text);
                    continue;
                }
                Segment::Stack { levels, key, expr } => (
                    stack.nearest(*levels).and_then(|map| map.get(key)).cloned(),
                    expr,
                ),
                Segment::Module { module, key, expr } => (module.value(key, env), expr),
            };
            match value {
                Some(v) => out.push_str(&v),
                None if self.mandatory => {
                    return Err(SitemapError::MissingVariable(expr.clone()));
                }
                None => {}
            }
        }
        Ok(out)
    }
}

impl fmt::Display for VariableResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::RequestEnvironment;
    use crate::routing::types::ResultMap;

    fn map(pairs: &[(&str, &str)]) -> ResultMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn compile(template: &str) -> VariableResolver {
        VariableResolver::compile(template, &ModuleRegistry::with_defaults()).unwrap()
    }

    #[test]
    fn test_positional_capture() {
        let mut stack = ResultStack::default();
        stack.push(map(&[("0", "/docs/intro.html"), ("1", "intro")]));
        let env = RequestEnvironment::new("/docs/intro.html");

        let resolved = compile("content/{1}.xml").resolve(&stack, &env).unwrap();
        assert_eq!(resolved, "content/intro.xml");
    }

    #[test]
    fn test_parent_levels() {
        let mut stack = ResultStack::default();
        stack.push(map(&[("1", "outer")]));
        stack.push(map(&[("1", "inner"), ("user", "ann")]));
        let env = RequestEnvironment::new("/");

        let resolved = compile("{1}-{../1}-{user}").resolve(&stack, &env).unwrap();
        assert_eq!(resolved, "inner-outer-ann");
    }

    #[test]
    fn test_modules() {
        let env = RequestEnvironment::new("/")
            .with_parameter("lang", "de")
            .with_header("Accept", "text/html")
            .with_attribute("skin", "dark");
        let resolved = compile("{request-param:lang}|{header:accept}|{attribute:skin}")
            .resolve(&ResultStack::default(), &env)
            .unwrap();
        assert_eq!(resolved, "de|text/html|dark");
    }

    #[test]
    fn test_missing_values() {
        let env = RequestEnvironment::new("/");
        let stack = ResultStack::default();

        assert_eq!(compile("a{1}b").resolve(&stack, &env).unwrap(), "ab");
        assert_eq!(
            compile("{request-param:nope}").resolve(&stack, &env).unwrap(),
            ""
        );

        let err = compile("a{1}b").mandatory().resolve(&stack, &env).unwrap_err();
        assert!(matches!(err, SitemapError::MissingVariable(ref v) if v == "1"));
    }

    #[test]
    fn test_unknown_module() {
        let err = VariableResolver::compile("{cookie:id}", &ModuleRegistry::with_defaults())
            .unwrap_err();
        assert!(matches!(err, SitemapError::UnresolvedModule(ref m) if m == "cookie"));
    }

    #[test]
    fn test_not_rescanned() {
        let env = RequestEnvironment::new("/").with_parameter("q", "{1}");
        let mut stack = ResultStack::default();
        stack.push(map(&[("1", "secret")]));

        let resolved = compile("{request-param:q}").resolve(&stack, &env).unwrap();
        assert_eq!(resolved, "{1}");
    }

    #[test]
    fn test_escapes_and_syntax_errors() {
        let env = RequestEnvironment::new("/");
        let stack = ResultStack::default();
        let resolver = compile("\\{1\\} /a/\\*");
        assert!(resolver.is_literal());
        assert_eq!(resolver.literal_text().as_deref(), Some("{1} /a/\\*"));
        assert!(compile("a{1}").literal_text().is_none());
        assert_eq!(resolver.resolve(&stack, &env).unwrap(), "{1} /a/\\*");

        for bad in ["{1", "a}b", "{}", "{a{b}}", "{:x}"] {
            assert!(
                matches!(
                    VariableResolver::compile(bad, &ModuleRegistry::new()),
                    Err(SitemapError::PatternSyntax { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }
}
