//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (calls reference declared resources,
//!   act nodes reference declared action sets)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Detect duplicate names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SitemapConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - Component types are not checked here; the builder asks the pool

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{ComponentConfig, NodeConfig, SitemapConfig};

/// One semantic problem, with the config path it was found at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Check `config`, collecting every problem.
pub fn validate_config(config: &SitemapConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a socket address", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be greater than 0"));
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", config.observability.log_level),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    let settings = &config.settings;
    if settings.view_parameter.is_empty() {
        errors.push(ValidationError::new("settings.view_parameter", "must not be empty"));
    }
    if settings.action_parameter.is_empty() {
        errors.push(ValidationError::new("settings.action_parameter", "must not be empty"));
    }
    if settings.max_call_depth == 0 {
        errors.push(ValidationError::new("settings.max_call_depth", "must be greater than 0"));
    }

    let components = &config.components;
    let roles: [(&str, &[ComponentConfig], bool); 7] = [
        ("generators", &components.generators, false),
        ("transformers", &components.transformers, false),
        ("serializers", &components.serializers, false),
        ("readers", &components.readers, false),
        ("selectors", &components.selectors, true),
        ("actions", &components.actions, true),
        ("flows", &components.flows, true),
    ];
    for (role, entries, needs_implementation) in roles {
        validate_components(role, entries, needs_implementation, &mut errors);
    }

    let mut view_names = HashSet::new();
    for (i, view) in config.views.iter().enumerate() {
        let path = format!("views[{}]", i);
        if view.name.is_empty() {
            errors.push(ValidationError::new(&path, "name must not be empty"));
        } else if !view_names.insert(view.name.as_str()) {
            errors.push(ValidationError::new(&path, format!("duplicate view '{}'", view.name)));
        }
        if view.from_label.is_some() == view.from_position.is_some() {
            errors.push(ValidationError::new(
                &path,
                "exactly one of from_label and from_position is required",
            ));
        }
    }

    let mut resource_names = HashSet::new();
    for (i, resource) in config.resources.iter().enumerate() {
        if !resource_names.insert(resource.name.as_str()) {
            errors.push(ValidationError::new(
                format!("resources[{}]", i),
                format!("duplicate resource '{}'", resource.name),
            ));
        }
    }

    let mut set_names = HashSet::new();
    for (i, set) in config.action_sets.iter().enumerate() {
        let path = format!("action_sets[{}]", i);
        if !set_names.insert(set.name.as_str()) {
            errors.push(ValidationError::new(&path, format!("duplicate action set '{}'", set.name)));
        }
        for (j, member) in set.actions.iter().enumerate() {
            if member.kind.is_empty() {
                errors.push(ValidationError::new(format!("{}.actions[{}]", path, j), "type must not be empty"));
            }
        }
    }

    let names = Names {
        resources: &resource_names,
        action_sets: &set_names,
    };
    for (i, view) in config.views.iter().enumerate() {
        validate_nodes(&view.children, &format!("views[{}]", i), &names, &mut errors);
    }
    for (i, resource) in config.resources.iter().enumerate() {
        validate_nodes(&resource.children, &format!("resources[{}]", i), &names, &mut errors);
    }
    for (i, pipeline) in config.pipelines.iter().enumerate() {
        let path = format!("pipelines[{}]", i);
        if pipeline.expires_secs.is_some() && !pipeline.cacheable {
            errors.push(ValidationError::new(&path, "expires_secs requires cacheable = true"));
        }
        validate_nodes(&pipeline.children, &path, &names, &mut errors);
        if let Some(handler) = &pipeline.handle_errors {
            validate_nodes(handler, &format!("{}.handle_errors", path), &names, &mut errors);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_components(
    role: &str,
    entries: &[ComponentConfig],
    needs_implementation: bool,
    errors: &mut Vec<ValidationError>,
) {
    let mut seen = HashSet::new();
    let mut defaults = 0;
    for (i, entry) in entries.iter().enumerate() {
        let path = format!("components.{}[{}]", role, i);
        if entry.name.is_empty() {
            errors.push(ValidationError::new(&path, "name must not be empty"));
        } else if !seen.insert(entry.name.as_str()) {
            errors.push(ValidationError::new(&path, format!("duplicate type '{}'", entry.name)));
        }
        if needs_implementation && entry.implementation.is_none() {
            errors.push(ValidationError::new(&path, "implementation is required"));
        }
        if entry.max_instances == Some(0) {
            errors.push(ValidationError::new(&path, "max_instances must be greater than 0"));
        }
        if entry.default {
            defaults += 1;
        }
    }
    if defaults > 1 {
        errors.push(ValidationError::new(
            format!("components.{}", role),
            "more than one default type",
        ));
    }
}

struct Names<'a> {
    resources: &'a HashSet<&'a str>,
    action_sets: &'a HashSet<&'a str>,
}

fn validate_nodes(nodes: &[NodeConfig], parent: &str, names: &Names<'_>, errors: &mut Vec<ValidationError>) {
    for (i, node) in nodes.iter().enumerate() {
        let path = format!("{}.children[{}]", parent, i);
        match node {
            NodeConfig::Match(m) => validate_nodes(&m.children, &path, names, errors),
            NodeConfig::Select(s) => {
                if s.when.is_empty() && s.otherwise.is_none() {
                    errors.push(ValidationError::new(&path, "select needs a when or otherwise branch"));
                }
                for (j, when) in s.when.iter().enumerate() {
                    validate_nodes(&when.children, &format!("{}.when[{}]", path, j), names, errors);
                }
                if let Some(otherwise) = &s.otherwise {
                    validate_nodes(otherwise, &format!("{}.otherwise", path), names, errors);
                }
            }
            NodeConfig::Act(a) => {
                match (&a.kind, &a.set) {
                    (Some(_), Some(_)) => {
                        errors.push(ValidationError::new(&path, "type and set are exclusive"));
                    }
                    (None, Some(set)) if !names.action_sets.contains(set.as_str()) => {
                        errors.push(ValidationError::new(&path, format!("unknown action set '{}'", set)));
                    }
                    _ => {}
                }
                validate_nodes(&a.children, &path, names, errors);
            }
            NodeConfig::Call(c) => {
                let flow = c.function.is_some() || c.continuation.is_some();
                match &c.resource {
                    Some(_) if flow => {
                        errors.push(ValidationError::new(&path, "resource excludes function and continuation"));
                    }
                    Some(resource) if !names.resources.contains(resource.as_str()) => {
                        errors.push(ValidationError::new(&path, format!("unknown resource '{}'", resource)));
                    }
                    None if !flow => {
                        errors.push(ValidationError::new(
                            &path,
                            "one of resource, function or continuation is required",
                        ));
                    }
                    _ => {}
                }
            }
            NodeConfig::Redirect(r) => {
                if r.uri.is_empty() {
                    errors.push(ValidationError::new(&path, "uri must not be empty"));
                }
            }
            NodeConfig::Serialize(s) => {
                if let Some(status) = &s.status_code {
                    if !status.contains('{') && status.trim().parse::<u16>().is_err() {
                        errors.push(ValidationError::new(&path, format!("invalid status code '{}'", status)));
                    }
                }
            }
            NodeConfig::Generate(_) | NodeConfig::Transform(_) | NodeConfig::Read(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> SitemapConfig {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&SitemapConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let config = parse(
            r#"
            [server]
            bind_address = "nowhere"
            request_timeout_secs = 0

            [[views]]
            name = "content"

            [[pipelines]]
            expires_secs = 60

            [[pipelines.children]]
            kind = "call"
            resource = "missing"

            [[pipelines.children]]
            kind = "act"
            set = "login"
            "#,
        );
        let errors = validate_config(&config).unwrap_err();
        let paths: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "server.bind_address",
                "server.request_timeout_secs",
                "views[0]",
                "pipelines[0]",
                "pipelines[0].children[0]",
                "pipelines[0].children[1]",
            ]
        );
    }

    #[test]
    fn test_component_rules() {
        let config = parse(
            r#"
            [[components.selectors]]
            name = "param"

            [[components.serializers]]
            name = "html"
            default = true
            [[components.serializers]]
            name = "html"
            default = true
            "#,
        );
        let errors = validate_config(&config).unwrap_err();
        let messages: Vec<_> = errors.iter().map(ToString::to_string).collect();
        assert!(messages.contains(&"components.serializers[1]: duplicate type 'html'".to_string()));
        assert!(messages.contains(&"components.serializers: more than one default type".to_string()));
        assert!(messages.contains(&"components.selectors[0]: implementation is required".to_string()));
    }

    #[test]
    fn test_nested_nodes_checked() {
        let config = parse(
            r#"
            [[resources]]
            name = "page"

            [[pipelines]]
            [[pipelines.children]]
            kind = "match"
            pattern = "*"

            [[pipelines.children.children]]
            kind = "call"
            resource = "page"

            [[pipelines.children.children]]
            kind = "serialize"
            status_code = "abc"
            "#,
        );
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "pipelines[0].children[0].children[1]");
    }
}
