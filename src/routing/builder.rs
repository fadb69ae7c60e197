//! Compile the descriptor tree into an immutable node tree.
//!
//! # Data Flow
//! ```text
//! SitemapConfig (already parsed and validated)
//!     → action sets, resource names, views (name checks)
//!     → nodes: component types checked against the pool,
//!       templates parsed, literal patterns compiled
//!     → Sitemap (shared read-only by every request)
//! ```
//!
//! # Design Decisions
//! - Everything that can fail at build fails here, located at the node
//! - Component types are validated through `ComponentPool::describe`

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::components::{ComponentInfo, ComponentPool};
use crate::config::schema::{
    ActConfig, CallConfig, MatchConfig, NodeConfig, ReadConfig, SelectConfig, SerializeConfig,
    SitemapConfig, StageConfig, ViewPosition,
};
use crate::routing::context::CachePolicy;
use crate::routing::node::{
    ActNode, ActTarget, ActionCall, ActionSet, ActionSetMember, CallNode, FlowCall, MatchNode,
    Node, NodeKind, ParameterTemplates, PatternSource, ReadNode, RedirectNode, Resource,
    Section, SelectCase, SelectNode, SequenceNode, SerializeNode, StageNode, View, ViewFrom,
};
use crate::routing::sitemap::Sitemap;
use crate::routing::types::{Location, Parameters, Role, SitemapError, SitemapResult};
use crate::routing::variables::{ModuleRegistry, VariableResolver};
use crate::routing::wildcard::WildcardPattern;

/// Builds a [`Sitemap`] against a component pool and input modules.
#[derive(Debug)]
pub struct SitemapBuilder {
    pool: Arc<dyn ComponentPool>,
    modules: ModuleRegistry,
}

impl SitemapBuilder {
    /// Builder with the default input modules.
    pub fn new(pool: Arc<dyn ComponentPool>) -> Self {
        Self {
            pool,
            modules: ModuleRegistry::with_defaults(),
        }
    }

    pub fn with_modules(mut self, modules: ModuleRegistry) -> Self {
        self.modules = modules;
        self
    }

    pub fn build(&self, config: &SitemapConfig) -> SitemapResult<Sitemap> {
        let mut compiler = Compiler {
            pool: self.pool.as_ref(),
            modules: &self.modules,
            resource_names: HashSet::new(),
            action_sets: HashMap::new(),
        };

        for set in &config.action_sets {
            let location = Location::new(format!("action-sets[{}]", set.name));
            if compiler.action_sets.contains_key(&set.name) {
                return Err(duplicate("action set", &set.name).at(&location));
            }
            let members = set
                .actions
                .iter()
                .map(|member| {
                    Ok(ActionSetMember {
                        action: member.action.clone(),
                        call: compiler.action_call(Some(&member.kind), &member.src, &member.parameters)?,
                    })
                })
                .collect::<SitemapResult<Vec<_>>>()
                .map_err(|e| e.at(&location))?;
            compiler.action_sets.insert(
                set.name.clone(),
                Arc::new(ActionSet {
                    name: set.name.clone(),
                    members,
                }),
            );
        }

        // Names first so resources may call each other.
        for resource in &config.resources {
            if !compiler.resource_names.insert(resource.name.clone()) {
                return Err(duplicate("resource", &resource.name));
            }
        }
        let mut resources = HashMap::new();
        for resource in &config.resources {
            let location = Location::new(format!("resources[{}]", resource.name));
            let children = compiler.children(&resource.children, &location)?;
            resources.insert(
                resource.name.clone(),
                Resource {
                    name: resource.name.clone(),
                    children,
                    location,
                },
            );
        }

        let mut views = HashMap::new();
        for view in &config.views {
            let location = Location::new(format!("views[{}]", view.name));
            if views.contains_key(&view.name) {
                return Err(duplicate("view", &view.name).at(&location));
            }
            let from = match (&view.from_label, view.from_position) {
                (Some(label), None) => ViewFrom::Label(label.clone()),
                (None, Some(ViewPosition::First)) => ViewFrom::First,
                (None, Some(ViewPosition::Last)) => ViewFrom::Last,
                _ => {
                    return Err(SitemapError::InvalidNode {
                        kind: "view",
                        reason: "exactly one of from_label and from_position is required".into(),
                    }
                    .at(&location))
                }
            };
            let children = compiler.children(&view.children, &location)?;
            views.insert(
                view.name.clone(),
                Arc::new(View {
                    name: view.name.clone(),
                    from,
                    children,
                    location,
                }),
            );
        }

        let sections = config
            .pipelines
            .iter()
            .enumerate()
            .map(|(index, pipeline)| {
                let location = Location::new(format!("pipelines[{}]", index));
                let handle_errors = pipeline
                    .handle_errors
                    .as_ref()
                    .map(|nodes| compiler.children(nodes, &location.child("handle-errors")))
                    .transpose()?;
                let section = Section {
                    internal_only: pipeline.internal_only,
                    cache: pipeline.cacheable.then_some(CachePolicy {
                        expires_secs: pipeline.expires_secs,
                    }),
                    handle_errors,
                };
                let children = compiler.children(&pipeline.children, &location)?;
                Ok(Node::new(
                    location,
                    NodeKind::Sequence(SequenceNode {
                        children,
                        section: Some(section),
                    }),
                ))
            })
            .collect::<SitemapResult<Vec<_>>>()?;

        let root = Node::new(
            Location::new("pipelines"),
            NodeKind::Sequence(SequenceNode {
                children: sections,
                section: None,
            }),
        );

        tracing::info!(
            pipelines = config.pipelines.len(),
            views = views.len(),
            resources = resources.len(),
            action_sets = compiler.action_sets.len(),
            "Sitemap built"
        );

        Ok(Sitemap::from_parts(
            root,
            views,
            resources,
            self.pool.clone(),
            config.settings.clone(),
        ))
    }
}

fn duplicate(kind: &'static str, name: &str) -> SitemapError {
    SitemapError::DuplicateName {
        kind,
        name: name.to_string(),
    }
}

fn invalid(kind: &'static str, reason: impl Into<String>) -> SitemapError {
    SitemapError::InvalidNode {
        kind,
        reason: reason.into(),
    }
}

struct Compiler<'a> {
    pool: &'a dyn ComponentPool,
    modules: &'a ModuleRegistry,
    resource_names: HashSet<String>,
    action_sets: HashMap<String, Arc<ActionSet>>,
}

impl Compiler<'_> {
    fn children(&self, configs: &[NodeConfig], parent: &Location) -> SitemapResult<Vec<Node>> {
        configs
            .iter()
            .enumerate()
            .map(|(index, config)| {
                let location = match config.location() {
                    Some(declared) => Location::new(declared),
                    None => parent.child(format!("{}[{}]", config.tag(), index)),
                };
                self.node(config, &location).map_err(|e| e.at(&location))
            })
            .collect()
    }

    fn node(&self, config: &NodeConfig, location: &Location) -> SitemapResult<Node> {
        let kind = match config {
            NodeConfig::Match(c) => NodeKind::Match(self.match_node(c, location)?),
            NodeConfig::Select(c) => NodeKind::Select(self.select_node(c, location)?),
            NodeConfig::Act(c) => NodeKind::Act(self.act_node(c, location)?),
            NodeConfig::Generate(c) => NodeKind::Generate(self.stage_node(Role::Generator, c)?),
            NodeConfig::Transform(c) => NodeKind::Transform(self.stage_node(Role::Transformer, c)?),
            NodeConfig::Serialize(c) => NodeKind::Serialize(self.serialize_node(c)?),
            NodeConfig::Read(c) => NodeKind::Read(self.read_node(c)?),
            NodeConfig::Call(c) => NodeKind::Call(self.call_node(c)?),
            NodeConfig::Redirect(c) => {
                if c.uri.is_empty() {
                    return Err(invalid("redirect", "uri is required"));
                }
                NodeKind::Redirect(RedirectNode {
                    target: self.template(&c.uri)?,
                    kind: c.redirect_kind,
                })
            }
        };
        Ok(Node::new(location.clone(), kind))
    }

    fn template(&self, text: &str) -> SitemapResult<VariableResolver> {
        VariableResolver::compile(text, self.modules)
    }

    fn opt_template(&self, text: &Option<String>) -> SitemapResult<Option<VariableResolver>> {
        text.as_deref().map(|t| self.template(t)).transpose()
    }

    fn parameters(&self, defaults: Parameters, parameters: &Parameters) -> SitemapResult<ParameterTemplates> {
        let entries = parameters
            .iter()
            .map(|(name, value)| Ok((name.clone(), self.template(value)?)))
            .collect::<SitemapResult<Vec<_>>>()?;
        Ok(ParameterTemplates::new(defaults, entries))
    }

    /// Named type, or the pool default for `role`, checked against the pool.
    fn component(&self, role: Role, kind: Option<&str>) -> SitemapResult<(String, ComponentInfo)> {
        let type_name = match kind {
            Some(kind) => kind.to_string(),
            None => self
                .pool
                .default_type(role)
                .ok_or_else(|| SitemapError::UnknownComponentRole {
                    role,
                    type_name: "(default)".to_string(),
                })?,
        };
        let info = self
            .pool
            .describe(role, &type_name)
            .ok_or_else(|| SitemapError::UnknownComponentRole {
                role,
                type_name: type_name.clone(),
            })?;
        Ok((type_name, info))
    }

    fn match_node(&self, c: &MatchConfig, location: &Location) -> SitemapResult<MatchNode> {
        let template = self.template(&c.pattern)?;
        let pattern = match template.literal_text() {
            Some(text) => PatternSource::Compiled(WildcardPattern::compile(&text)?),
            None => PatternSource::Templated(template),
        };
        Ok(MatchNode {
            pattern,
            value: self.opt_template(&c.value)?,
            children: self.children(&c.children, location)?,
        })
    }

    fn select_node(&self, c: &SelectConfig, location: &Location) -> SitemapResult<SelectNode> {
        let (type_name, info) = self.component(Role::Selector, c.kind.as_deref())?;
        let cases = c
            .when
            .iter()
            .enumerate()
            .map(|(index, when)| {
                Ok(SelectCase {
                    test: self.template(&when.test)?,
                    children: self.children(&when.children, &location.child(format!("when[{}]", index)))?,
                })
            })
            .collect::<SitemapResult<Vec<_>>>()?;
        let otherwise = c
            .otherwise
            .as_ref()
            .map(|nodes| self.children(nodes, &location.child("otherwise")))
            .transpose()?;

        Ok(SelectNode {
            parameters: self.parameters(info.parameters, &c.parameters)?,
            type_name,
            cases,
            otherwise,
        })
    }

    fn action_call(
        &self,
        kind: Option<&str>,
        source: &Option<String>,
        parameters: &Parameters,
    ) -> SitemapResult<ActionCall> {
        let (type_name, info) = self.component(Role::Action, kind)?;
        Ok(ActionCall {
            type_name,
            source: self.opt_template(source)?,
            parameters: self.parameters(info.parameters, parameters)?,
        })
    }

    fn act_node(&self, c: &ActConfig, location: &Location) -> SitemapResult<ActNode> {
        let target = match (&c.kind, &c.set) {
            (Some(_), Some(_)) => return Err(invalid("act", "type and set are exclusive")),
            (_, Some(name)) => ActTarget::Set {
                set: self
                    .action_sets
                    .get(name)
                    .cloned()
                    .ok_or_else(|| invalid("act", format!("unknown action set '{}'", name)))?,
                parameters: self.parameters(Parameters::new(), &c.parameters)?,
            },
            (kind, None) => ActTarget::Action(self.action_call(kind.as_deref(), &c.src, &c.parameters)?),
        };
        Ok(ActNode {
            target,
            children: self.children(&c.children, location)?,
        })
    }

    fn stage_node(&self, role: Role, c: &StageConfig) -> SitemapResult<StageNode> {
        let (type_name, info) = self.component(role, c.kind.as_deref())?;
        let mut labels = c.labels.clone();
        labels.extend(info.label);
        Ok(StageNode {
            type_name,
            source: self.opt_template(&c.src)?,
            parameters: self.parameters(info.parameters, &c.parameters)?,
            labels,
        })
    }

    fn serialize_node(&self, c: &SerializeConfig) -> SitemapResult<SerializeNode> {
        let (type_name, info) = self.component(Role::Serializer, c.kind.as_deref())?;
        let mut labels = c.labels.clone();
        labels.extend(info.label);
        Ok(SerializeNode {
            type_name,
            mime_type: self.opt_template(&c.mime_type)?,
            default_mime_type: info.mime_type,
            status_code: self.opt_template(&c.status_code)?,
            parameters: self.parameters(info.parameters, &c.parameters)?,
            labels,
        })
    }

    fn read_node(&self, c: &ReadConfig) -> SitemapResult<ReadNode> {
        let (type_name, info) = self.component(Role::Reader, c.kind.as_deref())?;
        Ok(ReadNode {
            type_name,
            source: self.opt_template(&c.src)?,
            mime_type: self.opt_template(&c.mime_type)?,
            default_mime_type: info.mime_type,
            status_code: self.opt_template(&c.status_code)?,
            parameters: self.parameters(info.parameters, &c.parameters)?,
        })
    }

    fn call_node(&self, c: &CallConfig) -> SitemapResult<CallNode> {
        let arguments = c
            .arguments
            .iter()
            .map(|a| Ok((a.name.clone(), self.template(&a.value)?)))
            .collect::<SitemapResult<Vec<_>>>()?;

        match (&c.resource, c.function.is_some() || c.continuation.is_some()) {
            (Some(name), false) => {
                if !self.resource_names.contains(name) {
                    return Err(SitemapError::UnknownResource(name.clone()));
                }
                Ok(CallNode::Resource {
                    name: name.clone(),
                    parameters: ParameterTemplates::new(Parameters::new(), arguments),
                })
            }
            (None, true) => {
                let (flow_type, _) = self.component(Role::Flow, c.flow.as_deref())?;
                Ok(CallNode::Flow(FlowCall {
                    flow_type,
                    function: self.opt_template(&c.function)?.map(VariableResolver::mandatory),
                    continuation: self.opt_template(&c.continuation)?,
                    arguments,
                }))
            }
            (Some(_), true) => Err(invalid("call", "resource excludes function and continuation")),
            (None, false) => Err(invalid("call", "one of resource, function or continuation is required")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ComponentManager;

    fn pool() -> Arc<dyn ComponentPool> {
        let mut manager = ComponentManager::new();
        manager
            .declare(Role::Generator, "file", ComponentInfo::default())
            .declare(Role::Transformer, "xslt", ComponentInfo::default())
            .declare(
                Role::Serializer,
                "html",
                ComponentInfo {
                    mime_type: Some("text/html".into()),
                    ..ComponentInfo::default()
                },
            );
        Arc::new(manager)
    }

    fn build(toml_text: &str) -> SitemapResult<Sitemap> {
        let config: SitemapConfig = toml::from_str(toml_text).unwrap();
        SitemapBuilder::new(pool()).build(&config)
    }

    #[test]
    fn test_unknown_component_is_located() {
        let err = build(
            r#"
            [[pipelines]]
            [[pipelines.children]]
            kind = "match"
            pattern = "*"
            [[pipelines.children.children]]
            kind = "generate"
            type = "sql"
            "#,
        )
        .unwrap_err();
        assert!(matches!(
            err.root(),
            SitemapError::UnknownComponentRole { role: Role::Generator, .. }
        ));
        assert_eq!(
            err.location().map(Location::as_str),
            Some("pipelines[0]/match[0]/generate[0]")
        );
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let err = build(
            r#"
            [[pipelines]]
            [[pipelines.children]]
            kind = "match"
            pattern = "/a/\\x"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err.root(), SitemapError::PatternSyntax { .. }));
    }

    #[test]
    fn test_duplicate_views_rejected() {
        let err = build(
            r#"
            [[views]]
            name = "content"
            from_position = "first"
            [[views]]
            name = "content"
            from_position = "last"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err.root(), SitemapError::DuplicateName { kind: "view", .. }));
    }

    #[test]
    fn test_unknown_resource_rejected() {
        let err = build(
            r#"
            [[pipelines]]
            [[pipelines.children]]
            kind = "call"
            resource = "missing"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err.root(), SitemapError::UnknownResource(_)));
    }

    #[test]
    fn test_unresolved_module_rejected() {
        let err = build(
            r#"
            [[pipelines]]
            [[pipelines.children]]
            kind = "generate"
            src = "{cookie:session}"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err.root(), SitemapError::UnresolvedModule(_)));
    }

    #[test]
    fn test_default_types_and_labels() {
        let sitemap = build(
            r#"
            [[pipelines]]
            [[pipelines.children]]
            kind = "serialize"
            labels = ["page"]
            "#,
        )
        .unwrap();
        let NodeKind::Sequence(root) = sitemap.root().kind() else {
            panic!("root is a sequence");
        };
        let NodeKind::Sequence(section) = root.children[0].kind() else {
            panic!("section is a sequence");
        };
        match section.children[0].kind() {
            NodeKind::Serialize(node) => {
                assert_eq!(node.type_name, "html");
                assert_eq!(node.default_mime_type.as_deref(), Some("text/html"));
                assert_eq!(node.labels, vec!["page".to_string()]);
            }
            other => panic!("unexpected node {other:?}"),
        }
    }
}
