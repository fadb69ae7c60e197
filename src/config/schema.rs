//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router,
//! including the routing descriptor tree consumed by the builder.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::pipeline::RedirectKind;
use crate::routing::types::Parameters;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SitemapConfig {
    /// HTTP adapter settings.
    pub server: ServerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Routing behaviour knobs.
    pub settings: RoutingSettings,

    /// Declared component types.
    pub components: ComponentsConfig,

    /// Named alternate subtrees that intercept pipeline finalization.
    pub views: Vec<ViewConfig>,

    /// Named subtrees invoked by call nodes.
    pub resources: Vec<ResourceConfig>,

    /// Named groups of actions.
    pub action_sets: Vec<ActionSetConfig>,

    /// Top-level pipeline sections, tried in order.
    pub pipelines: Vec<PipelineConfig>,
}

/// HTTP adapter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout (total time for routing a request) in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            max_body_size: 64 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Request parameters and attributes the tree reacts to.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingSettings {
    /// Request parameter selecting a view.
    pub view_parameter: String,

    /// Request parameter selecting action-set members.
    pub action_parameter: String,

    /// Environment attribute that turns on link translation.
    pub link_translation_attribute: String,

    /// Environment attribute that turns on link gathering.
    pub link_gathering_attribute: String,

    /// Deepest allowed nesting of resource calls.
    pub max_call_depth: usize,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            view_parameter: "cocoon-view".to_string(),
            action_parameter: "cocoon-action".to_string(),
            link_translation_attribute: "link-translation".to_string(),
            link_gathering_attribute: "link-gathering".to_string(),
            max_call_depth: 32,
        }
    }
}

/// Component declarations by role.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ComponentsConfig {
    pub generators: Vec<ComponentConfig>,
    pub transformers: Vec<ComponentConfig>,
    pub serializers: Vec<ComponentConfig>,
    pub readers: Vec<ComponentConfig>,
    pub selectors: Vec<ComponentConfig>,
    pub actions: Vec<ComponentConfig>,
    pub flows: Vec<ComponentConfig>,
}

/// One declared component type.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ComponentConfig {
    /// Type name nodes refer to.
    pub name: String,

    /// Built-in implementation (selectors, actions and flows).
    #[serde(default)]
    pub implementation: Option<String>,

    /// Default mime type (serializers, readers).
    #[serde(default)]
    pub mime_type: Option<String>,

    /// View label attached to every use of this type.
    #[serde(default)]
    pub label: Option<String>,

    /// Use this type when a node names none.
    #[serde(default)]
    pub default: bool,

    /// Maximum concurrent acquisitions.
    #[serde(default)]
    pub max_instances: Option<usize>,

    #[serde(default)]
    pub parameters: Parameters,
}

/// Where a view branches off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewPosition {
    /// Right after the generator.
    First,
    /// In place of the serializer.
    Last,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ViewConfig {
    pub name: String,
    #[serde(default)]
    pub from_label: Option<String>,
    #[serde(default)]
    pub from_position: Option<ViewPosition>,
    #[serde(default)]
    pub children: Vec<NodeConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResourceConfig {
    pub name: String,
    #[serde(default)]
    pub children: Vec<NodeConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActionSetConfig {
    pub name: String,
    #[serde(default)]
    pub actions: Vec<ActionSetMember>,
}

/// One action inside an action set.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActionSetMember {
    #[serde(rename = "type")]
    pub kind: String,
    /// Only run when the request's action parameter equals this.
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub parameters: Parameters,
}

/// A top-level pipeline section.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    /// Skipped for external requests.
    pub internal_only: bool,
    /// Compute a cache key for pipelines finalized inside this section.
    pub cacheable: bool,
    pub expires_secs: Option<u64>,
    /// Subtree run when this section fails.
    pub handle_errors: Option<Vec<NodeConfig>>,
    pub children: Vec<NodeConfig>,
}

/// The routing descriptor tree.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum NodeConfig {
    Match(MatchConfig),
    Select(SelectConfig),
    Act(ActConfig),
    Generate(StageConfig),
    Transform(StageConfig),
    Serialize(SerializeConfig),
    Read(ReadConfig),
    Call(CallConfig),
    Redirect(RedirectConfig),
}

impl NodeConfig {
    /// Short name used in locations.
    pub fn tag(&self) -> &'static str {
        match self {
            NodeConfig::Match(_) => "match",
            NodeConfig::Select(_) => "select",
            NodeConfig::Act(_) => "act",
            NodeConfig::Generate(_) => "generate",
            NodeConfig::Transform(_) => "transform",
            NodeConfig::Serialize(_) => "serialize",
            NodeConfig::Read(_) => "read",
            NodeConfig::Call(_) => "call",
            NodeConfig::Redirect(_) => "redirect",
        }
    }

    /// Location override supplied by whatever produced the descriptor.
    pub fn location(&self) -> Option<&str> {
        let location = match self {
            NodeConfig::Match(c) => &c.location,
            NodeConfig::Select(c) => &c.location,
            NodeConfig::Act(c) => &c.location,
            NodeConfig::Generate(c) | NodeConfig::Transform(c) => &c.location,
            NodeConfig::Serialize(c) => &c.location,
            NodeConfig::Read(c) => &c.location,
            NodeConfig::Call(c) => &c.location,
            NodeConfig::Redirect(c) => &c.location,
        };
        location.as_deref()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MatchConfig {
    pub pattern: String,
    /// Value to match; the request URI when absent.
    pub value: Option<String>,
    pub location: Option<String>,
    pub children: Vec<NodeConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SelectConfig {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub parameters: Parameters,
    pub when: Vec<WhenConfig>,
    pub otherwise: Option<Vec<NodeConfig>>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WhenConfig {
    pub test: String,
    #[serde(default)]
    pub children: Vec<NodeConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ActConfig {
    /// Single action type.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Action set name, instead of `type`.
    pub set: Option<String>,
    pub src: Option<String>,
    pub parameters: Parameters,
    pub location: Option<String>,
    pub children: Vec<NodeConfig>,
}

/// Generate and transform nodes.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StageConfig {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub src: Option<String>,
    pub parameters: Parameters,
    pub labels: Vec<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SerializeConfig {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub mime_type: Option<String>,
    pub status_code: Option<String>,
    pub parameters: Parameters,
    pub labels: Vec<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ReadConfig {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub src: Option<String>,
    pub mime_type: Option<String>,
    pub status_code: Option<String>,
    pub parameters: Parameters,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CallConfig {
    /// Named resource to invoke.
    pub resource: Option<String>,
    /// Flow function to call.
    pub function: Option<String>,
    /// Continuation to resume; wins over `function` when non-empty.
    pub continuation: Option<String>,
    /// Flow interpreter type; the pool default when absent.
    pub flow: Option<String>,
    /// Resource parameters, or function arguments in declared order.
    pub arguments: Vec<ArgumentConfig>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArgumentConfig {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RedirectConfig {
    pub uri: String,
    pub redirect_kind: RedirectKind,
    pub location: Option<String>,
}
