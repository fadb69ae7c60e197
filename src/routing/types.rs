//! Routing-specific types and error definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed error returned by external components.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias used throughout the routing core.
pub type SitemapResult<T> = Result<T, SitemapError>;

/// Ordered name/value parameters handed to components and stages.
pub type Parameters = BTreeMap<String, String>;

/// Map produced by a successful action, or any other keyed result pushed
/// onto the invocation context's result stack.
pub type ResultMap = BTreeMap<String, String>;

/// Where a node was declared, for diagnostics.
///
/// Copied into errors instead of referencing the node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location(Arc<str>);

impl Location {
    pub fn new(tag: impl Into<Arc<str>>) -> Self {
        Self(tag.into())
    }

    /// Location of a child node, e.g. `pipelines[0]/match[2]`.
    pub fn child(&self, segment: impl fmt::Display) -> Self {
        Self(format!("{}/{}", self.0, segment).into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of invoking a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The request was completed (pipeline finalized, redirect or call recorded).
    Handled,
    /// Nothing matched below this node; siblings may proceed.
    NotHandled,
}

impl Outcome {
    pub fn is_handled(self) -> bool {
        matches!(self, Outcome::Handled)
    }
}

/// Component roles known to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Generator,
    Transformer,
    Serializer,
    Reader,
    Action,
    Selector,
    Flow,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Generator => "generator",
            Role::Transformer => "transformer",
            Role::Serializer => "serializer",
            Role::Reader => "reader",
            Role::Action => "action",
            Role::Selector => "selector",
            Role::Flow => "flow",
        };
        f.write_str(name)
    }
}

/// Errors raised while building or invoking the processing tree.
#[derive(Debug, Error)]
pub enum SitemapError {
    /// Malformed wildcard pattern or variable template.
    #[error("invalid pattern '{pattern}': {reason}")]
    PatternSyntax { pattern: String, reason: String },

    /// `{module:key}` referenced a module that is not registered.
    #[error("unresolved input module '{0}'")]
    UnresolvedModule(String),

    /// A mandatory attribute resolved to nothing.
    #[error("missing value for mandatory variable '{0}'")]
    MissingVariable(String),

    /// The descriptor references a component type the pool does not know.
    #[error("unknown {role} type '{type_name}'")]
    UnknownComponentRole { role: Role, type_name: String },

    /// A call references a resource that is not declared.
    #[error("unknown resource '{0}'")]
    UnknownResource(String),

    /// A node is missing a required attribute or combines exclusive ones.
    #[error("invalid {kind} node: {reason}")]
    InvalidNode { kind: &'static str, reason: String },

    /// Two declarations share a name.
    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    /// An external component failed.
    #[error("{role} '{type_name}' failed: {source}")]
    ComponentInvocation {
        role: Role,
        type_name: String,
        #[source]
        source: BoxError,
    },

    /// A call completed without recording a redirect or continuation.
    #[error("call to '{0}' produced no redirect or continuation")]
    NoResponseProduced(String),

    /// Pipeline or redirect invariant violated.
    #[error("pipeline state error: {0}")]
    PipelineState(String),

    /// Resource calls nested deeper than the configured limit.
    #[error("resource call depth exceeded {0}")]
    RecursionLimit(usize),

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,

    /// Any of the above, annotated with the node it escaped from.
    #[error("{source} (at {location})")]
    Located {
        location: Location,
        #[source]
        source: Box<SitemapError>,
    },
}

impl SitemapError {
    pub fn pipeline_state(msg: impl Into<String>) -> Self {
        SitemapError::PipelineState(msg.into())
    }

    pub fn component(role: Role, type_name: impl Into<String>, source: BoxError) -> Self {
        SitemapError::ComponentInvocation {
            role,
            type_name: type_name.into(),
            source,
        }
    }

    /// Annotate with `location` unless an inner node already did.
    pub fn at(self, location: &Location) -> Self {
        match self {
            located @ SitemapError::Located { .. } => located,
            cancelled @ SitemapError::Cancelled => cancelled,
            other => SitemapError::Located {
                location: location.clone(),
                source: Box::new(other),
            },
        }
    }

    /// Location of the innermost failing node, if known.
    pub fn location(&self) -> Option<&Location> {
        match self {
            SitemapError::Located { location, .. } => Some(location),
            _ => None,
        }
    }

    /// The error without its location wrapper.
    pub fn root(&self) -> &SitemapError {
        match self {
            SitemapError::Located { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), SitemapError::Cancelled)
    }
}
