//! External component interfaces.
//!
//! # Data Flow
//! ```text
//! Act / Select / Call node
//!     → ComponentGuard::acquire(pool, role, type)   (may block)
//!     → invoke Action / Selector / FlowInterpreter
//!     → guard dropped → pool.release(handle)        (every exit path)
//! ```
//!
//! # Design Decisions
//! - The core never constructs components; a `ComponentPool` hands them out
//! - Generators, transformers, serializers and readers are only declared:
//!   the routing core records them in the pipeline, the caller runs them
//! - Release is tied to `Drop`, so errors and panics release too

pub mod builtin;
pub mod pool;

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::Serialize;

use crate::environment::Environment;
use crate::pipeline::Redirector;
use crate::routing::types::{BoxError, Parameters, ResultMap, Role, SitemapError, SitemapResult};

pub use pool::ComponentManager;

/// Conditionally contributes a result map and gates its children.
pub trait Action: Send + Sync {
    /// `Ok(None)` means the action did not apply.
    fn act(
        &self,
        env: &mut dyn Environment,
        source: Option<&str>,
        parameters: &Parameters,
    ) -> Result<Option<ResultMap>, BoxError>;
}

/// Evaluates `when` tests of a select node.
pub trait Selector: Send + Sync {
    fn select(
        &self,
        test: &str,
        env: &dyn Environment,
        parameters: &Parameters,
    ) -> Result<bool, BoxError>;
}

/// A positional argument passed to a flow function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Argument {
    pub name: String,
    pub value: String,
}

/// Scripted controller invoked by call nodes.
///
/// Every successful call must leave a redirect or continuation on the
/// redirector.
pub trait FlowInterpreter: Send + Sync {
    fn call_function(
        &self,
        function: &str,
        arguments: &[Argument],
        env: &mut dyn Environment,
        redirector: &mut Redirector,
    ) -> Result<(), BoxError>;

    fn resume_continuation(
        &self,
        continuation_id: &str,
        env: &mut dyn Environment,
        redirector: &mut Redirector,
    ) -> Result<(), BoxError>;
}

/// Static facts about a declared component type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentInfo {
    /// Default mime type (serializers, readers).
    pub mime_type: Option<String>,
    /// View label attached to every use of this type.
    pub label: Option<String>,
    /// Parameters configured on the type itself.
    pub parameters: Parameters,
}

/// An acquired component instance.
#[derive(Clone)]
pub enum Component {
    Action(Arc<dyn Action>),
    Selector(Arc<dyn Selector>),
    Flow(Arc<dyn FlowInterpreter>),
    /// A pipeline stage type, executed by the caller.
    Declared,
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Component::Action(_) => "Action",
            Component::Selector(_) => "Selector",
            Component::Flow(_) => "Flow",
            Component::Declared => "Declared",
        };
        f.write_str(kind)
    }
}

/// What `ComponentPool::acquire` hands out and `release` takes back.
#[derive(Debug)]
pub struct ComponentHandle {
    pub role: Role,
    pub type_name: String,
    pub component: Component,
}

/// Pooled lifecycle manager for components.
pub trait ComponentPool: Send + Sync + fmt::Debug {
    /// Hand out an instance. May block.
    fn acquire(&self, role: Role, type_name: &str) -> SitemapResult<ComponentHandle>;

    /// Take an instance back. Called exactly once per successful acquire.
    fn release(&self, handle: ComponentHandle);

    /// Facts about a declared type, `None` if the type is unknown.
    fn describe(&self, role: Role, type_name: &str) -> Option<ComponentInfo>;

    /// Type used when a node does not name one.
    fn default_type(&self, role: Role) -> Option<String>;
}

/// Scoped acquisition: releases on drop.
pub struct ComponentGuard<'a> {
    pool: &'a dyn ComponentPool,
    handle: ComponentHandle,
}

impl<'a> ComponentGuard<'a> {
    pub fn acquire(pool: &'a dyn ComponentPool, role: Role, type_name: &str) -> SitemapResult<Self> {
        let handle = pool.acquire(role, type_name)?;
        Ok(Self { pool, handle })
    }

    fn mismatch(&self) -> SitemapError {
        SitemapError::UnknownComponentRole {
            role: self.role,
            type_name: self.type_name.clone(),
        }
    }

    pub fn action(&self) -> SitemapResult<&dyn Action> {
        match &self.component {
            Component::Action(action) => Ok(action.as_ref()),
            _ => Err(self.mismatch()),
        }
    }

    pub fn selector(&self) -> SitemapResult<&dyn Selector> {
        match &self.component {
            Component::Selector(selector) => Ok(selector.as_ref()),
            _ => Err(self.mismatch()),
        }
    }

    pub fn flow(&self) -> SitemapResult<&dyn FlowInterpreter> {
        match &self.component {
            Component::Flow(flow) => Ok(flow.as_ref()),
            _ => Err(self.mismatch()),
        }
    }
}

impl Deref for ComponentGuard<'_> {
    type Target = ComponentHandle;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl Drop for ComponentGuard<'_> {
    fn drop(&mut self) {
        let placeholder = ComponentHandle {
            role: self.handle.role,
            type_name: String::new(),
            component: Component::Declared,
        };
        let handle = std::mem::replace(&mut self.handle, placeholder);
        self.pool.release(handle);
    }
}
