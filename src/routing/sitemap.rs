//! The compiled sitemap and its per-request entry point.

use std::collections::HashMap;
use std::sync::Arc;

use crate::components::{ComponentManager, ComponentPool};
use crate::config::schema::{RoutingSettings, SitemapConfig};
use crate::environment::Environment;
use crate::lifecycle::CancelToken;
use crate::routing::builder::SitemapBuilder;
use crate::routing::context::{Completion, InvocationContext};
use crate::routing::node::{Node, Resource, View};
use crate::routing::types::{Outcome, SitemapResult};

/// Immutable processing tree shared by all requests.
#[derive(Debug)]
pub struct Sitemap {
    root: Node,
    views: HashMap<String, Arc<View>>,
    resources: HashMap<String, Resource>,
    pool: Arc<dyn ComponentPool>,
    settings: RoutingSettings,
}

impl Sitemap {
    /// Build with the default input modules.
    pub fn build(config: &SitemapConfig, pool: Arc<dyn ComponentPool>) -> SitemapResult<Self> {
        SitemapBuilder::new(pool).build(config)
    }

    /// Build against a `ComponentManager` made from the configured components.
    pub fn from_config(config: &SitemapConfig) -> SitemapResult<Self> {
        let pool = ComponentManager::from_config(&config.components)?;
        Self::build(config, Arc::new(pool))
    }

    pub(crate) fn from_parts(
        root: Node,
        views: HashMap<String, Arc<View>>,
        resources: HashMap<String, Resource>,
        pool: Arc<dyn ComponentPool>,
        settings: RoutingSettings,
    ) -> Self {
        Self {
            root,
            views,
            resources,
            pool,
            settings,
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn pool(&self) -> &dyn ComponentPool {
        self.pool.as_ref()
    }

    pub fn settings(&self) -> &RoutingSettings {
        &self.settings
    }

    pub fn view(&self, name: &str) -> Option<&Arc<View>> {
        self.views.get(name)
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.get(name)
    }

    /// Fresh context for `env`, with the view and action it asks for.
    pub fn new_context(&self, env: &dyn Environment, cancel: CancelToken) -> InvocationContext {
        let mut ctx = InvocationContext::new(cancel);

        if let Some(name) = env.parameter(&self.settings.view_parameter).filter(|n| !n.is_empty()) {
            match self.views.get(&name) {
                Some(view) => ctx = ctx.with_view(view.clone()),
                None => tracing::warn!(view = %name, "Ignoring unknown view"),
            }
        }
        if let Some(action) = env.parameter(&self.settings.action_parameter).filter(|a| !a.is_empty()) {
            ctx = ctx.with_requested_action(action);
        }
        ctx
    }

    /// Walk the tree for one request.
    pub fn invoke(&self, env: &mut dyn Environment, ctx: &mut InvocationContext) -> SitemapResult<Outcome> {
        let outcome = self.root.invoke(env, ctx, self)?;
        tracing::debug!(uri = %env.uri(), outcome = ?outcome, "Sitemap invoked");
        Ok(outcome)
    }

    /// Create a context, invoke, and finish it.
    pub fn process(&self, env: &mut dyn Environment, cancel: CancelToken) -> SitemapResult<Completion> {
        let mut ctx = self.new_context(&*env, cancel);
        self.invoke(env, &mut ctx)?;
        Ok(ctx.finish())
    }
}
