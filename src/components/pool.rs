//! Component pool management.
//!
//! # Responsibilities
//! - Hold declared component types grouped by role
//! - Hand out shared instances, enforcing per-type instance limits
//! - Track active acquisitions so leaks are observable

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::components::builtin;
use crate::components::{
    Action, Component, ComponentHandle, ComponentInfo, ComponentPool, FlowInterpreter, Selector,
};
use crate::config::schema::{ComponentConfig, ComponentsConfig};
use crate::routing::types::{Role, SitemapError, SitemapResult};

#[derive(Debug)]
struct Slot {
    info: ComponentInfo,
    component: Component,
    max_instances: usize,
    active: AtomicUsize,
}

impl Slot {
    fn new(info: ComponentInfo, component: Component) -> Self {
        Self {
            info,
            component,
            max_instances: usize::MAX,
            active: AtomicUsize::new(0),
        }
    }

    /// Reserve one instance unless the limit is reached.
    fn try_reserve(&self) -> bool {
        let mut prev = self.active.load(Ordering::Relaxed);
        loop {
            if prev >= self.max_instances {
                return false;
            }
            match self.active.compare_exchange_weak(prev, prev + 1, Ordering::AcqRel, Ordering::Relaxed) {
                Ok(_) => return true,
                Err(x) => prev = x,
            }
        }
    }
}

/// Reference pool: one shared instance per declared type.
#[derive(Debug, Default)]
pub struct ComponentManager {
    slots: HashMap<(Role, String), Slot>,
    defaults: HashMap<Role, String>,
}

impl ComponentManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configuration, instantiating built-in actions, selectors and flows.
    pub fn from_config(config: &ComponentsConfig) -> SitemapResult<Self> {
        let mut manager = Self::new();

        let declared = [
            (Role::Generator, &config.generators),
            (Role::Transformer, &config.transformers),
            (Role::Serializer, &config.serializers),
            (Role::Reader, &config.readers),
        ];
        for (role, entries) in declared {
            for entry in entries {
                manager.insert(role, entry, Component::Declared)?;
            }
        }
        for entry in &config.selectors {
            let selector = builtin::selector(entry)?;
            manager.insert(Role::Selector, entry, Component::Selector(selector))?;
        }
        for entry in &config.actions {
            let action = builtin::action(entry)?;
            manager.insert(Role::Action, entry, Component::Action(action))?;
        }
        for entry in &config.flows {
            let flow = builtin::flow(entry)?;
            manager.insert(Role::Flow, entry, Component::Flow(flow))?;
        }

        tracing::debug!(types = manager.slots.len(), "Component types registered");
        Ok(manager)
    }

    fn insert(&mut self, role: Role, entry: &ComponentConfig, component: Component) -> SitemapResult<()> {
        let info = ComponentInfo {
            mime_type: entry.mime_type.clone(),
            label: entry.label.clone(),
            parameters: entry.parameters.clone(),
        };
        let key = (role, entry.name.clone());
        if self.slots.contains_key(&key) {
            return Err(SitemapError::DuplicateName {
                kind: "component",
                name: entry.name.clone(),
            });
        }
        let mut slot = Slot::new(info, component);
        if let Some(max) = entry.max_instances {
            slot.max_instances = max;
        }
        self.slots.insert(key, slot);
        if entry.default || !self.defaults.contains_key(&role) {
            self.defaults.insert(role, entry.name.clone());
        }
        Ok(())
    }

    fn register(&mut self, role: Role, name: &str, info: ComponentInfo, component: Component) {
        self.slots.insert((role, name.to_string()), Slot::new(info, component));
        self.defaults.entry(role).or_insert_with(|| name.to_string());
    }

    /// Declare a pipeline stage type (generator, transformer, serializer, reader).
    pub fn declare(&mut self, role: Role, name: &str, info: ComponentInfo) -> &mut Self {
        self.register(role, name, info, Component::Declared);
        self
    }

    pub fn register_action(&mut self, name: &str, action: Arc<dyn Action>) -> &mut Self {
        self.register_action_with(name, ComponentInfo::default(), action)
    }

    /// Register an action whose type carries default parameters.
    pub fn register_action_with(&mut self, name: &str, info: ComponentInfo, action: Arc<dyn Action>) -> &mut Self {
        self.register(Role::Action, name, info, Component::Action(action));
        self
    }

    pub fn register_selector(&mut self, name: &str, selector: Arc<dyn Selector>) -> &mut Self {
        self.register(Role::Selector, name, ComponentInfo::default(), Component::Selector(selector));
        self
    }

    pub fn register_flow(&mut self, name: &str, flow: Arc<dyn FlowInterpreter>) -> &mut Self {
        self.register(Role::Flow, name, ComponentInfo::default(), Component::Flow(flow));
        self
    }

    /// Make `name` the type used when a node omits one.
    pub fn set_default(&mut self, role: Role, name: &str) -> &mut Self {
        self.defaults.insert(role, name.to_string());
        self
    }

    /// Cap concurrent acquisitions of one type.
    pub fn limit(&mut self, role: Role, name: &str, max_instances: usize) -> &mut Self {
        if let Some(slot) = self.slots.get_mut(&(role, name.to_string())) {
            slot.max_instances = max_instances;
        }
        self
    }

    /// Instances currently acquired and not yet released.
    pub fn active(&self, role: Role, name: &str) -> usize {
        self.slots
            .get(&(role, name.to_string()))
            .map_or(0, |slot| slot.active.load(Ordering::Acquire))
    }
}

impl ComponentPool for ComponentManager {
    fn acquire(&self, role: Role, type_name: &str) -> SitemapResult<ComponentHandle> {
        let slot = self
            .slots
            .get(&(role, type_name.to_string()))
            .ok_or_else(|| SitemapError::UnknownComponentRole {
                role,
                type_name: type_name.to_string(),
            })?;

        if !slot.try_reserve() {
            tracing::warn!(role = %role, type_name = %type_name, max = slot.max_instances, "Component pool exhausted");
            return Err(SitemapError::component(
                role,
                type_name,
                format!("pool exhausted ({} instances in use)", slot.max_instances).into(),
            ));
        }

        Ok(ComponentHandle {
            role,
            type_name: type_name.to_string(),
            component: slot.component.clone(),
        })
    }

    fn release(&self, handle: ComponentHandle) {
        match self.slots.get(&(handle.role, handle.type_name)) {
            Some(slot) => {
                slot.active.fetch_sub(1, Ordering::AcqRel);
            }
            None => tracing::warn!(role = %handle.role, "Released a component the pool does not own"),
        }
    }

    fn describe(&self, role: Role, type_name: &str) -> Option<ComponentInfo> {
        self.slots
            .get(&(role, type_name.to_string()))
            .map(|slot| slot.info.clone())
    }

    fn default_type(&self, role: Role) -> Option<String> {
        self.defaults.get(&role).cloned()
    }
}
