//! Processing node tree.
//!
//! # Responsibilities
//! - Walk the compiled tree depth-first for one request
//! - Gate subtrees on pattern matches, selector tests and action results
//! - Feed pipeline stages to the assembler and record redirects
//!
//! # Design Decisions
//! - Closed enum with one `invoke` per variant, immutable after build
//! - Every error leaving a node carries the innermost node's location
//! - Cancellation is checked before each node runs
//! - Components are held only while they run; guards release on every exit

use std::sync::Arc;

use crate::components::{Argument, ComponentGuard, ComponentPool};
use crate::environment::Environment;
use crate::pipeline::{OutputDescriptor, RedirectKind, StageDescriptor};
use crate::routing::context::{CachePolicy, InvocationContext, ViewState};
use crate::routing::sitemap::Sitemap;
use crate::routing::types::{
    Location, Outcome, Parameters, ResultMap, Role, SitemapError, SitemapResult,
};
use crate::routing::variables::VariableResolver;
use crate::routing::wildcard::WildcardPattern;

/// Transformer inserted when the link-translation attribute is set.
pub const LINK_TRANSLATOR: &str = "link-translator";

/// Transformer inserted when the link-gathering attribute is set.
pub const LINK_GATHERER: &str = "link-gatherer";

/// One compiled node and where it was declared.
#[derive(Debug)]
pub struct Node {
    location: Location,
    kind: NodeKind,
}

#[derive(Debug)]
pub enum NodeKind {
    Sequence(SequenceNode),
    Match(MatchNode),
    Select(SelectNode),
    Act(ActNode),
    Generate(StageNode),
    Transform(StageNode),
    Serialize(SerializeNode),
    Read(ReadNode),
    Call(CallNode),
    Redirect(RedirectNode),
}

impl Node {
    pub fn new(location: Location, kind: NodeKind) -> Self {
        Self { location, kind }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Run this node for one request.
    pub fn invoke(
        &self,
        env: &mut dyn Environment,
        ctx: &mut InvocationContext,
        sitemap: &Sitemap,
    ) -> SitemapResult<Outcome> {
        ctx.check_cancelled()?;

        let result = match &self.kind {
            NodeKind::Sequence(node) => node.invoke(env, ctx, sitemap),
            NodeKind::Match(node) => node.invoke(env, ctx, sitemap),
            NodeKind::Select(node) => node.invoke(env, ctx, sitemap),
            NodeKind::Act(node) => node.invoke(env, ctx, sitemap),
            NodeKind::Generate(node) => node.generate(env, ctx, &self.location),
            NodeKind::Transform(node) => node.transform(env, ctx, &self.location),
            NodeKind::Serialize(node) => node.invoke(env, ctx, sitemap),
            NodeKind::Read(node) => node.invoke(env, ctx),
            NodeKind::Call(node) => node.invoke(env, ctx, sitemap),
            NodeKind::Redirect(node) => node.invoke(env, ctx),
        };

        let outcome = result.map_err(|e| e.at(&self.location))?;
        tracing::trace!(location = %self.location, outcome = ?outcome, "Node invoked");
        Ok(outcome)
    }
}

/// Invoke `children` in order until one handles the request.
pub fn invoke_sequence(
    children: &[Node],
    env: &mut dyn Environment,
    ctx: &mut InvocationContext,
    sitemap: &Sitemap,
) -> SitemapResult<Outcome> {
    for child in children {
        if child.invoke(env, ctx, sitemap)?.is_handled() {
            return Ok(Outcome::Handled);
        }
    }
    Ok(Outcome::NotHandled)
}

/// Named parameters whose values may reference captures and modules.
#[derive(Debug, Clone, Default)]
pub struct ParameterTemplates {
    /// Configured on the component type; overridden by `entries`.
    defaults: Parameters,
    entries: Vec<(String, VariableResolver)>,
}

impl ParameterTemplates {
    pub fn new(defaults: Parameters, entries: Vec<(String, VariableResolver)>) -> Self {
        Self { defaults, entries }
    }

    /// Resolve `entries` over `defaults`; an entry resolving to `""` keeps a
    /// non-empty default.
    pub fn resolve(&self, env: &dyn Environment, ctx: &InvocationContext) -> SitemapResult<Parameters> {
        let mut entries = Parameters::new();
        for (name, value) in &self.entries {
            entries.insert(name.clone(), value.resolve(ctx.results(), env)?);
        }
        let mut resolved = self.defaults.clone();
        merge_parameters(&mut resolved, &entries);
        Ok(resolved)
    }
}

fn resolve_opt(
    template: &Option<VariableResolver>,
    env: &dyn Environment,
    ctx: &InvocationContext,
) -> SitemapResult<Option<String>> {
    template
        .as_ref()
        .map(|t| t.resolve(ctx.results(), env))
        .transpose()
}

/// Parse a resolved status attribute. Garbage keeps the default status.
fn parse_status(
    template: &Option<VariableResolver>,
    env: &dyn Environment,
    ctx: &InvocationContext,
) -> SitemapResult<Option<u16>> {
    let Some(raw) = resolve_opt(template, env, ctx)? else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<u16>() {
        Ok(0) => Ok(None),
        Ok(status) => Ok(Some(status)),
        Err(e) => {
            tracing::warn!(status_code = %raw, error = %e, "Ignoring unparsable status code");
            Ok(None)
        }
    }
}

/// Environment attributes act as flags unless empty, "false" or "0".
fn flag(env: &dyn Environment, attribute: &str) -> bool {
    env.attribute(attribute)
        .is_some_and(|v| !v.is_empty() && v != "false" && v != "0")
}

/// Caller parameters override member parameters unless the caller's value is
/// empty and the member's is not.
pub fn merge_parameters(member: &mut Parameters, caller: &Parameters) {
    for (name, value) in caller {
        let keep_member = value.is_empty() && member.get(name).is_some_and(|v| !v.is_empty());
        if !keep_member {
            member.insert(name.clone(), value.clone());
        }
    }
}

/// Ordered children, optionally with the options of a top-level pipeline section.
#[derive(Debug)]
pub struct SequenceNode {
    pub children: Vec<Node>,
    pub section: Option<Section>,
}

/// Options of a `[[pipelines]]` entry.
#[derive(Debug, Default)]
pub struct Section {
    pub internal_only: bool,
    pub cache: Option<CachePolicy>,
    pub handle_errors: Option<Vec<Node>>,
}

impl SequenceNode {
    fn invoke(
        &self,
        env: &mut dyn Environment,
        ctx: &mut InvocationContext,
        sitemap: &Sitemap,
    ) -> SitemapResult<Outcome> {
        let Some(section) = &self.section else {
            return invoke_sequence(&self.children, env, ctx, sitemap);
        };
        if section.internal_only && env.is_external() {
            return Ok(Outcome::NotHandled);
        }

        let result = ctx.with_cache_policy(section.cache, |ctx| {
            invoke_sequence(&self.children, env, ctx, sitemap)
        });

        match (result, &section.handle_errors) {
            (Err(error), Some(handler))
                if !error.is_cancelled() && !ctx.redirector().has_response() =>
            {
                tracing::warn!(error = %error, "Pipeline failed, running error handler");
                ctx.reset_pipeline();
                let info = ResultMap::from([
                    ("message".to_string(), error.root().to_string()),
                    (
                        "location".to_string(),
                        error.location().map(ToString::to_string).unwrap_or_default(),
                    ),
                ]);
                match ctx.with_results(info, |ctx| invoke_sequence(handler, env, ctx, sitemap))? {
                    Outcome::Handled => Ok(Outcome::Handled),
                    Outcome::NotHandled => Err(error),
                }
            }
            (result, _) => result,
        }
    }
}

/// What a match node compares its input against.
#[derive(Debug)]
pub enum PatternSource {
    Compiled(WildcardPattern),
    /// Pattern containing placeholders, compiled per request.
    Templated(VariableResolver),
}

#[derive(Debug)]
pub struct MatchNode {
    pub pattern: PatternSource,
    /// Matched instead of the request URI when present.
    pub value: Option<VariableResolver>,
    pub children: Vec<Node>,
}

impl MatchNode {
    fn invoke(
        &self,
        env: &mut dyn Environment,
        ctx: &mut InvocationContext,
        sitemap: &Sitemap,
    ) -> SitemapResult<Outcome> {
        let input = match &self.value {
            Some(value) => value.resolve(ctx.results(), &*env)?,
            None => env.uri().to_string(),
        };

        let templated;
        let pattern = match &self.pattern {
            PatternSource::Compiled(pattern) => pattern,
            PatternSource::Templated(template) => {
                templated = WildcardPattern::compile(&template.resolve(ctx.results(), &*env)?)?;
                &templated
            }
        };

        let Some(result) = pattern.matches(&input) else {
            return Ok(Outcome::NotHandled);
        };
        tracing::debug!(pattern = %pattern.source(), input = %input, "Pattern matched");
        ctx.with_results(result.into_map(), |ctx| {
            invoke_sequence(&self.children, env, ctx, sitemap)
        })
    }
}

#[derive(Debug)]
pub struct SelectCase {
    pub test: VariableResolver,
    pub children: Vec<Node>,
}

#[derive(Debug)]
pub struct SelectNode {
    pub type_name: String,
    pub parameters: ParameterTemplates,
    pub cases: Vec<SelectCase>,
    pub otherwise: Option<Vec<Node>>,
}

impl SelectNode {
    /// Index of the first case whose test the selector accepts.
    fn choose(
        &self,
        env: &dyn Environment,
        ctx: &InvocationContext,
        pool: &dyn ComponentPool,
    ) -> SitemapResult<Option<usize>> {
        let guard = ComponentGuard::acquire(pool, Role::Selector, &self.type_name)?;
        let selector = guard.selector()?;
        let parameters = self.parameters.resolve(env, ctx)?;

        for (index, case) in self.cases.iter().enumerate() {
            let test = case.test.resolve(ctx.results(), env)?;
            let selected = selector
                .select(&test, env, &parameters)
                .map_err(|e| SitemapError::component(Role::Selector, &self.type_name, e))?;
            if selected {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    fn invoke(
        &self,
        env: &mut dyn Environment,
        ctx: &mut InvocationContext,
        sitemap: &Sitemap,
    ) -> SitemapResult<Outcome> {
        match self.choose(&*env, ctx, sitemap.pool())? {
            Some(index) => invoke_sequence(&self.cases[index].children, env, ctx, sitemap),
            None => match &self.otherwise {
                Some(children) => invoke_sequence(children, env, ctx, sitemap),
                None => Ok(Outcome::NotHandled),
            },
        }
    }
}

/// One action invocation with its attributes.
#[derive(Debug)]
pub struct ActionCall {
    pub type_name: String,
    pub source: Option<VariableResolver>,
    pub parameters: ParameterTemplates,
}

impl ActionCall {
    fn run(
        &self,
        env: &mut dyn Environment,
        ctx: &InvocationContext,
        pool: &dyn ComponentPool,
        caller: Option<&Parameters>,
    ) -> SitemapResult<Option<ResultMap>> {
        let source = resolve_opt(&self.source, &*env, ctx)?;
        let mut parameters = self.parameters.resolve(&*env, ctx)?;
        if let Some(caller) = caller {
            merge_parameters(&mut parameters, caller);
        }

        let guard = ComponentGuard::acquire(pool, Role::Action, &self.type_name)?;
        guard
            .action()?
            .act(env, source.as_deref(), &parameters)
            .map_err(|e| SitemapError::component(Role::Action, &self.type_name, e))
    }
}

/// A member of a named action set.
#[derive(Debug)]
pub struct ActionSetMember {
    /// Runs only when the request asks for this action.
    pub action: Option<String>,
    pub call: ActionCall,
}

#[derive(Debug)]
pub struct ActionSet {
    pub name: String,
    pub members: Vec<ActionSetMember>,
}

impl ActionSet {
    /// Run the applicable members, merging their maps first-writer-wins.
    ///
    /// `None` when no member succeeded.
    fn run(
        &self,
        env: &mut dyn Environment,
        ctx: &mut InvocationContext,
        pool: &dyn ComponentPool,
        caller: &Parameters,
    ) -> SitemapResult<Option<ResultMap>> {
        let mut accumulated = ResultMap::new();
        let mut succeeded = false;

        for member in &self.members {
            if let Some(action) = &member.action {
                if ctx.requested_action() != Some(action.as_str()) {
                    tracing::debug!(set = %self.name, action = %action, "Action set member skipped");
                    continue;
                }
            }
            let result = ctx.with_results(accumulated.clone(), |ctx| {
                member.call.run(env, ctx, pool, Some(caller))
            })?;
            if let Some(map) = result {
                succeeded = true;
                for (key, value) in map {
                    accumulated.entry(key).or_insert(value);
                }
            }
        }

        Ok(succeeded.then_some(accumulated))
    }
}

#[derive(Debug)]
pub enum ActTarget {
    Action(ActionCall),
    Set {
        set: Arc<ActionSet>,
        parameters: ParameterTemplates,
    },
}

#[derive(Debug)]
pub struct ActNode {
    pub target: ActTarget,
    pub children: Vec<Node>,
}

impl ActNode {
    fn invoke(
        &self,
        env: &mut dyn Environment,
        ctx: &mut InvocationContext,
        sitemap: &Sitemap,
    ) -> SitemapResult<Outcome> {
        let result = match &self.target {
            ActTarget::Action(call) => call.run(env, ctx, sitemap.pool(), None)?,
            ActTarget::Set { set, parameters } => {
                let caller = parameters.resolve(&*env, ctx)?;
                set.run(env, ctx, sitemap.pool(), &caller)?
            }
        };

        match result {
            Some(map) => ctx.with_results(map, |ctx| invoke_sequence(&self.children, env, ctx, sitemap)),
            None => Ok(Outcome::NotHandled),
        }
    }
}

/// Generate and transform nodes.
#[derive(Debug)]
pub struct StageNode {
    pub type_name: String,
    pub source: Option<VariableResolver>,
    pub parameters: ParameterTemplates,
    /// Node labels plus the component type's label.
    pub labels: Vec<String>,
}

impl StageNode {
    fn descriptor(&self, env: &dyn Environment, ctx: &InvocationContext) -> SitemapResult<StageDescriptor> {
        let source = resolve_opt(&self.source, env, ctx)?;
        let parameters = self.parameters.resolve(env, ctx)?;
        Ok(StageDescriptor::new(self.type_name.clone(), source).with_parameters(parameters))
    }

    fn generate(
        &self,
        env: &mut dyn Environment,
        ctx: &mut InvocationContext,
        location: &Location,
    ) -> SitemapResult<Outcome> {
        let stage = self.descriptor(&*env, ctx)?;
        ctx.pipeline_mut()?.set_generator(stage)?;

        let branch = ctx
            .view()
            .is_some_and(|view| view.from == ViewFrom::First || view.matches_labels(&self.labels));
        if branch {
            tracing::debug!(location = %location, "View armed after generator");
            ctx.arm_view();
        }
        Ok(Outcome::NotHandled)
    }

    fn transform(
        &self,
        env: &mut dyn Environment,
        ctx: &mut InvocationContext,
        location: &Location,
    ) -> SitemapResult<Outcome> {
        if ctx.view_state() == ViewState::Armed {
            tracing::debug!(location = %location, transformer = %self.type_name, "Transformer skipped by view");
            return Ok(Outcome::NotHandled);
        }

        let stage = self.descriptor(&*env, ctx)?;
        ctx.pipeline_mut()?.add_transformer(stage)?;

        if ctx.view().is_some_and(|view| view.matches_labels(&self.labels)) {
            tracing::debug!(location = %location, "View armed after transformer");
            ctx.arm_view();
        }
        Ok(Outcome::NotHandled)
    }
}

#[derive(Debug)]
pub struct SerializeNode {
    pub type_name: String,
    pub mime_type: Option<VariableResolver>,
    /// Mime type configured on the component type.
    pub default_mime_type: Option<String>,
    pub status_code: Option<VariableResolver>,
    pub parameters: ParameterTemplates,
    pub labels: Vec<String>,
}

impl SerializeNode {
    fn intercepted(&self, ctx: &InvocationContext) -> bool {
        let Some(view) = ctx.view() else {
            return false;
        };
        match ctx.view_state() {
            ViewState::Consumed => false,
            ViewState::Armed => true,
            ViewState::Idle => view.from == ViewFrom::Last || view.matches_labels(&self.labels),
        }
    }

    fn invoke(
        &self,
        env: &mut dyn Environment,
        ctx: &mut InvocationContext,
        sitemap: &Sitemap,
    ) -> SitemapResult<Outcome> {
        if self.intercepted(ctx) {
            if let Some(view) = ctx.consume_view() {
                tracing::debug!(view = %view.name, "View intercepts serializer");
                return view.invoke(env, ctx, sitemap);
            }
        }

        if ctx.pipeline().is_finalized() {
            return Err(SitemapError::pipeline_state(format!(
                "serializer '{}' reached but the pipeline already has an output stage",
                self.type_name
            )));
        }

        let mime_type = resolve_opt(&self.mime_type, &*env, ctx)?
            .filter(|m| !m.is_empty())
            .or_else(|| self.default_mime_type.clone());
        let status = parse_status(&self.status_code, &*env, ctx)?;
        let parameters = self.parameters.resolve(&*env, ctx)?;

        let settings = sitemap.settings();
        let gather = flag(&*env, &settings.link_gathering_attribute);
        let translate = flag(&*env, &settings.link_translation_attribute);

        let pipeline = ctx.pipeline_mut()?;
        if gather {
            pipeline.add_transformer(StageDescriptor::new(LINK_GATHERER, None))?;
        }
        if translate {
            pipeline.add_transformer(StageDescriptor::new(LINK_TRANSLATOR, None))?;
        }
        pipeline.finalize(OutputDescriptor {
            kind: self.type_name.clone(),
            mime_type,
            status,
            parameters,
        })?;

        if let Some(policy) = ctx.cache_policy() {
            ctx.pipeline_mut()?.mark_cacheable(policy.expires_secs)?;
        }
        if let Some(status) = status {
            env.set_status(status);
        }
        Ok(Outcome::Handled)
    }
}

#[derive(Debug)]
pub struct ReadNode {
    pub type_name: String,
    pub source: Option<VariableResolver>,
    pub mime_type: Option<VariableResolver>,
    pub default_mime_type: Option<String>,
    pub status_code: Option<VariableResolver>,
    pub parameters: ParameterTemplates,
}

impl ReadNode {
    fn invoke(&self, env: &mut dyn Environment, ctx: &mut InvocationContext) -> SitemapResult<Outcome> {
        let source = resolve_opt(&self.source, &*env, ctx)?;
        let parameters = self.parameters.resolve(&*env, ctx)?;
        let mime_type = resolve_opt(&self.mime_type, &*env, ctx)?
            .filter(|m| !m.is_empty())
            .or_else(|| self.default_mime_type.clone());
        let status = parse_status(&self.status_code, &*env, ctx)?;

        let reader = StageDescriptor::new(self.type_name.clone(), source).with_parameters(parameters.clone());
        let output = OutputDescriptor {
            kind: self.type_name.clone(),
            mime_type,
            status,
            parameters,
        };
        ctx.pipeline_mut()?.read(reader, output)?;

        if let Some(policy) = ctx.cache_policy() {
            ctx.pipeline_mut()?.mark_cacheable(policy.expires_secs)?;
        }
        if let Some(status) = status {
            env.set_status(status);
        }
        Ok(Outcome::Handled)
    }
}

#[derive(Debug)]
pub enum CallNode {
    /// Invoke a named resource with its parameters as the nearest result map.
    Resource {
        name: String,
        parameters: ParameterTemplates,
    },
    Flow(FlowCall),
}

#[derive(Debug)]
pub struct FlowCall {
    pub flow_type: String,
    pub function: Option<VariableResolver>,
    pub continuation: Option<VariableResolver>,
    pub arguments: Vec<(String, VariableResolver)>,
}

impl CallNode {
    fn invoke(
        &self,
        env: &mut dyn Environment,
        ctx: &mut InvocationContext,
        sitemap: &Sitemap,
    ) -> SitemapResult<Outcome> {
        match self {
            CallNode::Resource { name, parameters } => {
                let resource = sitemap
                    .resource(name)
                    .ok_or_else(|| SitemapError::UnknownResource(name.clone()))?;
                let parameters = parameters.resolve(&*env, ctx)?;
                let limit = sitemap.settings().max_call_depth;
                ctx.nested_call(limit, |ctx| {
                    ctx.with_results(parameters, |ctx| resource.invoke(env, ctx, sitemap))
                })
            }
            CallNode::Flow(call) => call.invoke(env, ctx, sitemap.pool()),
        }
    }
}

impl FlowCall {
    fn invoke(
        &self,
        env: &mut dyn Environment,
        ctx: &mut InvocationContext,
        pool: &dyn ComponentPool,
    ) -> SitemapResult<Outcome> {
        let continuation = resolve_opt(&self.continuation, &*env, ctx)?.filter(|id| !id.is_empty());

        let guard = ComponentGuard::acquire(pool, Role::Flow, &self.flow_type)?;
        let flow = guard.flow()?;

        let (target, result) = match continuation {
            Some(id) => {
                tracing::debug!(continuation = %id, "Resuming continuation");
                let result = flow.resume_continuation(&id, env, ctx.redirector_mut());
                (id, result)
            }
            None => {
                let function = self
                    .function
                    .as_ref()
                    .ok_or_else(|| SitemapError::InvalidNode {
                        kind: "call",
                        reason: "continuation resolved empty and no function is configured".into(),
                    })?
                    .resolve(ctx.results(), &*env)?;
                let arguments = self
                    .arguments
                    .iter()
                    .map(|(name, value)| {
                        Ok(Argument {
                            name: name.clone(),
                            value: value.resolve(ctx.results(), &*env)?,
                        })
                    })
                    .collect::<SitemapResult<Vec<_>>>()?;
                tracing::debug!(function = %function, arguments = arguments.len(), "Calling flow function");
                let result = flow.call_function(&function, &arguments, env, ctx.redirector_mut());
                (function, result)
            }
        };

        result.map_err(|e| SitemapError::component(Role::Flow, &self.flow_type, e))?;
        if !ctx.redirector().has_response() {
            return Err(SitemapError::NoResponseProduced(target));
        }
        Ok(Outcome::Handled)
    }
}

#[derive(Debug)]
pub struct RedirectNode {
    pub target: VariableResolver,
    pub kind: RedirectKind,
}

impl RedirectNode {
    fn invoke(&self, env: &mut dyn Environment, ctx: &mut InvocationContext) -> SitemapResult<Outcome> {
        let target = self.target.resolve(ctx.results(), &*env)?;
        ctx.redirector_mut().redirect(&target, self.kind, env.base_url())?;
        Ok(Outcome::Handled)
    }
}

/// Where a view branches off the main pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewFrom {
    Label(String),
    First,
    Last,
}

/// A named alternate subtree that takes over at a branch point.
#[derive(Debug)]
pub struct View {
    pub name: String,
    pub from: ViewFrom,
    pub children: Vec<Node>,
    pub location: Location,
}

impl View {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn matches_labels(&self, labels: &[String]) -> bool {
        match &self.from {
            ViewFrom::Label(label) => labels.iter().any(|l| l == label),
            ViewFrom::First | ViewFrom::Last => false,
        }
    }

    fn invoke(
        &self,
        env: &mut dyn Environment,
        ctx: &mut InvocationContext,
        sitemap: &Sitemap,
    ) -> SitemapResult<Outcome> {
        invoke_sequence(&self.children, env, ctx, sitemap).map_err(|e| e.at(&self.location))
    }
}

/// A named subtree invoked by call nodes.
#[derive(Debug)]
pub struct Resource {
    pub name: String,
    pub children: Vec<Node>,
    pub location: Location,
}

impl Resource {
    fn invoke(
        &self,
        env: &mut dyn Environment,
        ctx: &mut InvocationContext,
        sitemap: &Sitemap,
    ) -> SitemapResult<Outcome> {
        tracing::debug!(resource = %self.name, depth = ctx.call_depth(), "Calling resource");
        invoke_sequence(&self.children, env, ctx, sitemap).map_err(|e| e.at(&self.location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Parameters {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_merge_parameters_caller_wins() {
        let mut member = params(&[("a", "member"), ("b", "member"), ("c", "")]);
        merge_parameters(&mut member, &params(&[("a", "caller"), ("b", ""), ("c", "caller"), ("d", "")]));
        assert_eq!(
            member,
            params(&[("a", "caller"), ("b", "member"), ("c", "caller"), ("d", "")])
        );
    }

    #[test]
    fn test_view_label_matching() {
        let view = View {
            name: "content".into(),
            from: ViewFrom::Label("content".into()),
            children: Vec::new(),
            location: Location::new("views[0]"),
        };
        assert!(view.matches_labels(&["data".into(), "content".into()]));
        assert!(!view.matches_labels(&["data".into()]));
    }
}
