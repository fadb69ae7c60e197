//! Shared fixtures for integration tests: recording components and sitemap builders.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use sitemap_router::components::{
    Action, Argument, ComponentInfo, ComponentManager, ComponentPool, FlowInterpreter, Selector,
};
use sitemap_router::environment::{Environment, RequestEnvironment};
use sitemap_router::pipeline::{PipelineDescriptor, Redirector};
use sitemap_router::routing::types::{BoxError, Parameters, ResultMap, Role, SitemapResult};
use sitemap_router::{CancelToken, Completion, Sitemap, SitemapConfig};

/// What a [`RecordingAction`] does when invoked.
#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed(ResultMap),
    Decline,
    Fail(&'static str),
    Panic,
}

/// Action that records every parameter set it receives.
#[derive(Debug)]
pub struct RecordingAction {
    behavior: Behavior,
    calls: Mutex<Vec<Parameters>>,
}

impl RecordingAction {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn succeeding(pairs: &[(&str, &str)]) -> Arc<Self> {
        Self::new(Behavior::Succeed(map(pairs)))
    }

    pub fn calls(&self) -> Vec<Parameters> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Action for RecordingAction {
    fn act(
        &self,
        _env: &mut dyn Environment,
        _source: Option<&str>,
        parameters: &Parameters,
    ) -> Result<Option<ResultMap>, BoxError> {
        self.calls.lock().unwrap().push(parameters.clone());
        match &self.behavior {
            Behavior::Succeed(map) => Ok(Some(map.clone())),
            Behavior::Decline => Ok(None),
            Behavior::Fail(message) => Err((*message).into()),
            Behavior::Panic => panic!("action panicked"),
        }
    }
}

/// Selects when the test equals request parameter `choice`; records each test seen.
#[derive(Debug, Default)]
pub struct ChoiceSelector {
    tests: Mutex<Vec<String>>,
}

impl ChoiceSelector {
    pub fn tests(&self) -> Vec<String> {
        self.tests.lock().unwrap().clone()
    }
}

impl Selector for ChoiceSelector {
    fn select(&self, test: &str, env: &dyn Environment, _parameters: &Parameters) -> Result<bool, BoxError> {
        self.tests.lock().unwrap().push(test.to_string());
        Ok(env.parameter("choice").as_deref() == Some(test))
    }
}

/// Flow that returns without recording anything.
#[derive(Debug)]
pub struct SilentFlow;

impl FlowInterpreter for SilentFlow {
    fn call_function(
        &self,
        _function: &str,
        _arguments: &[Argument],
        _env: &mut dyn Environment,
        _redirector: &mut Redirector,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    fn resume_continuation(
        &self,
        _continuation_id: &str,
        _env: &mut dyn Environment,
        _redirector: &mut Redirector,
    ) -> Result<(), BoxError> {
        Ok(())
    }
}

pub fn map(pairs: &[(&str, &str)]) -> ResultMap {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// Manager with the stage types every scenario uses.
///
/// Generators `file`; transformers `xslt`, `i18n`, `link-gatherer`,
/// `link-translator`; serializers `html` (text/html, default) and `xml`
/// (text/xml, label `data`); reader `resource`.
pub fn manager() -> ComponentManager {
    let mut manager = ComponentManager::new();
    manager
        .declare(Role::Generator, "file", ComponentInfo::default())
        .declare(Role::Transformer, "xslt", ComponentInfo::default())
        .declare(Role::Transformer, "i18n", ComponentInfo::default())
        .declare(Role::Transformer, "link-gatherer", ComponentInfo::default())
        .declare(Role::Transformer, "link-translator", ComponentInfo::default())
        .declare(
            Role::Serializer,
            "html",
            ComponentInfo {
                mime_type: Some("text/html".into()),
                ..ComponentInfo::default()
            },
        )
        .declare(
            Role::Serializer,
            "xml",
            ComponentInfo {
                mime_type: Some("text/xml".into()),
                label: Some("data".into()),
                ..ComponentInfo::default()
            },
        )
        .declare(
            Role::Reader,
            "resource",
            ComponentInfo {
                mime_type: Some("application/octet-stream".into()),
                ..ComponentInfo::default()
            },
        );
    manager
}

pub fn parse(toml_text: &str) -> SitemapConfig {
    toml::from_str(toml_text).expect("fixture config parses")
}

/// Build `toml_text` against `pool`, keeping the pool for inspection.
pub fn build_with(pool: Arc<ComponentManager>, toml_text: &str) -> SitemapResult<Sitemap> {
    let pool: Arc<dyn ComponentPool> = pool;
    Sitemap::build(&parse(toml_text), pool)
}

pub fn build(toml_text: &str) -> Sitemap {
    build_with(Arc::new(manager()), toml_text).expect("fixture sitemap builds")
}

pub fn route(sitemap: &Sitemap, target: &str) -> SitemapResult<Completion> {
    route_env(sitemap, RequestEnvironment::from_target(target))
}

pub fn route_env(sitemap: &Sitemap, mut env: RequestEnvironment) -> SitemapResult<Completion> {
    sitemap.process(&mut env, CancelToken::new())
}

/// The finalized pipeline, panicking on any other completion.
pub fn pipeline(completion: Completion) -> PipelineDescriptor {
    match completion {
        Completion::Pipeline { pipeline } => pipeline,
        other => panic!("expected a pipeline, got {other:?}"),
    }
}

pub fn transformer_types(pipeline: &PipelineDescriptor) -> Vec<&str> {
    pipeline.transformers.iter().map(|t| t.kind.as_str()).collect()
}
