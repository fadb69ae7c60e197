//! Per-request invocation state.
//!
//! # Responsibilities
//! - Own the pipeline under construction and the redirect sink
//! - Scope match captures and action results to the subtree that made them
//! - Track the requested view through its idle → armed → consumed states
//! - Run deferred releases when the request ends
//!
//! # Design Decisions
//! - One context per request, used from one thread at a time
//! - Once a redirect or continuation is recorded the pipeline is frozen

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::lifecycle::CancelToken;
use crate::pipeline::{Dispatch, PipelineAssembler, PipelineDescriptor, Redirector};
use crate::routing::node::View;
use crate::routing::types::{ResultMap, SitemapError, SitemapResult};

/// Match captures and action results, innermost last.
#[derive(Debug, Clone, Default)]
pub struct ResultStack {
    maps: Vec<ResultMap>,
}

impl ResultStack {
    pub fn push(&mut self, map: ResultMap) {
        self.maps.push(map);
    }

    pub fn pop(&mut self) -> Option<ResultMap> {
        self.maps.pop()
    }

    /// The map `levels` above the nearest one (`0` is the nearest).
    pub fn nearest(&self, levels: usize) -> Option<&ResultMap> {
        let len = self.maps.len();
        if levels >= len {
            return None;
        }
        self.maps.get(len - 1 - levels)
    }

    pub fn depth(&self) -> usize {
        self.maps.len()
    }
}

/// How far the requested view has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// Waiting for a branch point.
    Idle,
    /// A branch point passed; the next serializer jumps into the view.
    Armed,
    /// The view already intercepted this request.
    Consumed,
}

/// Cache options of the enclosing pipeline section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub expires_secs: Option<u64>,
}

/// How a request ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum Completion {
    /// A pipeline was assembled and finalized.
    Pipeline { pipeline: PipelineDescriptor },
    /// A redirect or continuation owns the response.
    Dispatch { dispatch: Dispatch },
    /// Nothing was produced.
    Unhandled,
}

type Deferred = Box<dyn FnOnce() + Send>;

/// Mutable state of one request's walk through the tree.
pub struct InvocationContext {
    pipeline: PipelineAssembler,
    results: ResultStack,
    redirector: Redirector,
    view: Option<Arc<View>>,
    view_state: ViewState,
    requested_action: Option<String>,
    cache: Option<CachePolicy>,
    call_depth: usize,
    cancel: CancelToken,
    deferred: Vec<Deferred>,
}

impl InvocationContext {
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            pipeline: PipelineAssembler::new(),
            results: ResultStack::default(),
            redirector: Redirector::new(),
            view: None,
            view_state: ViewState::Idle,
            requested_action: None,
            cache: None,
            call_depth: 0,
            cancel,
            deferred: Vec::new(),
        }
    }

    /// Request `view` for this invocation.
    pub fn with_view(mut self, view: Arc<View>) -> Self {
        self.view = Some(view);
        self
    }

    /// Select action-set members registered under `action`.
    pub fn with_requested_action(mut self, action: impl Into<String>) -> Self {
        self.requested_action = Some(action.into());
        self
    }

    /// Abort at the next node boundary if the caller gave up.
    pub fn check_cancelled(&self) -> SitemapResult<()> {
        if self.cancel.is_cancelled() {
            return Err(SitemapError::Cancelled);
        }
        Ok(())
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn results(&self) -> &ResultStack {
        &self.results
    }

    /// Run `f` with `map` as the nearest result map.
    pub fn with_results<T>(
        &mut self,
        map: ResultMap,
        f: impl FnOnce(&mut Self) -> SitemapResult<T>,
    ) -> SitemapResult<T> {
        self.results.push(map);
        let result = f(self);
        self.results.pop();
        result
    }

    pub fn pipeline(&self) -> &PipelineAssembler {
        &self.pipeline
    }

    /// The pipeline, unless a redirect or continuation already owns the response.
    pub fn pipeline_mut(&mut self) -> SitemapResult<&mut PipelineAssembler> {
        if self.redirector.has_response() {
            return Err(SitemapError::pipeline_state(
                "pipeline modified after a redirect or continuation was recorded",
            ));
        }
        Ok(&mut self.pipeline)
    }

    /// Start over with an empty pipeline, e.g. before running an error handler.
    pub fn reset_pipeline(&mut self) {
        self.pipeline.reset();
    }

    pub fn redirector(&self) -> &Redirector {
        &self.redirector
    }

    pub fn redirector_mut(&mut self) -> &mut Redirector {
        &mut self.redirector
    }

    pub fn requested_action(&self) -> Option<&str> {
        self.requested_action.as_deref()
    }

    pub fn view(&self) -> Option<&Arc<View>> {
        self.view.as_ref()
    }

    pub fn view_state(&self) -> ViewState {
        self.view_state
    }

    /// Remember that a branch point for the requested view was passed.
    pub fn arm_view(&mut self) {
        if self.view.is_some() && self.view_state == ViewState::Idle {
            self.view_state = ViewState::Armed;
        }
    }

    /// Hand out the view for interception. Succeeds at most once.
    pub fn consume_view(&mut self) -> Option<Arc<View>> {
        if self.view_state == ViewState::Consumed {
            return None;
        }
        let view = self.view.clone()?;
        self.view_state = ViewState::Consumed;
        Some(view)
    }

    pub fn cache_policy(&self) -> Option<CachePolicy> {
        self.cache
    }

    /// Run `f` with `policy` applying to every pipeline it finalizes.
    pub fn with_cache_policy<T>(
        &mut self,
        policy: Option<CachePolicy>,
        f: impl FnOnce(&mut Self) -> SitemapResult<T>,
    ) -> SitemapResult<T> {
        let outer = std::mem::replace(&mut self.cache, policy);
        let result = f(self);
        self.cache = outer;
        result
    }

    /// Run `f` one resource call deeper, failing beyond `limit`.
    pub fn nested_call<T>(
        &mut self,
        limit: usize,
        f: impl FnOnce(&mut Self) -> SitemapResult<T>,
    ) -> SitemapResult<T> {
        if self.call_depth >= limit {
            return Err(SitemapError::RecursionLimit(limit));
        }
        self.call_depth += 1;
        let result = f(self);
        self.call_depth -= 1;
        result
    }

    pub fn call_depth(&self) -> usize {
        self.call_depth
    }

    /// Register work to run when the request ends, latest first.
    pub fn defer(&mut self, release: impl FnOnce() + Send + 'static) {
        self.deferred.push(Box::new(release));
    }

    fn run_deferred(&mut self) {
        while let Some(release) = self.deferred.pop() {
            release();
        }
    }

    /// End the request: run deferred releases and report what was produced.
    pub fn finish(mut self) -> Completion {
        self.run_deferred();
        let redirector = std::mem::take(&mut self.redirector);
        if let Some(dispatch) = redirector.into_recorded() {
            return Completion::Dispatch { dispatch };
        }
        match std::mem::take(&mut self.pipeline).into_finalized() {
            Some(pipeline) => Completion::Pipeline { pipeline },
            None => Completion::Unhandled,
        }
    }
}

impl Drop for InvocationContext {
    fn drop(&mut self) {
        self.run_deferred();
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("pipeline", &self.pipeline)
            .field("results", &self.results)
            .field("redirector", &self.redirector)
            .field("view", &self.view.as_ref().map(|v| v.name()))
            .field("view_state", &self.view_state)
            .field("call_depth", &self.call_depth)
            .field("deferred", &self.deferred.len())
            .finish()
    }
}
