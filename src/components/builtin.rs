//! Built-in selectors and actions available from configuration.
//!
//! | implementation      | role     | behaviour                                           |
//! |---------------------|----------|-----------------------------------------------------|
//! | `request-parameter` | selector | test equals request parameter `parameter-name`      |
//! | `header`            | selector | test equals request header `header-name`            |
//! | `request-params`    | action   | exposes request parameters as the result map       |
//! | `require-parameter` | action   | succeeds only when parameter `source` is present    |
//! | `redirect`          | flow     | redirects to argument `target`, echoes continuations |

use std::sync::Arc;

use crate::components::{Action, Argument, FlowInterpreter, Selector};
use crate::config::schema::ComponentConfig;
use crate::environment::Environment;
use crate::pipeline::{RedirectKind, Redirector};
use crate::routing::types::{BoxError, Parameters, ResultMap, Role, SitemapError, SitemapResult};

fn lookup<'a>(name: &str, call: &'a Parameters, configured: &'a Parameters) -> Option<&'a str> {
    call.get(name)
        .or_else(|| configured.get(name))
        .map(String::as_str)
}

/// Instantiate the selector named by `entry.implementation`.
pub fn selector(entry: &ComponentConfig) -> SitemapResult<Arc<dyn Selector>> {
    match entry.implementation.as_deref() {
        Some("request-parameter") => Ok(Arc::new(RequestParameterSelector {
            configured: entry.parameters.clone(),
        })),
        Some("header") => Ok(Arc::new(HeaderSelector {
            configured: entry.parameters.clone(),
        })),
        other => Err(SitemapError::UnknownComponentRole {
            role: Role::Selector,
            type_name: other.unwrap_or(&entry.name).to_string(),
        }),
    }
}

/// Instantiate the action named by `entry.implementation`.
pub fn action(entry: &ComponentConfig) -> SitemapResult<Arc<dyn Action>> {
    match entry.implementation.as_deref() {
        Some("request-params") => Ok(Arc::new(RequestParamsAction)),
        Some("require-parameter") => Ok(Arc::new(RequireParameterAction)),
        other => Err(SitemapError::UnknownComponentRole {
            role: Role::Action,
            type_name: other.unwrap_or(&entry.name).to_string(),
        }),
    }
}

/// Instantiate the flow interpreter named by `entry.implementation`.
pub fn flow(entry: &ComponentConfig) -> SitemapResult<Arc<dyn FlowInterpreter>> {
    match entry.implementation.as_deref() {
        Some("redirect") => Ok(Arc::new(RedirectFlow)),
        other => Err(SitemapError::UnknownComponentRole {
            role: Role::Flow,
            type_name: other.unwrap_or(&entry.name).to_string(),
        }),
    }
}

/// Compares the test against a request parameter.
#[derive(Debug)]
pub struct RequestParameterSelector {
    configured: Parameters,
}

impl Selector for RequestParameterSelector {
    fn select(&self, test: &str, env: &dyn Environment, parameters: &Parameters) -> Result<bool, BoxError> {
        let name = lookup("parameter-name", parameters, &self.configured)
            .ok_or("request-parameter selector needs 'parameter-name'")?;
        Ok(env.parameter(name).as_deref() == Some(test))
    }
}

/// Compares the test against a request header.
#[derive(Debug)]
pub struct HeaderSelector {
    configured: Parameters,
}

impl Selector for HeaderSelector {
    fn select(&self, test: &str, env: &dyn Environment, parameters: &Parameters) -> Result<bool, BoxError> {
        let name = lookup("header-name", parameters, &self.configured)
            .ok_or("header selector needs 'header-name'")?;
        Ok(env.header(name).as_deref() == Some(test))
    }
}

/// Copies request parameters into the result map.
///
/// With a `parameters` parameter (space separated names) only those are copied.
#[derive(Debug)]
pub struct RequestParamsAction;

impl Action for RequestParamsAction {
    fn act(
        &self,
        env: &mut dyn Environment,
        _source: Option<&str>,
        parameters: &Parameters,
    ) -> Result<Option<ResultMap>, BoxError> {
        let names: Vec<String> = match parameters.get("parameters") {
            Some(list) => list.split_whitespace().map(str::to_string).collect(),
            None => env.parameter_names(),
        };
        let map = names
            .into_iter()
            .filter_map(|name| env.parameter(&name).map(|value| (name, value)))
            .collect();
        Ok(Some(map))
    }
}

/// Succeeds with `{<name>: <value>}` when request parameter `source` is set.
#[derive(Debug)]
pub struct RequireParameterAction;

impl Action for RequireParameterAction {
    fn act(
        &self,
        env: &mut dyn Environment,
        source: Option<&str>,
        _parameters: &Parameters,
    ) -> Result<Option<ResultMap>, BoxError> {
        let name = source.ok_or("require-parameter action needs a source")?;
        Ok(env
            .parameter(name)
            .filter(|value| !value.is_empty())
            .map(|value| ResultMap::from([(name.to_string(), value)])))
    }
}

/// Minimal flow: every function redirects to its `target` argument and every
/// continuation is handed straight back to the caller.
#[derive(Debug)]
pub struct RedirectFlow;

impl FlowInterpreter for RedirectFlow {
    fn call_function(
        &self,
        function: &str,
        arguments: &[Argument],
        env: &mut dyn Environment,
        redirector: &mut Redirector,
    ) -> Result<(), BoxError> {
        let target = arguments
            .iter()
            .find(|a| a.name == "target")
            .map(|a| a.value.as_str())
            .ok_or_else(|| format!("function '{}' needs a 'target' argument", function))?;
        redirector.redirect(target, RedirectKind::Local, env.base_url())?;
        Ok(())
    }

    fn resume_continuation(
        &self,
        continuation_id: &str,
        _env: &mut dyn Environment,
        redirector: &mut Redirector,
    ) -> Result<(), BoxError> {
        redirector.continuation(continuation_id)?;
        Ok(())
    }
}
