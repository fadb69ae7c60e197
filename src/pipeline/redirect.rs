//! Redirect and continuation sink.
//!
//! # Responsibilities
//! - Record exactly one redirect target or continuation per request
//! - Classify redirects (local, global, permanent)
//! - Resolve relative targets against the request URL when known
//!
//! # Design Decisions
//! - Recording twice is an invariant violation, not a silent overwrite

use serde::{Deserialize, Serialize};
use url::Url;

use crate::routing::types::{SitemapError, SitemapResult};

/// How far a redirect propagates and how it is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RedirectKind {
    /// Temporary redirect within the current processing context.
    #[default]
    Local,
    /// Temporary redirect handed to the outermost caller.
    Global,
    /// Permanent (301) redirect.
    Permanent,
}

impl RedirectKind {
    /// HTTP status the adapter reports for this kind.
    pub fn status_code(self) -> u16 {
        match self {
            RedirectKind::Permanent => 301,
            RedirectKind::Local | RedirectKind::Global => 302,
        }
    }
}

/// What the request ended with, if not a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Dispatch {
    Redirect { target: String, kind: RedirectKind },
    Continuation { id: String },
}

/// Per-request sink for redirects and continuations.
#[derive(Debug, Default)]
pub struct Redirector {
    recorded: Option<Dispatch>,
}

impl Redirector {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_empty(&self) -> SitemapResult<()> {
        match &self.recorded {
            Some(existing) => Err(SitemapError::pipeline_state(format!(
                "response already recorded: {:?}",
                existing
            ))),
            None => Ok(()),
        }
    }

    /// Record a redirect. Relative targets are joined onto `base` when it is
    /// an absolute URL.
    pub fn redirect(
        &mut self,
        target: &str,
        kind: RedirectKind,
        base: Option<&str>,
    ) -> SitemapResult<()> {
        self.ensure_empty()?;
        let target = match (Url::parse(target), base.map(Url::parse)) {
            (Ok(absolute), _) => absolute.to_string(),
            (Err(_), Some(Ok(base))) => base
                .join(target)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| target.to_string()),
            _ => target.to_string(),
        };
        tracing::debug!(target = %target, kind = ?kind, "Redirect recorded");
        self.recorded = Some(Dispatch::Redirect { target, kind });
        Ok(())
    }

    /// Record that continuation `id` now owns the response.
    pub fn continuation(&mut self, id: &str) -> SitemapResult<()> {
        self.ensure_empty()?;
        tracing::debug!(continuation = %id, "Continuation recorded");
        self.recorded = Some(Dispatch::Continuation { id: id.to_string() });
        Ok(())
    }

    pub fn has_response(&self) -> bool {
        self.recorded.is_some()
    }

    pub fn recorded(&self) -> Option<&Dispatch> {
        self.recorded.as_ref()
    }

    pub fn into_recorded(self) -> Option<Dispatch> {
        self.recorded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_once() {
        let mut r = Redirector::new();
        r.redirect("/b/x", RedirectKind::Local, None).unwrap();
        assert!(r.has_response());
        assert!(matches!(
            r.redirect("/c", RedirectKind::Local, None),
            Err(SitemapError::PipelineState(_))
        ));
        assert!(r.continuation("k1").is_err());
        assert_eq!(
            r.recorded(),
            Some(&Dispatch::Redirect {
                target: "/b/x".into(),
                kind: RedirectKind::Local
            })
        );
    }

    #[test]
    fn test_relative_target_joined_to_base() {
        let mut r = Redirector::new();
        r.redirect("login.html", RedirectKind::Global, Some("http://example.com/app/page.html"))
            .unwrap();
        assert_eq!(
            r.into_recorded(),
            Some(Dispatch::Redirect {
                target: "http://example.com/app/login.html".into(),
                kind: RedirectKind::Global
            })
        );
    }

    #[test]
    fn test_absolute_target_kept() {
        let mut r = Redirector::new();
        r.redirect("https://other.org/x", RedirectKind::Permanent, Some("http://example.com/"))
            .unwrap();
        match r.recorded() {
            Some(Dispatch::Redirect { target, kind }) => {
                assert_eq!(target, "https://other.org/x");
                assert_eq!(kind.status_code(), 301);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_continuation() {
        let mut r = Redirector::new();
        r.continuation("abc").unwrap();
        assert_eq!(r.recorded(), Some(&Dispatch::Continuation { id: "abc".into() }));
    }
}
