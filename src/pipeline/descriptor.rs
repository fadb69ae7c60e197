//! Pipeline assembly.
//!
//! # Responsibilities
//! - Accumulate content source, transformation stages and output stage
//! - Enforce one source, one output, declaration-ordered transformers
//! - Refuse every mutation once finalized
//!
//! # Design Decisions
//! - The descriptor is data only; executing it belongs to the caller
//! - A reader is source and output at once, so reading finalizes

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::routing::types::{Parameters, SitemapError, SitemapResult};

/// A generator, transformer or reader stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Parameters::is_empty")]
    pub parameters: Parameters,
}

impl StageDescriptor {
    pub fn new(kind: impl Into<String>, source: Option<String>) -> Self {
        Self {
            kind: kind.into(),
            source,
            parameters: Parameters::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }
}

/// The serializer (or reader) that produces the response bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Parameters::is_empty")]
    pub parameters: Parameters,
}

/// An assembled pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<StageDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reader: Option<StageDescriptor>,
    pub transformers: Vec<StageDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_secs: Option<u64>,
}

impl PipelineDescriptor {
    /// SHA-256 over every stage, hex encoded.
    pub fn compute_cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        let mut feed = |tag: &str, kind: &str, source: Option<&str>, parameters: &Parameters| {
            hasher.update(tag.as_bytes());
            hasher.update(b"\0");
            hasher.update(kind.as_bytes());
            hasher.update(b"\0");
            hasher.update(source.unwrap_or_default().as_bytes());
            for (name, value) in parameters {
                hasher.update(b"\0");
                hasher.update(name.as_bytes());
                hasher.update(b"=");
                hasher.update(value.as_bytes());
            }
            hasher.update(b"\n");
        };

        if let Some(g) = &self.generator {
            feed("generator", &g.kind, g.source.as_deref(), &g.parameters);
        }
        if let Some(r) = &self.reader {
            feed("reader", &r.kind, r.source.as_deref(), &r.parameters);
        }
        for t in &self.transformers {
            feed("transformer", &t.kind, t.source.as_deref(), &t.parameters);
        }
        if let Some(o) = &self.output {
            feed("output", &o.kind, o.mime_type.as_deref(), &o.parameters);
        }
        hex::encode(hasher.finalize())
    }
}

/// Incrementally builds one request's pipeline.
#[derive(Debug, Default)]
pub struct PipelineAssembler {
    descriptor: PipelineDescriptor,
    finalized: bool,
}

impl PipelineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self, what: &str) -> SitemapResult<()> {
        if self.finalized {
            return Err(SitemapError::pipeline_state(format!(
                "{} after the pipeline was finalized",
                what
            )));
        }
        Ok(())
    }

    pub fn has_source(&self) -> bool {
        self.descriptor.generator.is_some() || self.descriptor.reader.is_some()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Set the sole content source.
    pub fn set_generator(&mut self, stage: StageDescriptor) -> SitemapResult<()> {
        self.ensure_open("generator")?;
        if self.has_source() {
            return Err(SitemapError::pipeline_state(format!(
                "generator '{}' added to a pipeline that already has a content source",
                stage.kind
            )));
        }
        self.descriptor.generator = Some(stage);
        Ok(())
    }

    /// Append a transformer after those already present.
    pub fn add_transformer(&mut self, stage: StageDescriptor) -> SitemapResult<()> {
        self.ensure_open("transformer")?;
        if self.descriptor.generator.is_none() {
            return Err(SitemapError::pipeline_state(format!(
                "transformer '{}' added before a generator",
                stage.kind
            )));
        }
        self.descriptor.transformers.push(stage);
        Ok(())
    }

    /// Set the output stage; the pipeline becomes executable.
    pub fn finalize(&mut self, output: OutputDescriptor) -> SitemapResult<()> {
        if self.finalized {
            return Err(SitemapError::pipeline_state(format!(
                "serializer '{}' reached but the pipeline already has an output stage",
                output.kind
            )));
        }
        if self.descriptor.generator.is_none() {
            return Err(SitemapError::pipeline_state(format!(
                "serializer '{}' reached without a generator",
                output.kind
            )));
        }
        self.descriptor.output = Some(output);
        self.finalized = true;
        Ok(())
    }

    /// Set a reader as both source and output.
    pub fn read(&mut self, reader: StageDescriptor, output: OutputDescriptor) -> SitemapResult<()> {
        self.ensure_open("reader")?;
        if self.has_source() {
            return Err(SitemapError::pipeline_state(format!(
                "reader '{}' added to a pipeline that already has a content source",
                reader.kind
            )));
        }
        self.descriptor.reader = Some(reader);
        self.descriptor.output = Some(output);
        self.finalized = true;
        Ok(())
    }

    /// Mark a finalized pipeline cacheable, computing its key.
    pub fn mark_cacheable(&mut self, expires_secs: Option<u64>) -> SitemapResult<()> {
        if !self.finalized {
            return Err(SitemapError::pipeline_state(
                "cache key requested for an unfinished pipeline",
            ));
        }
        self.descriptor.cache_key = Some(self.descriptor.compute_cache_key());
        self.descriptor.expires_secs = expires_secs;
        Ok(())
    }

    pub fn descriptor(&self) -> &PipelineDescriptor {
        &self.descriptor
    }

    /// The finalized descriptor, or `None` while still under construction.
    pub fn into_finalized(self) -> Option<PipelineDescriptor> {
        self.finalized.then_some(self.descriptor)
    }

    /// Discard everything assembled so far.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serializer(kind: &str) -> OutputDescriptor {
        OutputDescriptor {
            kind: kind.to_string(),
            mime_type: Some("text/html".to_string()),
            status: None,
            parameters: Parameters::new(),
        }
    }

    #[test]
    fn test_transformers_keep_order() {
        let mut p = PipelineAssembler::new();
        p.set_generator(StageDescriptor::new("file", Some("a.xml".into()))).unwrap();
        p.add_transformer(StageDescriptor::new("xslt", Some("one.xsl".into()))).unwrap();
        p.add_transformer(StageDescriptor::new("xslt", Some("two.xsl".into()))).unwrap();
        p.finalize(serializer("html")).unwrap();

        let d = p.into_finalized().unwrap();
        let sources: Vec<_> = d.transformers.iter().filter_map(|t| t.source.as_deref()).collect();
        assert_eq!(sources, vec!["one.xsl", "two.xsl"]);
    }

    #[test]
    fn test_single_source_and_output() {
        let mut p = PipelineAssembler::new();
        p.set_generator(StageDescriptor::new("file", None)).unwrap();
        assert!(matches!(
            p.set_generator(StageDescriptor::new("file", None)),
            Err(SitemapError::PipelineState(_))
        ));

        p.finalize(serializer("html")).unwrap();
        assert!(matches!(p.finalize(serializer("xml")), Err(SitemapError::PipelineState(_))));
        assert!(matches!(
            p.add_transformer(StageDescriptor::new("xslt", None)),
            Err(SitemapError::PipelineState(_))
        ));
    }

    #[test]
    fn test_requires_generator() {
        let mut p = PipelineAssembler::new();
        assert!(p.add_transformer(StageDescriptor::new("xslt", None)).is_err());
        assert!(p.finalize(serializer("html")).is_err());
        assert!(p.into_finalized().is_none());
    }

    #[test]
    fn test_reader_finalizes() {
        let mut p = PipelineAssembler::new();
        p.read(StageDescriptor::new("resource", Some("logo.png".into())), OutputDescriptor {
            kind: "resource".into(),
            mime_type: Some("image/png".into()),
            status: None,
            parameters: Parameters::new(),
        })
        .unwrap();
        assert!(p.is_finalized());
        assert!(p.set_generator(StageDescriptor::new("file", None)).is_err());
    }

    #[test]
    fn test_cache_key_tracks_stages() {
        let build = |xsl: &str| {
            let mut p = PipelineAssembler::new();
            p.set_generator(StageDescriptor::new("file", Some("a.xml".into()))).unwrap();
            p.add_transformer(StageDescriptor::new("xslt", Some(xsl.into()))).unwrap();
            p.finalize(serializer("html")).unwrap();
            p.mark_cacheable(Some(60)).unwrap();
            p.into_finalized().unwrap()
        };

        let a = build("one.xsl");
        let b = build("one.xsl");
        let c = build("two.xsl");
        assert_eq!(a.cache_key, b.cache_key);
        assert_ne!(a.cache_key, c.cache_key);
        assert_eq!(a.cache_key.as_ref().map(String::len), Some(64));
        assert_eq!(a.expires_secs, Some(60));
    }

    #[test]
    fn test_cache_key_requires_final_pipeline() {
        let mut p = PipelineAssembler::new();
        assert!(p.mark_cacheable(None).is_err());
    }
}
