//! Environment configuration for the annotate binary

use annotator_core::{PdfVersion, RenderOptions, Unit, UnknownObjectPolicy, UploadLimits};
use anyhow::{Context, Result};
use std::str::FromStr;

pub const UNIT: &str = "ANNOTATOR_UNIT";
pub const MAX_PDF_VERSION: &str = "ANNOTATOR_MAX_PDF_VERSION";
pub const UNKNOWN_OBJECTS: &str = "ANNOTATOR_UNKNOWN_OBJECTS";
pub const UPLOAD_MAX_MB: &str = "ANNOTATOR_UPLOAD_MAX_MB";
pub const POST_MAX_MB: &str = "ANNOTATOR_POST_MAX_MB";
pub const MEMORY_LIMIT_MB: &str = "ANNOTATOR_MEMORY_LIMIT_MB";
pub const SITE_MAX_BYTES: &str = "ANNOTATOR_SITE_MAX_BYTES";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub render: RenderOptions,
    pub limits: UploadLimits,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from a variable lookup; unset or empty variables keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut render = RenderOptions::default();
        let mut limits = UploadLimits::default();

        if let Some(v) = get(UNIT) {
            render.unit = parse(UNIT, &v)?;
        }
        if let Some(v) = get(MAX_PDF_VERSION) {
            render.max_pdf_version = parse(MAX_PDF_VERSION, &v)?;
        }
        if let Some(v) = get(UNKNOWN_OBJECTS) {
            render.unknown_objects = parse(UNKNOWN_OBJECTS, &v)?;
        }
        if let Some(v) = get(UPLOAD_MAX_MB) {
            limits.upload_max_mb = parse(UPLOAD_MAX_MB, &v)?;
        }
        if let Some(v) = get(POST_MAX_MB) {
            limits.post_max_mb = parse(POST_MAX_MB, &v)?;
        }
        if let Some(v) = get(MEMORY_LIMIT_MB) {
            limits.memory_limit_mb = parse(MEMORY_LIMIT_MB, &v)?;
        }
        if let Some(v) = get(SITE_MAX_BYTES) {
            limits.site_max_bytes = parse(SITE_MAX_BYTES, &v)?;
        }

        Ok(Self { render, limits })
    }

    /// Apply command line overrides on top of the environment
    pub fn with_overrides(
        mut self,
        unit: Option<Unit>,
        max_pdf_version: Option<PdfVersion>,
        unknown_objects: Option<UnknownObjectPolicy>,
    ) -> Self {
        if let Some(unit) = unit {
            self.render.unit = unit;
        }
        if let Some(version) = max_pdf_version {
            self.render.max_pdf_version = version;
        }
        if let Some(policy) = unknown_objects {
            self.render.unknown_objects = policy;
        }
        self
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {}: {:?}", key, value))
}
