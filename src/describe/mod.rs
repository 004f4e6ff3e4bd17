//! Asset descriptions from a multimodal model.

pub mod error;
pub mod template;
pub mod vertex;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use self::error::{DescribeError, TemplateError};
use self::template::PromptTemplate;

/// Description used when describing is turned off.
pub const SKIPPED_PLACEHOLDER: &str = "Description skipped";

/// A model that turns media bytes plus a prompt into text.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(
        &self,
        bytes: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, DescribeError>;
}

/// Result of describing one asset when the template was usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Description {
    /// Model text, or the placeholder when describing is off.
    Text(String),
    /// The model call failed. Already logged; the row gets an empty
    /// description and a zero size.
    ModelFailed,
}

pub struct Describer {
    enabled: bool,
    custom_template: Option<PathBuf>,
    generator: Arc<dyn ContentGenerator>,
}

impl Describer {
    pub fn new(
        generator: Arc<dyn ContentGenerator>,
        enabled: bool,
        custom_template: Option<PathBuf>,
    ) -> Self {
        Self {
            enabled,
            custom_template,
            generator,
        }
    }

    async fn template(&self) -> Result<PromptTemplate, TemplateError> {
        match &self.custom_template {
            Some(path) => PromptTemplate::load(path).await,
            None => PromptTemplate::builtin(),
        }
    }

    /// Describe one asset.
    ///
    /// Template problems are returned as errors. Model failures are logged
    /// together with the prompt and reported as [`Description::ModelFailed`].
    pub async fn describe(
        &self,
        name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<Description, TemplateError> {
        if !self.enabled {
            return Ok(Description::Text(SKIPPED_PLACEHOLDER.to_string()));
        }

        let prompt = self.template().await?.render(name);
        match self.generator.generate(bytes, mime_type, &prompt).await {
            Ok(text) => Ok(Description::Text(text)),
            Err(e) => {
                tracing::error!("unable to generate content for {}: {}", name, e);
                tracing::error!("prompt: {}", prompt);
                Ok(Description::ModelFailed)
            }
        }
    }
}
