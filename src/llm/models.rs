//! Model definitions
//!
//! All models the service can assess with, in one place.

use super::anthropic::AnthropicModel;
use super::{AnthropicService, LlmError, LlmService};
use std::sync::Arc;

/// Model definition with metadata
#[derive(Debug, Clone)]
pub struct ModelDef {
    /// User-facing model ID (e.g., "claude-4.5-sonnet")
    pub id: &'static str,
    model: AnthropicModel,
}

impl ModelDef {
    /// Create the service for this model
    pub fn create(
        &self,
        api_key: &str,
        gateway: Option<&str>,
    ) -> Result<Arc<dyn LlmService>, LlmError> {
        // Accept any non-empty key (including "implicit" for gateway mode)
        if api_key.is_empty() {
            return Err(LlmError::auth(format!(
                "{} requires ANTHROPIC_API_KEY or gateway",
                self.id
            )));
        }
        let service = AnthropicService::new(api_key.to_string(), self.model, gateway)?;
        Ok(Arc::new(service))
    }
}

/// Get all available model definitions
pub fn all_models() -> &'static [ModelDef] {
    &[
        ModelDef {
            id: "claude-4.5-sonnet",
            model: AnthropicModel::Claude45Sonnet,
        },
        ModelDef {
            id: "claude-4.5-opus",
            model: AnthropicModel::Claude45Opus,
        },
        ModelDef {
            id: "claude-4.5-haiku",
            model: AnthropicModel::Claude45Haiku,
        },
    ]
}
