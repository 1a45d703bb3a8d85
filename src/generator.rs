use async_trait::async_trait;
use ollama_rs::generation::completion::request::GenerationRequest;
use ollama_rs::Ollama;
use tracing::debug;
use url::Url;

use crate::error::GenerationError;

/// Something that turns a prompt into a completion in a single call.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: String) -> Result<String, GenerationError>;
}

pub struct OllamaGenerator {
    client: Ollama,
    model: String,
}

impl OllamaGenerator {
    pub fn new(url: Url, model: String) -> Self {
        Self {
            client: Ollama::from_url(url),
            model,
        }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, prompt: String) -> Result<String, GenerationError> {
        debug!(model = %self.model, "requesting completion");

        let request = GenerationRequest::new(self.model.clone(), prompt);

        let response = self
            .client
            .generate(request)
            .await
            .map_err(|err| GenerationError::GenerationFailed(Box::new(err)))?;

        Ok(response.response)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use ollama_rs::error::OllamaError;

    use super::*;

    #[test]
    fn endpoint_error_is_kept_as_source() {
        let err = GenerationError::GenerationFailed(Box::new(OllamaError::Other(
            "model \"llama3.2:latest\" not found".to_string(),
        )));

        let source = err.source().unwrap();
        assert!(source.downcast_ref::<OllamaError>().is_some());
        assert_eq!(source.to_string(), "model \"llama3.2:latest\" not found");
    }
}
