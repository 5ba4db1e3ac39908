pub mod mymemory;
pub mod ollama;

pub use mymemory::MyMemoryClient;
pub use ollama::OllamaClient;

use anyhow::Result;
use async_trait::async_trait;

/// One non-streaming completion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub system: String,
}

/// Produces free-form reply text from a local model server
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Lists the models a generation server has available
#[async_trait]
pub trait ModelLister: Send + Sync {
    async fn list_models(&self) -> Result<Vec<String>>;
}

/// Translates text between two language tags.
///
/// Implementations never fail: on any error the input text comes back
/// unchanged.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, from: &str, to: &str) -> String;
}
