use reqwest::Client;
use serde::Deserialize;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use super::Translator;

#[derive(Deserialize)]
struct MyMemoryData {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

#[derive(Deserialize)]
struct MyMemoryResponse {
    // The service sends this as a number on success and sometimes as a
    // string ("403") on quota errors
    #[serde(rename = "responseStatus")]
    response_status: serde_json::Value,
    #[serde(rename = "responseData")]
    response_data: Option<MyMemoryData>,
}

impl MyMemoryResponse {
    fn status(&self) -> Option<u64> {
        match &self.response_status {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Client for the MyMemory free-tier translation API
#[derive(Clone)]
pub struct MyMemoryClient {
    client: Client,
    base_url: String,
}

impl MyMemoryClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Translate `text`, failing on any transport, status or decoding problem
    pub async fn try_translate(&self, text: &str, from: &str, to: &str) -> Result<String> {
        let url = format!("{}/get", self.base_url);
        let langpair = format!("{}|{}", from, to);

        let response = self
            .client
            .get(&url)
            .query(&[("q", text), ("langpair", langpair.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("Translation request failed with status: {}", response.status()));
        }

        let body: MyMemoryResponse = response.json().await?;
        match (body.status(), body.response_data) {
            (Some(200), Some(data)) => Ok(data.translated_text),
            (status, _) => Err(anyhow!(
                "Translation API limit or error (responseStatus: {:?})",
                status
            )),
        }
    }
}

#[async_trait]
impl Translator for MyMemoryClient {
    async fn translate(&self, text: &str, from: &str, to: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        match self.try_translate(text, from, to).await {
            Ok(translated) => translated,
            Err(e) => {
                warn!(error = %e, from, to, "translation failed, passing text through");
                text.to_string()
            }
        }
    }
}
