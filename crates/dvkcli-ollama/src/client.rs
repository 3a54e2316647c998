//! Ollama HTTP client.

use crate::error::OllamaError;
use crate::stream::NdjsonDecoder;
use crate::types::{
    ChatMessage, ChatRequest, ChatResponseLine, EmbedRequest, EmbedResponse, ModelInfo,
    TagsResponse,
};
use async_trait::async_trait;
use dvkcli_memory::{EmbeddingProvider, MemoryError};
use futures_util::StreamExt;
use log::{debug, info, warn};
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;

/// Default local server.
pub const LOCAL_URL: &str = "http://localhost:11434";
/// Hosted server used when an API key is present.
pub const CLOUD_URL: &str = "https://api.ollama.com";
/// Chat model used in cloud mode when none is configured.
pub const CLOUD_MODEL: &str = "llama3.3";
const LOCAL_MODEL: &str = "qwen2.5:3b";
const EMBED_MODEL: &str = "nomic-embed-text";
/// Environment variable that switches the client into cloud mode.
const API_KEY_ENV: &str = "OLLAMA_API_KEY";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const PING_TIMEOUT: Duration = Duration::from_secs(2);

/// Client for one model server.
///
/// The chat model can be switched at runtime through a shared reference, so
/// one `Arc<OllamaClient>` serves the UI and its background tasks.
#[derive(Debug)]
pub struct OllamaClient {
    http: Client,
    base_url: String,
    model: RwLock<String>,
    embed_model: String,
    api_key: Option<String>,
}

impl OllamaClient {
    /// Build a client, entering cloud mode when `OLLAMA_API_KEY` is set.
    pub fn new(base_url: &str, model: &str, embed_model: &str) -> Result<Self, OllamaError> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty());
        Self::with_api_key(base_url, model, embed_model, api_key)
    }

    /// Build a client with an explicit API key.
    ///
    /// With a key, an empty or default-local `base_url` resolves to
    /// [`CLOUD_URL`] and an empty `model` to [`CLOUD_MODEL`].
    pub fn with_api_key(
        base_url: &str,
        model: &str,
        embed_model: &str,
        api_key: Option<String>,
    ) -> Result<Self, OllamaError> {
        let cloud = api_key.is_some();
        let base_url = resolve_base_url(base_url, cloud)?;
        let model = match (model.trim(), cloud) {
            ("", true) => CLOUD_MODEL.to_string(),
            ("", false) => LOCAL_MODEL.to_string(),
            (model, _) => model.to_string(),
        };
        let embed_model = match embed_model.trim() {
            "" => EMBED_MODEL.to_string(),
            embed_model => embed_model.to_string(),
        };
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        info!(
            "model server client ready (url={}, model={}, cloud={})",
            base_url, model, cloud
        );
        Ok(Self {
            http,
            base_url,
            model: RwLock::new(model),
            embed_model,
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current chat model.
    pub fn model(&self) -> String {
        self.model.read().clone()
    }

    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }

    /// True when requests carry a bearer token.
    pub fn is_cloud(&self) -> bool {
        self.api_key.is_some()
    }

    /// Switch the chat model used by later requests.
    pub fn set_model(&self, model: &str) {
        info!("chat model switched (model={})", model);
        *self.model.write() = model.to_string();
    }

    /// Whether the server answers `/api/tags` within two seconds.
    pub async fn is_connected(&self) -> bool {
        let request = self.get("/api/tags").timeout(PING_TIMEOUT);
        match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!("model server unreachable (url={}): {err}", self.base_url);
                false
            }
        }
    }

    /// Models installed on the server.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, OllamaError> {
        let response = check_status(self.get("/api/tags").send().await?).await?;
        let tags: TagsResponse = serde_json::from_slice(&response.bytes().await?)?;
        Ok(tags.models)
    }

    /// Send a conversation and wait for the whole reply.
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String, OllamaError> {
        let model = self.model();
        let body = ChatRequest {
            model: &model,
            messages,
            stream: false,
        };
        let response = check_status(self.post("/api/chat").json(&body).send().await?).await?;
        let line: ChatResponseLine = serde_json::from_slice(&response.bytes().await?)?;
        if let Some(error) = line.error {
            return Err(OllamaError::Server(error));
        }
        Ok(line.message.map(|m| m.content).unwrap_or_default())
    }

    /// Send a conversation and stream the reply.
    ///
    /// `on_chunk` receives every non-empty text delta in order; the full reply
    /// is returned once the server marks the stream done or closes it.
    pub async fn chat_stream<F>(
        &self,
        messages: &[ChatMessage],
        mut on_chunk: F,
    ) -> Result<String, OllamaError>
    where
        F: FnMut(&str) + Send,
    {
        let model = self.model();
        let body = ChatRequest {
            model: &model,
            messages,
            stream: true,
        };
        debug!(
            "chat stream started (model={}, messages={})",
            model,
            messages.len()
        );
        let response = check_status(self.post("/api/chat").json(&body).send().await?).await?;

        let mut full = String::new();
        let mut decoder = NdjsonDecoder::new();
        let mut stream = response.bytes_stream();
        while let Some(bytes) = stream.next().await {
            for chunk in decoder.push(&bytes?)? {
                if !chunk.content.is_empty() {
                    on_chunk(&chunk.content);
                    full.push_str(&chunk.content);
                }
                if chunk.done {
                    debug!("chat stream done (chars={})", full.chars().count());
                    return Ok(full);
                }
            }
        }
        if let Some(chunk) = decoder.finish()? {
            if !chunk.content.is_empty() {
                on_chunk(&chunk.content);
                full.push_str(&chunk.content);
            }
        }
        warn!("chat stream closed without a done marker (model={})", model);
        Ok(full)
    }

    /// Embed `text` with the embedding model.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, OllamaError> {
        let body = EmbedRequest {
            model: &self.embed_model,
            input: text,
        };
        let response = check_status(self.post("/api/embed").json(&body).send().await?).await?;
        let parsed: EmbedResponse = serde_json::from_slice(&response.bytes().await?)?;
        let first = parsed
            .embeddings
            .into_iter()
            .next()
            .filter(|vector| !vector.is_empty())
            .ok_or(OllamaError::EmptyEmbedding)?;
        Ok(first.into_iter().map(|value| value as f32).collect())
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.get(format!("{}{path}", self.base_url)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.post(format!("{}{path}", self.base_url)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        OllamaClient::embed(self, text)
            .await
            .map_err(|err| MemoryError::EmbeddingUnavailable(err.to_string()))
    }
}

async fn check_status(response: Response) -> Result<Response, OllamaError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(OllamaError::Api {
        status: status.as_u16(),
        message,
    })
}

fn resolve_base_url(base_url: &str, cloud: bool) -> Result<String, OllamaError> {
    let trimmed = base_url.trim().trim_end_matches('/');
    let resolved = match trimmed {
        "" | LOCAL_URL if cloud => CLOUD_URL,
        "" => LOCAL_URL,
        other => other,
    };
    if !(resolved.starts_with("http://") || resolved.starts_with("https://")) {
        return Err(OllamaError::InvalidUrl(base_url.to_string()));
    }
    Ok(resolved.to_string())
}

#[cfg(test)]
mod tests {
    use super::{CLOUD_MODEL, CLOUD_URL, LOCAL_URL, OllamaClient, resolve_base_url};
    use crate::OllamaError;
    use pretty_assertions::assert_eq;

    #[test]
    fn base_url_resolution() {
        assert_eq!(resolve_base_url("", false).expect("url"), LOCAL_URL);
        assert_eq!(resolve_base_url("", true).expect("url"), CLOUD_URL);
        assert_eq!(resolve_base_url(LOCAL_URL, true).expect("url"), CLOUD_URL);
        assert_eq!(
            resolve_base_url("http://gpu-box:11434/", true).expect("url"),
            "http://gpu-box:11434"
        );
        assert!(matches!(
            resolve_base_url("gpu-box:11434", false),
            Err(OllamaError::InvalidUrl(_))
        ));
    }

    #[test]
    fn cloud_mode_defaults() {
        let client =
            OllamaClient::with_api_key("", "", "", Some("secret".to_string())).expect("client");
        assert!(client.is_cloud());
        assert_eq!(client.base_url(), CLOUD_URL);
        assert_eq!(client.model(), CLOUD_MODEL);
        assert_eq!(client.embed_model(), "nomic-embed-text");
    }

    #[test]
    fn configured_values_win() {
        let client = OllamaClient::with_api_key("http://127.0.0.1:9999", "llama3.2", "mxbai", None)
            .expect("client");
        assert!(!client.is_cloud());
        assert_eq!(client.model(), "llama3.2");
        client.set_model("mistral");
        assert_eq!(client.model(), "mistral");
        assert_eq!(client.embed_model(), "mxbai");
    }
}
