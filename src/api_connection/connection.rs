use async_trait::async_trait;
use reqwest::{Client, Proxy, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};

use super::endpoints::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, CompletionOptions};
use crate::config::{ConfigError, GatewayConfig};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("proxy configuration error: {0}")]
    Proxy(#[from] ConfigError),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("API error {status}: {error_body}")]
    Api { status: StatusCode, error_body: String },
    #[error("provider returned no completion text")]
    EmptyResponse,
}

impl GatewayError {
    /// Whether a resolver may spend another attempt after this failure.
    ///
    /// Timeouts, connection drops, throttling and 5xx responses are transient;
    /// rejected credentials and other 4xx responses will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Proxy(_) => false,
            GatewayError::Network(err) => {
                if err.is_builder() {
                    return false;
                }
                match err.status() {
                    Some(status) => is_retryable_status(status),
                    None => true,
                }
            }
            GatewayError::Api { status, .. } => is_retryable_status(*status),
            GatewayError::EmptyResponse => true,
        }
    }

    /// Short description safe to show to an end user: never the provider's body,
    /// URLs or credentials.
    pub fn summary(&self) -> String {
        match self {
            GatewayError::Proxy(_) => "proxy is misconfigured".to_string(),
            GatewayError::Network(err) if err.is_timeout() => "request to the provider timed out".to_string(),
            GatewayError::Network(err) => match err.status() {
                Some(status) => format!("provider rejected the request ({})", status),
                None => "could not reach the provider".to_string(),
            },
            GatewayError::Api { status, .. } => format!("provider rejected the request ({})", status),
            GatewayError::EmptyResponse => "provider returned no completion text".to_string(),
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

/// Sends one conversation to a language model and returns its completion text.
///
/// Implementations issue exactly one request per call and never retry.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, GatewayError>;
}

#[async_trait]
impl<'a, G: ModelGateway + ?Sized> ModelGateway for &'a G {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, GatewayError> {
        (**self).complete(messages, options).await
    }
}

/// Gateway for OpenAI-compatible chat completion endpoints, optionally behind a forward proxy.
#[derive(Debug, Clone)]
pub struct OpenAiGateway {
    config: GatewayConfig,
}

impl OpenAiGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    /// A client scoped to a single call; dropping it closes its connections.
    fn build_client(&self, proxy_auth: bool) -> Result<Client, GatewayError> {
        let builder = Client::builder().timeout(self.config.request_timeout);
        let builder = match &self.config.proxy {
            Some(proxy) => {
                let url = proxy.url(proxy_auth)?;
                builder.proxy(Proxy::all(url)?)
            }
            None => builder.no_proxy(),
        };
        Ok(builder.build()?)
    }
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, GatewayError> {
        let client = self.build_client(options.proxy_auth)?;
        let request = ChatCompletionRequest::new(messages, options);

        debug!(
            model = %options.model,
            temperature = options.temperature,
            messages = messages.len(),
            via_proxy = self.config.proxy.is_some(),
            "sending chat completion request"
        );

        let response = client
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            warn!(%status, body = %error_body, "provider rejected chat completion request");
            return Err(GatewayError::Api { status, error_body });
        }

        let chat_response = response.json::<ChatCompletionResponse>().await?;
        if let Some(usage) = &chat_response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                total_tokens = usage.total_tokens,
                "chat completion usage"
            );
        }
        chat_response.first_content().ok_or(GatewayError::EmptyResponse)
    }
}
