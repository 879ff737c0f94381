use std::time::{Duration, Instant};

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use serde::Deserialize;
use url::Url;

use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUESTS, CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS};
use crate::types::{ChatCompletion, ChatCompletionRequest};

/// Default endpoint of the OpenAI REST API.
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/";
/// Default transport timeout for a single request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Options for [`OpenAi::new`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Base URL that `chat/completions` is joined onto.
    pub base_url: String,
    /// Transport timeout per request.
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Client for an OpenAI-compatible chat-completion API.
#[derive(Debug, Clone)]
pub struct OpenAi {
    client: ReqwestClient,
    completions_url: Url,
    timeout: Duration,
}

impl OpenAi {
    /// Create a new client bound to `credential`.
    ///
    /// Fails when the credential cannot be sent as a bearer token, when the
    /// base URL does not parse, or when the HTTP client cannot be built.
    pub fn new(credential: &Credential, options: ClientOptions) -> Result<Self> {
        let mut authorization =
            HeaderValue::from_str(&format!("Bearer {}", credential.expose())).map_err(|_| {
                Error::authentication("API key contains characters not allowed in a header")
            })?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, authorization);
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let mut base_url = options.base_url;
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let completions_url = Url::parse(&base_url)?.join("chat/completions")?;

        let client = ReqwestClient::builder()
            .default_headers(headers)
            .timeout(options.timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            completions_url,
            timeout: options.timeout,
        })
    }

    /// The URL requests are sent to.
    pub fn completions_url(&self) -> &Url {
        &self.completions_url
    }

    /// The configured transport timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status = response.status();
        let status_code = status.as_u16();

        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<ErrorDetail>,
        }

        #[derive(Deserialize)]
        struct ErrorDetail {
            #[serde(rename = "type")]
            error_type: Option<String>,
            message: Option<String>,
            param: Option<String>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {}", e),
                    Some(Box::new(e)),
                );
            }
        };

        let detail = serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.error);
        let error_type = detail.as_ref().and_then(|e| e.error_type.clone());
        let error_param = detail.as_ref().and_then(|e| e.param.clone());
        let error_message = detail
            .and_then(|e| e.message)
            .unwrap_or_else(|| match status.canonical_reason() {
                Some(reason) if error_body.trim().is_empty() => reason.to_string(),
                _ => error_body.clone(),
            });

        match status_code {
            400 => Error::bad_request(error_message, error_param),
            401 => Error::authentication(error_message),
            403 => Error::permission(error_message),
            404 => Error::not_found(error_message),
            408 => Error::timeout(error_message, None),
            429 => Error::rate_limit(error_message, retry_after),
            500 => Error::internal_server(error_message),
            502..=504 => Error::service_unavailable(error_message, retry_after),
            _ => Error::api(status_code, error_type, error_message),
        }
    }

    /// Send a chat-completion request and wait for the full response.
    pub async fn send(&self, params: &ChatCompletionRequest) -> Result<ChatCompletion> {
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let result = self.send_inner(params).await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        if result.is_err() {
            CLIENT_REQUEST_ERRORS.click();
        }
        result
    }

    async fn send_inner(&self, params: &ChatCompletionRequest) -> Result<ChatCompletion> {
        let response = self
            .client
            .post(self.completions_url.clone())
            .json(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::timeout(
                        format!("Request timed out: {}", e),
                        Some(self.timeout.as_secs_f64()),
                    )
                } else if e.is_connect() {
                    Error::connection(e.to_string(), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
                }
            })?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                Error::timeout(
                    format!("Timed out reading response: {}", e),
                    Some(self.timeout.as_secs_f64()),
                )
            } else {
                Error::http_client(format!("Failed to read response: {}", e), Some(Box::new(e)))
            }
        })?;
        serde_json::from_slice::<ChatCompletion>(&body).map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {}", e),
                Some(Box::new(e)),
            )
        })
    }
}
