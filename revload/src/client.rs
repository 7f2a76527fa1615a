//! The HTTP primitive scenarios issue requests through.
use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid base URL `{0}`")]
    BaseUrl(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A request against the target service, relative to its base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest<B = ()> {
    pub method: Method,
    pub path: &'static str,
    pub query: Vec<(&'static str, String)>,
    pub body: Option<B>,
}

impl ApiRequest<()> {
    pub fn get(path: &'static str) -> Self {
        Self {
            method: Method::Get,
            path,
            query: vec![],
            body: None,
        }
    }
}

impl<B> ApiRequest<B> {
    /// POST with `body` encoded as JSON.
    pub fn post(path: &'static str, body: B) -> Self {
        Self {
            method: Method::Post,
            path,
            query: vec![],
            body: Some(body),
        }
    }

    pub fn query(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    /// Time from sending the request until the body was fully read.
    pub elapsed: Duration,
    pub body: Vec<u8>,
}

/// Issue one request and report status, timing and body. Implementations never retry.
#[trait_variant::make(HttpClient: Send)]
pub trait LocalHttpClient {
    async fn send<B: Serialize + Send + Sync>(
        &self,
        request: ApiRequest<B>,
    ) -> Result<ApiResponse, TransportError>;
}

/// [`HttpClient`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestClient {
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let base_url = base_url.trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(TransportError::BaseUrl(base_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl HttpClient for ReqwestClient {
    async fn send<B: Serialize + Send + Sync>(
        &self,
        request: ApiRequest<B>,
    ) -> Result<ApiResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let start = Instant::now();
        let res = builder.send().await?;
        let status = res.status().as_u16();
        let body = res.bytes().await?.to_vec();

        Ok(ApiResponse {
            status,
            elapsed: start.elapsed(),
            body,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// A request as seen by [`ScriptedClient`], with the body already encoded.
    #[derive(Debug, Clone)]
    pub(crate) struct SeenRequest {
        pub method: Method,
        pub path: &'static str,
        pub query: Vec<(&'static str, String)>,
        pub body: Option<serde_json::Value>,
    }

    type Responder =
        Box<dyn Fn(&SeenRequest) -> Result<ApiResponse, TransportError> + Send + Sync>;

    /// In-memory [`HttpClient`] answering from a closure.
    pub(crate) struct ScriptedClient {
        responder: Responder,
        pub seen: Mutex<Vec<SeenRequest>>,
    }

    impl ScriptedClient {
        pub(crate) fn new(
            responder: impl Fn(&SeenRequest) -> Result<ApiResponse, TransportError>
                + Send
                + Sync
                + 'static,
        ) -> Self {
            Self {
                responder: Box::new(responder),
                seen: Mutex::new(vec![]),
            }
        }

        pub(crate) fn status(status: u16) -> Self {
            Self::new(move |_| Ok(respond(status, "{}")))
        }

        pub(crate) fn seen(&self) -> Vec<SeenRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    pub(crate) fn respond(status: u16, body: &str) -> ApiResponse {
        ApiResponse {
            status,
            elapsed: Duration::from_millis(5),
            body: body.as_bytes().to_vec(),
        }
    }

    impl HttpClient for ScriptedClient {
        async fn send<B: Serialize + Send + Sync>(
            &self,
            request: ApiRequest<B>,
        ) -> Result<ApiResponse, TransportError> {
            let seen = SeenRequest {
                method: request.method,
                path: request.path,
                query: request.query,
                body: request
                    .body
                    .as_ref()
                    .map(|b| serde_json::to_value(b).unwrap()),
            };
            let res = (self.responder)(&seen);
            self.seen.lock().unwrap().push(seen);
            res
        }
    }

    #[test]
    fn rejects_relative_base_url() {
        assert!(matches!(
            ReqwestClient::new("localhost:8080"),
            Err(TransportError::BaseUrl(_))
        ));
        let client = ReqwestClient::new("http://localhost:8080/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn request_builders() {
        let req = ApiRequest::get("/api/v1/team/get").query("team_name", "backend");
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.query, vec![("team_name", "backend".to_string())]);
        assert!(req.body.is_none());

        let req = ApiRequest::post("/api/v1/pullRequests/merge", 5u8);
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.body, Some(5));
    }
}
