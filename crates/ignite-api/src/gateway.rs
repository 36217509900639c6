//! HTTP gateway
//!
//! A single reqwest client bound to the API base URL. Every request funnels
//! through [`HttpGateway::send`], which hands any failure to the classifier.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::multipart::Form;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::classifier::{classify, Failure};
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::Result;

/// Request payload.
#[derive(Debug)]
pub enum RequestBody {
    Json(Value),
    Multipart(Form),
}

impl RequestBody {
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(RequestBody::Json)
            .map_err(|e| ApiError::Unknown(format!("failed to encode request body: {e}")))
    }
}

pub struct HttpGateway {
    client: Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ApiError::Unknown(format!("invalid base URL {}: {e}", config.base_url)))?;

        if base_url.cannot_be_a_base() {
            return Err(ApiError::Unknown(format!(
                "base URL cannot carry a path: {}",
                config.base_url
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::Unknown(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `path` against the base URL, percent-encoding each segment.
    pub fn url_for(&self, path: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::Unknown("base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(path.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    /// `{base}/avatar/{file_name}`
    pub fn avatar_url(&self, file_name: &str) -> Result<Url> {
        self.media_url("avatar", file_name)
    }

    /// `{base}/exercise/demo/{file_name}`
    pub fn exercise_demo_url(&self, file_name: &str) -> Result<Url> {
        self.media_url("exercise/demo", file_name)
    }

    /// `{base}/exercise/thumb/{file_name}`
    pub fn exercise_thumb_url(&self, file_name: &str) -> Result<Url> {
        self.media_url("exercise/thumb", file_name)
    }

    fn media_url(&self, prefix: &str, file_name: &str) -> Result<Url> {
        self.resource_url(prefix, &[file_name])
    }

    /// Resolve a fixed `prefix` followed by caller-supplied `segments`.
    ///
    /// Each segment stays a single path segment: `/` and other reserved
    /// characters are percent-encoded. Empty, `.` and `..` segments are
    /// rejected, since the URL parser would drop or collapse them.
    pub fn resource_url(&self, prefix: &str, segments: &[&str]) -> Result<Url> {
        if let Some(bad) = segments
            .iter()
            .find(|segment| matches!(**segment, "" | "." | ".."))
        {
            return Err(ApiError::Validation(format!("invalid path segment {bad:?}")));
        }

        let mut url = self.url_for(prefix)?;
        url.path_segments_mut()
            .map_err(|()| ApiError::Unknown("base URL cannot carry a path".to_string()))?
            .extend(segments);
        Ok(url)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        headers: Option<HeaderMap>,
    ) -> Result<T> {
        self.send(Method::GET, path, None, headers).await
    }

    /// GET `prefix` followed by encoded `segments`, see [`Self::resource_url`].
    pub async fn get_resource<T: DeserializeOwned>(
        &self,
        prefix: &str,
        segments: &[&str],
        headers: Option<HeaderMap>,
    ) -> Result<T> {
        let url = self.resource_url(prefix, segments)?;
        self.dispatch(Method::GET, url, None, headers).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<RequestBody>,
        headers: Option<HeaderMap>,
    ) -> Result<T> {
        self.send(Method::POST, path, body, headers).await
    }

    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<RequestBody>,
        headers: Option<HeaderMap>,
    ) -> Result<T> {
        self.send(Method::PUT, path, body, headers).await
    }

    pub async fn patch<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<RequestBody>,
        headers: Option<HeaderMap>,
    ) -> Result<T> {
        self.send(Method::PATCH, path, body, headers).await
    }

    /// Send a request and decode the success body as `T`.
    ///
    /// Header overrides replace the defaults. A multipart body always sends
    /// its own boundary-carrying `Content-Type`, whatever the overrides say.
    /// An empty success body decodes as JSON `null`.
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<RequestBody>,
        headers: Option<HeaderMap>,
    ) -> Result<T> {
        let url = self.url_for(path)?;
        self.dispatch(method, url, body, headers).await
    }

    async fn dispatch<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<RequestBody>,
        headers: Option<HeaderMap>,
    ) -> Result<T> {
        let path = url.path().to_string();
        let mut request = self.client.request(method.clone(), url);

        if let Some(mut headers) = headers {
            if matches!(body, Some(RequestBody::Multipart(_))) {
                headers.remove(CONTENT_TYPE);
            }
            request = request.headers(headers);
        }

        request = match body {
            None => request,
            Some(RequestBody::Json(value)) => request.json(&value),
            Some(RequestBody::Multipart(form)) => request.multipart(form),
        };

        let result = match request.send().await {
            Ok(response) => {
                let status = response.status();
                match response.bytes().await {
                    Ok(bytes) if status.is_success() => decode(&bytes),
                    Ok(bytes) => Err(Failure::Status {
                        status,
                        body: bytes.to_vec(),
                    }),
                    Err(err) => Err(Failure::Transport(err)),
                }
            }
            Err(err) => Err(Failure::Transport(err)),
        };

        result.map_err(|failure| {
            let err = classify(failure);
            tracing::warn!(method = %method, path = %path, error = %err, "API request failed");
            err
        })
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> std::result::Result<T, Failure> {
    let decoded = if bytes.iter().all(u8::is_ascii_whitespace) {
        serde_json::from_value(Value::Null)
    } else {
        serde_json::from_slice(bytes)
    };
    decoded.map_err(Failure::Decode)
}
