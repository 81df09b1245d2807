use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::from_str;
use std::time::Duration;

/// Transport-level failure, classified so each client can map it onto its
/// own stage error.
#[derive(thiserror::Error, Debug)]
pub enum HttpError {
    #[error("{method} {url} timed out")]
    Timeout { method: &'static str, url: String },

    #[error("{method} {url} unreachable: {message}")]
    Connect {
        method: &'static str,
        url: String,
        message: String,
    },

    #[error("{method} {url} failed: {status} {body}")]
    Status {
        method: &'static str,
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("{method} {url} decode failed: {message}")]
    Decode {
        method: &'static str,
        url: String,
        message: String,
    },
}

impl HttpError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, HttpError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, HttpError::Timeout { .. })
    }

    /// Worth another attempt: timeouts, refused connections, 429 and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            HttpError::Timeout { .. } | HttpError::Connect { .. } => true,
            HttpError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            HttpError::Decode { .. } => false,
        }
    }
}

/// JSON-over-HTTP helper shared by the Ollama and Qdrant clients.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self { client })
    }

    pub fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, HttpError> {
        send("GET", url, self.client.get(url))
    }

    pub fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, HttpError> {
        let req = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .json(body);
        send("POST", url, req)
    }

    pub fn put_json<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, HttpError> {
        let req = self
            .client
            .put(url)
            .header(CONTENT_TYPE, "application/json")
            .json(body);
        send("PUT", url, req)
    }
}

fn send<T: DeserializeOwned>(
    method: &'static str,
    url: &str,
    req: RequestBuilder,
) -> Result<T, HttpError> {
    let resp = req.send().map_err(|e| classify(method, url, e))?;
    let status = resp.status();
    let text = resp.text().unwrap_or_default();
    if !status.is_success() {
        return Err(HttpError::Status {
            method,
            url: url.to_string(),
            status,
            body: text,
        });
    }
    from_str::<T>(&text).map_err(|e| HttpError::Decode {
        method,
        url: url.to_string(),
        message: format!("{} | {}", e, text),
    })
}

fn classify(method: &'static str, url: &str, err: reqwest::Error) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout {
            method,
            url: url.to_string(),
        }
    } else {
        HttpError::Connect {
            method,
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> HttpError {
        HttpError::Status {
            method: "POST",
            url: "http://localhost/x".to_string(),
            status: StatusCode::from_u16(code).expect("valid status"),
            body: String::new(),
        }
    }

    #[test]
    fn transient_covers_throttling_and_server_errors_only() {
        assert!(status(429).is_transient());
        assert!(status(503).is_transient());
        assert!(!status(400).is_transient());
        assert!(!status(404).is_transient());
        assert!(status(404).is_not_found());
    }
}
