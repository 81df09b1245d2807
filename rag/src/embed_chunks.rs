use std::thread;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::error::{RagError, Result};
use crate::http::{HttpClient, HttpError};

/// Turns texts into fixed-length vectors, one per input, in input order.
///
/// A failure on any text fails the whole call.
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::EmbeddingUnavailable("no vector returned for query".into()))
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Serialize)]
struct EmbedLegacyRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

/// Ollama embeddings: batched `/api/embed`, falling back to the older
/// one-text-per-call `/api/embeddings` when the batch endpoint is missing.
pub struct OllamaEmbedder {
    http: HttpClient,
    base_url: String,
    model: String,
    max_retries: usize,
    backoff: Duration,
}

impl OllamaEmbedder {
    pub fn new(http: HttpClient, base_url: &str, model: &str, max_retries: usize) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            max_retries: max_retries.max(1),
            backoff: Duration::from_millis(250),
        }
    }

    pub fn from_config(cfg: &Config, http: HttpClient) -> Self {
        Self::new(http, &cfg.ollama_url, &cfg.embed_model, cfg.embed_max_retries)
    }

    fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, HttpError> {
        let url = format!("{}/api/embed", self.base_url);
        let req = EmbedRequest {
            model: &self.model,
            input: texts,
        };
        let res = self.with_retries(|| self.http.post_json::<Value, _>(&url, &req))?;
        parse_embeddings(&url, res)
    }

    fn embed_each(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, HttpError> {
        let url = format!("{}/api/embeddings", self.base_url);
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let req = EmbedLegacyRequest {
                model: &self.model,
                prompt: text,
            };
            let res = self.with_retries(|| self.http.post_json::<Value, _>(&url, &req))?;
            let mut vectors = parse_embeddings(&url, res)?;
            if vectors.len() != 1 {
                return Err(decode_error(&url, "expected exactly one embedding"));
            }
            out.append(&mut vectors);
        }
        Ok(out)
    }

    fn with_retries<T>(
        &self,
        mut call: impl FnMut() -> std::result::Result<T, HttpError>,
    ) -> std::result::Result<T, HttpError> {
        let mut attempt = 0usize;
        loop {
            match call() {
                Ok(v) => return Ok(v),
                Err(err) if err.is_transient() && attempt + 1 < self.max_retries => {
                    attempt += 1;
                    tracing::debug!(attempt, error = %err, "retrying embedding request");
                    thread::sleep(self.backoff * (1 << attempt.min(4)) as u32);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Embedder for OllamaEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let vectors = match self.embed_batch(texts) {
            Ok(v) => v,
            Err(err) if err.is_not_found() => {
                tracing::debug!("batch embed endpoint missing, using /api/embeddings");
                self.embed_each(texts)
                    .map_err(|e| RagError::EmbeddingUnavailable(e.to_string()))?
            }
            Err(err) => return Err(RagError::EmbeddingUnavailable(err.to_string())),
        };
        check_shape(texts.len(), &vectors)?;
        Ok(vectors)
    }
}

/// One vector per text and one length across the batch.
pub(crate) fn check_shape(expected: usize, vectors: &[Vec<f32>]) -> Result<()> {
    if vectors.len() != expected {
        return Err(RagError::EmbeddingUnavailable(format!(
            "got {} embeddings for {} texts",
            vectors.len(),
            expected
        )));
    }
    if let Some(first) = vectors.first() {
        if first.is_empty() {
            return Err(RagError::EmbeddingUnavailable("empty embedding vector".into()));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != first.len()) {
            return Err(RagError::DimensionMismatch {
                expected: first.len(),
                actual: bad.len(),
            });
        }
    }
    Ok(())
}

fn parse_embeddings(url: &str, value: Value) -> std::result::Result<Vec<Vec<f32>>, HttpError> {
    let field = value
        .get("embeddings")
        .or_else(|| value.get("embedding"))
        .ok_or_else(|| decode_error(url, "no embeddings in response"))?;
    let arr = field
        .as_array()
        .ok_or_else(|| decode_error(url, "invalid embeddings format"))?;
    if arr.first().is_some_and(Value::is_array) {
        arr.iter().map(|row| parse_vec(url, row)).collect()
    } else {
        Ok(vec![parse_vec(url, field)?])
    }
}

fn parse_vec(url: &str, value: &Value) -> std::result::Result<Vec<f32>, HttpError> {
    let arr = value
        .as_array()
        .ok_or_else(|| decode_error(url, "embedding is not an array"))?;
    arr.iter()
        .map(|v| {
            v.as_f64()
                .map(|n| n as f32)
                .ok_or_else(|| decode_error(url, "embedding value is not a number"))
        })
        .collect()
}

fn decode_error(url: &str, message: &str) -> HttpError {
    HttpError::Decode {
        method: "POST",
        url: url.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use reqwest::StatusCode;
    use serde_json::json;

    fn embedder(max_retries: usize) -> OllamaEmbedder {
        let http = HttpClient::new(Duration::from_secs(1)).expect("http client");
        let mut embedder = OllamaEmbedder::new(http, "http://127.0.0.1:1", "m", max_retries);
        embedder.backoff = Duration::ZERO;
        embedder
    }

    fn status(code: u16) -> HttpError {
        HttpError::Status {
            method: "POST",
            url: "u".into(),
            status: StatusCode::from_u16(code).expect("valid status"),
            body: String::new(),
        }
    }

    #[test]
    fn transient_failures_are_retried_until_success() {
        let calls = Cell::new(0);
        let out = embedder(3).with_retries(|| {
            calls.set(calls.get() + 1);
            match calls.get() {
                1 => Err(status(503)),
                2 => Err(HttpError::Timeout { method: "POST", url: "u".into() }),
                _ => Ok("ok"),
            }
        });
        assert_eq!(out.expect("third attempt succeeds"), "ok");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn retries_are_bounded() {
        let calls = Cell::new(0);
        let out: std::result::Result<(), _> = embedder(3).with_retries(|| {
            calls.set(calls.get() + 1);
            Err(status(429))
        });
        assert!(matches!(out, Err(HttpError::Status { .. })));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn permanent_failures_are_not_retried() {
        for err in [
            status(400),
            status(404),
            decode_error("u", "garbage"),
        ] {
            let calls = Cell::new(0);
            let mut pending = Some(err);
            let out: std::result::Result<(), _> = embedder(5).with_retries(|| {
                calls.set(calls.get() + 1);
                Err(pending.take().unwrap_or_else(|| status(500)))
            });
            assert!(out.is_err());
            assert_eq!(calls.get(), 1);
        }
    }

    #[test]
    fn exhausted_retries_surface_as_embedding_unavailable() {
        let err = embedder(2)
            .embed(&["hello".to_string()])
            .expect_err("nothing listens on port 1");
        assert!(matches!(err, RagError::EmbeddingUnavailable(_)), "{err}");
    }

    #[test]
    fn parses_batch_and_single_shapes() {
        let batch = parse_embeddings("u", json!({"embeddings": [[1.0, 2.0], [3.0, 4.0]]}))
            .expect("batch shape");
        assert_eq!(batch, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);

        let single = parse_embeddings("u", json!({"embedding": [0.5, 0.25]})).expect("single shape");
        assert_eq!(single, vec![vec![0.5, 0.25]]);
    }

    #[test]
    fn rejects_ragged_batches() {
        let err = check_shape(2, &[vec![1.0, 2.0], vec![1.0]]).expect_err("ragged batch");
        assert!(matches!(err, RagError::DimensionMismatch { expected: 2, actual: 1 }));

        let err = check_shape(3, &[vec![1.0]]).expect_err("short batch");
        assert!(matches!(err, RagError::EmbeddingUnavailable(_)));
    }
}
