use std::collections::HashSet;

use parking_lot::Mutex;
use chrono::Utc;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{RagError, Result};
use crate::http::{HttpClient, HttpError};
use crate::vector_index::{IndexEntry, VectorStore};

#[derive(Serialize)]
struct CreateCollection<'a> {
    vectors: VectorParams<'a>,
}

#[derive(Serialize)]
struct VectorParams<'a> {
    size: usize,
    distance: &'a str,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct PointPayload {
    pub agent_id: String,
    pub entry_id: String,
    pub source_id: String,
    pub source_kind: String,
    pub sequence_index: usize,
    /// Microseconds since the epoch at write time; orders equal-score hits.
    #[serde(default)]
    pub inserted_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub text: String,
}

#[derive(Serialize)]
struct Point {
    id: String,
    vector: Vec<f32>,
    payload: PointPayload,
}

#[derive(Serialize)]
struct UpsertPoints<'a> {
    points: &'a [Point],
}

#[derive(Serialize)]
struct DeletePoints {
    filter: Value,
}

/// Qdrant over its REST API, one collection per agent.
///
/// Every point carries its `agent_id`, and reads and deletes filter on it in
/// addition to the per-agent collection.
pub struct QdrantStore {
    pub(crate) http: HttpClient,
    pub(crate) base_url: String,
    prefix: String,
    distance: String,
    known: Mutex<HashSet<String>>,
}

impl QdrantStore {
    pub fn new(http: HttpClient, base_url: &str, prefix: &str, distance: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            prefix: prefix.to_string(),
            distance: distance.to_string(),
            known: Mutex::new(HashSet::new()),
        }
    }

    pub fn from_config(cfg: &Config, http: HttpClient) -> Self {
        Self::new(http, &cfg.qdrant_url, &cfg.collection_prefix, &cfg.distance)
    }

    pub fn collection_name(&self, agent_id: &str) -> String {
        collection_name(&self.prefix, agent_id)
    }

    pub(crate) fn collection_url(&self, agent_id: &str) -> String {
        format!("{}/collections/{}", self.base_url, self.collection_name(agent_id))
    }

    fn ensure_collection(&self, agent_id: &str, vector_size: usize) -> Result<()> {
        let name = self.collection_name(agent_id);
        if self.known.lock().contains(&name) {
            return Ok(());
        }
        let url = self.collection_url(agent_id);
        match self.http.get_json::<IgnoredAny>(&url) {
            Ok(_) => {}
            Err(err) if err.is_not_found() => {
                let body = CreateCollection {
                    vectors: VectorParams {
                        size: vector_size,
                        distance: &self.distance,
                    },
                };
                self.http
                    .put_json::<IgnoredAny, _>(&url, &body)
                    .map_err(unavailable)?;
                tracing::info!(agent_id, collection = %name, vector_size, "created qdrant collection");
            }
            Err(err) => return Err(unavailable(err)),
        }
        self.known.lock().insert(name);
        Ok(())
    }
}

impl VectorStore for QdrantStore {
    fn upsert(&self, agent_id: &str, entries: &[IndexEntry]) -> Result<()> {
        let Some(first) = entries.first() else {
            return Ok(());
        };
        self.ensure_collection(agent_id, first.vector.len())?;

        let inserted_at = Utc::now().timestamp_micros();
        let points: Vec<Point> = entries
            .iter()
            .map(|entry| Point {
                id: point_id(&entry.id),
                vector: entry.vector.clone(),
                payload: PointPayload {
                    agent_id: agent_id.to_string(),
                    entry_id: entry.id.clone(),
                    source_id: entry.metadata.source_id.clone(),
                    source_kind: entry.metadata.source_kind.clone(),
                    sequence_index: entry.metadata.sequence_index,
                    inserted_at,
                    title: entry.metadata.title.clone(),
                    text: entry.text.clone(),
                },
            })
            .collect();
        let url = format!("{}/points?wait=true", self.collection_url(agent_id));
        self.http
            .put_json::<IgnoredAny, _>(&url, &UpsertPoints { points: &points })
            .map_err(unavailable)?;
        Ok(())
    }

    fn prune_source(&self, agent_id: &str, source_id: &str, keep: usize) -> Result<()> {
        let url = format!("{}/points/delete?wait=true", self.collection_url(agent_id));
        let body = DeletePoints {
            filter: prune_filter(agent_id, source_id, keep),
        };
        match self.http.post_json::<IgnoredAny, _>(&url, &body) {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(unavailable(err)),
        }
    }

    fn search(&self, agent_id: &str, vector: &[f32], top_k: usize) -> Result<Vec<String>> {
        self.search_points(agent_id, vector, top_k)
    }
}

pub(crate) fn agent_filter(agent_id: &str) -> Value {
    json!({ "must": [ { "key": "agent_id", "match": { "value": agent_id } } ] })
}

fn prune_filter(agent_id: &str, source_id: &str, keep: usize) -> Value {
    json!({
        "must": [
            { "key": "agent_id", "match": { "value": agent_id } },
            { "key": "source_id", "match": { "value": source_id } },
            { "key": "sequence_index", "range": { "gte": keep } },
        ]
    })
}

pub(crate) fn unavailable(err: HttpError) -> RagError {
    RagError::IndexUnavailable(err.to_string())
}

/// Qdrant only accepts integer or UUID ids, so entry ids map to UUIDv5.
fn point_id(entry_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, entry_id.as_bytes()).to_string()
}

fn collection_name(prefix: &str, agent_id: &str) -> String {
    let mut out = String::new();
    for c in agent_id.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() {
        out.push_str("default");
    }
    if prefix.is_empty() {
        out
    } else {
        format!("{}_{}", prefix, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_names_are_prefixed_and_sanitized() {
        assert_eq!(collection_name("agent", "64f1c2"), "agent_64f1c2");
        assert_eq!(collection_name("agent", "a b/c"), "agent_a_b_c");
        assert_eq!(collection_name("", ""), "default");
    }

    #[test]
    fn point_ids_are_stable_per_entry() {
        assert_eq!(point_id("a1:s1:0"), point_id("a1:s1:0"));
        assert_ne!(point_id("a1:s1:0"), point_id("a2:s1:0"));
    }

    #[test]
    fn prune_filter_keeps_the_rewritten_prefix() {
        let filter = prune_filter("a1", "s1", 3);
        let must = filter["must"].as_array().expect("must clauses");
        assert_eq!(must.len(), 3);
        assert_eq!(must[0]["match"]["value"], "a1");
        assert_eq!(must[1]["match"]["value"], "s1");
        assert_eq!(must[2]["key"], "sequence_index");
        assert_eq!(must[2]["range"]["gte"], 3);
    }

    #[test]
    fn write_acknowledgements_need_no_particular_shape() {
        for body in [
            r#"{"result":{"operation_id":7,"status":"completed"},"status":"ok","time":0.002}"#,
            r#"{"result":true,"status":"ok","time":0.01}"#,
        ] {
            serde_json::from_str::<IgnoredAny>(body).expect("acknowledgement");
        }
    }

    #[test]
    fn agent_filter_matches_on_payload_field() {
        let filter = agent_filter("a1");
        assert_eq!(filter["must"][0]["key"], "agent_id");
        assert_eq!(filter["must"][0]["match"]["value"], "a1");
    }
}
