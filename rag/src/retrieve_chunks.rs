use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::store_qdrant::{agent_filter, unavailable, PointPayload, QdrantStore};

#[derive(Deserialize)]
struct Hit {
    #[serde(default)]
    score: f32,
    payload: Option<PointPayload>,
}

#[derive(Deserialize)]
struct QueryResponse {
    result: Option<QueryResult>,
}

#[derive(Deserialize)]
struct QueryResult {
    points: Vec<Hit>,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a [f32],
    limit: usize,
    filter: Value,
    with_payload: bool,
}

impl QdrantStore {
    pub(crate) fn search_points(
        &self,
        agent_id: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<String>> {
        if vector.is_empty() || top_k == 0 {
            return Ok(vec![]);
        }
        let url = format!("{}/points/query", self.collection_url(agent_id));
        let req = QueryRequest {
            query: vector,
            limit: top_k,
            filter: agent_filter(agent_id),
            with_payload: true,
        };
        let res = match self.http.post_json::<QueryResponse, _>(&url, &req) {
            Ok(res) => res,
            Err(err) if err.is_not_found() => {
                tracing::debug!(agent_id, "no collection yet, empty context");
                return Ok(vec![]);
            }
            Err(err) if err.is_timeout() => {
                tracing::warn!(agent_id, error = %err, "vector query timed out, empty context");
                return Ok(vec![]);
            }
            Err(err) => return Err(unavailable(err)),
        };

        let hits = res.result.map(|r| r.points).unwrap_or_default();
        Ok(rank_hits(agent_id, hits, top_k))
    }
}

/// Most similar first; equal scores go to the earlier write, then the
/// earlier chunk. The filter already scopes the query, the agent is
/// re-checked before any text is returned.
fn rank_hits(agent_id: &str, hits: Vec<Hit>, top_k: usize) -> Vec<String> {
    let mut scored: Vec<(f32, PointPayload)> = hits
        .into_iter()
        .filter_map(|hit| hit.payload.map(|p| (hit.score, p)))
        .filter(|(_, p)| p.agent_id == agent_id)
        .collect();
    scored.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then(a.1.inserted_at.cmp(&b.1.inserted_at))
            .then(a.1.sequence_index.cmp(&b.1.sequence_index))
    });
    scored.into_iter().take(top_k).map(|(_, p)| p.text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hit(agent: &str, score: f32, inserted_at: i64, seq: usize, text: &str) -> Hit {
        serde_json::from_value(json!({
            "id": "00000000-0000-0000-0000-000000000000",
            "score": score,
            "payload": {
                "agent_id": agent,
                "entry_id": format!("{agent}:s:{seq}"),
                "source_id": "s",
                "source_kind": "text",
                "sequence_index": seq,
                "inserted_at": inserted_at,
                "text": text,
            }
        }))
        .expect("hit json")
    }

    #[test]
    fn equal_scores_keep_write_order() {
        let hits = vec![
            hit("a1", 0.5, 20, 0, "newer"),
            hit("a1", 0.9, 30, 0, "best"),
            hit("a1", 0.5, 10, 1, "older second chunk"),
            hit("a1", 0.5, 10, 0, "older first chunk"),
        ];
        assert_eq!(
            rank_hits("a1", hits, 3),
            vec!["best", "older first chunk", "older second chunk"]
        );
    }

    #[test]
    fn foreign_agent_points_are_never_returned() {
        let hits = vec![hit("a2", 0.99, 0, 0, "leak"), hit("a1", 0.1, 0, 0, "mine")];
        assert_eq!(rank_hits("a1", hits, 5), vec!["mine"]);
    }
}
