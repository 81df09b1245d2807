//! Collaborators owned by the surrounding CRUD layer, seen through the
//! narrow interfaces the answer pipeline needs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::actions::{Action, ActionKind};
use crate::error::Result;
use crate::sources::Source;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub response_tokens: usize,
    pub total_tokens: usize,
}

impl TokenUsage {
    /// Whitespace word counts; a stand-in until a real tokenizer is wired in.
    pub fn approximate(prompt: &str, response: &str) -> Self {
        let prompt_tokens = prompt.split_whitespace().count();
        let response_tokens = response.split_whitespace().count();
        Self {
            prompt_tokens,
            response_tokens,
            total_tokens: prompt_tokens + response_tokens,
        }
    }
}

/// One logged chat exchange. Append-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub agent_id: String,
    pub user_id: String,
    pub prompt: String,
    pub response: String,
    pub action: Option<ActionKind>,
    pub action_payload: Option<Value>,
    pub usage: TokenUsage,
    pub created_at: DateTime<Utc>,
}

/// Per-agent overrides from the agent's settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub system_prompt: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

pub trait SourceStore: Send + Sync {
    fn find_sources(&self, agent_id: &str) -> Result<Vec<Source>>;
}

pub trait ActionCatalogue: Send + Sync {
    fn find_actions(&self, agent_id: &str) -> Result<Vec<Action>>;
}

pub trait ChatHistory: Send + Sync {
    /// Up to `limit` most recent turns for the pair, in any order.
    fn find_recent(&self, agent_id: &str, user_id: &str, limit: usize)
        -> Result<Vec<ConversationTurn>>;

    fn append(&self, turn: ConversationTurn) -> Result<()>;
}

pub trait AgentProfiles: Send + Sync {
    fn profile(&self, agent_id: &str) -> Result<Option<AgentProfile>>;
}

/// Process-local stand-in for every collaborator store.
#[derive(Default)]
pub struct MemoryStore {
    sources: RwLock<HashMap<String, Vec<Source>>>,
    actions: RwLock<HashMap<String, Vec<Action>>>,
    turns: RwLock<Vec<ConversationTurn>>,
    profiles: RwLock<HashMap<String, AgentProfile>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a source by id.
    pub fn put_source(&self, source: Source) {
        let mut sources = self.sources.write();
        let list = sources.entry(source.agent_id.clone()).or_default();
        match list.iter_mut().find(|s| s.id == source.id) {
            Some(existing) => *existing = source,
            None => list.push(source),
        }
    }

    pub fn set_actions(&self, agent_id: &str, actions: Vec<Action>) {
        self.actions.write().insert(agent_id.to_string(), actions);
    }

    pub fn set_profile(&self, agent_id: &str, profile: AgentProfile) {
        self.profiles.write().insert(agent_id.to_string(), profile);
    }

    pub fn turns(&self) -> Vec<ConversationTurn> {
        self.turns.read().clone()
    }
}

impl SourceStore for MemoryStore {
    fn find_sources(&self, agent_id: &str) -> Result<Vec<Source>> {
        Ok(self.sources.read().get(agent_id).cloned().unwrap_or_default())
    }
}

impl ActionCatalogue for MemoryStore {
    fn find_actions(&self, agent_id: &str) -> Result<Vec<Action>> {
        Ok(self.actions.read().get(agent_id).cloned().unwrap_or_default())
    }
}

impl ChatHistory for MemoryStore {
    fn find_recent(
        &self,
        agent_id: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>> {
        let turns = self.turns.read();
        let mut recent: Vec<ConversationTurn> = turns
            .iter()
            .rev()
            .filter(|t| t.agent_id == agent_id && t.user_id == user_id)
            .take(limit)
            .cloned()
            .collect();
        recent.reverse();
        Ok(recent)
    }

    fn append(&self, turn: ConversationTurn) -> Result<()> {
        self.turns.write().push(turn);
        Ok(())
    }
}

impl AgentProfiles for MemoryStore {
    fn profile(&self, agent_id: &str) -> Result<Option<AgentProfile>> {
        Ok(self.profiles.read().get(agent_id).cloned())
    }
}
