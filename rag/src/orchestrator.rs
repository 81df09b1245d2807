use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;

use crate::actions::{Action, ActionKind};
use crate::build_prompt::PromptComposer;
use crate::error::Result;
use crate::generate::{Completer, CompletionOptions};
use crate::parse_response::{parse_response, ModelResponse};
use crate::stores::{
    ActionCatalogue, AgentProfile, AgentProfiles, ChatHistory, ConversationTurn, TokenUsage,
};
use crate::vector_index::VectorIndex;

pub const INVALID_JSON_ANSWER: &str = "Error: Agent did not return valid JSON.";
pub const UNAVAILABLE_ANSWER: &str = "Error: Unable to get response from AI agent.";

/// Result of one chat call together with the context it was grounded on.
#[derive(Clone, Debug)]
pub struct ChatReply {
    pub context: Vec<String>,
    pub response: ModelResponse,
}

pub struct Orchestrator {
    index: VectorIndex,
    completer: Arc<dyn Completer>,
    history: Arc<dyn ChatHistory>,
    actions: Arc<dyn ActionCatalogue>,
    profiles: Option<Arc<dyn AgentProfiles>>,
    composer: PromptComposer,
    options: CompletionOptions,
    top_k: usize,
}

impl Orchestrator {
    pub fn new(
        index: VectorIndex,
        completer: Arc<dyn Completer>,
        history: Arc<dyn ChatHistory>,
        actions: Arc<dyn ActionCatalogue>,
        options: CompletionOptions,
    ) -> Self {
        Self {
            index,
            completer,
            history,
            actions,
            profiles: None,
            composer: PromptComposer::default(),
            options,
            top_k: 5,
        }
    }

    pub fn with_profiles(mut self, profiles: Arc<dyn AgentProfiles>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    pub fn with_composer(mut self, composer: PromptComposer) -> Self {
        self.composer = composer;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn chat(&self, agent_id: &str, user_id: &str, query: &str) -> Result<ModelResponse> {
        self.chat_with_context(agent_id, user_id, query)
            .map(|reply| reply.response)
    }

    /// Runs retrieve, compose, complete, parse and log for one query.
    ///
    /// Only retrieval failures propagate. Completion and parse failures turn
    /// into a fixed fallback answer, and a failed log append is only warned.
    pub fn chat_with_context(
        &self,
        agent_id: &str,
        user_id: &str,
        query: &str,
    ) -> Result<ChatReply> {
        let context = self.index.query(agent_id, query, self.top_k)?;

        let history = self
            .history
            .find_recent(agent_id, user_id, self.composer.history_turns())
            .unwrap_or_else(|err| {
                tracing::warn!(agent_id, user_id, error = %err, "chat history unavailable");
                Vec::new()
            });
        let actions = self.actions.find_actions(agent_id).unwrap_or_else(|err| {
            tracing::warn!(agent_id, error = %err, "action catalogue unavailable");
            Vec::new()
        });
        let profile = self.load_profile(agent_id);

        let prompt = self.composer.compose_with_persona(
            profile.system_prompt.as_deref(),
            &context,
            &history,
            &actions,
            query,
        );
        let options = CompletionOptions {
            model: profile.model.clone().unwrap_or_else(|| self.options.model.clone()),
            temperature: profile.temperature.unwrap_or(self.options.temperature),
        };

        let response = match self.completer.complete(&prompt, &options) {
            Ok(raw) => match parse_response(&raw, &known_kinds(&actions)) {
                Ok(parsed) => parsed,
                Err(err) => {
                    tracing::warn!(agent_id, error = %err, raw = %raw, "unusable model output");
                    ModelResponse::answer_only(INVALID_JSON_ANSWER)
                }
            },
            Err(err) => {
                tracing::warn!(agent_id, error = %err, "completion failed");
                ModelResponse::answer_only(UNAVAILABLE_ANSWER)
            }
        };

        let turn = ConversationTurn {
            agent_id: agent_id.to_string(),
            user_id: user_id.to_string(),
            prompt: query.to_string(),
            response: response.answer.clone(),
            action: response.action,
            action_payload: response.action_payload.clone(),
            usage: TokenUsage::approximate(&prompt, &response.answer),
            created_at: Utc::now(),
        };
        if let Err(err) = self.history.append(turn) {
            tracing::warn!(agent_id, user_id, error = %err, "failed to log chat turn");
        }

        Ok(ChatReply { context, response })
    }

    fn load_profile(&self, agent_id: &str) -> AgentProfile {
        let Some(profiles) = &self.profiles else {
            return AgentProfile::default();
        };
        match profiles.profile(agent_id) {
            Ok(profile) => profile.unwrap_or_default(),
            Err(err) => {
                tracing::warn!(agent_id, error = %err, "agent profile unavailable");
                AgentProfile::default()
            }
        }
    }
}

fn known_kinds(actions: &[Action]) -> HashSet<ActionKind> {
    actions.iter().map(Action::kind).collect()
}
