use std::fmt::Write as _;

use crate::actions::{Action, ActionSpec};
use crate::stores::ConversationTurn;

pub const CONTEXT_SEPARATOR: &str = "\n---\n";

const DEFAULT_PERSONA: &str = "You are an AI agent.";

/// Assembles the single completion prompt for one chat turn.
#[derive(Clone, Debug)]
pub struct PromptComposer {
    history_turns: usize,
    persona: Option<String>,
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::new(6)
    }
}

impl PromptComposer {
    pub fn new(history_turns: usize) -> Self {
        Self {
            history_turns,
            persona: None,
        }
    }

    /// Opening instruction used when the agent has no system prompt of its own.
    pub fn with_persona(mut self, persona: &str) -> Self {
        self.persona = Some(persona.to_string()).filter(|p| !p.trim().is_empty());
        self
    }

    pub fn history_turns(&self) -> usize {
        self.history_turns
    }

    pub fn compose(
        &self,
        context: &[String],
        history: &[ConversationTurn],
        actions: &[Action],
        question: &str,
    ) -> String {
        self.compose_with_persona(None, context, history, actions, question)
    }

    pub fn compose_with_persona(
        &self,
        persona: Option<&str>,
        context: &[String],
        history: &[ConversationTurn],
        actions: &[Action],
        question: &str,
    ) -> String {
        let persona = persona
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .or_else(|| self.persona.as_deref().map(str::trim))
            .unwrap_or(DEFAULT_PERSONA);

        let mut prompt = String::new();
        prompt.push_str(persona);
        prompt.push_str("\n\n");
        prompt.push_str(RESPONSE_FORMAT);
        prompt.push_str("\n\nAvailable actions:\n");
        prompt.push_str(&format_actions(actions));
        prompt.push_str("\n\nUse the context below to answer.\n\nContext:\n");
        prompt.push_str(&format_context(context));
        prompt.push_str("\n\nConversation so far:\n");
        prompt.push_str(&format_history(history, self.history_turns));
        let _ = write!(prompt, "\n\nQuestion: {}\n", question.trim());
        prompt
    }
}

const RESPONSE_FORMAT: &str = r#"Answer the question strictly as a single JSON object in this format:

{
  "answer": "your answer here",
  "action": "action type or null",
  "action_payload": { } or null
}

"answer" is required. Set "action" and "action_payload" only when one of the available actions clearly matches what the user wants; otherwise use null for both.
When you set "action_payload", copy the payload of the matching action below exactly as listed. Never invent a payload."#;

pub fn format_context(context: &[String]) -> String {
    let chunks: Vec<&str> = context
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();
    if chunks.is_empty() {
        "(no context found)".to_string()
    } else {
        chunks.join(CONTEXT_SEPARATOR)
    }
}

/// The most recent `limit` turns, oldest first, as `User:` / `Agent:` lines.
pub fn format_history(history: &[ConversationTurn], limit: usize) -> String {
    let mut turns: Vec<&ConversationTurn> = history.iter().collect();
    turns.sort_by_key(|t| t.created_at);
    let skip = turns.len().saturating_sub(limit);

    let mut out = String::new();
    for turn in turns.into_iter().skip(skip) {
        let _ = writeln!(out, "User: {}", turn.prompt.trim());
        let _ = writeln!(out, "Agent: {}", turn.response.trim());
    }
    if out.is_empty() {
        "(no previous messages)".to_string()
    } else {
        out.trim_end().to_string()
    }
}

pub fn format_actions(actions: &[Action]) -> String {
    if actions.is_empty() {
        return "(none)".to_string();
    }
    let mut out = String::new();
    for (i, action) in actions.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "{}. {} (type: {})", i + 1, action.name, action.kind());
        if let Some(trigger) = &action.trigger {
            let _ = writeln!(out, "   Use when: {}", trigger);
        }
        match &action.spec {
            ActionSpec::ApiCall(p) => {
                let _ = writeln!(out, "   API: {} {}", p.method.as_str(), p.url);
            }
            ActionSpec::Redirect(p) => {
                let _ = writeln!(out, "   URL: {}", p.url);
            }
            ActionSpec::Button(p) => {
                let _ = writeln!(out, "   Button label: {}", p.display_name);
            }
            ActionSpec::CollectLeads(p) => {
                let labels: Vec<&str> = p.fields.iter().map(|f| f.label.as_str()).collect();
                let _ = writeln!(out, "   Fields: {}", labels.join(", "));
            }
        }
        let _ = write!(out, "   Payload: {}", action.prompt_payload());
    }
    out
}
