//! Agent-configured side effects the model may request alongside an answer.
//!
//! Stores hand actions over in their loose `{name, type, payload}` shape;
//! they are decoded and validated once into [`ActionSpec`] here.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RagError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ApiCall,
    Button,
    Redirect,
    CollectLeads,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        ActionKind::ApiCall,
        ActionKind::Button,
        ActionKind::Redirect,
        ActionKind::CollectLeads,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::ApiCall => "api_call",
            ActionKind::Button => "button",
            ActionKind::Redirect => "redirect",
            ActionKind::CollectLeads => "collect_leads",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        ActionKind::ALL
            .into_iter()
            .find(|k| k.as_str() == norm)
            .ok_or_else(|| format!("unknown action kind: {}", s.trim()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCallPayload {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, rename = "result_accessor", skip_serializing_if = "Option::is_none")]
    pub result_accessor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_method() -> HttpMethod {
    HttpMethod::Get
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonPayload {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RedirectPayload {
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeadField {
    pub label: String,
    #[serde(default)]
    pub key: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollectLeadsPayload {
    pub fields: Vec<LeadField>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ActionSpec {
    ApiCall(ApiCallPayload),
    Button(ButtonPayload),
    Redirect(RedirectPayload),
    CollectLeads(CollectLeadsPayload),
}

impl ActionSpec {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionSpec::ApiCall(_) => ActionKind::ApiCall,
            ActionSpec::Button(_) => ActionKind::Button,
            ActionSpec::Redirect(_) => ActionKind::Redirect,
            ActionSpec::CollectLeads(_) => ActionKind::CollectLeads,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAction", into = "RawAction")]
pub struct Action {
    pub name: String,
    pub trigger: Option<String>,
    pub spec: ActionSpec,
}

/// Store-side shape: `{"name", "type", "payload": {..., "trigger"}}`.
#[derive(Serialize, Deserialize)]
struct RawAction {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

impl TryFrom<RawAction> for Action {
    type Error = String;

    fn try_from(raw: RawAction) -> Result<Self, Self::Error> {
        let name = raw.name.trim().to_string();
        if name.is_empty() {
            return Err("action name is required".to_string());
        }
        let kind: ActionKind = raw.kind.parse()?;
        let payload = if raw.payload.is_null() {
            Value::Object(Map::new())
        } else {
            raw.payload
        };
        let trigger = payload
            .get("trigger")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let spec = decode_spec(kind, payload).map_err(|e| format!("action {}: {}", name, e))?;
        Ok(Action {
            name,
            trigger,
            spec,
        })
    }
}

impl From<Action> for RawAction {
    fn from(action: Action) -> Self {
        let kind = action.spec.kind().as_str().to_string();
        let mut payload = spec_value(&action.spec);
        if let (Some(trigger), Some(map)) = (action.trigger, payload.as_object_mut()) {
            map.insert("trigger".to_string(), Value::String(trigger));
        }
        RawAction {
            name: action.name,
            kind,
            payload,
        }
    }
}

fn decode_spec(kind: ActionKind, payload: Value) -> Result<ActionSpec, String> {
    let spec = match kind {
        ActionKind::ApiCall => {
            let p: ApiCallPayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;
            require_url(&p.url)?;
            ActionSpec::ApiCall(p)
        }
        ActionKind::Button => {
            let p: ButtonPayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;
            if p.display_name.trim().is_empty() {
                return Err("button needs a display name".to_string());
            }
            ActionSpec::Button(p)
        }
        ActionKind::Redirect => {
            let p: RedirectPayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;
            require_url(&p.url)?;
            ActionSpec::Redirect(p)
        }
        ActionKind::CollectLeads => {
            let mut p: CollectLeadsPayload =
                serde_json::from_value(payload).map_err(|e| e.to_string())?;
            p.fields.retain(|f| !f.label.trim().is_empty());
            if p.fields.is_empty() {
                return Err("collect_leads needs at least one labelled field".to_string());
            }
            ActionSpec::CollectLeads(p)
        }
    };
    Ok(spec)
}

fn require_url(url: &str) -> Result<(), String> {
    if url.trim().is_empty() {
        Err("url is required".to_string())
    } else {
        Ok(())
    }
}

fn spec_value(spec: &ActionSpec) -> Value {
    let value = match spec {
        ActionSpec::ApiCall(p) => serde_json::to_value(p),
        ActionSpec::Button(p) => serde_json::to_value(p),
        ActionSpec::Redirect(p) => serde_json::to_value(p),
        ActionSpec::CollectLeads(p) => serde_json::to_value(p),
    };
    value.unwrap_or_else(|_| Value::Object(Map::new()))
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        self.spec.kind()
    }

    /// Payload the model is told to copy verbatim. Credentials are left out.
    pub fn prompt_payload(&self) -> Value {
        let mut value = spec_value(&self.spec);
        if let Some(map) = value.as_object_mut() {
            map.remove("apiKey");
        }
        value
    }
}

/// Decodes a store listing, skipping entries that fail validation.
pub fn decode_actions(values: Vec<Value>) -> Vec<Action> {
    values
        .into_iter()
        .filter_map(|v| match serde_json::from_value::<Action>(v) {
            Ok(action) => Some(action),
            Err(err) => {
                tracing::warn!(error = %err, "skipping invalid action");
                None
            }
        })
        .collect()
}

/// Reads a JSON array of store-shaped actions from disk.
pub fn load_actions(path: &Path) -> crate::error::Result<Vec<Action>> {
    let raw = fs::read_to_string(path).map_err(|e| {
        RagError::Configuration(format!("actions file {}: {}", path.display(), e))
    })?;
    let values: Vec<Value> = serde_json::from_str(&raw).map_err(|e| {
        RagError::Configuration(format!("actions file {} is not a JSON array: {}", path.display(), e))
    })?;
    Ok(decode_actions(values))
}
