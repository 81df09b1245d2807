use serde::{Deserialize, Serialize};

/// A knowledge source owned by one agent. Read-only to ingestion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: String,
    pub agent_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(flatten)]
    pub body: SourceBody,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceBody {
    Document {
        #[serde(rename = "fileUrl")]
        file_url: String,
    },
    Text {
        #[serde(rename = "sourcesArray", default)]
        blocks: Vec<TextBlock>,
    },
    Qna {
        #[serde(rename = "sourcesArray", default)]
        groups: Vec<QnaGroup>,
    },
    Website {
        #[serde(rename = "sourcesArray", default)]
        sites: Vec<WebsiteEntry>,
    },
    #[serde(other)]
    Unknown,
}

impl SourceBody {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceBody::Document { .. } => "document",
            SourceBody::Text { .. } => "text",
            SourceBody::Qna { .. } => "qna",
            SourceBody::Website { .. } => "website",
            SourceBody::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    #[serde(default)]
    pub title: String,
    pub content: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QnaGroup {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub questions: Vec<String>,
    pub answer: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WebsiteEntry {
    pub url: String,
    #[serde(default)]
    pub links: Vec<String>,
}

impl Source {
    pub fn text(id: &str, agent_id: &str, title: &str, blocks: Vec<TextBlock>) -> Self {
        Self {
            id: id.to_string(),
            agent_id: agent_id.to_string(),
            title: title.to_string(),
            body: SourceBody::Text { blocks },
        }
    }

    pub fn document(id: &str, agent_id: &str, title: &str, file_url: &str) -> Self {
        Self {
            id: id.to_string(),
            agent_id: agent_id.to_string(),
            title: title.to_string(),
            body: SourceBody::Document {
                file_url: file_url.to_string(),
            },
        }
    }

    pub fn qna(id: &str, agent_id: &str, title: &str, groups: Vec<QnaGroup>) -> Self {
        Self {
            id: id.to_string(),
            agent_id: agent_id.to_string(),
            title: title.to_string(),
            body: SourceBody::Qna { groups },
        }
    }

    pub fn kind(&self) -> &'static str {
        self.body.kind()
    }
}
