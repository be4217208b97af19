//! OpenAI-compatible chat-completions backend.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{IssueDraft, PullRequestReview, ReviewRequest, SuggestionError, SuggestionSource};

/// Diffs beyond this many characters are cut before prompting.
const MAX_DIFF_CHARS: usize = 12_000;

static JSON_ARRAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*\]").expect("valid regex"));
static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiSuggester {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiSuggester {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    async fn complete(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, SuggestionError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens,
            temperature: 0.7,
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SuggestionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| SuggestionError::Schema(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .ok_or_else(|| SuggestionError::Schema("response has no message content".into()))
    }
}

#[async_trait]
impl SuggestionSource for OpenAiSuggester {
    async fn suggest_labels(
        &self,
        issue: &IssueDraft,
        existing_labels: &[String],
    ) -> Result<Vec<String>, SuggestionError> {
        let prompt = label_prompt(issue, existing_labels);
        let content = self
            .complete(
                "You are a helpful assistant for managing GitHub issues.",
                &prompt,
                150,
            )
            .await?;
        debug!(%content, "label suggestion response");
        parse_labels(&content)
    }

    async fn review_pull_request(
        &self,
        request: &ReviewRequest,
    ) -> Result<PullRequestReview, SuggestionError> {
        let prompt = review_prompt(request);
        let content = self
            .complete("You are an expert code reviewer.", &prompt, 700)
            .await?;
        debug!(%content, "pull request review response");
        parse_review(&content)
    }
}

pub fn label_prompt(issue: &IssueDraft, existing_labels: &[String]) -> String {
    format!(
        "Based on the following issue details, suggest GitHub labels that best describe the issue.\n\
         You may choose from the predefined labels below or suggest new ones if you think they are necessary.\n\n\
         Title: {}\n\
         Description: {}\n\n\
         Predefined labels: {}\n\n\
         If you suggest a new label, ensure it is concise, relevant, and follows common GitHub labeling practices.\n\
         Return the labels as a JSON list.",
        issue.title,
        issue.body,
        existing_labels.join(", ")
    )
}

pub fn review_prompt(request: &ReviewRequest) -> String {
    let mut changes = String::new();
    for file in &request.files {
        changes.push_str(&format!(
            "File: {}\nDiff:\n{}\n\n",
            file.filename,
            file.patch.as_deref().unwrap_or("(no textual diff)")
        ));
    }
    if changes.chars().count() > MAX_DIFF_CHARS {
        changes = changes.chars().take(MAX_DIFF_CHARS).collect();
        changes.push_str("\n[diff truncated]\n");
    }

    let issues = if request.open_issues.is_empty() {
        "(none)".to_string()
    } else {
        request
            .open_issues
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "A Pull Request has been created with the following details:\n\n\
         Title: {}\n\
         Description: {}\n\n\
         Here are the changes made in this Pull Request:\n{}\n\
         These are the open issues created by the author:\n{}\n\n\
         Review the changes and provide specific, concise suggestions for improvement or potential issues.\n\
         Also decide which of the listed issues, if any, this Pull Request resolves.\n\
         Answer with a JSON object: {{\"related_issue\": <issue number or null>, \"review\": \"<your review>\"}}",
        request.pull_request.title,
        request.pull_request.body.as_deref().unwrap_or(""),
        changes,
        issues
    )
}

/// Extract a JSON list of label names from model output, tolerating code
/// fences and surrounding prose.
pub fn parse_labels(content: &str) -> Result<Vec<String>, SuggestionError> {
    let value: Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(_) => {
            let candidate = JSON_ARRAY
                .find(content)
                .ok_or_else(|| SuggestionError::Schema("no JSON list in response".into()))?;
            serde_json::from_str(candidate.as_str())
                .map_err(|e| SuggestionError::Schema(e.to_string()))?
        }
    };

    let Value::Array(items) = value else {
        return Err(SuggestionError::Schema("response is not a JSON list".into()));
    };

    let mut labels = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(s) => {
                let s = s.trim();
                if !s.is_empty() && !labels.iter().any(|l: &String| l == s) {
                    labels.push(s.to_string());
                }
            }
            other => {
                return Err(SuggestionError::Schema(format!(
                    "label is not a string: {}",
                    other
                )))
            }
        }
    }
    Ok(labels)
}

/// Extract `{related_issue, review}` from model output.
pub fn parse_review(content: &str) -> Result<PullRequestReview, SuggestionError> {
    let value: Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(_) => {
            let candidate = JSON_OBJECT
                .find(content)
                .ok_or_else(|| SuggestionError::Schema("no JSON object in response".into()))?;
            serde_json::from_str(candidate.as_str())
                .map_err(|e| SuggestionError::Schema(e.to_string()))?
        }
    };

    let Value::Object(map) = value else {
        return Err(SuggestionError::Schema("response is not a JSON object".into()));
    };

    let related_issue = match map.get("related_issue") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().trim_start_matches('#').parse().ok(),
        Some(other) => {
            return Err(SuggestionError::Schema(format!(
                "related_issue has unexpected type: {}",
                other
            )))
        }
    };

    let review = match map.get("review") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(other) => {
            return Err(SuggestionError::Schema(format!(
                "review has unexpected type: {}",
                other
            )))
        }
    };

    Ok(PullRequestReview {
        related_issue,
        review,
    })
}
