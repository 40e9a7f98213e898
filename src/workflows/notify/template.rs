use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Message template with `{{variable}}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTemplate {
    pub key: String,
    pub subject: Option<String>,
    pub body: String,
    pub variables: Vec<String>,
}

/// Read-only template lookup so workflows can be exercised against fakes.
pub trait TemplateStore: Send + Sync {
    fn get(&self, key: &str) -> Option<NotificationTemplate>;
}

/// Replace every `{{key}}` occurrence with its value.
///
/// A placeholder whose key is absent renders as the empty string; this silent
/// policy is relied on by callers that reuse one template across channels.
pub fn render(body: &str, variables: &BTreeMap<String, String>) -> String {
    let mut output = String::with_capacity(body.len());
    let mut rest = body;

    while let Some(open) = rest.find("{{") {
        output.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        match after.find("}}") {
            Some(close) => {
                let key = after[..close].trim();
                if let Some(value) = variables.get(key) {
                    output.push_str(value);
                }
                rest = &after[close + 2..];
            }
            None => {
                // Unterminated placeholder: emit the remainder verbatim.
                output.push_str(&rest[open..]);
                rest = "";
            }
        }
    }

    output.push_str(rest);
    output
}

/// Collect placeholder names, deduplicated, in first-seen order.
pub fn extract_variables(body: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut rest = body;

    while let Some(open) = rest.find("{{") {
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            break;
        };
        let token = after[..close].trim();
        if is_identifier(token) && !names.iter().any(|name| name == token) {
            names.push(token.to_string());
        }
        rest = &after[close + 2..];
    }

    names
}

fn is_identifier(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Outcome of a purely syntactic template check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyntaxReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Check brace balance without verifying that declared variables exist.
pub fn validate_syntax(body: &str) -> SyntaxReport {
    let bytes = body.as_bytes();
    let mut opens = 0usize;
    let mut closes = 0usize;
    let mut stray = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' if i + 1 < bytes.len() && bytes[i + 1] == b'{' => {
                opens += 1;
                i += 2;
            }
            b'}' if i + 1 < bytes.len() && bytes[i + 1] == b'}' => {
                closes += 1;
                i += 2;
            }
            b'{' | b'}' => {
                stray += 1;
                i += 1;
            }
            _ => i += 1,
        }
    }

    let mut errors = Vec::new();
    if opens != closes {
        errors.push(format!(
            "unbalanced placeholders: {opens} opening '{{{{' against {closes} closing '}}}}'"
        ));
    }
    if stray > 0 {
        errors.push(format!(
            "{stray} stray single brace(s); placeholders use double braces"
        ));
    }

    SyntaxReport {
        valid: errors.is_empty(),
        errors,
    }
}

/// Template store backed by a plain map, preloaded with the stock messages.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTemplateStore {
    templates: HashMap<String, NotificationTemplate>,
}

impl InMemoryTemplateStore {
    pub const INTERVIEW_PROPOSAL: &'static str = "interview_proposal";
    pub const INTERVIEW_REMINDER: &'static str = "interview_reminder";
    pub const INTERVIEW_DECISION: &'static str = "interview_decision";
    pub const SIGNATURE_SCHEDULED: &'static str = "signature_scheduled";

    pub fn with_defaults() -> Self {
        let mut store = Self::default();
        store.insert(NotificationTemplate {
            key: Self::INTERVIEW_PROPOSAL.to_string(),
            subject: Some("Compliance interview scheduling".to_string()),
            body: "Hello {{client_name}}! Your compliance interview can happen on {{slot_a}} \
                   or {{slot_b}}, between {{window_start}} and {{window_end}}, at {{venue}} \
                   ({{city}}). Reply with the date that works best for you."
                .to_string(),
            variables: vec![
                "client_name".to_string(),
                "slot_a".to_string(),
                "slot_b".to_string(),
                "window_start".to_string(),
                "window_end".to_string(),
                "venue".to_string(),
                "city".to_string(),
            ],
        });
        store.insert(NotificationTemplate {
            key: Self::INTERVIEW_REMINDER.to_string(),
            subject: Some("Interview date still pending".to_string()),
            body: "Hello {{client_name}}, we are still waiting for your interview date: \
                   {{slot_a}} or {{slot_b}}, between {{window_start}} and {{window_end}}. \
                   Reply here to confirm."
                .to_string(),
            variables: vec![
                "client_name".to_string(),
                "slot_a".to_string(),
                "slot_b".to_string(),
                "window_start".to_string(),
                "window_end".to_string(),
            ],
        });
        store.insert(NotificationTemplate {
            key: Self::INTERVIEW_DECISION.to_string(),
            subject: Some("Compliance interview decision".to_string()),
            body: "Hello {{client_name}}, your compliance interview was {{decision}}. {{note}}"
                .to_string(),
            variables: vec![
                "client_name".to_string(),
                "decision".to_string(),
                "note".to_string(),
            ],
        });
        store.insert(NotificationTemplate {
            key: Self::SIGNATURE_SCHEDULED.to_string(),
            subject: Some("Contract signature scheduled".to_string()),
            body: "Hello {{client_name}}, your contract signature is scheduled for \
                   {{scheduled_for}}."
                .to_string(),
            variables: vec!["client_name".to_string(), "scheduled_for".to_string()],
        });
        store
    }

    pub fn insert(&mut self, template: NotificationTemplate) {
        self.templates.insert(template.key.clone(), template);
    }
}

impl TemplateStore for InMemoryTemplateStore {
    fn get(&self, key: &str) -> Option<NotificationTemplate> {
        self.templates.get(key).cloned()
    }
}
