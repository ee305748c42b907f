//! Read-only presentation snapshot
//!
//! Projects coordinator state into the shape a front end renders. Holds no
//! state of its own.

use serde::Serialize;

use crate::coordinator::{CoordinatorState, Status};
use crate::domain::QueuedMessage;

/// What a front end shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub messages: Vec<QueuedMessage>,
    pub status: Status,
    pub is_sending: bool,
    pub webhook_url: Option<String>,
    pub error_message: Option<String>,
    /// No endpoint configured and the editor is not already open
    pub show_config_prompt: bool,
    pub show_edit_config: bool,
}

impl ViewState {
    pub fn project(state: &CoordinatorState) -> Self {
        Self {
            messages: state.messages.clone(),
            status: state.status(),
            is_sending: state.sending,
            webhook_url: state.endpoint.clone(),
            error_message: state.last_error.clone(),
            show_config_prompt: !state.endpoint_configured() && !state.show_edit_config,
            show_edit_config: state.show_edit_config,
        }
    }
}

impl From<&CoordinatorState> for ViewState {
    fn from(state: &CoordinatorState) -> Self {
        Self::project(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_install_prompts_for_endpoint() {
        let state = CoordinatorState {
            deliverable: true,
            ..Default::default()
        };
        let view = ViewState::project(&state);

        assert_eq!(view.status, Status::OnlineReady);
        assert!(view.show_config_prompt);
        assert!(!view.show_edit_config);
        assert!(view.webhook_url.is_none());
    }

    #[test]
    fn test_blank_endpoint_counts_as_missing() {
        let state = CoordinatorState {
            endpoint: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(ViewState::project(&state).show_config_prompt);
    }

    #[test]
    fn test_open_editor_hides_prompt() {
        let state = CoordinatorState {
            show_edit_config: true,
            ..Default::default()
        };
        let view = ViewState::project(&state);
        assert!(!view.show_config_prompt);
        assert!(view.show_edit_config);
    }

    #[test]
    fn test_projects_sending_and_error() {
        let state = CoordinatorState {
            messages: vec![QueuedMessage::with_id("m1", "hi")],
            deliverable: true,
            sending: true,
            endpoint: Some("https://example.com/hook".to_string()),
            last_error: Some("404".to_string()),
            show_edit_config: false,
        };
        let view = ViewState::project(&state);

        assert_eq!(view.status, Status::Sending);
        assert!(view.is_sending);
        assert_eq!(view.error_message.as_deref(), Some("404"));
        assert!(!view.show_config_prompt);
        assert_eq!(view.messages.len(), 1);
    }

    #[test]
    fn test_json_field_names() {
        let view = ViewState::project(&CoordinatorState::default());
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["status"], "EMPTY");
        assert_eq!(json["isSending"], false);
        assert_eq!(json["showConfigPrompt"], true);
        assert!(json.get("webhookUrl").is_some());
        assert!(json.get("errorMessage").is_some());
    }
}
