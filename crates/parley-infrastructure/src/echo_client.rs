//! Offline completion client.
//!
//! Answers every turn locally after a fixed latency. Useful for the CLI when
//! no backend is configured and for exercising cancellation end to end.

use async_trait::async_trait;
use parley_core::completion::{
    CompletionClient, CompletionError, CompletionRequest, CompletionResponse, MimicRequest,
};
use parley_core::session::MessageRole;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct EchoCompletionClient {
    latency: Duration,
}

impl Default for EchoCompletionClient {
    fn default() -> Self {
        Self::new(Duration::from_millis(200))
    }
}

impl EchoCompletionClient {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    async fn wait(&self, cancel: &CancellationToken) -> Result<(), CompletionError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CompletionError::Cancelled),
            _ = tokio::time::sleep(self.latency) => Ok(()),
        }
    }

    fn reply_to(request: &CompletionRequest) -> String {
        let prompt = if request.prompt.trim().is_empty() {
            request
                .history
                .iter()
                .rev()
                .find(|m| m.role == MessageRole::User)
                .map(|m| m.content.as_str())
                .unwrap_or_default()
        } else {
            request.prompt.as_str()
        };

        if prompt.is_empty() {
            "(no prompt)".to_string()
        } else {
            format!("You said: {}", prompt)
        }
    }
}

#[async_trait]
impl CompletionClient for EchoCompletionClient {
    async fn complete(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<Option<CompletionResponse>, CompletionError> {
        self.wait(&cancel).await?;

        let reply = Self::reply_to(&request);
        // A prefixed request only wants the continuation.
        let text = match &request.response_prefix {
            Some(prefix) if reply.starts_with(prefix.as_str()) => reply[prefix.len()..].to_string(),
            Some(_) => format!(" {}", reply),
            None => reply,
        };

        tracing::debug!(
            "[EchoCompletionClient] Answered session {} with {} chars",
            request.session_id,
            text.len()
        );
        Ok(Some(CompletionResponse::text(text)))
    }

    async fn mimic_user(
        &self,
        request: MimicRequest,
        cancel: CancellationToken,
    ) -> Result<String, CompletionError> {
        self.wait(&cancel).await?;

        // History is role-flipped: the assistant turns to answer carry the user role.
        let last = request
            .history
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str());

        Ok(match last {
            Some(text) => format!("Tell me more about: {}", text),
            None => "Hello!".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::session::{GenerationSettings, Message, SettingsOverride};

    fn request(prompt: &str, prefix: Option<&str>) -> CompletionRequest {
        CompletionRequest {
            session_id: "s1".to_string(),
            model: "echo".to_string(),
            prompt: prompt.to_string(),
            attachments: Vec::new(),
            history: Vec::new(),
            settings: GenerationSettings::default(),
            system_instruction_override: None,
            settings_override: None,
            personas: Vec::new(),
            response_prefix: prefix.map(str::to_string),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_echoes_prompt() {
        let client = EchoCompletionClient::default();
        let response = client
            .complete(request("Hi", None), CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.text, "You said: Hi");
    }

    #[tokio::test(start_paused = true)]
    async fn test_prefix_returns_continuation_only() {
        let client = EchoCompletionClient::default();
        let response = client
            .complete(request("Hi", Some("You said")), CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.text, ": Hi");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_token_short_circuits() {
        let client = EchoCompletionClient::new(Duration::from_secs(30));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client.complete(request("Hi", None), cancel).await.unwrap_err();
        assert!(err.is_cancellation());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mimic_reads_flipped_history() {
        let client = EchoCompletionClient::default();
        let mimic = MimicRequest {
            session_id: "s1".to_string(),
            model: "echo".to_string(),
            history: vec![Message::user("otters", Vec::new())],
            persona_instruction: None,
            settings: GenerationSettings::default(),
            overrides: SettingsOverride::role_mimic(true),
        };

        let text = client.mimic_user(mimic, CancellationToken::new()).await.unwrap();
        assert_eq!(text, "Tell me more about: otters");
    }
}
