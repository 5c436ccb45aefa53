//! Bounded self-correcting conversation with the model.
//!
//! Each attempt sends the whole conversation. A completion that fails validation
//! leaves a corrective user message behind so the next attempt sees what went wrong.
//! Attempts are strictly sequential and capped at [`RETRY_BUDGET`].

use tracing::{debug, warn};

use crate::api_connection::connection::ModelGateway;
use crate::api_connection::endpoints::{ChatMessage, CompletionOptions};
use crate::error::{ExtractionError, Stage, ValidationError};

pub const RETRY_BUDGET: u32 = 5;

/// Fresh conversation: the task contract first, then the user's request.
pub fn start_conversation(system_prompt: &str, user_message: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user(user_message),
    ]
}

pub async fn complete_with_corrections<G, T, F>(
    gateway: &G,
    stage: Stage,
    conversation: &mut Vec<ChatMessage>,
    options: &CompletionOptions,
    correction: &str,
    mut validate: F,
) -> Result<T, ExtractionError>
where
    G: ModelGateway + ?Sized,
    F: FnMut(&str) -> Result<T, ValidationError>,
{
    let mut last_failure = String::new();

    for attempt in 1..=RETRY_BUDGET {
        match gateway.complete(conversation.as_slice(), options).await {
            Ok(completion) => match validate(&completion) {
                Ok(value) => {
                    debug!(%stage, attempt, "model response accepted");
                    return Ok(value);
                }
                Err(err) => {
                    warn!(%stage, attempt, error = %err, raw = %completion, "model response rejected");
                    last_failure = err.to_string();
                    conversation.push(ChatMessage::user(correction));
                }
            },
            Err(err) if err.is_retryable() => {
                warn!(%stage, attempt, error = %err, "transient gateway failure");
                last_failure = err.to_string();
            }
            Err(err) => {
                warn!(%stage, attempt, error = %err, "gateway failure is not retryable");
                return Err(ExtractionError::Gateway { stage, source: err });
            }
        }
    }

    warn!(%stage, attempts = RETRY_BUDGET, last_failure = %last_failure, "retry budget exhausted");
    Err(ExtractionError::Exhausted {
        stage,
        attempts: RETRY_BUDGET,
        last_failure,
    })
}
