use tracing::info;

use crate::api_connection::connection::ModelGateway;
use crate::api_connection::endpoints::CompletionOptions;
use crate::config::ModelSettings;
use crate::conversation::{complete_with_corrections, start_conversation};
use crate::error::{ExtractionError, Stage, ValidationError};

pub const PORTION_TEMPERATURE: f32 = 0.0;

const PORTION_SYSTEM_PROMPT: &str = "You are a professional cooking assistant. The user may name a dish together \
with a duration or an amount (for example \"borscht for two weeks\" or \"pancakes for four people\"). \
Your task is to work out how many servings that duration or amount corresponds to. \
If no duration or amount is given, assume a single serving.

Answer with a whole number only, without any explanation.";

const PORTION_CORRECTION: &str = "Please respond with the serving count as a whole number only.";

/// Parses a bare positive integer. Fractions and words are rejected, never rounded.
pub fn parse_portion_count(completion: &str) -> Result<u32, ValidationError> {
    let trimmed = completion.trim();
    let value: i64 = trimmed
        .parse()
        .map_err(|_| ValidationError::NotAnInteger(trimmed.to_string()))?;
    if value <= 0 {
        return Err(ValidationError::NonPositive(value));
    }
    u32::try_from(value).map_err(|_| ValidationError::NotAnInteger(trimmed.to_string()))
}

/// Infers how many servings the user's request implies.
pub async fn get_number_of_portions<G>(
    gateway: &G,
    settings: &ModelSettings,
    user_message: &str,
) -> Result<u32, ExtractionError>
where
    G: ModelGateway + ?Sized,
{
    let options = CompletionOptions {
        model: settings.model.clone(),
        temperature: PORTION_TEMPERATURE,
        max_tokens: settings.max_tokens,
        proxy_auth: settings.proxy_auth,
    };
    let mut conversation = start_conversation(PORTION_SYSTEM_PROMPT, user_message);

    let portions = complete_with_corrections(
        gateway,
        Stage::PortionResolution,
        &mut conversation,
        &options,
        PORTION_CORRECTION,
        parse_portion_count,
    )
    .await?;

    info!(portions, "resolved portion count");
    Ok(portions)
}
