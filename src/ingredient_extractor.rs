use std::collections::BTreeMap;

use serde_json::Value;
use tracing::info;

use crate::api_connection::connection::ModelGateway;
use crate::api_connection::endpoints::CompletionOptions;
use crate::config::ModelSettings;
use crate::conversation::{complete_with_corrections, start_conversation};
use crate::error::{ExtractionError, Stage, ValidationError};

/// Ingredient name to whole grams.
pub type IngredientTable = BTreeMap<String, u64>;

pub const INGREDIENT_TEMPERATURE: f32 = 0.2;
pub const MAX_GRAMS_PER_SERVING: u64 = 100_000;
pub const MAX_INGREDIENT_NAME_CHARS: usize = 128;

const INGREDIENT_SYSTEM_PROMPT: &str = r#"You are a professional cooking assistant. Your task is to list the ingredients, with exact amounts in grams, needed for ONE serving of the dish the user describes. Format your answer strictly as a JSON object where every ingredient is a key and every value is a whole number of grams (no units).

Special instructions:
1. Ignore any mention of duration or number of servings in the user's message.
2. The answer must be strict JSON, with no explanations and no units inside the values.

Structure of the answer, FOLLOW IT EXACTLY:
{
    "ingredient1": amount_in_grams,
    "ingredient2": amount_in_grams,
    ...
}

Example of a correct answer:
{
    "potato": 500,
    "onion": 100,
    "egg": 50
}

Examples of incorrect answers:
- Units inside values: "potato": "500 grams"
- Text outside the JSON: "Here is your ingredient list..."
- Non-numeric values: "salt": "to taste"

Remember: the answer must be a flat JSON object only. Compute the amounts in grams for a single serving."#;

const INGREDIENT_CORRECTION: &str = "Your previous answer did not match the required format. \
Please answer strictly with a flat JSON object whose values are whole numbers of grams, \
without units and without any explanation.";

/// Strips one surrounding Markdown fence along with any language tag (`json`, `JSON`, ...).
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    if !trimmed.ends_with("```") {
        return trimmed;
    }
    match trimmed.strip_prefix("```") {
        Some(rest) => rest
            .trim_start_matches(|c: char| c.is_ascii_alphanumeric())
            .trim_end_matches("```")
            .trim(),
        None => trimmed,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name.chars().count() > MAX_INGREDIENT_NAME_CHARS {
        return Err(ValidationError::NameTooLong {
            name: name.chars().take(32).collect::<String>() + "...",
            limit: MAX_INGREDIENT_NAME_CHARS,
        });
    }
    Ok(())
}

fn validate_grams(name: &str, value: &Value) -> Result<u64, ValidationError> {
    let grams = match value {
        Value::Number(number) => match (number.as_u64(), number.as_i64()) {
            (Some(grams), _) => grams,
            (None, Some(negative)) => {
                return Err(ValidationError::NegativeValue {
                    ingredient: name.to_string(),
                    value: negative,
                })
            }
            _ => {
                return Err(ValidationError::NonIntegerValue {
                    ingredient: name.to_string(),
                    value: number.to_string(),
                })
            }
        },
        other => {
            return Err(ValidationError::NonIntegerValue {
                ingredient: name.to_string(),
                value: other.to_string(),
            })
        }
    };

    if grams > MAX_GRAMS_PER_SERVING {
        return Err(ValidationError::ValueTooLarge {
            ingredient: name.to_string(),
            value: grams,
            limit: MAX_GRAMS_PER_SERVING,
        });
    }
    Ok(grams)
}

/// Checks a completion against the flat `{"name": grams}` shape.
///
/// An empty object is a valid table.
pub fn parse_ingredient_table(completion: &str) -> Result<IngredientTable, ValidationError> {
    let content = strip_code_fence(completion);
    let value: Value = serde_json::from_str(content)
        .map_err(|e| ValidationError::MalformedJson(e.to_string()))?;

    let entries = match value {
        Value::Object(entries) => entries,
        other => return Err(ValidationError::NotAnObject(json_kind(&other))),
    };

    let mut table = IngredientTable::new();
    for (name, amount) in &entries {
        validate_name(name)?;
        let grams = validate_grams(name, amount)?;
        table.insert(name.clone(), grams);
    }
    Ok(table)
}

/// Asks the model for the per-serving ingredient table of the user's request.
pub async fn get_ingredients_per_portion<G>(
    gateway: &G,
    settings: &ModelSettings,
    user_message: &str,
) -> Result<IngredientTable, ExtractionError>
where
    G: ModelGateway + ?Sized,
{
    let options = CompletionOptions {
        model: settings.model.clone(),
        temperature: INGREDIENT_TEMPERATURE,
        max_tokens: settings.max_tokens,
        proxy_auth: settings.proxy_auth,
    };
    let mut conversation = start_conversation(INGREDIENT_SYSTEM_PROMPT, user_message);

    let table = complete_with_corrections(
        gateway,
        Stage::IngredientExtraction,
        &mut conversation,
        &options,
        INGREDIENT_CORRECTION,
        parse_ingredient_table,
    )
    .await?;

    info!(ingredients = table.len(), "extracted per-serving ingredients");
    Ok(table)
}
