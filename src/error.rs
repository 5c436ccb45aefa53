use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::api_connection::connection::GatewayError;

/// Pipeline stage a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    PortionResolution,
    IngredientExtraction,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::PortionResolution => write!(f, "portion resolution"),
            Stage::IngredientExtraction => write!(f, "ingredient extraction"),
        }
    }
}

/// Why a completion was rejected. Always answered with a corrective message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("expected a whole number, got '{0}'")]
    NotAnInteger(String),
    #[error("portion count must be positive, got {0}")]
    NonPositive(i64),
    #[error("response is not valid JSON: {0}")]
    MalformedJson(String),
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
    #[error("value for '{ingredient}' is not an integer: {value}")]
    NonIntegerValue { ingredient: String, value: String },
    #[error("value for '{ingredient}' is negative: {value}")]
    NegativeValue { ingredient: String, value: i64 },
    #[error("value for '{ingredient}' exceeds {limit} g per serving: {value}")]
    ValueTooLarge {
        ingredient: String,
        value: u64,
        limit: u64,
    },
    #[error("ingredient name is empty")]
    EmptyName,
    #[error("ingredient name exceeds {limit} characters: '{name}'")]
    NameTooLong { name: String, limit: usize },
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("{}", exhausted_message(.stage))]
    Exhausted {
        stage: Stage,
        attempts: u32,
        last_failure: String,
    },
    #[error("{stage} failed: {}", .source.summary())]
    Gateway {
        stage: Stage,
        #[source]
        source: GatewayError,
    },
    #[error("{first}; {second}")]
    Both {
        first: Box<ExtractionError>,
        second: Box<ExtractionError>,
    },
    #[error("extraction timed out after {0:?}")]
    Timeout(Duration),
}

fn exhausted_message(stage: &Stage) -> &'static str {
    match stage {
        Stage::PortionResolution => "could not determine portion count after repeated attempts",
        Stage::IngredientExtraction => {
            "could not obtain a valid structured ingredient list after repeated attempts"
        }
    }
}

impl ExtractionError {
    /// Stages implicated in this failure, in the order they were reported.
    pub fn stages(&self) -> Vec<Stage> {
        match self {
            ExtractionError::Exhausted { stage, .. } | ExtractionError::Gateway { stage, .. } => {
                vec![*stage]
            }
            ExtractionError::Both { first, second } => {
                let mut stages = first.stages();
                stages.extend(second.stages());
                stages
            }
            ExtractionError::Timeout(_) => Vec::new(),
        }
    }

    pub fn attempts(&self) -> Option<u32> {
        match self {
            ExtractionError::Exhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

/// Uniform failure payload handed to the front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionFailure {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

impl From<&ExtractionError> for ExtractionFailure {
    fn from(err: &ExtractionError) -> Self {
        Self {
            error: err.to_string(),
            stages: err.stages(),
            attempts: err.attempts(),
        }
    }
}

impl From<ExtractionError> for ExtractionFailure {
    fn from(err: ExtractionError) -> Self {
        Self::from(&err)
    }
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.error)
    }
}
