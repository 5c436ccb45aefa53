//! Turns a free-text meal request into a total shopping quantity table.

use std::time::Duration;

use tracing::{info, info_span, warn, Instrument};

use crate::api_connection::connection::ModelGateway;
use crate::config::ModelSettings;
use crate::error::{ExtractionError, ExtractionFailure};
use crate::ingredient_extractor::{get_ingredients_per_portion, IngredientTable};
use crate::portion_resolver::get_number_of_portions;

/// Ingredient name to total grams across all portions.
pub type QuantityTable = IngredientTable;

/// How the two independent model queries are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Sequential,
    /// Both queries in flight at once, joined before scaling.
    Concurrent,
}

/// Multiplies every per-serving quantity by the portion count.
///
/// Per-serving values are capped at `MAX_GRAMS_PER_SERVING`, so the product of a
/// parsed table and a `u32` portion count always fits in `u64`.
pub fn scale_table(per_portion: IngredientTable, portions: u32) -> QuantityTable {
    per_portion
        .into_iter()
        .map(|(ingredient, grams)| (ingredient, grams.saturating_mul(u64::from(portions))))
        .collect()
}

pub struct ExtractionPipeline<G> {
    gateway: G,
    settings: ModelSettings,
    mode: ExecutionMode,
    timeout: Option<Duration>,
}

impl<G: ModelGateway> ExtractionPipeline<G> {
    pub fn new(gateway: G, settings: ModelSettings) -> Self {
        Self {
            gateway,
            settings,
            mode: ExecutionMode::default(),
            timeout: None,
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Aborts the whole run, both stages included, once `timeout` elapses.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Front-end boundary: a final table or one uniform failure payload.
    pub async fn get_ingredients_list(
        &self,
        user_message: &str,
    ) -> Result<QuantityTable, ExtractionFailure> {
        self.try_extract(user_message).await.map_err(|err| {
            warn!(error = %err, "ingredient list extraction failed");
            ExtractionFailure::from(err)
        })
    }

    pub async fn try_extract(&self, user_message: &str) -> Result<QuantityTable, ExtractionError> {
        let span = info_span!("extraction", mode = ?self.mode);
        let run = self.run(user_message).instrument(span);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| ExtractionError::Timeout(limit))?,
            None => run.await,
        }
    }

    async fn run(&self, user_message: &str) -> Result<QuantityTable, ExtractionError> {
        let (portions, per_portion) = match self.mode {
            ExecutionMode::Sequential => {
                let portions =
                    get_number_of_portions(&self.gateway, &self.settings, user_message).await?;
                let per_portion =
                    get_ingredients_per_portion(&self.gateway, &self.settings, user_message)
                        .await?;
                (portions, per_portion)
            }
            ExecutionMode::Concurrent => {
                let (portions, per_portion) = tokio::join!(
                    get_number_of_portions(&self.gateway, &self.settings, user_message),
                    get_ingredients_per_portion(&self.gateway, &self.settings, user_message),
                );
                match (portions, per_portion) {
                    (Ok(portions), Ok(per_portion)) => (portions, per_portion),
                    (Err(err), Ok(_)) | (Ok(_), Err(err)) => return Err(err),
                    (Err(first), Err(second)) => {
                        return Err(ExtractionError::Both {
                            first: Box::new(first),
                            second: Box::new(second),
                        })
                    }
                }
            }
        };

        let total = scale_table(per_portion, portions);
        info!(portions, ingredients = total.len(), "built final quantity table");
        Ok(total)
    }
}
