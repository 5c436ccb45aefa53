#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use grocery_extract::api_connection::connection::{GatewayError, ModelGateway};
use grocery_extract::api_connection::endpoints::{ChatMessage, CompletionOptions, Role};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    pub options: CompletionOptions,
}

impl RecordedCall {
    pub fn is_ingredient_call(&self) -> bool {
        self.messages
            .first()
            .map(|m| m.role == Role::System && m.content.contains("JSON"))
            .unwrap_or(false)
    }
}

/// Replays canned completions, one queue per pipeline stage, and records every call.
#[derive(Default)]
pub struct ScriptedGateway {
    portions: Mutex<VecDeque<Result<String, GatewayError>>>,
    ingredients: Mutex<VecDeque<Result<String, GatewayError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn portion_reply(self, reply: &str) -> Self {
        self.portions.lock().unwrap().push_back(Ok(reply.to_string()));
        self
    }

    pub fn portion_error(self, err: GatewayError) -> Self {
        self.portions.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn ingredient_reply(self, reply: &str) -> Self {
        self.ingredients.lock().unwrap().push_back(Ok(reply.to_string()));
        self
    }

    pub fn ingredient_error(self, err: GatewayError) -> Self {
        self.ingredients.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn portion_calls(&self) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| !c.is_ingredient_call()).collect()
    }

    pub fn ingredient_calls(&self) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.is_ingredient_call()).collect()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, GatewayError> {
        let call = RecordedCall {
            messages: messages.to_vec(),
            options: options.clone(),
        };
        let queue = if call.is_ingredient_call() {
            &self.ingredients
        } else {
            &self.portions
        };
        self.calls.lock().unwrap().push(call);
        let next = queue.lock().unwrap().pop_front();
        next.unwrap_or_else(|| panic!("scripted gateway ran out of replies"))
    }
}

pub fn api_error(status: reqwest::StatusCode) -> GatewayError {
    GatewayError::Api {
        status,
        error_body: "{\"error\":\"scripted\"}".to_string(),
    }
}
