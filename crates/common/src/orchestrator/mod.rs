//! Query-processing orchestrator
//!
//! Classifies a query, routes it to the grounded or direct path and
//! returns exactly one answer. Every dependency failure is absorbed by the
//! node that hit it, so `answer` has no error variant.

mod classifier;
mod generator;
mod prompts;
mod retriever;
mod router;
mod state;

pub use classifier::{Classification, Classifier, DEFAULT_QUERY_TYPE};
pub use generator::{DirectGenerator, Generated, GroundedGenerator};
pub use prompts::{Prompts, NO_CONTEXT};
pub use retriever::{Retrieval, Retriever};
pub use router::route;
pub use state::{normalize_query, ChatMessage, QueryType, RequestState, Role, Stage};

use crate::config::{AppConfig, AssistantConfig};
use crate::errors::Result;
use crate::inference::InferenceClient;
use crate::knowledge::KnowledgeStore;
use crate::metrics;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// Knobs the orchestrator is built with
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub top_k: usize,
    pub inference_timeout: Duration,
    pub store_timeout: Duration,
    pub assistant: AssistantConfig,
}

impl OrchestratorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            top_k: config.knowledge.top_k,
            inference_timeout: config.inference.timeout(),
            store_timeout: config.knowledge.timeout(),
            assistant: config.assistant.clone(),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// What the caller gets back
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    /// True when fixed fallback text stands in for a model answer
    pub fallback: bool,
}

/// The state machine. Built once at startup and shared by all requests.
pub struct Orchestrator {
    prompts: Arc<Prompts>,
    classifier: Classifier,
    retriever: Retriever,
    grounded: GroundedGenerator,
    direct: DirectGenerator,
}

impl Orchestrator {
    pub fn new(
        inference: Arc<dyn InferenceClient>,
        store: Arc<dyn KnowledgeStore>,
        settings: OrchestratorSettings,
    ) -> Self {
        let prompts = Arc::new(Prompts::new(settings.assistant));
        let timeout = settings.inference_timeout;

        Self {
            classifier: Classifier::new(inference.clone(), prompts.clone(), timeout),
            retriever: Retriever::new(store, settings.top_k, settings.store_timeout),
            grounded: GroundedGenerator::new(inference.clone(), prompts.clone(), timeout),
            direct: DirectGenerator::new(inference, prompts.clone(), timeout),
            prompts,
        }
    }

    /// First-message greeting; touches neither client
    pub fn greeting(&self) -> &str {
        self.prompts.greeting()
    }

    /// Fixed apology-and-redirect text
    pub fn fallback(&self) -> &str {
        self.prompts.fallback()
    }

    /// Answer one query; always returns non-empty text
    pub async fn answer(&self, query: &str) -> Answer {
        let state = self.process(query).await;

        let path = match state.query_type() {
            Some(QueryType::Company) => "grounded",
            _ => "direct",
        };
        let fallback = state.fallback_used();
        metrics::record_answer(path, fallback);

        let text = state
            .final_answer()
            .map(|m| m.content.clone())
            .unwrap_or_else(|| self.prompts.fallback().to_string());

        Answer { text, fallback }
    }

    /// Like `answer`, but gives up as soon as `cancel` fires.
    ///
    /// Dropping the pipeline future drops whichever upstream call is in
    /// flight.
    pub async fn answer_cancellable(&self, query: &str, cancel: &CancellationToken) -> Option<Answer> {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Request cancelled before an answer was produced");
                None
            }
            answer = self.answer(query) => Some(answer),
        }
    }

    /// Run the full pipeline and hand back the finished state
    pub async fn process(&self, query: &str) -> RequestState {
        let state = RequestState::new(query);
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("orchestrator", %request_id, query_len = state.query().len());
        self.run(state).instrument(span).await
    }

    async fn run(&self, mut state: RequestState) -> RequestState {
        let mut stage = Stage::Start;

        while stage != Stage::Done {
            state.enter(stage);
            let next = match self.step(stage, &mut state).await {
                Ok(next) => next,
                Err(e) => {
                    tracing::error!(error = %e, stage = ?stage, "Orchestrator invariant violated");
                    Stage::Done
                }
            };
            tracing::debug!(from = ?stage, to = ?next, "Transition");
            stage = next;
        }
        state.enter(Stage::Done);

        if state.final_answer().is_none() {
            tracing::error!(trail = ?state.trail(), "No terminal node produced an answer");
            let fallback = ChatMessage::assistant(self.prompts.fallback());
            if let Err(e) = state.set_final_answer(fallback, true) {
                tracing::error!(error = %e, "Could not record fallback answer");
            }
        }

        tracing::info!(
            query_type = ?state.query_type(),
            retrieval_succeeded = ?state.retrieval_succeeded(),
            fallback = state.fallback_used(),
            "Request processed"
        );

        state
    }

    /// One transition
    async fn step(&self, stage: Stage, state: &mut RequestState) -> Result<Stage> {
        match stage {
            Stage::Start => Ok(Stage::Classifying),
            Stage::Classifying => {
                let classification = self.classifier.run(state.query()).await;
                state.append(classification.turn);
                state.set_query_type(classification.query_type)?;
                Ok(route(classification.query_type))
            }
            Stage::Retrieving => {
                let retrieval = self.retriever.run(state.query()).await;
                state.set_retrieval(retrieval.passages, retrieval.succeeded)?;
                Ok(Stage::GeneratingGrounded)
            }
            Stage::GeneratingGrounded => {
                let generated = self
                    .grounded
                    .run(state.query(), state.retrieved_passages())
                    .await;
                state.set_final_answer(generated.message, generated.fallback)?;
                Ok(Stage::Done)
            }
            Stage::GeneratingDirect => {
                let generated = self.direct.run(state.query()).await;
                state.set_final_answer(generated.message, generated.fallback)?;
                Ok(Stage::Done)
            }
            Stage::Done => Ok(Stage::Done),
        }
    }
}
