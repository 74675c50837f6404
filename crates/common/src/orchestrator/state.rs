//! Request-scoped state owned by the orchestrator
//!
//! One `RequestState` exists per incoming query and is dropped once the
//! answer is returned. Nodes never hold it; the orchestrator applies their
//! outputs through the write-once setters below.

use crate::errors::{AppError, Result};
use crate::knowledge::Passage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification label for an incoming query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    /// Not about the company; answered directly
    General,
    /// About the company, its products or its industry; answered from the knowledge store
    Company,
    /// The model could not tell
    Unknown,
}

impl QueryType {
    pub const ALL: [QueryType; 3] = [QueryType::General, QueryType::Company, QueryType::Unknown];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::General => "general",
            QueryType::Company => "company",
            QueryType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        QueryType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| AppError::StructuredOutput {
                message: format!("`{}` is not a query type", s),
            })
    }
}

/// Author of a conversation-log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }
}

/// Orchestrator states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    Classifying,
    Retrieving,
    GeneratingGrounded,
    GeneratingDirect,
    Done,
}

/// Collapse runs of whitespace and trim the ends
pub fn normalize_query(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone)]
pub struct RequestState {
    conversation_log: Vec<ChatMessage>,
    query: String,
    query_type: Option<QueryType>,
    retrieved_passages: Vec<Passage>,
    retrieval_succeeded: Option<bool>,
    final_answer: Option<ChatMessage>,
    fallback_used: bool,
    trail: Vec<Stage>,
}

impl RequestState {
    /// Seed state for one request
    pub fn new(raw_query: &str) -> Self {
        let query = normalize_query(raw_query);
        Self {
            conversation_log: vec![ChatMessage::user(query.clone())],
            query,
            query_type: None,
            retrieved_passages: Vec::new(),
            retrieval_succeeded: None,
            final_answer: None,
            fallback_used: false,
            trail: Vec::new(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn query_type(&self) -> Option<QueryType> {
        self.query_type
    }

    pub fn conversation_log(&self) -> &[ChatMessage] {
        &self.conversation_log
    }

    pub fn retrieved_passages(&self) -> &[Passage] {
        &self.retrieved_passages
    }

    /// `None` when retrieval never ran
    pub fn retrieval_succeeded(&self) -> Option<bool> {
        self.retrieval_succeeded
    }

    pub fn final_answer(&self) -> Option<&ChatMessage> {
        self.final_answer.as_ref()
    }

    /// Whether any fixed fallback text stands in for a model answer
    pub fn fallback_used(&self) -> bool {
        self.fallback_used
    }

    /// States visited, in order
    pub fn trail(&self) -> &[Stage] {
        &self.trail
    }

    pub(crate) fn enter(&mut self, stage: Stage) {
        self.trail.push(stage);
    }

    pub(crate) fn append(&mut self, message: ChatMessage) {
        self.conversation_log.push(message);
    }

    pub(crate) fn set_query_type(&mut self, query_type: QueryType) -> Result<()> {
        if let Some(existing) = self.query_type {
            return Err(invariant(format!(
                "query type already set to {}, refusing {}",
                existing, query_type
            )));
        }
        self.query_type = Some(query_type);
        Ok(())
    }

    pub(crate) fn set_retrieval(&mut self, passages: Vec<Passage>, succeeded: bool) -> Result<()> {
        if self.query_type != Some(QueryType::Company) {
            return Err(invariant("retrieval outside the company path".to_string()));
        }
        if self.retrieval_succeeded.is_some() {
            return Err(invariant("retrieval already recorded".to_string()));
        }
        self.retrieved_passages = passages;
        self.retrieval_succeeded = Some(succeeded);
        Ok(())
    }

    pub(crate) fn set_final_answer(&mut self, answer: ChatMessage, fallback: bool) -> Result<()> {
        if self.final_answer.is_some() {
            return Err(invariant("final answer already written".to_string()));
        }
        self.conversation_log.push(answer.clone());
        self.final_answer = Some(answer);
        self.fallback_used |= fallback;
        Ok(())
    }
}

fn invariant(message: String) -> AppError {
    AppError::Internal { message }
}
