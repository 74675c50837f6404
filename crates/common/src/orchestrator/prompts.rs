//! Prompt templates for the classifier and both generators

use crate::config::AssistantConfig;
use crate::knowledge::Passage;

/// Context line used when the grounded path has nothing to ground on
pub const NO_CONTEXT: &str = "No relevant documents found in knowledge base.";

/// Prompt builder bound to one assistant persona
#[derive(Debug, Clone)]
pub struct Prompts {
    persona: AssistantConfig,
}

impl Prompts {
    /// Blank fixed texts are replaced with the built-in ones so an answer is
    /// never empty
    pub fn new(mut persona: AssistantConfig) -> Self {
        let defaults = AssistantConfig::default();
        if persona.greeting.trim().is_empty() {
            persona.greeting = defaults.greeting;
        }
        if persona.fallback_message.trim().is_empty() {
            persona.fallback_message = defaults.fallback_message;
        }
        Self { persona }
    }

    pub fn greeting(&self) -> &str {
        &self.persona.greeting
    }

    pub fn fallback(&self) -> &str {
        &self.persona.fallback_message
    }

    pub fn classification(&self, query: &str) -> String {
        let p = &self.persona;
        format!(
            "You are a query classifier for {company}, {description}.\n\n\
             Classify the following query into one of these categories:\n\
             - \"general\": General questions not specifically about {company}, its industry, or its products\n\
             - \"company\": Questions about {topics}\n\
             - \"unknown\": Only when the query is too ambiguous to place in either category\n\n\
             Query: {query}\n\n\
             Examples:\n\
             - \"What is the weather today?\" -> general\n\
             - \"How do I cook pasta?\" -> general\n\
             - \"What is {company}?\" -> company\n\
             - \"Tell me about CableERP\" -> company\n\
             - \"How does wire manufacturing work?\" -> company\n\
             - \"What are your products?\" -> company\n\
             - \"Wire and cable industry trends\" -> company\n",
            company = p.company,
            description = p.company_description,
            topics = p.company_topics,
            query = query,
        )
    }

    /// Answer-from-context prompt; an empty `passages` says so explicitly
    pub fn grounded(&self, query: &str, passages: &[Passage]) -> String {
        let p = &self.persona;

        let context = if passages.is_empty() {
            NO_CONTEXT.to_string()
        } else {
            passages
                .iter()
                .enumerate()
                .map(|(i, passage)| format!("Document {}:\n{}\n", i + 1, passage.text))
                .collect::<Vec<_>>()
                .join("\n---\n")
        };

        format!(
            "You are {name}, a knowledgeable assistant for {company}, {description}.\n\n\
             Use the following context to answer the user's question. If the context doesn't \
             contain enough information to answer the question fully, acknowledge this and \
             suggest contacting our customer care team at {support}.\n\n\
             Context:\n{context}\n\n\
             Question: {query}\n\n\
             Guidelines:\n\
             - Answer based primarily on the provided context\n\
             - If information is incomplete or missing, say so honestly; never invent facts\n\
             - Suggest contacting customer care at {support} for anything the context cannot answer\n\
             - Be helpful and professional, concise but informative\n\
             - Provide a direct answer, not a tool call\n\n\
             Answer:\n",
            name = p.name,
            company = p.company,
            description = p.company_description,
            support = p.support_contact,
            context = context,
            query = query,
        )
    }

    pub fn direct(&self, query: &str) -> String {
        let p = &self.persona;
        format!(
            "You are {name}, a helpful assistant. You can answer general questions, but when asked \
             about {company}, its industry, or related technical topics, politely redirect users to \
             contact our specialized team at {support} for detailed information.\n\n\
             Keep responses helpful, concise, and friendly. For general questions, provide helpful \
             answers. For company-specific questions, acknowledge the question and suggest \
             contacting our team rather than guessing.\n\n\
             Provide a direct answer, not a tool call.\n\n\
             User Question: {query}\n\n\
             Response:\n",
            name = p.name,
            company = p.company,
            support = p.support_contact,
            query = query,
        )
    }
}
