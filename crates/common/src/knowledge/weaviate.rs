//! Weaviate knowledge store client
//!
//! Searches with GraphQL `nearText`, leaving vectorization to the
//! collection's configured text vectorizer.

use super::{KnowledgeStore, Passage};
use crate::config::KnowledgeConfig;
use crate::errors::{within, AppError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

/// Weaviate REST/GraphQL client
pub struct WeaviateStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    vectorizer_api_key: Option<String>,
    collection: String,
    text_property: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<serde_json::Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct InsertResponse {
    id: String,
}

impl WeaviateStore {
    /// Create a new client from configuration
    pub fn new(config: &KnowledgeConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AppError::Configuration {
                message: "knowledge.url is required".to_string(),
            })?;

        let base_url = if url.starts_with("http") {
            url.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", url.trim_end_matches('/'))
        };

        if !is_class_name(&config.collection) {
            return Err(AppError::Configuration {
                message: format!("`{}` is not a valid collection name", config.collection),
            });
        }

        if !is_property_name(&config.text_property) {
            return Err(AppError::Configuration {
                message: format!("`{}` is not a valid property name", config.text_property),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
            vectorizer_api_key: config.vectorizer_api_key.clone(),
            collection: config.collection.clone(),
            text_property: config.text_property.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        };
        match &self.vectorizer_api_key {
            Some(key) => request.header("X-OpenAI-Api-Key", key),
            None => request,
        }
    }

    /// Property passages are written to and read from
    pub fn text_property(&self) -> &str {
        &self.text_property
    }

    /// GraphQL document for a nearText search; selects only the text property
    /// since Weaviate rejects fields the class does not define
    fn search_query(&self, query: &str, limit: usize) -> String {
        // A JSON string literal is also a valid GraphQL string literal
        let concept = serde_json::Value::String(query.to_string()).to_string();
        format!(
            "{{ Get {{ {}(nearText: {{ concepts: [{}] }}, limit: {}) {{ {} _additional {{ id certainty distance }} }} }} }}",
            self.collection, concept, limit, self.text_property
        )
    }

    async fn run_search(&self, query: &str, limit: usize) -> Result<Vec<Passage>> {
        let body = serde_json::json!({ "query": self.search_query(query, limit) });

        let response = self
            .authorized(self.client.post(format!("{}/v1/graphql", self.base_url)))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, text));
        }

        let response: GraphQlResponse = response.json().await.map_err(|e| AppError::StoreQuery {
            message: format!("Failed to parse response: {}", e),
        })?;

        parse_search_response(response, &self.collection, &self.text_property)
    }

    fn insert_body(
        &self,
        content: &str,
        metadata: &serde_json::Map<String, serde_json::Value>,
    ) -> serde_json::Value {
        let mut properties = metadata.clone();
        properties.insert(self.text_property.clone(), serde_json::json!(content));

        serde_json::json!({
            "class": self.collection,
            "properties": properties,
        })
    }

    /// Insert one passage with its metadata properties, returning the object id
    pub async fn insert_passage(
        &self,
        content: &str,
        metadata: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<String> {
        let body = self.insert_body(content, metadata);

        let response = self
            .authorized(self.client.post(format!("{}/v1/objects", self.base_url)))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, text));
        }

        let created: InsertResponse = response.json().await.map_err(|e| AppError::StoreQuery {
            message: format!("Failed to parse insert response: {}", e),
        })?;

        Ok(created.id)
    }
}

fn is_class_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_property_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn transport_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::StoreTimeout { timeout_ms: 0 }
    } else {
        AppError::StoreUnavailable {
            message: format!("Request failed: {}", e),
        }
    }
}

fn status_error(status: StatusCode, body: String) -> AppError {
    let message = format!("API error {}: {}", status, body);
    if status.is_server_error()
        || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        AppError::StoreUnavailable { message }
    } else {
        AppError::StoreQuery { message }
    }
}

fn parse_search_response(
    response: GraphQlResponse,
    collection: &str,
    text_property: &str,
) -> Result<Vec<Passage>> {
    if !response.errors.is_empty() {
        let messages: Vec<&str> = response.errors.iter().map(|e| e.message.as_str()).collect();
        return Err(AppError::StoreQuery {
            message: messages.join("; "),
        });
    }

    let objects = response
        .data
        .as_ref()
        .and_then(|d| d.get("Get"))
        .and_then(|g| g.get(collection))
        .and_then(|c| c.as_array())
        .cloned()
        .unwrap_or_default();

    let passages = objects
        .iter()
        .filter_map(|object| {
            let text = object
                .get(text_property)
                .and_then(|v| v.as_str())
                .unwrap_or_default();

            if text.trim().is_empty() {
                tracing::debug!("Skipping stored object without text");
                return None;
            }

            let additional = object.get("_additional");
            let source_id = additional
                .and_then(|a| a.get("id"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            let certainty = additional.and_then(|a| a.get("certainty")).and_then(|v| v.as_f64());
            let distance = additional.and_then(|a| a.get("distance")).and_then(|v| v.as_f64());
            let relevance_score = certainty
                .or_else(|| distance.map(|d| 1.0 - d))
                .unwrap_or(0.0) as f32;

            Some(Passage {
                text: text.to_string(),
                source_id,
                relevance_score,
            })
        })
        .collect();

    Ok(passages)
}

#[async_trait]
impl KnowledgeStore for WeaviateStore {
    async fn search(&self, query: &str, limit: usize, timeout: Duration) -> Result<Vec<Passage>> {
        let timeout_ms = timeout.as_millis() as u64;
        within(timeout, AppError::StoreTimeout { timeout_ms }, self.run_search(query, limit))
            .await
            .map_err(|e| match e {
                AppError::StoreTimeout { .. } => AppError::StoreTimeout { timeout_ms },
                other => other,
            })
    }

    async fn is_ready(&self) -> Result<bool> {
        let response = self
            .authorized(self.client.get(format!("{}/v1/.well-known/ready", self.base_url)))
            .send()
            .await
            .map_err(transport_error)?;

        Ok(response.status().is_success())
    }

    fn backend(&self) -> &str {
        "weaviate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> WeaviateStore {
        WeaviateStore::new(&KnowledgeConfig {
            url: Some("innovites.weaviate.network".to_string()),
            ..KnowledgeConfig::default()
        })
        .unwrap()
    }

    fn response(value: serde_json::Value) -> GraphQlResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_bare_host_gets_https() {
        assert_eq!(store().base_url(), "https://innovites.weaviate.network");
    }

    #[test]
    fn test_invalid_collection_rejected() {
        let result = WeaviateStore::new(&KnowledgeConfig {
            url: Some("http://localhost:8080".to_string()),
            collection: "innovites) { x }".to_string(),
            ..KnowledgeConfig::default()
        });
        assert!(matches!(result, Err(AppError::Configuration { .. })));
    }

    #[test]
    fn test_search_query_escapes_input() {
        let query = store().search_query("What is \"CableERP\"?", 3);
        assert!(query.contains(r#"concepts: ["What is \"CableERP\"?"]"#));
        assert!(query.contains("Innovites(nearText"));
        assert!(query.contains("limit: 3"));
    }

    #[test]
    fn test_search_query_selects_only_text_property() {
        let query = store().search_query("x", 3);
        assert!(query.contains("limit: 3) { content _additional { id certainty distance } }"));
        assert!(!query.contains(" text "));
    }

    #[test]
    fn test_search_selects_properties_that_inserts_write() {
        let store = store();
        let mut metadata = serde_json::Map::new();
        metadata.insert("title".to_string(), "About InnoVites".into());
        metadata.insert("type".to_string(), "company_info".into());
        metadata.insert("category".to_string(), "general".into());

        let body = store.insert_body("InnoVites is a partner.", &metadata);
        let written = body["properties"].as_object().unwrap();

        let query = store.search_query("x", 3);
        let selection = query
            .split("limit: 3) {")
            .nth(1)
            .and_then(|rest| rest.split("_additional").next())
            .unwrap();
        for field in selection.split_whitespace() {
            assert!(written.contains_key(field), "`{}` is selected but never written", field);
        }
        assert_eq!(written["content"], "InnoVites is a partner.");
    }

    #[test]
    fn test_search_query_follows_configured_property() {
        let store = WeaviateStore::new(&KnowledgeConfig {
            url: Some("http://localhost:8080".to_string()),
            text_property: "body".to_string(),
            ..KnowledgeConfig::default()
        })
        .unwrap();
        assert_eq!(store.text_property(), "body");
        assert!(store.search_query("x", 1).contains("{ body _additional"));
    }

    #[test]
    fn test_invalid_text_property_rejected() {
        let result = WeaviateStore::new(&KnowledgeConfig {
            url: Some("http://localhost:8080".to_string()),
            text_property: "content } x {".to_string(),
            ..KnowledgeConfig::default()
        });
        assert!(matches!(result, Err(AppError::Configuration { .. })));
    }

    #[test]
    fn test_parse_keeps_store_order_and_scores() {
        let parsed = parse_search_response(
            response(serde_json::json!({
                "data": { "Get": { "Innovites": [
                    { "content": "InnoVites is a digital transformation partner.",
                      "_additional": { "id": "a1", "certainty": 0.91, "distance": 0.18 } },
                    { "content": "CableERP manages resource planning.",
                      "_additional": { "id": "b2", "certainty": null, "distance": 0.4 } },
                    { "content": "  ",
                      "_additional": { "id": "c3", "certainty": 0.5 } }
                ] } }
            })),
            "Innovites",
            "content",
        )
        .unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].source_id, "a1");
        assert!((parsed[0].relevance_score - 0.91).abs() < 1e-6);
        assert_eq!(parsed[1].text, "CableERP manages resource planning.");
        assert!((parsed[1].relevance_score - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_parse_empty_result_is_ok() {
        let parsed = parse_search_response(
            response(serde_json::json!({ "data": { "Get": { "Innovites": [] } } })),
            "Innovites",
            "content",
        )
        .unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_parse_graphql_errors() {
        let err = parse_search_response(
            response(serde_json::json!({
                "data": { "Get": { "Innovites": null } },
                "errors": [{ "message": "Cannot query field \"Innovites\"" }]
            })),
            "Innovites",
            "content",
        )
        .unwrap_err();
        assert!(matches!(err, AppError::StoreQuery { .. }));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::SERVICE_UNAVAILABLE, String::new()),
            AppError::StoreUnavailable { .. }
        ));
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, String::new()),
            AppError::StoreUnavailable { .. }
        ));
        assert!(matches!(
            status_error(StatusCode::UNPROCESSABLE_ENTITY, String::new()),
            AppError::StoreQuery { .. }
        ));
    }
}
