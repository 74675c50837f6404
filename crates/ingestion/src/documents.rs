//! Seed documents for the knowledge store

use crate::errors::IngestionError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One document to upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedDocument {
    pub content: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub category: String,
}

impl SeedDocument {
    fn new(title: &str, kind: &str, category: &str, content: &str) -> Self {
        Self {
            content: content.to_string(),
            metadata: DocumentMetadata {
                title: title.to_string(),
                kind: kind.to_string(),
                category: category.to_string(),
            },
        }
    }

    /// Metadata as store properties
    pub fn properties(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut properties = serde_json::Map::new();
        properties.insert("title".to_string(), self.metadata.title.clone().into());
        properties.insert("type".to_string(), self.metadata.kind.clone().into());
        properties.insert("category".to_string(), self.metadata.category.clone().into());
        properties
    }
}

/// Built-in company documents
pub fn sample_documents() -> Vec<SeedDocument> {
    vec![
        SeedDocument::new(
            "About InnoVites",
            "company_info",
            "general",
            "InnoVites is a leading strategic partner for digital transformation in the wire and \
             cable industry. We specialize in providing comprehensive solutions that bridge the wire \
             and cable ecosystem with ERP, MES, and Design and Data Management (DDM) systems.",
        ),
        SeedDocument::new(
            "CableERP Overview",
            "product_info",
            "erp",
            "CableERP is InnoVites' comprehensive Enterprise Resource Planning solution specifically \
             designed for the wire and cable industry. It manages everything from resource planning \
             to final delivery with wire & cable specific precision, ensuring smooth and efficient \
             operations.",
        ),
        SeedDocument::new(
            "cableCORE MES",
            "product_info",
            "mes",
            "cableCORE MES (Manufacturing Execution System) provides real-time shop floor \
             visibility, optimizes production, and scales effortlessly from basic tracking to full \
             IoT integration. It's designed specifically for wire and cable manufacturing processes.",
        ),
        SeedDocument::new(
            "cableCORE DDM",
            "product_info",
            "ddm",
            "cableCORE DDM (Design and Data Management) speeds up inquiry-to-quote processes, \
             automates design with AI, and reduces rework for a seamless transition from cable \
             design to engineering. It's ideal for sales and engineering teams.",
        ),
        SeedDocument::new(
            "Microsoft Partnership",
            "partnership_info",
            "technology",
            "InnoVites works with Microsoft technologies and is built on the Microsoft Platform. We \
             are proud to be an Independent Software Vendor (ISV) on Microsoft Dynamics 365, but we \
             also believe in open architectures and APIs.",
        ),
    ]
}

/// Parse a JSON array of documents
pub fn parse_documents(path: &str, json: &str) -> Result<Vec<SeedDocument>, IngestionError> {
    let documents: Vec<SeedDocument> =
        serde_json::from_str(json).map_err(|e| IngestionError::InvalidDocuments {
            path: path.to_string(),
            message: e.to_string(),
        })?;

    if let Some(index) = documents.iter().position(|d| d.content.trim().is_empty()) {
        return Err(IngestionError::InvalidDocuments {
            path: path.to_string(),
            message: format!("document {} has empty content", index + 1),
        });
    }

    Ok(documents)
}

/// Load documents from a JSON file
pub async fn load_documents(path: &Path) -> Result<Vec<SeedDocument>, IngestionError> {
    let display = path.display().to_string();
    if !path.exists() {
        return Err(IngestionError::FileNotFound(display));
    }

    let json = tokio::fs::read_to_string(path).await?;
    parse_documents(&display, &json)
}
