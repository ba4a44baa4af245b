use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::db::Database;
use crate::services::extraction::{ExtractedInvoice, RawExtraction};
use crate::services::gemini::DocumentExtractor;
use crate::services::review::QueueItem;
use crate::utils::{mime_type_for, sha256_bytes, to_data_uri};

const PROCESS_TYPE: &str = "extract";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("No supported documents found")]
    NoDocuments,
    #[error("None of the {attempted} documents could be extracted")]
    NothingExtracted { attempted: usize },
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub path: PathBuf,
    pub data_uri: String,
    pub mime_type: String,
    pub fingerprint: String,
}

impl LoadedDocument {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.to_string_lossy().to_string())
    }
}

/// Expands directories (one level deep) and keeps files with a supported type.
pub fn collect_documents(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut documents = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut entries = walkdir::WalkDir::new(path)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .filter(|e| mime_type_for(e.path()).is_some())
                .map(|e| e.path().to_path_buf())
                .collect::<Vec<_>>();
            entries.sort();
            documents.extend(entries);
        } else if mime_type_for(path).is_some() {
            documents.push(path.clone());
        } else {
            tracing::warn!(path = %path.display(), "Skipping unsupported file");
        }
    }
    documents
}

pub fn load_document(path: &Path) -> Result<LoadedDocument> {
    let mime_type = mime_type_for(path).ok_or_else(|| anyhow!("Unsupported file type: {}", path.display()))?;
    let bytes = std::fs::read(path)?;
    Ok(LoadedDocument {
        path: path.to_path_buf(),
        data_uri: to_data_uri(mime_type, &bytes),
        mime_type: mime_type.to_string(),
        fingerprint: sha256_bytes(&bytes),
    })
}

async fn extract_document<E: DocumentExtractor>(
    extractor: &E,
    prompt: &str,
    document: &LoadedDocument,
) -> Result<QueueItem> {
    let value = extractor
        .extract(&document.data_uri, prompt, &document.mime_type)
        .await?;
    let extracted = ExtractedInvoice::from_value(value)?;
    Ok(QueueItem {
        extraction: RawExtraction::AiExtraction(extracted),
        image: document.data_uri.clone(),
        mime_type: document.mime_type.clone(),
    })
}

/// Runs every document through the extractor one at a time. A document that
/// fails is logged and left out; the batch only fails when nothing came back.
pub async fn ingest_batch<E: DocumentExtractor>(
    extractor: &E,
    prompt: &str,
    paths: &[PathBuf],
    db: &Database,
) -> Result<Vec<QueueItem>, IngestError> {
    let documents = collect_documents(paths);
    if documents.is_empty() {
        return Err(IngestError::NoDocuments);
    }

    let mut items = Vec::new();
    for path in &documents {
        let document = match load_document(path) {
            Ok(document) => document,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Failed to read document");
                db.log_processing(
                    None,
                    Some(&path.to_string_lossy()),
                    PROCESS_TYPE,
                    "failed",
                    Some(&err.to_string()),
                )?;
                continue;
            }
        };

        let file_name = document.file_name();
        match extract_document(extractor, prompt, &document).await {
            Ok(item) => {
                tracing::info!(file = %file_name, hash = %document.fingerprint, "Document extracted");
                db.log_processing(
                    Some(&document.fingerprint),
                    Some(&file_name),
                    PROCESS_TYPE,
                    "success",
                    None,
                )?;
                items.push(item);
            }
            Err(err) => {
                tracing::warn!(file = %file_name, error = %err, "Extraction failed");
                db.log_processing(
                    Some(&document.fingerprint),
                    Some(&file_name),
                    PROCESS_TYPE,
                    "failed",
                    Some(&err.to_string()),
                )?;
            }
        }
    }

    if items.is_empty() {
        return Err(IngestError::NothingExtracted {
            attempted: documents.len(),
        });
    }
    Ok(items)
}
