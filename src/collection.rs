//! Collection manager / 集合管理
//!
//! Ensures a collection exists with the fixed employee schema before use.
//! Creation is idempotent: an existing collection is left untouched as long as
//! its mapping does not contradict the schema.

use crate::backend::{BackendRef, CreateOutcome};
use crate::error::{Result, SearchError};
use crate::models::{CollectionName, CollectionSchema};

/// Result of `ensure_collection` / 确保集合存在的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    AlreadyExists,
}

#[derive(Clone)]
pub struct CollectionManager {
    backend: BackendRef,
    schema: CollectionSchema,
}

impl CollectionManager {
    pub fn new(backend: BackendRef) -> Self {
        Self {
            backend,
            schema: CollectionSchema::employee(),
        }
    }

    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    /// Create the collection unless it already exists / 确保集合存在
    pub async fn ensure_collection(&self, name: &str) -> Result<EnsureOutcome> {
        let collection = CollectionName::parse(name)?;

        if self.backend.exists(&collection).await? {
            self.check_mapping(&collection).await?;
            tracing::info!("Collection '{}' already exists", collection);
            return Ok(EnsureOutcome::AlreadyExists);
        }

        match self.backend.create_collection(&collection, &self.schema).await? {
            CreateOutcome::Created => {
                tracing::info!("Collection '{}' created", collection);
                Ok(EnsureOutcome::Created)
            }
            CreateOutcome::AlreadyExists => {
                // Lost a creation race with another caller
                self.check_mapping(&collection).await?;
                tracing::info!("Collection '{}' created concurrently", collection);
                Ok(EnsureOutcome::AlreadyExists)
            }
        }
    }

    /// Administrative delete; `false` when absent / 删除集合（管理操作）
    pub async fn drop_collection(&self, name: &str) -> Result<bool> {
        let collection = CollectionName::parse(name)?;
        let deleted = self.backend.delete_collection(&collection).await?;
        if deleted {
            tracing::info!("Collection '{}' deleted", collection);
        } else {
            tracing::info!("Collection '{}' not found, skipping deletion", collection);
        }
        Ok(deleted)
    }

    /// Schema fields present with another type are a conflict / 映射冲突检查
    async fn check_mapping(&self, collection: &CollectionName) -> Result<()> {
        let mapping = self.backend.field_mapping(collection).await?;
        for field in &self.schema.fields {
            match mapping.get(field.name) {
                Some(actual) if actual != field.field_type.as_str() => {
                    return Err(SearchError::SchemaConflict {
                        collection: collection.to_string(),
                        reason: format!(
                            "field '{}' is mapped as '{}', expected '{}'",
                            field.name,
                            actual,
                            field.field_type.as_str()
                        ),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }
}
