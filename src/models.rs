//! Data model / 数据模型
//!
//! Collection names, the fixed employee schema, records, hits and facet buckets.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

use crate::error::{Result, SearchError};

/// Characters the engine refuses in index names / 索引名禁止字符
const FORBIDDEN_NAME_CHARS: &[char] = &['\\', '/', '*', '?', '"', '<', '>', '|', ',', '#', ' '];

/// Normalized (lowercase) collection name / 规范化的集合名称
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionName(String);

impl CollectionName {
    /// Validate and lowercase a caller-supplied name / 校验并转为小写
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SearchError::validation("collection name must not be empty"));
        }
        if trimmed.starts_with(['-', '_', '+']) {
            return Err(SearchError::validation(format!(
                "collection name '{}' must not start with '-', '_' or '+'",
                trimmed
            )));
        }
        if let Some(c) = trimmed.chars().find(|c| FORBIDDEN_NAME_CHARS.contains(c)) {
            return Err(SearchError::validation(format!(
                "collection name '{}' contains forbidden character {:?}",
                trimmed, c
            )));
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Field indexing type / 字段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Tokenized free text / 分词全文
    Text,
    /// Exact match, aggregatable / 精确匹配
    Keyword,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Keyword => "keyword",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaField {
    pub name: &'static str,
    pub field_type: FieldType,
}

/// Fixed collection schema / 固定的集合结构
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSchema {
    pub fields: Vec<SchemaField>,
}

impl CollectionSchema {
    /// name (text), department (keyword), gender (text)
    pub fn employee() -> Self {
        Self {
            fields: vec![
                SchemaField { name: "name", field_type: FieldType::Text },
                SchemaField { name: "department", field_type: FieldType::Keyword },
                SchemaField { name: "gender", field_type: FieldType::Text },
            ],
        }
    }

    pub fn field_type(&self, field: &str) -> Option<FieldType> {
        self.fields.iter().find(|f| f.name == field).map(|f| f.field_type)
    }

    /// Field must exist in the schema / 字段必须存在
    pub fn require_field(&self, field: &str) -> Result<FieldType> {
        self.field_type(field).ok_or_else(|| {
            SearchError::validation(format!("unknown field '{}'", field))
        })
    }

    /// Engine mapping body: `{"mappings": {"properties": {...}}}`
    pub fn mapping_body(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.to_string(), json!({ "type": f.field_type.as_str() })))
            .collect();
        json!({ "mappings": { "properties": properties } })
    }
}

/// Employee record with caller-supplied id / 员工记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub name: String,
    pub department: String,
    pub gender: String,
}

impl Employee {
    pub fn new(id: &str, name: &str, department: &str, gender: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            department: department.to_string(),
            gender: gender.to_string(),
        }
    }

    /// Stored document body (id lives in the document key) / 存储的文档内容
    pub fn source(&self) -> EmployeeSource {
        EmployeeSource {
            name: self.name.clone(),
            department: self.department.clone(),
            gender: self.gender.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeSource {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub gender: String,
}

impl EmployeeSource {
    /// Field value by schema name / 按字段名取值
    pub fn field(&self, field: &str) -> Option<&str> {
        match field {
            "name" => Some(&self.name),
            "department" => Some(&self.department),
            "gender" => Some(&self.gender),
            _ => None,
        }
    }
}

/// Search hit as returned to HTTP clients / 搜索命中
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(alias = "_source")]
    pub source: EmployeeSource,
    #[serde(alias = "_score", default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// One distinct keyword value and its document count / 分面桶
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetBucket {
    pub key: String,
    pub count: u64,
}

impl FacetBucket {
    pub fn new(key: &str, count: u64) -> Self {
        Self { key: key.to_string(), count }
    }
}
