//! Field catalog: read-only metadata about queryable fields.
//!
//! The catalog is keyed by field name and supplied by the caller on every
//! compile or lint call. It is never mutated by either. Catalogs can be
//! loaded from the JSON record shape:
//!
//! ```json
//! {
//!   "label":     { "type": "text", "keywordField": "label.keyword" },
//!   "items.sku": { "type": "keyword", "nestedPath": "items" }
//! }
//! ```
//!
//! the same shape in TOML, or derived from an index mapping document with
//! [`FieldCatalog::from_mapping`].

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Semantic type of a field as declared by the index mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[serde(alias = "match_only_text")]
    Text,
    #[serde(alias = "constant_keyword", alias = "wildcard")]
    Keyword,
    Boolean,
    Long,
    Integer,
    Short,
    Byte,
    Double,
    Float,
    HalfFloat,
    ScaledFloat,
    UnsignedLong,
    Date,
    DateNanos,
    Ip,
    #[default]
    #[serde(other)]
    Unknown,
}

impl FieldType {
    /// Parse a mapping type name. Unrecognized names become `Unknown`.
    pub fn from_name(name: &str) -> Self {
        serde_json::from_value(Value::String(name.to_string())).unwrap_or_default()
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            FieldType::Long
                | FieldType::Integer
                | FieldType::Short
                | FieldType::Byte
                | FieldType::Double
                | FieldType::Float
                | FieldType::HalfFloat
                | FieldType::ScaledFloat
                | FieldType::UnsignedLong
        )
    }

    pub fn is_date(self) -> bool {
        matches!(self, FieldType::Date | FieldType::DateNanos)
    }

    /// Types a range query compares meaningfully: dates, numbers and IPs.
    pub fn is_rangeable(self) -> bool {
        self.is_date() || self.is_numeric() || self == FieldType::Ip
    }

    /// Whether the engine builds doc values for this type by default.
    pub fn is_aggregatable(self) -> bool {
        !matches!(self, FieldType::Text | FieldType::Unknown)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Keyword => "keyword",
            FieldType::Boolean => "boolean",
            FieldType::Long => "long",
            FieldType::Integer => "integer",
            FieldType::Short => "short",
            FieldType::Byte => "byte",
            FieldType::Double => "double",
            FieldType::Float => "float",
            FieldType::HalfFloat => "half_float",
            FieldType::ScaledFloat => "scaled_float",
            FieldType::UnsignedLong => "unsigned_long",
            FieldType::Date => "date",
            FieldType::DateNanos => "date_nanos",
            FieldType::Ip => "ip",
            FieldType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Metadata for a single field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldInfo {
    /// Dot-path of the field. Filled from the catalog key when omitted.
    #[serde(default)]
    pub name: String,

    /// Semantic type.
    #[serde(rename = "type", default)]
    pub field_type: FieldType,

    /// Companion field holding the untokenized value (e.g. `label.keyword`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_field: Option<String>,

    /// Path of the nested object this field lives under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub searchable: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregatable: Option<bool>,
}

impl FieldInfo {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            ..Default::default()
        }
    }

    pub fn with_keyword_field(mut self, keyword_field: impl Into<String>) -> Self {
        self.keyword_field = Some(keyword_field.into());
        self
    }

    pub fn with_nested_path(mut self, nested_path: impl Into<String>) -> Self {
        self.nested_path = Some(nested_path.into());
        self
    }

    /// Field to use for exact matches: the keyword companion, or the field itself.
    pub fn exact_field(&self) -> &str {
        self.keyword_field.as_deref().unwrap_or(&self.name)
    }

    pub fn has_exact_companion(&self) -> bool {
        self.keyword_field.is_some()
    }

    /// Nested path, if the field declares a non-blank one.
    pub fn nested_path(&self) -> Option<&str> {
        self.nested_path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
    }
}

/// Read-only lookup table of field metadata, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldCatalog {
    fields: BTreeMap<String, FieldInfo>,
}

impl FieldCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from field entries, keyed by each entry's name.
    pub fn from_fields(fields: impl IntoIterator<Item = FieldInfo>) -> Self {
        let mut catalog = Self::new();
        for info in fields {
            catalog.insert(info);
        }
        catalog
    }

    /// Add or replace a field. Returns the previous entry, if any.
    pub fn insert(&mut self, info: FieldInfo) -> Option<FieldInfo> {
        self.fields.insert(info.name.clone(), info)
    }

    fn insert_if_absent(&mut self, info: FieldInfo) {
        self.fields.entry(info.name.clone()).or_insert(info);
    }

    pub fn get(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All fields, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &FieldInfo> {
        self.fields.values()
    }

    /// Fields whose name matches a glob pattern (e.g. `items.*`).
    pub fn matching(&self, pattern: &str) -> Vec<&FieldInfo> {
        self.fields
            .iter()
            .filter(|(name, _)| glob_match::glob_match(pattern, name))
            .map(|(_, info)| info)
            .collect()
    }

    /// Whether any field name begins with `path`.
    ///
    /// Plain string prefix: `items` is satisfied by `itemsCount` as well as
    /// `items.sku`.
    pub fn has_path_prefix(&self, path: &str) -> bool {
        self.fields.keys().any(|name| name.starts_with(path))
    }

    /// Parse the JSON record shape `{fieldName: FieldInfo}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let entries: BTreeMap<String, FieldInfo> = serde_json::from_str(json)?;
        Ok(Self::from_entries(entries))
    }

    /// Parse the record shape from TOML (`["items.sku"]` tables).
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let entries: BTreeMap<String, FieldInfo> = toml::from_str(toml_str)
            .map_err(|e| Error::Catalog(format!("Failed to parse catalog: {}", e)))?;
        Ok(Self::from_entries(entries))
    }

    /// Load a catalog file. `.toml` files are parsed as TOML, anything else as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let catalog = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&contents)?,
            _ => Self::from_json_str(&contents)?,
        };
        tracing::debug!(path = %path.display(), fields = catalog.len(), "loaded field catalog");
        Ok(catalog)
    }

    /// Serialize back to the JSON record shape.
    pub fn to_json_string_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn from_entries(entries: BTreeMap<String, FieldInfo>) -> Self {
        let fields = entries
            .into_iter()
            .map(|(key, mut info)| {
                if info.name.is_empty() {
                    info.name = key.clone();
                }
                (key, info)
            })
            .collect();
        Self { fields }
    }

    /// Derive a catalog from an index mapping document.
    ///
    /// Accepts a `GET _mapping` response (keyed by index name), a
    /// `{"mappings": {"properties": ..}}` document, or a bare
    /// `{"properties": ..}` object. With several indices the first
    /// definition of a field wins.
    pub fn from_mapping(mapping: &Value) -> Result<Self> {
        let roots = mapping_roots(mapping);
        if roots.is_empty() {
            return Err(Error::Catalog(
                "No `properties` found in mapping document".to_string(),
            ));
        }

        let mut catalog = Self::new();
        for properties in roots {
            collect_properties(properties, "", None, &mut catalog);
        }
        Ok(catalog)
    }
}

/// Locate the top-level `properties` objects of a mapping document.
fn mapping_roots(doc: &Value) -> Vec<&Map<String, Value>> {
    fn properties_of(mappings: &Value) -> Option<&Map<String, Value>> {
        mappings.get("properties").and_then(Value::as_object)
    }

    if let Some(properties) = properties_of(doc) {
        return vec![properties];
    }
    if let Some(properties) = doc.get("mappings").and_then(properties_of) {
        return vec![properties];
    }

    // `GET _mapping` response keyed by index name
    doc.as_object()
        .map(|indices| {
            indices
                .values()
                .filter_map(|index| index.get("mappings").and_then(properties_of))
                .collect()
        })
        .unwrap_or_default()
}

fn collect_properties(
    properties: &Map<String, Value>,
    prefix: &str,
    nested: Option<&str>,
    catalog: &mut FieldCatalog,
) {
    for (name, prop) in properties {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };
        let type_name = prop.get("type").and_then(Value::as_str);

        if let Some(children) = prop.get("properties").and_then(Value::as_object) {
            let scope = if type_name == Some("nested") {
                Some(path.as_str())
            } else {
                nested
            };
            collect_properties(children, &path, scope, catalog);
            continue;
        }

        let Some(type_name) = type_name else {
            continue;
        };
        if matches!(type_name, "nested" | "object") {
            continue;
        }

        let field_type = FieldType::from_name(type_name);
        let mut keyword_field = None;

        // Multi-fields: the first keyword sub-field is the exact-match companion
        if let Some(subfields) = prop.get("fields").and_then(Value::as_object) {
            for (sub_name, sub_prop) in subfields {
                let sub_type = FieldType::from_name(
                    sub_prop.get("type").and_then(Value::as_str).unwrap_or_default(),
                );
                let sub_path = format!("{}.{}", path, sub_name);
                if sub_type == FieldType::Keyword && keyword_field.is_none() {
                    keyword_field = Some(sub_path.clone());
                }
                catalog.insert_if_absent(FieldInfo {
                    name: sub_path,
                    field_type: sub_type,
                    keyword_field: None,
                    nested_path: nested.map(str::to_string),
                    searchable: Some(true),
                    aggregatable: Some(sub_type.is_aggregatable()),
                });
            }
        }

        let searchable = prop.get("index").and_then(Value::as_bool).unwrap_or(true);
        catalog.insert_if_absent(FieldInfo {
            name: path,
            field_type,
            keyword_field,
            nested_path: nested.map(str::to_string),
            searchable: Some(searchable),
            aggregatable: Some(field_type.is_aggregatable()),
        });
    }
}
