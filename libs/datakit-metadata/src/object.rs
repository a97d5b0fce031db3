use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Closed set of field type tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    Textarea,
    Markdown,
    Html,
    Select,
    Multiselect,
    Date,
    Datetime,
    Time,
    Number,
    Currency,
    Percent,
    Boolean,
    Email,
    Phone,
    Url,
    Image,
    File,
    Avatar,
    Location,
    Lookup,
    MasterDetail,
    Password,
    Formula,
    Summary,
    AutoNumber,
    Object,
    Grid,
}

impl FieldType {
    /// Whether values of this type hold the id of a record in another object.
    #[must_use]
    pub fn is_reference(self) -> bool {
        matches!(self, Self::Lookup | Self::MasterDetail)
    }
}

/// Choice for `select` fields: either a bare value or a labeled one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldOption {
    Value(String),
    Labeled { label: String, value: Value },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldDefinition {
    /// Equal to the field's key once the definition is registered.
    pub name: String,
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    pub unique: bool,
    pub readonly: bool,
    pub hidden: bool,
    #[serde(alias = "defaultValue")]
    pub default_value: Option<Value>,
    pub multiple: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub regex: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    pub scale: Option<u32>,
    pub precision: Option<u32>,
    /// Target object of a `lookup` / `master_detail` field.
    pub reference_to: Option<String>,
    pub searchable: bool,
    pub sortable: bool,
    pub index: bool,
    pub description: Option<String>,
}

impl FieldDefinition {
    #[must_use]
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            ..Self::default()
        }
    }

    /// `lookup` field pointing at `target`.
    #[must_use]
    pub fn lookup(target: impl Into<String>) -> Self {
        Self {
            field_type: FieldType::Lookup,
            reference_to: Some(target.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// Declared custom action. Handlers are bound on the engine, not here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionDefinition {
    pub label: Option<String>,
    pub description: Option<String>,
}

/// Declared entity type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectDefinition {
    pub name: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    /// Named datasource; `None` uses the engine default.
    pub datasource: Option<String>,
    pub fields: BTreeMap<String, FieldDefinition>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub actions: BTreeMap<String, ActionDefinition>,
    /// Inline seed records.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<Map<String, Value>>,
}

impl ObjectDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn datasource(mut self, datasource: impl Into<String>) -> Self {
        self.datasource = Some(datasource.into());
        self
    }

    #[must_use]
    pub fn field(mut self, key: impl Into<String>, field: FieldDefinition) -> Self {
        self.fields.insert(key.into(), field);
        self
    }

    #[must_use]
    pub fn action(mut self, name: impl Into<String>, action: ActionDefinition) -> Self {
        self.actions.insert(name.into(), action);
        self
    }

    #[must_use]
    pub fn data(mut self, records: Vec<Map<String, Value>>) -> Self {
        self.data = records;
        self
    }

    /// Set every field's `name` to its key.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        for (key, field) in &mut self.fields {
            if field.name != *key {
                field.name.clone_from(key);
            }
        }
        self
    }

    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }
}
