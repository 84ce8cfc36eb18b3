use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Placeholder for "none": no foreign key table, no resolved key, no value.
pub const SENTINEL: &str = "-";

/// Two-option placeholder handed to option-style widgets until the operator edits it.
pub const PLACEHOLDER_OPTIONS: &str = "0-Male,1-Female";

/// Label half of the dynamic dropdown placeholder (`<pk>-columnName`).
pub const DYNAMIC_LABEL_PLACEHOLDER: &str = "columnName";

// ---------- enums ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InputType {
    #[default]
    Textbox,
    #[serde(rename = "Static dropdown")]
    StaticDropdown,
    #[serde(rename = "Dynamic dropdown")]
    DynamicDropdown,
    Checkbox,
    #[serde(rename = "Radio button")]
    RadioButton,
    #[serde(rename = "Radio group")]
    RadioGroup,
    Password,
    Number,
    Email,
}

impl InputType {
    pub const ALL: [InputType; 9] = [
        InputType::Textbox,
        InputType::StaticDropdown,
        InputType::DynamicDropdown,
        InputType::Checkbox,
        InputType::RadioButton,
        InputType::RadioGroup,
        InputType::Password,
        InputType::Number,
        InputType::Email,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Textbox => "Textbox",
            InputType::StaticDropdown => "Static dropdown",
            InputType::DynamicDropdown => "Dynamic dropdown",
            InputType::Checkbox => "Checkbox",
            InputType::RadioButton => "Radio button",
            InputType::RadioGroup => "Radio group",
            InputType::Password => "Password",
            InputType::Number => "Number",
            InputType::Email => "Email",
        }
    }

    /// Value payload a field gets when it switches to this input type.
    ///
    /// `fk_primary_key` is the resolved primary key of the referenced table
    /// (or the sentinel when the column is not a foreign key).
    pub fn default_value(&self, fk_primary_key: &str) -> String {
        match self {
            InputType::DynamicDropdown => {
                format!("{fk_primary_key}-{DYNAMIC_LABEL_PLACEHOLDER}")
            }
            InputType::StaticDropdown | InputType::RadioGroup | InputType::RadioButton => {
                PLACEHOLDER_OPTIONS.to_string()
            }
            _ => SENTINEL.to_string(),
        }
    }

    /// Input types whose delimited value is exported as a key → label mapping.
    pub fn exports_option_map(&self) -> bool {
        matches!(
            self,
            InputType::StaticDropdown
                | InputType::Checkbox
                | InputType::RadioGroup
                | InputType::RadioButton
        )
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Enability {
    #[default]
    Enabled,
    Disabled,
}

// ---------- field config ----------

/// One column's presentation record.
///
/// `V` is the value payload: a raw delimited `String` while the field is being
/// edited, a [`FieldValue`] once it has been exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConfig<V = String> {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub is_nullable: bool,
    #[serde(default)]
    pub is_primary_key: bool,
    pub foreign_key_table: String,
    pub primary_key_of_foreign_key_table: String,
    #[serde(default)]
    pub input_type: InputType,
    pub value: V,
    pub display_name: String,
    pub row_number: u32,
    pub sequence: u32,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub enability: Enability,
    #[serde(default)]
    pub child_table: Option<String>,
}

impl<V> FieldConfig<V> {
    pub fn is_foreign_key(&self) -> bool {
        self.foreign_key_table != SENTINEL
    }

    pub fn is_visible(&self) -> bool {
        self.visibility == Visibility::Visible
    }

    pub fn is_enabled(&self) -> bool {
        self.enability == Enability::Enabled
    }

    /// Rebuild the record with a different value payload, leaving every other attribute as is.
    pub fn map_value<W, E>(
        &self,
        f: impl FnOnce(&V) -> Result<W, E>,
    ) -> Result<FieldConfig<W>, E> {
        Ok(FieldConfig {
            name: self.name.clone(),
            data_type: self.data_type.clone(),
            is_nullable: self.is_nullable,
            is_primary_key: self.is_primary_key,
            foreign_key_table: self.foreign_key_table.clone(),
            primary_key_of_foreign_key_table: self.primary_key_of_foreign_key_table.clone(),
            input_type: self.input_type,
            value: f(&self.value)?,
            display_name: self.display_name.clone(),
            row_number: self.row_number,
            sequence: self.sequence,
            visibility: self.visibility,
            enability: self.enability,
            child_table: self.child_table.clone(),
        })
    }
}

/// Exported value payload: either the raw spec string or a parsed option mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Spec(String),
    Options(OptionMap),
}

impl FieldValue {
    pub fn as_spec(&self) -> Option<&str> {
        match self {
            FieldValue::Spec(s) => Some(s),
            FieldValue::Options(_) => None,
        }
    }

    pub fn as_options(&self) -> Option<&OptionMap> {
        match self {
            FieldValue::Spec(_) => None,
            FieldValue::Options(map) => Some(map),
        }
    }
}

// ---------- option map ----------

/// Ordered key → label mapping, serialized as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionMap(Vec<(String, String)>);

impl OptionMap {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Insert or replace. Replacing keeps the key's original position.
    pub fn insert(&mut self, key: impl Into<String>, label: impl Into<String>) {
        let key = key.into();
        let label = label.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = label,
            None => self.0.push((key, label)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    /// Parse `"k1-v1,k2-v2"`: split on `,`, then each pair on its first `-`.
    ///
    /// Returns the first pair without a `-` as the error.
    pub fn parse_delimited(spec: &str) -> Result<Self, String> {
        let mut map = OptionMap::new();
        for pair in spec.split(',') {
            let (key, label) = pair.split_once('-').ok_or_else(|| pair.to_string())?;
            map.insert(key, label);
        }
        Ok(map)
    }

    /// Inverse of [`OptionMap::parse_delimited`].
    pub fn to_delimited(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{k}-{v}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl FromIterator<(String, String)> for OptionMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut map = OptionMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl Serialize for OptionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for OptionMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OptionMapVisitor;

        impl<'de> Visitor<'de> for OptionMapVisitor {
            type Value = OptionMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object of option key to label")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<OptionMap, A::Error> {
                let mut map = OptionMap::new();
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    map.insert(k, v);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(OptionMapVisitor)
    }
}

// ---------- helpers ----------

/// Primitive type tag from a runtime type descriptor.
///
/// `"System.Int32, mscorlib, Version=4.0.0.0"` → `"Int32"`.
pub fn extract_data_type(descriptor: &str) -> String {
    let basic = descriptor.split(',').next().unwrap_or("").trim();
    basic.rsplit('.').next().unwrap_or(basic).to_string()
}

/// `"UserId"` → `"userId"`.
pub fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
