use serde::Serialize;
use serde_json::Value;

use super::value::{DataKind, TemporalKind};
use crate::export::DocumentField;
use crate::field::{InputType, OptionMap};

/// Native input `type` for textual widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextHint {
    Text,
    DatetimeLocal,
    Date,
    Time,
    Number,
    Email,
    Password,
}

impl TextHint {
    /// Hint for a plain textbox bound to a column of `data_type`.
    pub fn for_data_type(data_type: &str) -> Self {
        match DataKind::of(data_type) {
            DataKind::Temporal {
                kind: TemporalKind::DateTime,
                ..
            } => TextHint::DatetimeLocal,
            DataKind::Temporal {
                kind: TemporalKind::Date,
                ..
            } => TextHint::Date,
            DataKind::Temporal {
                kind: TemporalKind::Time,
                ..
            } => TextHint::Time,
            _ => TextHint::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Widget {
    Text { hint: TextHint },
    Select { options: OptionMap },
    Checkbox { options: OptionMap },
    Radio { options: OptionMap },
    RadioGroup { options: OptionMap },
}

impl Widget {
    /// Pick the control for `field`. `dynamic` carries resolved options for
    /// dynamic dropdowns; it is ignored for every other input type.
    pub fn for_field(field: &DocumentField, dynamic: Option<OptionMap>) -> Self {
        let static_options = || field.value.as_options().cloned().unwrap_or_default();
        match field.input_type {
            InputType::Textbox => match DataKind::of(&field.data_type) {
                DataKind::Boolean => Widget::Checkbox {
                    options: OptionMap::new(),
                },
                _ => Widget::Text {
                    hint: TextHint::for_data_type(&field.data_type),
                },
            },
            InputType::Number => Widget::Text {
                hint: TextHint::Number,
            },
            InputType::Email => Widget::Text {
                hint: TextHint::Email,
            },
            InputType::Password => Widget::Text {
                hint: TextHint::Password,
            },
            InputType::StaticDropdown => Widget::Select {
                options: static_options(),
            },
            InputType::DynamicDropdown => Widget::Select {
                options: dynamic.unwrap_or_default(),
            },
            InputType::Checkbox => Widget::Checkbox {
                options: static_options(),
            },
            InputType::RadioButton => Widget::Radio {
                options: static_options(),
            },
            InputType::RadioGroup => Widget::RadioGroup {
                options: static_options(),
            },
        }
    }
}

/// A visible field ready to draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedField {
    pub name: String,
    pub label: String,
    pub widget: Widget,
    pub required: bool,
    pub disabled: bool,
    pub value: Value,
}

impl RenderedField {
    pub fn new(field: &DocumentField, widget: Widget, value: Value) -> Self {
        Self {
            name: field.name.clone(),
            label: field.display_name.clone(),
            widget,
            // primary keys are assigned by the data service
            required: !field.is_nullable && !field.is_primary_key,
            disabled: !field.is_enabled(),
            value,
        }
    }
}
