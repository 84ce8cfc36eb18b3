use dashmap::DashMap;
use futures::future::join_all;
use std::sync::Arc;

use crate::export::DocumentField;
use crate::field::{InputType, OptionMap, lower_first};
use crate::schema::{Record, SchemaService, value_to_text};

/// Builds and caches option lists for dynamic dropdowns.
///
/// One resolver belongs to one form or grid session. The cache is keyed by
/// field name; a newer resolution for the same field replaces the older one.
pub struct DropdownResolver {
    service: Arc<dyn SchemaService>,
    cache: DashMap<String, OptionMap>,
}

impl DropdownResolver {
    pub fn new(service: Arc<dyn SchemaService>) -> Self {
        Self {
            service,
            cache: DashMap::new(),
        }
    }

    /// Fetch `field.foreign_key_table` and map `idColumn` → `labelColumn` from
    /// the field's `"<idColumn>-<labelColumn>"` spec.
    ///
    /// Fetch failures and unusable specs store an empty mapping.
    pub async fn resolve(&self, field: &DocumentField) -> OptionMap {
        let options = match field.value.as_spec().and_then(|s| s.split_once('-')) {
            Some((id_column, label_column)) => {
                match self.service.get_related_rows(&field.foreign_key_table).await {
                    Ok(rows) => build_options(&rows, id_column, label_column),
                    Err(e) => {
                        tracing::warn!(
                            field = %field.name,
                            table = %field.foreign_key_table,
                            error = %e,
                            "dynamic dropdown fetch failed"
                        );
                        OptionMap::new()
                    }
                }
            }
            None => {
                tracing::warn!(field = %field.name, "dynamic dropdown value is not an id-label spec");
                OptionMap::new()
            }
        };
        self.cache.insert(field.name.clone(), options.clone());
        options
    }

    /// Resolve every dynamic dropdown in `fields` concurrently.
    pub async fn resolve_all(&self, fields: &[DocumentField]) {
        let pending = fields
            .iter()
            .filter(|f| f.input_type == InputType::DynamicDropdown)
            .map(|f| self.resolve(f));
        join_all(pending).await;
    }

    pub fn options(&self, field_name: &str) -> Option<OptionMap> {
        self.cache.get(field_name).map(|entry| entry.value().clone())
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

/// Column lookup tolerant of the service camel-casing its JSON keys.
fn column<'a>(row: &'a Record, name: &str) -> Option<&'a serde_json::Value> {
    row.get(name).or_else(|| row.get(&lower_first(name)))
}

fn build_options(rows: &[Record], id_column: &str, label_column: &str) -> OptionMap {
    rows.iter()
        .filter_map(|row| {
            let id = column(row, id_column)?;
            let label = column(row, label_column).map(value_to_text).unwrap_or_default();
            Some((value_to_text(id), label))
        })
        .collect()
}
