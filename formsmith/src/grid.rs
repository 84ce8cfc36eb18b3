//! Grid renderer: a sortable, filterable, paginated view over a table's rows.

use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::field::lower_first;
use crate::schema::{Record, SchemaError, SchemaService, value_to_text};

/// Trailing column carrying the per-row edit and delete actions.
pub const ACTIONS_COLUMN: &str = "Actions";

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Row identity column used when the service reports no primary key.
const FALLBACK_ID_COLUMN: &str = "id";

const FILTER_PREFIX: &str = "filter.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowAction {
    Edit,
    Delete,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridQuery {
    pub sort: Option<String>,
    pub descending: bool,
    /// Column → case-insensitive substring.
    pub filters: Vec<(String, String)>,
    pub page: u64,
    pub page_size: u64,
}

impl GridQuery {
    /// Build from flat query parameters: `sort`, `desc`, `page`, `page_size`
    /// and one `filter.<column>` per filtered column. Unparsable numbers fall
    /// back to defaults.
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let number = |key: &str| params.get(key).and_then(|v| v.parse::<u64>().ok());
        let mut filters: Vec<(String, String)> = params
            .iter()
            .filter_map(|(k, v)| {
                let column = k.strip_prefix(FILTER_PREFIX)?;
                (!column.is_empty() && !v.is_empty()).then(|| (column.to_string(), v.clone()))
            })
            .collect();
        filters.sort();

        Self {
            sort: params.get("sort").filter(|s| !s.is_empty()).cloned(),
            descending: params
                .get("desc")
                .is_some_and(|v| matches!(v.as_str(), "1" | "true")),
            filters,
            page: number("page").unwrap_or(1).max(1),
            page_size: number("page_size")
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridRow {
    /// `None` when the row has no value in the identity column; such rows get no actions.
    pub id: Option<String>,
    pub values: Record,
    pub actions: Vec<RowAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridPage {
    pub table: String,
    pub columns: Vec<String>,
    pub data: Vec<GridRow>,
    /// Rows matching the filters, across all pages.
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

/// Rows of one table, fetched on `load` and re-fetched after each delete.
pub struct GridView {
    service: Arc<dyn SchemaService>,
    table: String,
    id_column: String,
    rows: Vec<Record>,
}

impl GridView {
    pub fn new(service: Arc<dyn SchemaService>, table: impl Into<String>) -> Self {
        Self {
            service,
            table: table.into(),
            id_column: FALLBACK_ID_COLUMN.to_string(),
            rows: Vec::new(),
        }
    }

    /// Fetch all rows and resolve the identity column.
    pub async fn load(&mut self) -> Result<(), SchemaError> {
        self.id_column = match self.service.get_primary_key_name(&self.table).await {
            Ok(Some(pk)) if !pk.is_empty() => pk,
            Ok(_) => FALLBACK_ID_COLUMN.to_string(),
            Err(e) => {
                tracing::warn!(table = %self.table, error = %e, "primary key lookup failed, using id");
                FALLBACK_ID_COLUMN.to_string()
            }
        };
        self.reload().await
    }

    async fn reload(&mut self) -> Result<(), SchemaError> {
        self.rows = self.service.get_rows(&self.table).await.map_err(|e| {
            tracing::error!(table = %self.table, error = %e, "row fetch failed");
            e
        })?;
        tracing::debug!(table = %self.table, rows = self.rows.len(), "grid loaded");
        Ok(())
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    /// Keys of the first row, in order, then the actions column.
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self
            .rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        columns.push(ACTIONS_COLUMN.to_string());
        columns
    }

    /// Filter, sort and slice the loaded rows.
    pub fn page(&self, query: &GridQuery) -> GridPage {
        let mut matching: Vec<&Record> = self
            .rows
            .iter()
            .filter(|row| {
                query
                    .filters
                    .iter()
                    .all(|(column, needle)| contains_ignore_case(cell(row, column), needle))
            })
            .collect();

        if let Some(column) = &query.sort {
            matching.sort_by(|a, b| {
                let ord = compare_cells(cell(a, column), cell(b, column));
                if query.descending { ord.reverse() } else { ord }
            });
        }

        let page_size = query.page_size.clamp(1, MAX_PAGE_SIZE);
        let page = query.page.max(1);
        let total = matching.len() as u64;
        let start = (page - 1).saturating_mul(page_size).min(total) as usize;

        let data = matching
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .map(|row| self.grid_row(row))
            .collect();

        GridPage {
            table: self.table.clone(),
            columns: self.columns(),
            data,
            total,
            page,
            page_size,
        }
    }

    /// Delete through the data service, then refresh.
    pub async fn delete(&mut self, id: &str) -> Result<(), SchemaError> {
        self.service.delete_row(&self.table, id).await.map_err(|e| {
            tracing::warn!(table = %self.table, id = %id, error = %e, "delete failed");
            e
        })?;
        tracing::info!(table = %self.table, id = %id, "row deleted");
        self.reload().await
    }

    fn grid_row(&self, row: &Record) -> GridRow {
        let id = cell(row, &self.id_column)
            .filter(|v| !v.is_null())
            .map(value_to_text);
        let actions = if id.is_some() {
            vec![RowAction::Edit, RowAction::Delete]
        } else {
            Vec::new()
        };
        GridRow {
            id,
            values: row.clone(),
            actions,
        }
    }
}

fn cell<'a>(row: &'a Record, column: &str) -> Option<&'a Value> {
    row.get(column).or_else(|| row.get(&lower_first(column)))
}

fn contains_ignore_case(value: Option<&Value>, needle: &str) -> bool {
    value
        .map(value_to_text)
        .is_some_and(|text| text.to_lowercase().contains(&needle.to_lowercase()))
}

/// Nulls first, numbers numerically, everything else by its text.
fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => value_to_text(a).cmp(&value_to_text(b)),
    }
}
