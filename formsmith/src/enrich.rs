//! Field enrichment: raw column metadata → presentation records.

use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::field::{FieldConfig, SENTINEL, extract_data_type, lower_first};
use crate::schema::{ColumnMetadata, SchemaError, SchemaService};

// ---------- errors ----------

#[derive(Debug)]
pub enum EnrichError {
    /// Metadata for the table being configured could not be fetched.
    Metadata { table: String, source: SchemaError },
}

impl fmt::Display for EnrichError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrichError::Metadata { table, source } => {
                write!(f, "Failed to load metadata for {table}: {source}")
            }
        }
    }
}

impl std::error::Error for EnrichError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EnrichError::Metadata { source, .. } => Some(source),
        }
    }
}

// ---------- enrichment ----------

/// Fetch `table`'s columns and enrich them, one record per column in source order.
///
/// A failed metadata fetch aborts; a failed primary-key lookup for a referenced
/// table only degrades the dependent fields to the sentinel.
pub async fn enrich_table(
    service: &dyn SchemaService,
    table: &str,
) -> Result<Vec<FieldConfig>, EnrichError> {
    let columns = service.get_column_metadata(table).await.map_err(|source| {
        tracing::error!(table = %table, error = %source, "metadata fetch failed");
        EnrichError::Metadata {
            table: table.to_string(),
            source,
        }
    })?;

    let primary_keys = resolve_foreign_primary_keys(service, &columns).await;
    let fields = enrich_columns(&columns, &primary_keys);

    tracing::info!(table = %table, fields = fields.len(), "enriched table");
    Ok(fields)
}

/// Enrich `child_table` for linkage under a parent field.
///
/// Same pipeline as [`enrich_table`]; kept separate so callers read as the
/// operation they perform.
pub async fn link_child_table(
    service: &dyn SchemaService,
    parent_field: &str,
    child_table: &str,
) -> Result<Vec<FieldConfig>, EnrichError> {
    tracing::debug!(parent_field = %parent_field, child_table = %child_table, "linking child table");
    enrich_table(service, child_table).await
}

/// Look up the primary key of every distinct referenced table, concurrently.
///
/// Each table is asked once no matter how many columns reference it. Failures
/// and empty answers map to the sentinel.
pub async fn resolve_foreign_primary_keys(
    service: &dyn SchemaService,
    columns: &[ColumnMetadata],
) -> HashMap<String, String> {
    let mut seen = HashSet::new();
    let tables: Vec<&str> = columns
        .iter()
        .filter_map(first_foreign_table)
        .filter(|t| seen.insert(*t))
        .collect();

    let lookups = tables.iter().map(|table| async move {
        let pk = match service.get_primary_key_name(table).await {
            Ok(Some(pk)) => pk,
            Ok(None) => SENTINEL.to_string(),
            Err(e) => {
                tracing::warn!(table = %table, error = %e, "primary key lookup failed");
                SENTINEL.to_string()
            }
        };
        (table.to_string(), pk)
    });

    join_all(lookups).await.into_iter().collect()
}

fn first_foreign_table(column: &ColumnMetadata) -> Option<&str> {
    column
        .foreign_keys
        .first()
        .map(|fk| fk.principal_table.as_str())
        .filter(|t| !t.is_empty())
}

/// Pure half of enrichment: apply defaults given the resolved foreign primary keys.
pub fn enrich_columns(
    columns: &[ColumnMetadata],
    primary_keys: &HashMap<String, String>,
) -> Vec<FieldConfig> {
    let mut names = HashSet::new();
    columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let name = unique_name(&mut names, column);
            enrich_column(column, name, index, primary_keys)
        })
        .collect()
}

/// Normalized name, else the source casing, else the source name with the
/// first free numeric suffix. The chosen name is reserved in `taken`.
fn unique_name(taken: &mut HashSet<String>, column: &ColumnMetadata) -> String {
    let normalized = lower_first(&column.name);
    if taken.insert(normalized.clone()) {
        return normalized;
    }
    tracing::warn!(column = %column.name, "normalized name collides");
    if taken.insert(column.name.clone()) {
        return column.name.clone();
    }
    let mut suffix = 2u32;
    loop {
        let candidate = format!("{normalized}{suffix}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        suffix += 1;
    }
}

fn enrich_column(
    column: &ColumnMetadata,
    name: String,
    index: usize,
    primary_keys: &HashMap<String, String>,
) -> FieldConfig {
    let foreign_key_table = first_foreign_table(column).unwrap_or(SENTINEL).to_string();
    let primary_key_of_foreign_key_table = primary_keys
        .get(&foreign_key_table)
        .cloned()
        .unwrap_or_else(|| SENTINEL.to_string());

    let input_type = column.input_type.unwrap_or_default();
    let value = input_type.default_value(&primary_key_of_foreign_key_table);

    let display_name = column
        .display_name
        .clone()
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| name.clone());

    FieldConfig {
        data_type: extract_data_type(&column.type_descriptor),
        is_nullable: column.is_nullable,
        is_primary_key: column.is_primary_key,
        foreign_key_table,
        primary_key_of_foreign_key_table,
        input_type,
        value,
        display_name,
        row_number: column.row_number.filter(|n| *n > 0).unwrap_or(index as u32 + 1),
        sequence: column.sequence.filter(|n| *n > 0).unwrap_or(1),
        visibility: column.visibility.unwrap_or_default(),
        enability: column.enability.unwrap_or_default(),
        child_table: None,
        name,
    }
}
