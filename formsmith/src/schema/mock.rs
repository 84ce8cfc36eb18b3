//! In-memory `SchemaService` for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::{ColumnMetadata, Record, SchemaError, SchemaService, value_to_text};

#[derive(Default)]
pub struct MockSchemaService {
    pub tables: HashMap<String, Vec<ColumnMetadata>>,
    pub primary_keys: HashMap<String, String>,
    pub rows: Mutex<HashMap<String, Vec<Record>>>,
    /// Tables whose requests fail with a 500.
    pub failing: HashSet<String>,
    pub pk_lookups: Mutex<Vec<String>>,
    pub id_column: String,
}

impl MockSchemaService {
    pub fn new() -> Self {
        Self {
            id_column: "id".to_string(),
            ..Default::default()
        }
    }

    pub fn with_table(mut self, name: &str, columns: Vec<ColumnMetadata>) -> Self {
        self.tables.insert(name.to_string(), columns);
        self
    }

    pub fn with_primary_key(mut self, table: &str, pk: &str) -> Self {
        self.primary_keys.insert(table.to_string(), pk.to_string());
        self
    }

    pub fn with_rows(self, table: &str, rows: Vec<serde_json::Value>) -> Self {
        let records = rows
            .into_iter()
            .filter_map(|v| v.as_object().cloned())
            .collect();
        self.rows.lock().unwrap().insert(table.to_string(), records);
        self
    }

    pub fn failing(mut self, table: &str) -> Self {
        self.failing.insert(table.to_string());
        self
    }

    pub fn pk_lookup_count(&self, table: &str) -> usize {
        self.pk_lookups
            .lock()
            .unwrap()
            .iter()
            .filter(|t| *t == table)
            .count()
    }

    pub fn rows_of(&self, table: &str) -> Vec<Record> {
        self.rows
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    fn check(&self, table: &str) -> Result<(), SchemaError> {
        if self.failing.contains(table) {
            return Err(SchemaError::Status {
                status: 500,
                url: format!("mock://{table}"),
            });
        }
        Ok(())
    }

    fn row_id(&self, row: &Record) -> Option<String> {
        row.get(&self.id_column).map(value_to_text)
    }
}

#[async_trait::async_trait]
impl SchemaService for MockSchemaService {
    async fn list_entities(&self) -> Result<Vec<String>, SchemaError> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn get_column_metadata(&self, table: &str) -> Result<Vec<ColumnMetadata>, SchemaError> {
        self.check(table)?;
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| SchemaError::NotFound(table.to_string()))
    }

    async fn get_primary_key_name(&self, table: &str) -> Result<Option<String>, SchemaError> {
        self.pk_lookups.lock().unwrap().push(table.to_string());
        // Let concurrent lookups interleave.
        tokio::task::yield_now().await;
        self.check(table)?;
        Ok(self.primary_keys.get(table).cloned())
    }

    async fn get_rows(&self, table: &str) -> Result<Vec<Record>, SchemaError> {
        self.check(table)?;
        Ok(self.rows_of(table))
    }

    async fn get_row_by_id(&self, table: &str, id: &str) -> Result<Record, SchemaError> {
        self.check(table)?;
        self.rows_of(table)
            .into_iter()
            .find(|r| self.row_id(r).as_deref() == Some(id))
            .ok_or_else(|| SchemaError::NotFound(format!("{table}/{id}")))
    }

    async fn create_row(&self, table: &str, values: &Record) -> Result<Record, SchemaError> {
        self.check(table)?;
        let mut rows = self.rows.lock().unwrap();
        rows.entry(table.to_string())
            .or_default()
            .push(values.clone());
        Ok(values.clone())
    }

    async fn update_row(&self, table: &str, id: &str, values: &Record) -> Result<(), SchemaError> {
        self.check(table)?;
        let mut rows = self.rows.lock().unwrap();
        let table_rows = rows.entry(table.to_string()).or_default();
        let row = table_rows
            .iter_mut()
            .find(|r| r.get(&self.id_column).map(value_to_text).as_deref() == Some(id))
            .ok_or_else(|| SchemaError::NotFound(format!("{table}/{id}")))?;
        for (k, v) in values {
            row.insert(k.clone(), v.clone());
        }
        Ok(())
    }

    async fn delete_row(&self, table: &str, id: &str) -> Result<(), SchemaError> {
        self.check(table)?;
        let mut rows = self.rows.lock().unwrap();
        let table_rows = rows.entry(table.to_string()).or_default();
        let before = table_rows.len();
        table_rows.retain(|r| r.get(&self.id_column).map(value_to_text).as_deref() != Some(id));
        if table_rows.len() == before {
            return Err(SchemaError::NotFound(format!("{table}/{id}")));
        }
        Ok(())
    }

    async fn get_related_rows(&self, foreign_table: &str) -> Result<Vec<Record>, SchemaError> {
        self.check(foreign_table)?;
        Ok(self.rows_of(foreign_table))
    }
}
