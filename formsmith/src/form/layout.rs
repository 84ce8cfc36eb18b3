use serde::Serialize;
use std::collections::BTreeMap;

use crate::field::FieldConfig;

/// One visual row of a form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormRow<T> {
    pub row_number: u32,
    pub cells: Vec<T>,
}

/// Group fields into rows by `row_number` ascending; cells within a row are
/// ordered by `sequence`, ties kept in configuration order.
pub fn group_rows<V>(fields: &[FieldConfig<V>]) -> Vec<FormRow<&FieldConfig<V>>> {
    let mut rows: BTreeMap<u32, Vec<&FieldConfig<V>>> = BTreeMap::new();
    for field in fields {
        rows.entry(field.row_number).or_default().push(field);
    }
    rows.into_iter()
        .map(|(row_number, mut cells)| {
            cells.sort_by_key(|f| f.sequence);
            FormRow { row_number, cells }
        })
        .collect()
}

impl<T> FormRow<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> FormRow<U> {
        FormRow {
            row_number: self.row_number,
            cells: self.cells.into_iter().map(f).collect(),
        }
    }
}
