use std::collections::HashMap;
use std::sync::Arc;

use crate::types::RowValues;

/// Column labels of one result and their positions, shared by every row of that result.
#[derive(Debug, Default)]
pub struct ColumnIndex {
    labels: Vec<String>,
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    #[must_use]
    pub fn new(labels: Vec<String>) -> Self {
        let positions = labels
            .iter()
            .enumerate()
            .map(|(position, label)| (label.clone(), position))
            .collect();
        Self { labels, positions }
    }

    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Position of `label`; exact match first, then ASCII case-insensitive.
    #[must_use]
    pub fn position(&self, label: &str) -> Option<usize> {
        self.positions.get(label).copied().or_else(|| {
            self.labels
                .iter()
                .position(|candidate| candidate.eq_ignore_ascii_case(label))
        })
    }
}

/// One fetched row.
#[derive(Debug, Clone)]
pub struct CustomDbRow {
    columns: Arc<ColumnIndex>,
    values: Vec<RowValues>,
}

impl CustomDbRow {
    /// Row over freshly named columns.
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<RowValues>) -> Self {
        Self::with_columns(Arc::new(ColumnIndex::new(column_names.as_ref().clone())), values)
    }

    /// Row over a column index already shared with its siblings.
    #[must_use]
    pub fn with_columns(columns: Arc<ColumnIndex>, values: Vec<RowValues>) -> Self {
        Self { columns, values }
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        self.columns.labels()
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&RowValues> {
        self.columns
            .position(column)
            .and_then(|position| self.values.get(position))
    }

    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(column, value)` pairs in select-list order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.columns
            .labels()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    #[must_use]
    pub fn into_values(self) -> Vec<RowValues> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_falls_back_to_case_insensitive_labels() {
        let row = CustomDbRow::new(
            Arc::new(vec!["ID".to_string(), "name".to_string()]),
            vec![RowValues::Int(4), RowValues::Text("dee".into())],
        );
        assert_eq!(row.get("ID"), Some(&RowValues::Int(4)));
        assert_eq!(row.get("id"), Some(&RowValues::Int(4)));
        assert_eq!(row.get("Name"), Some(&RowValues::Text("dee".into())));
        assert_eq!(row.get("email"), None);
        assert_eq!(row.iter().count(), 2);
    }
}
