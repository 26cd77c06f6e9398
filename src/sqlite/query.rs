use rusqlite::Statement;
use rusqlite::types::Value;

use crate::error::SqlMapperError;
use crate::results::ResultSet;

use super::params::sqlite_extract_value_sync;

/// Run a prepared query and materialize every row.
///
/// # Errors
/// Returns `SqlMapperError::SqliteError` if query execution or row extraction fails.
pub fn build_result_set(stmt: &mut Statement, params: &[Value]) -> Result<ResultSet, SqlMapperError> {
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let col_count = column_names.len();

    let mut rows_iter = stmt.query(rusqlite::params_from_iter(params.iter()))?;
    let mut result_set = ResultSet::new(column_names);

    while let Some(row) = rows_iter.next()? {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            row_values.push(sqlite_extract_value_sync(row, i)?);
        }
        result_set.push_values(row_values);
    }

    Ok(result_set)
}
