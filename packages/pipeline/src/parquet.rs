//! Parquet copies of the CSV tables, written through an in-memory `DuckDB`.

use std::path::{Path, PathBuf};

use crate::PipelineError;
use crate::paths::parquet_path;

/// Converts a CSV table to Parquet next to it.
///
/// # Errors
///
/// Returns [`PipelineError::DuckDb`] if `DuckDB` cannot read the CSV or
/// write the Parquet file.
pub fn write_parquet(csv_path: &Path) -> Result<PathBuf, PipelineError> {
    let target = parquet_path(csv_path);
    let conn = duckdb::Connection::open_in_memory()?;
    conn.execute_batch(&format!(
        "COPY (SELECT * FROM read_csv_auto('{}', header = true)) TO '{}' (FORMAT PARQUET)",
        sql_string(csv_path),
        sql_string(&target),
    ))?;
    log::info!("Wrote {}", target.display());
    Ok(target)
}

fn sql_string(path: &Path) -> String {
    path.display().to_string().replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_are_escaped_in_paths() {
        assert_eq!(sql_string(Path::new("/tmp/o'brien.csv")), "/tmp/o''brien.csv");
    }

    #[test]
    fn csv_converts_to_parquet() {
        let dir = std::env::temp_dir().join(format!(
            "junction_danger_parquet_test_{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let csv_path = dir.join("ranking.csv");
        std::fs::write(&csv_path, "junction_rank,name\n1,Strand\n2,Aldwych\n").unwrap();

        let parquet = write_parquet(&csv_path).unwrap();
        assert!(parquet.exists());

        let conn = duckdb::Connection::open_in_memory().unwrap();
        let count: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM read_parquet('{}')", sql_string(&parquet)),
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
