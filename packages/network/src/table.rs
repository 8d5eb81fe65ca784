//! Junction table CSV I/O.

use std::io::{Read, Write};
use std::path::Path;

use junction_danger_network_models::{JunctionRow, JunctionTable};

use crate::NetworkError;

/// File name of the junction table for a consolidation tolerance.
#[must_use]
pub fn junction_table_file_name(tolerance: f64) -> String {
    format!("junctions-tolerance={tolerance}.csv")
}

/// Writes the junction table as CSV.
///
/// # Errors
///
/// Returns [`NetworkError`] if the file cannot be created or written.
pub fn write_junction_table(path: &Path, table: &JunctionTable) -> Result<(), NetworkError> {
    let file = std::fs::File::create(path)?;
    write_junction_rows(std::io::BufWriter::new(file), table)?;
    log::info!("Wrote {} junctions to {}", table.len(), path.display());
    Ok(())
}

/// Writes the junction table as CSV to any `Write` sink.
///
/// # Errors
///
/// Returns [`NetworkError`] if serialization or the write fails.
pub fn write_junction_rows(writer: impl Write, table: &JunctionTable) -> Result<(), NetworkError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in &table.rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Reads a junction table written by [`write_junction_table`].
///
/// # Errors
///
/// Returns [`NetworkError::SourceUnavailable`] if the file cannot be opened
/// and [`NetworkError::SchemaViolation`] if the rows are malformed or the
/// junction indices are not `0..n` in order.
pub fn read_junction_table(path: &Path) -> Result<JunctionTable, NetworkError> {
    let file = std::fs::File::open(path).map_err(|e| {
        log::error!("Cannot open {}: {e}", path.display());
        NetworkError::SourceUnavailable {
            path: path.to_path_buf(),
        }
    })?;
    let table = parse_junction_table(file)?;
    log::info!("Read {} junctions from {}", table.len(), path.display());
    Ok(table)
}

/// Parses a junction table from any CSV `Read` source.
///
/// # Errors
///
/// Returns [`NetworkError::SchemaViolation`] if a row is malformed or the
/// junction indices are not `0..n` in order.
pub fn parse_junction_table(reader: impl Read) -> Result<JunctionTable, NetworkError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();

    for (i, result) in csv_reader.deserialize::<JunctionRow>().enumerate() {
        let row = result.map_err(|e| NetworkError::SchemaViolation {
            message: format!("junction table row {i}: {e}"),
        })?;
        if row.junction_index != i {
            return Err(NetworkError::SchemaViolation {
                message: format!(
                    "junction table row {i} has junction_index {}",
                    row.junction_index
                ),
            });
        }
        rows.push(row);
    }

    Ok(JunctionTable { rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> JunctionTable {
        JunctionTable {
            rows: vec![
                JunctionRow {
                    junction_index: 0,
                    junction_id: 10,
                    latitude_junction: 51.5,
                    longitude_junction: -0.12,
                    junction_cluster_id: 1,
                    latitude_cluster: 51.5001,
                    longitude_cluster: -0.1201,
                    junction_cluster_name: "Charing Cross Rd-Strand".to_string(),
                },
                JunctionRow {
                    junction_index: 1,
                    junction_id: 11,
                    latitude_junction: 51.5002,
                    longitude_junction: -0.1202,
                    junction_cluster_id: 1,
                    latitude_cluster: 51.5001,
                    longitude_cluster: -0.1201,
                    junction_cluster_name: "Charing Cross Rd-Strand".to_string(),
                },
            ],
        }
    }

    #[test]
    fn writes_expected_header() {
        let mut buf = Vec::new();
        write_junction_rows(&mut buf, &table()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with(
            "junction_index,junction_id,latitude_junction,longitude_junction,\
             junction_cluster_id,latitude_cluster,longitude_cluster,junction_cluster_name\n"
        ));
    }

    #[test]
    fn file_round_trip_preserves_rows() {
        let dir = std::env::temp_dir().join("junction_danger_network_table");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(junction_table_file_name(15.0));

        write_junction_table(&path, &table()).unwrap();
        let read = read_junction_table(&path).unwrap();
        assert_eq!(read, table());
    }

    #[test]
    fn out_of_order_indices_are_rejected() {
        let mut t = table();
        t.rows[1].junction_index = 5;
        let mut buf = Vec::new();
        write_junction_rows(&mut buf, &t).unwrap();

        let err = parse_junction_table(buf.as_slice()).unwrap_err();
        assert!(matches!(err, NetworkError::SchemaViolation { .. }));
    }

    #[test]
    fn tolerance_appears_in_file_name() {
        assert_eq!(junction_table_file_name(15.0), "junctions-tolerance=15.csv");
        assert_eq!(junction_table_file_name(7.5), "junctions-tolerance=7.5.csv");
    }
}
