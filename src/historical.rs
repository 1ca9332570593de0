//! Historical dataset loading and lookup.
//!
//! The dataset is a CSV file with a header row. `sensor_id` and `timestamp`
//! columns are required; `pm25`, `pm10`, `no2` and `o3` are picked up when
//! present and every other column is ignored. Rows are cleaned once at load
//! time and then held in memory, indexed by sensor id.

use std::{collections::HashMap, io::Read, path::Path};

use chrono::Datelike;

use crate::cleaning::{clean_historical, CleaningStats, HistoricalRecord, PollutantColumns, RawRecord, RawTable};
use crate::error::{ServiceError, ServiceResult};
use crate::models::Pollutants;

// ---

/// Cleaned historical rows in file order, with a per-sensor index.
#[derive(Debug, Clone, Default)]
pub struct HistoricalTable {
    rows: Vec<HistoricalRecord>,
    by_sensor: HashMap<String, Vec<usize>>,
}

impl HistoricalTable {
    // ---
    pub fn from_records(rows: Vec<HistoricalRecord>) -> Self {
        // ---
        let mut by_sensor: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, row) in rows.iter().enumerate() {
            by_sensor.entry(row.sensor_id.clone()).or_default().push(idx);
        }
        HistoricalTable { rows, by_sensor }
    }

    pub fn rows(&self) -> &[HistoricalRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows for one sensor, in file order.
    pub fn for_sensor<'a>(&'a self, sensor_id: &str) -> impl Iterator<Item = &'a HistoricalRecord> {
        self.by_sensor
            .get(sensor_id)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.rows[idx])
    }

    /// Row with the greatest timestamp for a sensor; the later row in file
    /// order wins a tie.
    pub fn latest_for(&self, sensor_id: &str) -> Option<&HistoricalRecord> {
        self.for_sensor(sensor_id)
            .fold(None, |best: Option<&HistoricalRecord>, row| match best {
                Some(b) if b.timestamp > row.timestamp => Some(b),
                _ => Some(row),
            })
    }

    /// Rows whose UTC timestamp falls in the given calendar month.
    pub fn in_month(&self, year: i32, month: u32) -> impl Iterator<Item = &HistoricalRecord> {
        self.rows
            .iter()
            .filter(move |r| r.timestamp.year() == year && r.timestamp.month() == month)
    }
}

/// Load and clean the historical CSV dataset.
pub fn load_historical(path: &Path) -> ServiceResult<(HistoricalTable, CleaningStats)> {
    // ---
    tracing::info!("Loading historical data from {}", path.display());

    let file = std::fs::File::open(path).map_err(|e| ServiceError::io_failure(path, e))?;
    let raw = read_raw_csv(file).map_err(|reason| ServiceError::io_failure(path, reason))?;

    let (rows, stats) = clean_historical(raw);
    tracing::info!(
        initial_rows = stats.initial_rows,
        final_rows = stats.final_rows,
        dropped_rows = stats.dropped_rows,
        percent_cleaned = stats.percent_cleaned,
        "Historical cleaning stats"
    );

    Ok((HistoricalTable::from_records(rows), stats))
}

/// Cell values read as missing, as spreadsheet and dataframe exports write them.
const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn is_na(cell: &str) -> bool {
    NA_TOKENS.contains(&cell)
}

/// Column positions resolved from the header row.
struct Columns {
    sensor_id: usize,
    timestamp: usize,
    pm25: Option<usize>,
    pm10: Option<usize>,
    no2: Option<usize>,
    o3: Option<usize>,
}

/// Read raw historical rows from CSV; short rows yield missing values.
///
/// A pollutant cell that is empty, an NA token or not a number reads as
/// missing.
pub fn read_raw_csv<R: Read>(reader: R) -> Result<RawTable, String> {
    // ---
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = rdr.headers().map_err(|e| e.to_string())?.clone();
    let find = |name: &str| headers.iter().position(|h| h == name);
    let cols = Columns {
        sensor_id: find("sensor_id").ok_or("missing required column `sensor_id`")?,
        timestamp: find("timestamp").ok_or("missing required column `timestamp`")?,
        pm25: find("pm25"),
        pm10: find("pm10"),
        no2: find("no2"),
        o3: find("o3"),
    };

    let mut rows = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| format!("row {}: {}", line + 1, e))?;
        let text = |idx: usize| record.get(idx).filter(|s| !is_na(s)).map(String::from);
        let number = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .and_then(|s| s.trim().parse::<f64>().ok())
                .filter(|v| !v.is_nan())
        };

        rows.push(RawRecord {
            sensor_id: text(cols.sensor_id),
            timestamp: text(cols.timestamp),
            pollutants: Pollutants {
                pm25: number(cols.pm25),
                pm10: number(cols.pm10),
                no2: number(cols.no2),
                o3: number(cols.o3),
            },
        });
    }

    let columns = PollutantColumns {
        pm25: cols.pm25.is_some(),
        pm10: cols.pm10.is_some(),
        no2: cols.no2.is_some(),
        o3: cols.o3.is_some(),
    };
    Ok(RawTable { columns, rows })
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{TimeZone, Utc};

    const CSV: &str = "\
sensor_id,timestamp,pm25,pm10,no2,o3,station_name
s1,2024-01-01 10:00:00,12.5,20,8,30,Amsterdam West
s1,2024-01-01 08:00:00,11,19,,31,Amsterdam West
s2,2024-01-02 10:00:00,,25,10,40,Utrecht
s1,2024-02-01 10:00:00,-3,20,8,30,Amsterdam West
,2024-01-03 10:00:00,1,1,1,1,Nowhere
s3,not-a-date,1,1,1,1,Rotterdam
";

    #[test]
    fn test_read_raw_csv_columns() {
        // ---
        let table = read_raw_csv(CSV.as_bytes()).unwrap();
        assert_eq!(table.columns, PollutantColumns::ALL);
        let rows = table.rows;
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0].sensor_id.as_deref(), Some("s1"));
        assert_eq!(rows[0].pollutants.pm25, Some(12.5));
        assert_eq!(rows[1].pollutants.no2, None);
        assert_eq!(rows[2].pollutants.pm25, None);
        assert_eq!(rows[4].sensor_id, None);
    }

    #[test]
    fn test_read_raw_csv_without_optional_columns() {
        // ---
        let table = read_raw_csv("timestamp,sensor_id\n2024-01-01,s1\n".as_bytes()).unwrap();
        assert_eq!(table.columns, PollutantColumns::default());
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].pollutants, Pollutants::default());
    }

    #[test]
    fn test_read_raw_csv_requires_key_columns() {
        // ---
        let err = read_raw_csv("sensor_id,pm25\ns1,3\n".as_bytes()).unwrap_err();
        assert!(err.contains("timestamp"));
    }

    #[test]
    fn test_read_raw_csv_short_row() {
        // ---
        let table = read_raw_csv("sensor_id,timestamp,pm25\ns1,2024-01-01\n".as_bytes()).unwrap();
        assert!(table.columns.pm25);
        assert_eq!(table.rows[0].pollutants.pm25, None);
    }

    #[test]
    fn test_na_tokens_read_as_missing() {
        // ---
        let csv = "\
sensor_id,timestamp,pm25
NA,2024-01-01 10:00:00,1
N/A,2024-01-01 10:00:00,1
null,2024-01-01 10:00:00,1
s1,NULL,1
s1,2024-01-01 10:00:00,n/a
s1,2024-01-01 10:00:00,abc
s1,2024-01-01 10:00:00,4
";
        let table = read_raw_csv(csv.as_bytes()).unwrap();
        let ids: Vec<Option<&str>> = table.rows.iter().map(|r| r.sensor_id.as_deref()).collect();
        assert_eq!(ids, vec![None, None, None, Some("s1"), Some("s1"), Some("s1"), Some("s1")]);
        assert_eq!(table.rows[3].timestamp, None);
        assert_eq!(table.rows[4].pollutants.pm25, None);
        assert_eq!(table.rows[5].pollutants.pm25, None);

        let (rows, stats) = clean_historical(table);
        assert_eq!(stats.dropped_rows, 6);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pollutants.pm25, Some(4.0));
    }

    #[test]
    fn test_empty_pollutant_cells_dropped_when_cleaned() {
        // ---
        let csv = "\
sensor_id,timestamp,pm25,pm10,no2,o3
s1,2024-01-01 10:00:00,10,,5,5
s1,2024-01-02 10:00:00,,20,5,5
s1,2024-01-03 10:00:00,10,20,5,5
";
        let (rows, stats) = clean_historical(read_raw_csv(csv.as_bytes()).unwrap());
        assert_eq!(stats.final_rows, 1);
        assert_eq!(stats.dropped_rows, 2);
        assert_eq!(rows[0].timestamp, Utc.with_ymd_and_hms(2024, 1, 3, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_table_lookups() {
        // ---
        let (rows, stats) = clean_historical(read_raw_csv(CSV.as_bytes()).unwrap());
        assert_eq!(stats.final_rows, 1);
        let table = HistoricalTable::from_records(rows);

        assert_eq!(table.for_sensor("s1").count(), 1);
        assert_eq!(table.for_sensor("s2").count(), 0);
        assert_eq!(table.for_sensor("missing").count(), 0);

        let latest = table.latest_for("s1").unwrap();
        assert_eq!(latest.timestamp, Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
        assert!(table.latest_for("s3").is_none());

        assert_eq!(table.in_month(2024, 1).count(), 1);
        assert_eq!(table.in_month(2024, 2).count(), 0);
        assert_eq!(table.in_month(2023, 1).count(), 0);
    }

    #[test]
    fn test_latest_for_tie_prefers_later_row() {
        // ---
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let mk = |pm25| HistoricalRecord {
            sensor_id: "s1".to_string(),
            timestamp: ts,
            pollutants: Pollutants {
                pm25: Some(pm25),
                ..Pollutants::default()
            },
        };
        let table = HistoricalTable::from_records(vec![mk(1.0), mk(2.0)]);
        assert_eq!(table.latest_for("s1").unwrap().pollutants.pm25, Some(2.0));
    }

    #[test]
    fn test_load_historical_missing_file() {
        // ---
        let err = load_historical(Path::new("/no/such/history.csv")).unwrap_err();
        assert!(matches!(err, ServiceError::IoFailure { .. }));
    }
}
