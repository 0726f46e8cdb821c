//! Append-only savings ledger, aggregate reporting, and CSV export.

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::devices::types::HomeId;

/// Why energy was saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SavingsCategory {
    /// A short-cycle restart was prevented.
    ThermalRest,
    /// A lower-tier device was shed during Economy Mode.
    PriorityArbitrage,
    /// A grid-cost interval was covered by solar/battery instead.
    SourceOptimization,
}

impl SavingsCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ThermalRest => "THERMAL_REST",
            Self::PriorityArbitrage => "PRIORITY_ARBITRAGE",
            Self::SourceOptimization => "SOURCE_OPTIMIZATION",
        }
    }

    pub fn all() -> &'static [SavingsCategory] {
        &[
            Self::ThermalRest,
            Self::PriorityArbitrage,
            Self::SourceOptimization,
        ]
    }
}

impl fmt::Display for SavingsCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// One immutable ledger entry. Never updated or deleted once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsRecord {
    pub home_id: HomeId,
    pub timestamp: NaiveDateTime,
    pub category: SavingsCategory,
    pub energy_kwh_saved: f32,
    pub cost_gnf_saved: f32,
}

/// In-memory append-only ledger, safe for concurrent writers across homes.
#[derive(Debug, Default)]
pub struct SavingsLedger {
    records: Mutex<Vec<SavingsRecord>>,
}

impl SavingsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, record: SavingsRecord) {
        self.records
            .lock()
            .expect("savings ledger lock poisoned")
            .push(record);
    }

    /// Copy of the current records, in append order.
    pub fn snapshot(&self) -> Vec<SavingsRecord> {
        self.records
            .lock()
            .expect("savings ledger lock poisoned")
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .expect("savings ledger lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Aggregate savings derived from the complete ledger.
///
/// Computed post-hoc from the records to keep the ledger and the reported
/// totals consistent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavingsReport {
    pub record_count: usize,
    pub total_energy_kwh: f32,
    pub total_cost_gnf: f32,
    pub thermal_rest_kwh: f32,
    pub priority_arbitrage_kwh: f32,
    pub source_optimization_kwh: f32,
}

impl SavingsReport {
    pub fn from_records(records: &[SavingsRecord]) -> Self {
        let mut report = Self {
            record_count: records.len(),
            total_energy_kwh: 0.0,
            total_cost_gnf: 0.0,
            thermal_rest_kwh: 0.0,
            priority_arbitrage_kwh: 0.0,
            source_optimization_kwh: 0.0,
        };
        for r in records {
            report.total_energy_kwh += r.energy_kwh_saved;
            report.total_cost_gnf += r.cost_gnf_saved;
            match r.category {
                SavingsCategory::ThermalRest => report.thermal_rest_kwh += r.energy_kwh_saved,
                SavingsCategory::PriorityArbitrage => {
                    report.priority_arbitrage_kwh += r.energy_kwh_saved;
                }
                SavingsCategory::SourceOptimization => {
                    report.source_optimization_kwh += r.energy_kwh_saved;
                }
            }
        }
        report
    }
}

impl fmt::Display for SavingsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Savings Report ---")?;
        writeln!(f, "Records:              {}", self.record_count)?;
        writeln!(f, "Total energy saved:   {:.3} kWh", self.total_energy_kwh)?;
        writeln!(f, "Total cost saved:     {:.0} GNF", self.total_cost_gnf)?;
        writeln!(f, "Thermal rest:         {:.3} kWh", self.thermal_rest_kwh)?;
        writeln!(
            f,
            "Priority arbitrage:   {:.3} kWh",
            self.priority_arbitrage_kwh
        )?;
        write!(
            f,
            "Source optimization:  {:.3} kWh",
            self.source_optimization_kwh
        )
    }
}

/// Schema v1 column header for CSV ledger export.
pub const SAVINGS_SCHEMA_V1_HEADER: &str =
    "home_id,timestamp,category,energy_kwh_saved,cost_gnf_saved";

/// Writes the ledger as CSV to any writer.
///
/// Deterministic for identical inputs: records are written in append order
/// with fixed-precision numeric formatting.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_savings_csv(records: &[SavingsRecord], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(SAVINGS_SCHEMA_V1_HEADER.split(','))?;
    for r in records {
        wtr.write_record(&[
            r.home_id.to_string(),
            r.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
            r.category.display_name().to_string(),
            format!("{:.4}", r.energy_kwh_saved),
            format!("{:.2}", r.cost_gnf_saved),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Exports the ledger to a CSV file at the given path.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(records: &[SavingsRecord], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_savings_csv(records, buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_record(home_id: u64, category: SavingsCategory, kwh: f32) -> SavingsRecord {
        SavingsRecord {
            home_id,
            timestamp: NaiveDate::from_ymd_opt(2025, 1, 6)
                .expect("valid date")
                .and_hms_opt(10, 0, 0)
                .expect("valid time"),
            category,
            energy_kwh_saved: kwh,
            cost_gnf_saved: kwh * 900.0,
        }
    }

    #[test]
    fn ledger_preserves_append_order() {
        let ledger = SavingsLedger::new();
        ledger.append(make_record(1, SavingsCategory::ThermalRest, 0.1));
        ledger.append(make_record(2, SavingsCategory::PriorityArbitrage, 0.2));

        let records = ledger.snapshot();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].home_id, 1);
        assert_eq!(records[1].home_id, 2);
    }

    #[test]
    fn report_breaks_down_by_category() {
        let records = vec![
            make_record(1, SavingsCategory::ThermalRest, 0.1),
            make_record(1, SavingsCategory::ThermalRest, 0.3),
            make_record(1, SavingsCategory::PriorityArbitrage, 0.5),
            make_record(2, SavingsCategory::SourceOptimization, 1.0),
        ];
        let report = SavingsReport::from_records(&records);
        assert_eq!(report.record_count, 4);
        assert!((report.total_energy_kwh - 1.9).abs() < 1e-5);
        assert!((report.thermal_rest_kwh - 0.4).abs() < 1e-5);
        assert!((report.priority_arbitrage_kwh - 0.5).abs() < 1e-5);
        assert!((report.source_optimization_kwh - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_report() {
        let report = SavingsReport::from_records(&[]);
        assert_eq!(report.record_count, 0);
        assert_eq!(report.total_energy_kwh, 0.0);
        assert!(format!("{report}").contains("Records:              0"));
    }

    #[test]
    fn csv_has_schema_v1_header_and_one_row_per_record() {
        let records = vec![
            make_record(1, SavingsCategory::ThermalRest, 0.1),
            make_record(2, SavingsCategory::SourceOptimization, 0.2),
        ];
        let mut out = Vec::new();
        write_savings_csv(&records, &mut out).expect("csv export should succeed");

        let csv = String::from_utf8(out).expect("csv output should be valid UTF-8");
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(SAVINGS_SCHEMA_V1_HEADER));
        assert_eq!(lines.count(), 2);
    }

    #[test]
    fn csv_export_is_deterministic() {
        let records = vec![
            make_record(1, SavingsCategory::ThermalRest, 0.125),
            make_record(1, SavingsCategory::PriorityArbitrage, 0.25),
        ];
        let mut out_a = Vec::new();
        let mut out_b = Vec::new();
        write_savings_csv(&records, &mut out_a).expect("first export should succeed");
        write_savings_csv(&records, &mut out_b).expect("second export should succeed");
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn csv_rows_round_trip_parseable() {
        let records = vec![make_record(7, SavingsCategory::ThermalRest, 0.5)];
        let mut out = Vec::new();
        write_savings_csv(&records, &mut out).expect("csv export should succeed");

        let mut rdr = csv::ReaderBuilder::new().from_reader(out.as_slice());
        let row = rdr
            .records()
            .next()
            .expect("one row")
            .expect("row should parse");
        assert_eq!(&row[0], "7");
        assert_eq!(&row[2], "THERMAL_REST");
        assert!(row[3].parse::<f32>().is_ok());
        assert!(row[4].parse::<f32>().is_ok());
    }
}
