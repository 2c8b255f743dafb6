//! Parquet writer and reader for archived records

use super::ArchiveSummary;
use crate::audit::ExecutionPhaseRecord;
use crate::engine::RiskEngine;
use crate::ledger::{RiskCalculationRecord, VerificationMethod};
use crate::money;
use crate::storage::TimeRange;
use crate::types::Side;
use arrow::array::{Array, ArrayRef, BooleanArray, Int64Array, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use rust_decimal::Decimal;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

fn utc_timestamp(name: &str, nullable: bool) -> Field {
    Field::new(
        name,
        DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
        nullable,
    )
}

/// Execution phase schema; the payload is stored as JSON
pub fn phase_schema() -> Schema {
    Schema::new(vec![
        utc_timestamp("start_time", false),
        Field::new("id", DataType::Utf8, false),
        Field::new("position_id", DataType::Utf8, false),
        Field::new("cycle", DataType::Int64, false),
        Field::new("phase", DataType::Utf8, false),
        Field::new("duration_ms", DataType::Int64, false),
        Field::new("success", DataType::Boolean, false),
        Field::new("payload", DataType::Utf8, false),
        utc_timestamp("recorded_at", false),
    ])
}

/// Risk calculation schema; decimals are canonical strings
pub fn calculation_schema() -> Schema {
    Schema::new(vec![
        utc_timestamp("created_at", false),
        Field::new("id", DataType::Utf8, false),
        Field::new("side", DataType::Utf8, false),
        Field::new("equity", DataType::Utf8, false),
        Field::new("risk_pct", DataType::Utf8, false),
        Field::new("entry_price", DataType::Utf8, false),
        Field::new("stop_loss", DataType::Utf8, false),
        Field::new("risk_amount", DataType::Utf8, false),
        Field::new("per_unit_risk", DataType::Utf8, false),
        Field::new("position_size", DataType::Utf8, false),
        Field::new("elapsed_ms", DataType::Int64, false),
        Field::new("hash", DataType::Utf8, false),
        Field::new("verified", DataType::Boolean, false),
        Field::new("verification_method", DataType::Utf8, true),
        utc_timestamp("verified_at", true),
    ])
}

/// Writes archive partitions into one directory
pub struct ParquetArchiver {
    output_dir: PathBuf,
}

impl ParquetArchiver {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    pub fn ensure_dir(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    /// Path for a partition written at `timestamp`
    pub fn file_path(&self, prefix: &str, timestamp: DateTime<Utc>) -> PathBuf {
        let filename = format!("{}_{}.parquet", prefix, timestamp.format("%Y%m%d_%H%M%S_%6f"));
        self.output_dir.join(filename)
    }

    /// Archive everything recorded before `cutoff`
    pub fn archive(&self, engine: &RiskEngine, cutoff: DateTime<Utc>) -> anyhow::Result<ArchiveSummary> {
        let range = TimeRange::before(cutoff);
        let phases = engine.audit().scan_all(range)?;
        let calculations = engine.ledger().range(range)?;

        let now = Utc::now();
        let mut summary = ArchiveSummary {
            phase_records: phases.len(),
            calculation_records: calculations.len(),
            files: vec![],
        };

        let path = self.file_path("phases", now);
        if self.write_phases(&path, &phases)? {
            summary.files.push(path);
        }
        let path = self.file_path("calculations", now);
        if self.write_calculations(&path, &calculations)? {
            summary.files.push(path);
        }

        tracing::info!(
            %cutoff,
            phase_records = summary.phase_records,
            calculation_records = summary.calculation_records,
            files = summary.files.len(),
            "Archive written"
        );
        Ok(summary)
    }

    /// Write phase records; returns false when there was nothing to write
    pub fn write_phases(&self, path: &Path, records: &[ExecutionPhaseRecord]) -> anyhow::Result<bool> {
        if records.is_empty() {
            return Ok(false);
        }

        let start_times: Vec<i64> = records.iter().map(|r| r.start_time.timestamp_micros()).collect();
        let ids: Vec<String> = records.iter().map(|r| r.id.to_string()).collect();
        let position_ids: Vec<String> = records.iter().map(|r| r.position_id.to_string()).collect();
        let cycles: Vec<i64> = records.iter().map(|r| i64::from(r.cycle)).collect();
        let phases: Vec<&str> = records.iter().map(|r| r.phase.as_str()).collect();
        let durations: Vec<i64> = records.iter().map(|r| r.duration_ms as i64).collect();
        let successes: Vec<bool> = records.iter().map(|r| r.success).collect();
        let payloads = records
            .iter()
            .map(|r| serde_json::to_string(&r.payload))
            .collect::<Result<Vec<_>, _>>()?;
        let recorded: Vec<i64> = records.iter().map(|r| r.recorded_at.timestamp_micros()).collect();

        let columns: Vec<ArrayRef> = vec![
            Arc::new(TimestampMicrosecondArray::from(start_times).with_timezone("UTC")),
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(position_ids)),
            Arc::new(Int64Array::from(cycles)),
            Arc::new(StringArray::from(phases)),
            Arc::new(Int64Array::from(durations)),
            Arc::new(BooleanArray::from(successes)),
            Arc::new(StringArray::from(payloads)),
            Arc::new(TimestampMicrosecondArray::from(recorded).with_timezone("UTC")),
        ];

        self.write_batch(path, phase_schema(), columns)?;
        tracing::debug!(path = ?path, count = records.len(), "Wrote phase records to Parquet");
        Ok(true)
    }

    /// Write calculation records; returns false when there was nothing to write
    pub fn write_calculations(&self, path: &Path, records: &[RiskCalculationRecord]) -> anyhow::Result<bool> {
        if records.is_empty() {
            return Ok(false);
        }

        let decimals = |f: fn(&RiskCalculationRecord) -> Decimal| -> ArrayRef {
            Arc::new(StringArray::from(
                records.iter().map(|r| money::canonical(f(r))).collect::<Vec<_>>(),
            ))
        };

        let created: Vec<i64> = records.iter().map(|r| r.created_at.timestamp_micros()).collect();
        let ids: Vec<String> = records.iter().map(|r| r.id.to_string()).collect();
        let sides: Vec<&str> = records.iter().map(|r| r.side.as_str()).collect();
        let elapsed: Vec<i64> = records.iter().map(|r| r.elapsed_ms as i64).collect();
        let hashes: Vec<&str> = records.iter().map(|r| r.hash.as_str()).collect();
        let verified: Vec<bool> = records.iter().map(|r| r.verified).collect();
        let methods: Vec<Option<&str>> = records
            .iter()
            .map(|r| r.verification_method.map(method_name))
            .collect();
        let verified_at: Vec<Option<i64>> = records
            .iter()
            .map(|r| r.verified_at.map(|t| t.timestamp_micros()))
            .collect();

        let columns: Vec<ArrayRef> = vec![
            Arc::new(TimestampMicrosecondArray::from(created).with_timezone("UTC")),
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(sides)),
            decimals(|r| r.equity),
            decimals(|r| r.risk_pct),
            decimals(|r| r.entry_price),
            decimals(|r| r.stop_loss),
            decimals(|r| r.risk_amount),
            decimals(|r| r.per_unit_risk),
            decimals(|r| r.position_size),
            Arc::new(Int64Array::from(elapsed)),
            Arc::new(StringArray::from(hashes)),
            Arc::new(BooleanArray::from(verified)),
            Arc::new(StringArray::from(methods)),
            Arc::new(TimestampMicrosecondArray::from(verified_at).with_timezone("UTC")),
        ];

        self.write_batch(path, calculation_schema(), columns)?;
        tracing::debug!(path = ?path, count = records.len(), "Wrote calculation records to Parquet");
        Ok(true)
    }

    fn write_batch(&self, path: &Path, schema: Schema, columns: Vec<ArrayRef>) -> anyhow::Result<()> {
        self.ensure_dir()?;

        let schema = Arc::new(schema);
        let batch = RecordBatch::try_new(schema.clone(), columns)?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        // Fails atomically when another run already owns this partition
        let file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                anyhow::bail!("Archive partition already exists: {}", path.display())
            }
            Err(e) => return Err(e.into()),
        };
        let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    }
}

fn method_name(method: VerificationMethod) -> &'static str {
    match method {
        VerificationMethod::Recompute => "recompute",
        VerificationMethod::Manual => "manual",
        VerificationMethod::External => "external",
    }
}

fn parse_method(name: &str) -> anyhow::Result<VerificationMethod> {
    match name {
        "recompute" => Ok(VerificationMethod::Recompute),
        "manual" => Ok(VerificationMethod::Manual),
        "external" => Ok(VerificationMethod::External),
        other => anyhow::bail!("Unknown verification method: {}", other),
    }
}

/// Reads archived partitions back
pub struct ArchiveReader {
    path: PathBuf,
}

impl ArchiveReader {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Number of rows in the file
    pub fn row_count(&self) -> anyhow::Result<usize> {
        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&self.path)?)?.build()?;
        let mut rows = 0;
        for batch in reader {
            rows += batch?.num_rows();
        }
        Ok(rows)
    }

    /// Read a calculations partition
    pub fn read_calculations(&self) -> anyhow::Result<Vec<RiskCalculationRecord>> {
        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&self.path)?)?.build()?;

        let mut records = Vec::new();
        for batch_result in reader {
            let batch = batch_result?;
            let created = timestamp_column(&batch, 0)?;
            let strings = |i: usize| string_column(&batch, i);
            let (ids, sides) = (strings(1)?, strings(2)?);
            let (equity, risk_pct, entry, stop) = (strings(3)?, strings(4)?, strings(5)?, strings(6)?);
            let (risk_amount, per_unit, size) = (strings(7)?, strings(8)?, strings(9)?);
            let elapsed = batch
                .column(10)
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(|| anyhow::anyhow!("Invalid elapsed_ms column"))?;
            let hashes = strings(11)?;
            let verified = batch
                .column(12)
                .as_any()
                .downcast_ref::<BooleanArray>()
                .ok_or_else(|| anyhow::anyhow!("Invalid verified column"))?;
            let methods = strings(13)?;
            let verified_at = timestamp_column(&batch, 14)?;

            for i in 0..batch.num_rows() {
                records.push(RiskCalculationRecord {
                    id: ids.value(i).parse()?,
                    side: sides.value(i).parse::<Side>().map_err(anyhow::Error::msg)?,
                    equity: Decimal::from_str(equity.value(i))?,
                    risk_pct: Decimal::from_str(risk_pct.value(i))?,
                    entry_price: Decimal::from_str(entry.value(i))?,
                    stop_loss: Decimal::from_str(stop.value(i))?,
                    risk_amount: Decimal::from_str(risk_amount.value(i))?,
                    per_unit_risk: Decimal::from_str(per_unit.value(i))?,
                    position_size: Decimal::from_str(size.value(i))?,
                    elapsed_ms: u64::try_from(elapsed.value(i))?,
                    hash: hashes.value(i).to_string(),
                    verified: verified.value(i),
                    verification_method: if methods.is_null(i) {
                        None
                    } else {
                        Some(parse_method(methods.value(i))?)
                    },
                    verified_at: if verified_at.is_null(i) {
                        None
                    } else {
                        Some(micros(verified_at.value(i))?)
                    },
                    created_at: micros(created.value(i))?,
                });
            }
        }

        Ok(records)
    }
}

fn string_column(batch: &RecordBatch, index: usize) -> anyhow::Result<&StringArray> {
    batch
        .column(index)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| anyhow::anyhow!("Invalid string column {}", index))
}

fn timestamp_column(batch: &RecordBatch, index: usize) -> anyhow::Result<&TimestampMicrosecondArray> {
    batch
        .column(index)
        .as_any()
        .downcast_ref::<TimestampMicrosecondArray>()
        .ok_or_else(|| anyhow::anyhow!("Invalid timestamp column {}", index))
}

fn micros(value: i64) -> anyhow::Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(value).ok_or_else(|| anyhow::anyhow!("Invalid timestamp"))
}
