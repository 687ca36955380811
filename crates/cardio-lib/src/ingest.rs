//! Delimited text to [`Signal`] conversion with sampling-rate inference.
//!
//! Parsing runs in two tiers. The strict tier hands the text to the `csv`
//! reader and accepts it only if every field is a number and every row has the
//! same width. Anything else (headers, ragged rows, stray annotations) drops to
//! a tolerant line tokenizer that keeps whatever numbers it can find.

use crate::error::IngestError;
use crate::signal::{median, validate_rate, Signal, SignalMetadata, TimeColumn};
use csv::{ReaderBuilder, Trim};
use log::{debug, warn};
use std::fs;
use std::path::Path;

/// Rate assumed when neither the caller nor a time column provides one.
pub const DEFAULT_SAMPLING_RATE: f64 = 250.0;

const INDEX_STEP_TOLERANCE: f64 = 1e-9;
const INDEX_MIN_SPAN: f64 = 1000.0;
const MILLISECOND_MIN_STEP: f64 = 1.5;

#[derive(Debug, Clone, PartialEq)]
pub struct IngestOptions {
    /// Recorded verbatim in the metadata
    pub source: String,
    /// Explicit time column; auto-detected from column 0 when `None`
    pub time_col: Option<usize>,
    pub value_col: usize,
    /// Leading lines dropped before parsing
    pub skip_rows: usize,
    /// Multiplier applied to every value
    pub scale: Option<f64>,
    /// Rate used when no usable time axis exists
    pub sampling_rate: Option<f64>,
    pub delimiter: u8,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            source: "<memory>".to_string(),
            time_col: None,
            value_col: 0,
            skip_rows: 0,
            scale: None,
            sampling_rate: None,
            delimiter: b',',
        }
    }
}

/// Parsed columns before rate inference.
#[derive(Debug, Default)]
struct Columns {
    values: Vec<f64>,
    times: Option<Vec<f64>>,
}

/// Read a file and ingest it, recording the path as the source.
pub fn ingest_path(path: &Path, opts: &IngestOptions) -> Result<(Signal, SignalMetadata), IngestError> {
    let raw = fs::read_to_string(path)?;
    let opts = IngestOptions {
        source: path.display().to_string(),
        ..opts.clone()
    };
    ingest(&raw, &opts)
}

/// Convert raw delimited text into a signal plus provenance metadata.
pub fn ingest(raw: &str, opts: &IngestOptions) -> Result<(Signal, SignalMetadata), IngestError> {
    if let Some(fs) = opts.sampling_rate {
        validate_rate(fs)?;
    }
    let body = raw.lines().skip(opts.skip_rows).collect::<Vec<_>>().join("\n");
    if body.trim().is_empty() {
        return Err(IngestError::Empty);
    }

    let mut columns = match parse_table(&body, opts.delimiter, opts.skip_rows)? {
        Some(rows) => select_columns(rows, opts)?,
        None => {
            debug!("{}: strict parse rejected, tokenizing line by line", opts.source);
            tokenize(&body, opts.delimiter, opts.skip_rows)?
        }
    };
    if let Some(scale) = opts.scale {
        columns.values.iter_mut().for_each(|v| *v *= scale);
    }

    let n = columns.values.len();
    let fallback = opts.sampling_rate.unwrap_or(DEFAULT_SAMPLING_RATE);
    let timing = infer_timing(columns.times.as_deref(), n, fallback, &opts.source)?;
    debug!(
        "{}: {} samples at {:.3} Hz ({:?} time column)",
        opts.source, n, timing.rate, timing.kind
    );

    let signal = Signal::new(columns.values, opts.source.clone()).with_rate(timing.rate)?;
    let meta = SignalMetadata {
        source: opts.source.clone(),
        n_samples: n,
        sampling_rate: timing.rate,
        duration_seconds: timing.duration,
        scale_applied: opts.scale,
        time_column: timing.kind,
    };
    Ok((signal, meta))
}

/// Strict tier. `Ok(None)` means the text is not a clean numeric table.
fn parse_table(body: &str, delimiter: u8, line_offset: usize) -> Result<Option<Vec<Vec<f64>>>, IngestError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_reader(body.as_bytes());
    let mut rows = Vec::new();
    for record in reader.records() {
        let Ok(record) = record else {
            return Ok(None);
        };
        let line = record.position().map_or(0, |p| p.line() as usize) + line_offset;
        let mut row = Vec::with_capacity(record.len());
        for field in record.iter() {
            let Ok(value) = field.parse::<f64>() else {
                return Ok(None);
            };
            if !value.is_finite() {
                return Err(IngestError::NonFinite { row: line });
            }
            row.push(value);
        }
        rows.push(row);
    }
    Ok((!rows.is_empty()).then_some(rows))
}

fn select_columns(rows: Vec<Vec<f64>>, opts: &IngestOptions) -> Result<Columns, IngestError> {
    let width = rows[0].len();
    let column = |idx: usize| -> Result<Vec<f64>, IngestError> {
        if idx >= width {
            return Err(IngestError::ColumnOutOfRange { column: idx, width });
        }
        Ok(rows.iter().map(|row| row[idx]).collect())
    };

    if width == 1 {
        if let Some(time_col) = opts.time_col {
            if time_col != opts.value_col {
                return Err(IngestError::ConflictingColumns {
                    time_col,
                    value_col: opts.value_col,
                });
            }
        }
        return Ok(Columns {
            values: column(0)?,
            times: None,
        });
    }

    let values = column(opts.value_col)?;
    let times = match opts.time_col {
        Some(idx) => Some(column(idx)?),
        None if opts.value_col != 0 => {
            let first = column(0)?;
            let ascending = first.windows(2).all(|w| w[1] >= w[0]);
            ascending.then_some(first)
        }
        None => None,
    };
    Ok(Columns { values, times })
}

/// Tolerant tier: first two numbers of a row are `(time, value)`, a lone
/// number is a value, rows without numbers are skipped.
fn tokenize(body: &str, delimiter: u8, line_offset: usize) -> Result<Columns, IngestError> {
    let delimiter = delimiter as char;
    let mut values = Vec::new();
    let mut times = Vec::new();
    for (idx, line) in body.lines().enumerate() {
        let mut nums = Vec::with_capacity(2);
        for token in line
            .split(|c: char| c == delimiter || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            if let Ok(value) = token.parse::<f64>() {
                if !value.is_finite() {
                    return Err(IngestError::NonFinite {
                        row: idx + 1 + line_offset,
                    });
                }
                nums.push(value);
            }
        }
        match nums.as_slice() {
            [] => {}
            [value] => values.push(*value),
            [time, value, ..] => {
                times.push(*time);
                values.push(*value);
            }
        }
    }
    if values.is_empty() {
        return Err(IngestError::NoNumericValues);
    }
    let times = if times.len() == values.len() {
        Some(times)
    } else {
        if !times.is_empty() {
            warn!(
                "only {} of {} rows carried a time stamp; ignoring the time axis",
                times.len(),
                values.len()
            );
        }
        None
    };
    Ok(Columns { values, times })
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Timing {
    rate: f64,
    duration: f64,
    kind: TimeColumn,
}

fn infer_timing(times: Option<&[f64]>, n: usize, fallback: f64, source: &str) -> Result<Timing, IngestError> {
    let untimed = |kind| Timing {
        rate: fallback,
        duration: n as f64 / fallback,
        kind,
    };
    let Some(times) = times.filter(|t| t.len() >= 2) else {
        return Ok(untimed(TimeColumn::None));
    };

    let diffs: Vec<f64> = times.windows(2).map(|w| w[1] - w[0]).collect();
    if let Some((idx, &delta)) = diffs.iter().enumerate().find(|(_, d)| **d <= 0.0) {
        return Err(IngestError::NonPositiveTimeDelta { row: idx + 1, delta });
    }
    let max_time = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = times[times.len() - 1] - times[0];

    if max_time > INDEX_MIN_SPAN && diffs.iter().all(|d| (d - 1.0).abs() <= INDEX_STEP_TOLERANCE) {
        debug!("{}: time column is a sample index", source);
        return Ok(untimed(TimeColumn::SampleIndex));
    }
    let step = median(&diffs);
    if step > MILLISECOND_MIN_STEP {
        if max_time > INDEX_MIN_SPAN {
            return Ok(Timing {
                rate: 1000.0 / step,
                duration: span / 1000.0,
                kind: TimeColumn::Milliseconds,
            });
        }
        warn!(
            "{}: time step {} has no recognizable unit; assuming {} Hz",
            source, step, fallback
        );
        return Ok(Timing {
            rate: fallback,
            duration: span,
            kind: TimeColumn::Unknown,
        });
    }
    Ok(Timing {
        rate: 1.0 / step,
        duration: span,
        kind: TimeColumn::Seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn two_col(times: impl Iterator<Item = f64>) -> String {
        times
            .enumerate()
            .map(|(i, t)| format!("{},{}\n", t, (i as f64 * 0.1).sin()))
            .collect()
    }

    fn value_col_1() -> IngestOptions {
        IngestOptions {
            value_col: 1,
            ..IngestOptions::default()
        }
    }

    #[test]
    fn seconds_column_sets_rate() {
        let raw = two_col((0..100).map(|i| i as f64 / 99.0));
        let (signal, meta) = ingest(&raw, &value_col_1()).unwrap();
        assert_eq!(meta.n_samples, 100);
        assert_eq!(signal.len(), 100);
        assert!((meta.sampling_rate - 99.0).abs() < 1e-6);
        assert!((meta.duration_seconds - 1.0).abs() < 1e-9);
        assert_eq!(meta.time_column, TimeColumn::Seconds);
        assert_eq!(signal.fs, Some(meta.sampling_rate));
    }

    #[test]
    fn sample_index_column_falls_back_to_default_rate() {
        let raw = two_col((0..5000).map(|i| i as f64));
        let (_, meta) = ingest(&raw, &value_col_1()).unwrap();
        assert_eq!(meta.time_column, TimeColumn::SampleIndex);
        assert_eq!(meta.sampling_rate, DEFAULT_SAMPLING_RATE);
        assert!((meta.duration_seconds - 20.0).abs() < 1e-9);

        let opts = IngestOptions {
            sampling_rate: Some(500.0),
            ..value_col_1()
        };
        let (_, meta) = ingest(&raw, &opts).unwrap();
        assert_eq!(meta.sampling_rate, 500.0);
    }

    #[test]
    fn short_index_column_is_seconds_not_index() {
        // max below the index span threshold, so unit steps read as 1 Hz
        let raw = two_col((0..10).map(|i| i as f64));
        let (_, meta) = ingest(&raw, &value_col_1()).unwrap();
        assert_eq!(meta.time_column, TimeColumn::Seconds);
        assert!((meta.sampling_rate - 1.0).abs() < 1e-12);
    }

    #[test]
    fn millisecond_column() {
        let raw = two_col((0..2000).map(|i| i as f64 * 4.0));
        let (_, meta) = ingest(&raw, &value_col_1()).unwrap();
        assert_eq!(meta.time_column, TimeColumn::Milliseconds);
        assert!((meta.sampling_rate - 250.0).abs() < 1e-9);
        assert!((meta.duration_seconds - 7.996).abs() < 1e-9);
    }

    #[test]
    fn unknown_unit_uses_fallback_rate() {
        let raw = two_col((0..100).map(|i| i as f64 * 2.0));
        let (_, meta) = ingest(&raw, &value_col_1()).unwrap();
        assert_eq!(meta.time_column, TimeColumn::Unknown);
        assert_eq!(meta.sampling_rate, DEFAULT_SAMPLING_RATE);
        assert!((meta.duration_seconds - 198.0).abs() < 1e-9);
    }

    #[test]
    fn non_positive_delta_is_error() {
        let raw = "0.0,1\n0.1,2\n0.1,3\n0.3,4\n";
        let err = ingest(raw, &value_col_1()).unwrap_err();
        assert!(matches!(err, IngestError::NonPositiveTimeDelta { row: 2, .. }), "{err}");

        let raw = "0.0,1\n0.2,2\n0.1,3\n";
        let opts = IngestOptions {
            time_col: Some(0),
            ..value_col_1()
        };
        assert!(matches!(
            ingest(raw, &opts),
            Err(IngestError::NonPositiveTimeDelta { row: 2, .. })
        ));
    }

    #[test]
    fn descending_first_column_is_not_a_time_axis() {
        let raw = "3,1\n2,2\n1,3\n";
        let (signal, meta) = ingest(raw, &value_col_1()).unwrap();
        assert_eq!(signal.data, vec![1.0, 2.0, 3.0]);
        assert_eq!(meta.time_column, TimeColumn::None);
    }

    #[test]
    fn single_column_values() {
        let (signal, meta) = ingest("1.5\n-2\n3e-1\n", &IngestOptions::default()).unwrap();
        assert_eq!(signal.data, vec![1.5, -2.0, 0.3]);
        assert_eq!(meta.time_column, TimeColumn::None);
        assert!((meta.duration_seconds - 3.0 / DEFAULT_SAMPLING_RATE).abs() < 1e-12);
    }

    #[test]
    fn single_column_rejects_separate_time_column() {
        let opts = IngestOptions {
            time_col: Some(0),
            ..value_col_1()
        };
        assert!(matches!(
            ingest("1\n2\n3\n", &opts),
            Err(IngestError::ConflictingColumns { time_col: 0, value_col: 1 })
        ));
    }

    #[test]
    fn value_column_out_of_range() {
        let opts = IngestOptions {
            value_col: 4,
            ..IngestOptions::default()
        };
        assert!(matches!(
            ingest("1,2\n3,4\n", &opts),
            Err(IngestError::ColumnOutOfRange { column: 4, width: 2 })
        ));
    }

    #[test]
    fn header_and_junk_rows_use_tokenizer() {
        let raw = "time,value\n0.000,1.0\n0.004,2.0\n-- lead off --\n0.008,3.0\n";
        let (signal, meta) = ingest(raw, &IngestOptions::default()).unwrap();
        assert_eq!(signal.data, vec![1.0, 2.0, 3.0]);
        assert_eq!(meta.time_column, TimeColumn::Seconds);
        assert!((meta.sampling_rate - 250.0).abs() < 1e-6);
    }

    #[test]
    fn partial_time_stamps_are_dropped() {
        let raw = "1.0\n0.5,2.0\nabc\n3.0\n";
        let (signal, meta) = ingest(raw, &IngestOptions::default()).unwrap();
        assert_eq!(signal.data, vec![1.0, 2.0, 3.0]);
        assert_eq!(meta.time_column, TimeColumn::None);
    }

    #[test]
    fn no_numbers_and_empty_input() {
        assert!(matches!(
            ingest("a,b\nc,d\n", &IngestOptions::default()),
            Err(IngestError::NoNumericValues)
        ));
        assert!(matches!(ingest("", &IngestOptions::default()), Err(IngestError::Empty)));
        assert!(matches!(ingest("  \n\n", &IngestOptions::default()), Err(IngestError::Empty)));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        assert!(matches!(
            ingest("1\nNaN\n3\n", &IngestOptions::default()),
            Err(IngestError::NonFinite { row: 2 })
        ));
        assert!(matches!(
            ingest("x 1\ny inf\n", &IngestOptions::default()),
            Err(IngestError::NonFinite { row: 2 })
        ));
    }

    #[test]
    fn scale_and_skip_rows() {
        let opts = IngestOptions {
            skip_rows: 2,
            scale: Some(0.5),
            ..IngestOptions::default()
        };
        let (signal, meta) = ingest("device X\nunits mV\n2\n4\n", &opts).unwrap();
        assert_eq!(signal.data, vec![1.0, 2.0]);
        assert_eq!(meta.scale_applied, Some(0.5));
    }

    #[test]
    fn custom_delimiter() {
        let opts = IngestOptions {
            delimiter: b';',
            ..value_col_1()
        };
        let raw = two_col((0..50).map(|i| i as f64 * 0.002)).replace(',', ";");
        let (_, meta) = ingest(&raw, &opts).unwrap();
        assert!((meta.sampling_rate - 500.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_invalid_caller_rate() {
        let opts = IngestOptions {
            sampling_rate: Some(0.0),
            ..IngestOptions::default()
        };
        assert!(matches!(ingest("1\n2\n", &opts), Err(IngestError::Config(_))));
    }

    #[test]
    fn ingest_path_records_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0.1\n0.2\n0.3").unwrap();
        let (_, meta) = ingest_path(file.path(), &IngestOptions::default()).unwrap();
        assert_eq!(meta.source, file.path().display().to_string());
        assert_eq!(meta.n_samples, 3);

        let missing = file.path().with_extension("missing");
        assert!(matches!(
            ingest_path(&missing, &IngestOptions::default()),
            Err(IngestError::Io(_))
        ));
    }
}
