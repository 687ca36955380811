use crate::error::{Error, IngestError, Result};
use crate::labeler::LabelOutcome;
use crate::signal::{Label, SignalMetadata};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Parse newline-delimited floating point series, ignoring blank/comment lines.
pub fn parse_f64_series(text: &str) -> Result<Vec<f64>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val: f64 = trimmed.parse().map_err(|_| Error::Parse {
            line: idx + 1,
            text: trimmed.to_string(),
        })?;
        if !val.is_finite() {
            return Err(IngestError::NonFinite { row: idx + 1 }.into());
        }
        out.push(val);
    }
    if out.is_empty() {
        return Err(IngestError::NoNumericValues.into());
    }
    Ok(out)
}

/// Read a newline-delimited floating point series from disk.
pub fn read_f64_series(path: &Path) -> Result<Vec<f64>> {
    parse_f64_series(&fs::read_to_string(path)?)
}

/// One value per line, in shortest round-trip form.
pub fn write_f64_series(path: &Path, data: &[f64]) -> Result<()> {
    let mut text = String::with_capacity(data.len() * 20);
    for value in data {
        // `{:?}` keeps a trailing `.0` and round-trips exactly
        let _ = writeln!(text, "{:?}", value);
    }
    fs::write(path, text)?;
    Ok(())
}

pub fn read_metadata(path: &Path) -> Result<SignalMetadata> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

pub fn write_metadata(path: &Path, meta: &SignalMetadata) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(meta)?)?;
    Ok(())
}

/// Sidecar metadata path for a samples file: `dir/stem.txt` -> `dir/stem.meta.json`.
pub fn metadata_path(samples: &Path) -> std::path::PathBuf {
    let stem = samples
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    samples.with_file_name(format!("{}.meta.json", stem))
}

/// Row of `labels.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub filename: String,
    pub label: Label,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
}

pub fn write_label_manifest(path: &Path, entries: &[ManifestEntry]) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(entries)?)?;
    Ok(())
}

pub fn read_label_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Per-window measurements keyed by window filename.
pub fn write_label_details(path: &Path, details: &BTreeMap<String, LabelOutcome>) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(details)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::TimeColumn;
    use tempfile::tempdir;

    #[test]
    fn parses_with_comments_and_reports_bad_lines() {
        let data = parse_f64_series("# header\n1.0\n\n-2.5\n").unwrap();
        assert_eq!(data, vec![1.0, -2.5]);
        match parse_f64_series("1.0\noops\n") {
            Err(Error::Parse { line, text }) => {
                assert_eq!(line, 2);
                assert_eq!(text, "oops");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(parse_f64_series("# nothing\n").is_err());
    }

    #[test]
    fn non_finite_samples_are_rejected() {
        for bad in ["1.0\nNaN\n", "1.0\ninf\n", "1.0\n-infinity\n"] {
            assert!(matches!(
                parse_f64_series(bad),
                Err(Error::Ingest(IngestError::NonFinite { row: 2 }))
            ));
        }
    }

    #[test]
    fn series_written_then_read_is_identical() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("samples.txt");
        let data = vec![0.1 + 0.2, -1e-300, 12345.678901234567, 1.0 / 3.0, 0.0];
        write_f64_series(&path, &data).unwrap();
        assert_eq!(read_f64_series(&path).unwrap(), data);
    }

    #[test]
    fn metadata_sidecar() {
        let dir = tempdir().unwrap();
        let samples = dir.path().join("rec01.txt");
        let meta_path = metadata_path(&samples);
        assert_eq!(meta_path, dir.path().join("rec01.meta.json"));

        let meta = SignalMetadata {
            source: "rec01.csv".into(),
            n_samples: 500,
            sampling_rate: 250.0,
            duration_seconds: 2.0,
            scale_applied: None,
            time_column: TimeColumn::Seconds,
        };
        write_metadata(&meta_path, &meta).unwrap();
        assert_eq!(read_metadata(&meta_path).unwrap(), meta);
        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&meta_path).unwrap()).unwrap();
        assert!(raw["scale_applied"].is_null());
    }

    #[test]
    fn manifest_omits_missing_patient() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("labels.json");
        let entries = vec![
            ManifestEntry {
                filename: "a_win_0000.txt".into(),
                label: Label::Afib,
                patient_id: None,
            },
            ManifestEntry {
                filename: "a_win_0001.txt".into(),
                label: Label::Normal,
                patient_id: Some("p7".into()),
            },
        ];
        write_label_manifest(&path, &entries).unwrap();
        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw[0].get("patient_id").is_none());
        assert_eq!(raw[0]["label"], "afib");
        assert_eq!(raw[1]["patient_id"], "p7");
        assert_eq!(read_label_manifest(&path).unwrap(), entries);
    }
}
