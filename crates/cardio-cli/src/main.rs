use anyhow::{bail, Context, Result};
use cardio_lib::{
    conditioning::{condition, window},
    config::PipelineConfig,
    ingest::{ingest_path, IngestOptions, DEFAULT_SAMPLING_RATE},
    io::text::{self as text_io, ManifestEntry},
    labeler::label,
    pipeline::{auto_label, summarize},
    signal::{mean, std_dev, validate_rate, SignalMetadata, TimeColumn},
    synth::{generate, Archetype},
};
use clap::{Parser, Subcommand};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashSet},
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "cardio",
    version,
    about = "Synthesize, convert, condition and auto-label single-lead cardiac recordings"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a serial-logger CSV into a samples file plus metadata sidecar
    Convert {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// Sampling rate to use when the file has no usable time column
        #[arg(long)]
        sr: Option<f64>,
        #[arg(long)]
        time_col: Option<usize>,
        #[arg(long, default_value_t = 0)]
        value_col: usize,
        #[arg(long, default_value_t = 0)]
        skip_rows: usize,
        #[arg(long)]
        scale: Option<f64>,
        #[arg(long, default_value_t = ',')]
        delimiter: char,
    },
    /// Generate one synthetic recording
    Synth {
        #[arg(long, default_value = "normal")]
        kind: Archetype,
        #[arg(long, default_value_t = 30.0)]
        duration: f64,
        #[arg(long, default_value_t = 250.0)]
        sr: f64,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long)]
        out: PathBuf,
    },
    /// Generate one recording per archetype into a directory
    Fixtures {
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 30.0)]
        duration: f64,
        #[arg(long, default_value_t = 250.0)]
        sr: f64,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Band-pass, normalize and window a samples file
    Condition {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        sr: Option<f64>,
        #[arg(long)]
        window_sec: Option<f64>,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write `<stem>_win_NNNN.txt` files here instead of JSON lines on stdout
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Window a recording and label every window
    AutoLabel {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        sr: Option<f64>,
        #[arg(long)]
        window_sec: Option<f64>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[arg(long)]
        patient_id: Option<String>,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Band-pass and normalize before labeling
        #[arg(long)]
        condition: bool,
    },
    /// Label newline-delimited samples as a single window
    Label {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        sr: Option<f64>,
        #[arg(long)]
        global_mean: Option<f64>,
        #[arg(long)]
        global_std: Option<f64>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Convert {
            input,
            out,
            sr,
            time_col,
            value_col,
            skip_rows,
            scale,
            delimiter,
        } => {
            let opts = IngestOptions {
                time_col,
                value_col,
                skip_rows,
                scale,
                sampling_rate: sr,
                delimiter: ascii_delimiter(delimiter)?,
                ..IngestOptions::default()
            };
            cmd_convert(&input, &out, &opts)?
        }
        Commands::Synth {
            kind,
            duration,
            sr,
            seed,
            out,
        } => cmd_synth(kind, duration, sr, seed, &out)?,
        Commands::Fixtures {
            out,
            duration,
            sr,
            seed,
        } => cmd_fixtures(&out, duration, sr, seed)?,
        Commands::Condition {
            input,
            sr,
            window_sec,
            config,
            out_dir,
        } => cmd_condition(
            input.as_deref(),
            sr,
            window_sec,
            config.as_deref(),
            out_dir.as_deref(),
        )?,
        Commands::AutoLabel {
            input,
            sr,
            window_sec,
            out_dir,
            patient_id,
            config,
            condition,
        } => cmd_auto_label(
            &input,
            sr,
            window_sec,
            out_dir.as_deref(),
            patient_id,
            config.as_deref(),
            condition,
        )?,
        Commands::Label {
            input,
            sr,
            global_mean,
            global_std,
            config,
        } => cmd_label(input.as_deref(), sr, global_mean, global_std, config.as_deref())?,
    }
    Ok(())
}

fn ascii_delimiter(c: char) -> Result<u8> {
    if !c.is_ascii() {
        bail!("delimiter must be a single ASCII character, got {:?}", c);
    }
    Ok(c as u8)
}

fn read_samples(input: Option<&Path>) -> Result<Vec<f64>> {
    match input {
        Some(path) => text_io::read_f64_series(path)
            .with_context(|| format!("failed to read samples from {}", path.display())),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(text_io::parse_f64_series(&buf)?)
        }
    }
}

fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))
}

/// `--sr`, else the sidecar `<stem>.meta.json`, else the default rate.
fn resolve_rate(sr: Option<f64>, input: Option<&Path>) -> Result<f64> {
    let rate = match (sr, input.map(text_io::metadata_path)) {
        (Some(sr), _) => sr,
        (None, Some(meta_path)) if meta_path.exists() => {
            let meta = text_io::read_metadata(&meta_path)
                .with_context(|| format!("failed to read {}", meta_path.display()))?;
            info!("sampling rate {} Hz from {}", meta.sampling_rate, meta_path.display());
            meta.sampling_rate
        }
        _ => {
            info!("no sampling rate given; assuming {} Hz", DEFAULT_SAMPLING_RATE);
            DEFAULT_SAMPLING_RATE
        }
    };
    validate_rate(rate)?;
    Ok(rate)
}

fn load_config(path: Option<&Path>, window_sec: Option<f64>) -> Result<PipelineConfig> {
    let mut cfg = match path {
        Some(path) => PipelineConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(seconds) = window_sec {
        cfg.window_seconds = seconds;
    }
    Ok(cfg.validated()?)
}

fn write_signal(path: &Path, data: &[f64], meta: &SignalMetadata) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    text_io::write_f64_series(path, data)
        .with_context(|| format!("failed to write {}", path.display()))?;
    let meta_path = text_io::metadata_path(path);
    text_io::write_metadata(&meta_path, meta)
        .with_context(|| format!("failed to write {}", meta_path.display()))?;
    Ok(())
}

fn cmd_convert(input: &Path, out: &Path, opts: &IngestOptions) -> Result<()> {
    let (signal, meta) =
        ingest_path(input, opts).with_context(|| format!("failed to convert {}", input.display()))?;
    let target = out.join(format!("{}.txt", file_stem(input)?));
    write_signal(&target, &signal.data, &meta)?;
    info!("wrote {} samples to {}", meta.n_samples, target.display());
    println!("{}", serde_json::to_string(&meta)?);
    Ok(())
}

fn synth_metadata(kind: Archetype, n_samples: usize, sr: f64, seed: u64) -> SignalMetadata {
    SignalMetadata {
        source: format!("synthetic:{}:seed={}", kind, seed),
        n_samples,
        sampling_rate: sr,
        duration_seconds: n_samples as f64 / sr,
        scale_applied: None,
        time_column: TimeColumn::None,
    }
}

fn cmd_synth(kind: Archetype, duration: f64, sr: f64, seed: u64, out: &Path) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    let signal = generate(duration, sr, kind, &mut rng)?;
    let meta = synth_metadata(kind, signal.len(), sr, seed);
    write_signal(out, &signal.data, &meta)?;
    println!("{}", serde_json::to_string(&meta)?);
    Ok(())
}

fn cmd_fixtures(out: &Path, duration: f64, sr: f64, seed: u64) -> Result<()> {
    let mut written = Vec::new();
    for (offset, kind) in Archetype::ALL.into_iter().enumerate() {
        let seed = seed.wrapping_add(offset as u64);
        let mut rng = StdRng::seed_from_u64(seed);
        let signal = generate(duration, sr, kind, &mut rng)?;
        let path = out.join(format!("{}_{}s_{}hz.txt", kind, duration, sr));
        write_signal(&path, &signal.data, &synth_metadata(kind, signal.len(), sr, seed))?;
        written.push(path.display().to_string());
    }
    println!("{}", serde_json::to_string(&written)?);
    Ok(())
}

#[derive(Serialize)]
struct WindowLine<'a> {
    index: usize,
    start: usize,
    samples: &'a [f64],
}

fn cmd_condition(
    input: Option<&Path>,
    sr: Option<f64>,
    window_sec: Option<f64>,
    config: Option<&Path>,
    out_dir: Option<&Path>,
) -> Result<()> {
    let cfg = load_config(config, window_sec)?;
    let fs_hz = resolve_rate(sr, input)?;
    let samples = read_samples(input)?;
    let conditioned = condition(&samples, fs_hz, &cfg.conditioning)?;
    let windows = window(&conditioned, fs_hz, cfg.window_seconds)?;
    match out_dir {
        Some(dir) => {
            let stem = match input {
                Some(path) => file_stem(path)?,
                None => "stdin".to_string(),
            };
            fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
            for (idx, w) in windows.iter().enumerate() {
                let path = dir.join(format!("{}_win_{:04}.txt", stem, idx));
                text_io::write_f64_series(&path, w.samples)
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }
            info!("wrote {} windows to {}", windows.len(), dir.display());
        }
        None => {
            for (index, w) in windows.iter().enumerate() {
                let line = WindowLine {
                    index,
                    start: w.start,
                    samples: w.samples,
                };
                println!("{}", serde_json::to_string(&line)?);
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct AutoLabelSummary {
    input: String,
    sampling_rate: f64,
    n_windows: usize,
    counts: BTreeMap<String, usize>,
    labels: Vec<String>,
}

fn cmd_auto_label(
    input: &Path,
    sr: Option<f64>,
    window_sec: Option<f64>,
    out_dir: Option<&Path>,
    patient_id: Option<String>,
    config: Option<&Path>,
    apply_conditioning: bool,
) -> Result<()> {
    let cfg = load_config(config, window_sec)?;
    let fs_hz = resolve_rate(sr, Some(input))?;
    let raw = read_samples(Some(input))?;
    let samples = if apply_conditioning {
        condition(&raw, fs_hz, &cfg.conditioning)?
    } else {
        raw
    };
    let labeled = auto_label(&samples, fs_hz, &cfg)?;

    let out_dir = match out_dir {
        Some(dir) => dir.to_path_buf(),
        None => input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    fs::create_dir_all(&out_dir).with_context(|| format!("failed to create {}", out_dir.display()))?;
    let stem = file_stem(input)?;

    let mut entries = Vec::with_capacity(labeled.len());
    let mut details = BTreeMap::new();
    for w in &labeled {
        let filename = format!("{}_win_{:04}.txt", stem, w.index);
        let path = out_dir.join(&filename);
        text_io::write_f64_series(&path, &samples[w.start..w.start + w.len])
            .with_context(|| format!("failed to write {}", path.display()))?;
        entries.push(ManifestEntry {
            filename: filename.clone(),
            label: w.label(),
            patient_id: patient_id.clone(),
        });
        details.insert(filename, w.outcome);
    }

    let manifest_path = out_dir.join("labels.json");
    let manifest = merge_manifest(&manifest_path, entries)?;
    text_io::write_label_manifest(&manifest_path, &manifest)
        .with_context(|| format!("failed to write {}", manifest_path.display()))?;
    let details_path = out_dir.join(format!("{}_label_details.json", stem));
    text_io::write_label_details(&details_path, &details)
        .with_context(|| format!("failed to write {}", details_path.display()))?;

    let summary = AutoLabelSummary {
        input: input.display().to_string(),
        sampling_rate: fs_hz,
        n_windows: labeled.len(),
        counts: summarize(&labeled),
        labels: labeled.iter().map(|w| w.label().to_string()).collect(),
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

/// Keep manifest rows from other recordings; rows for rewritten windows are replaced.
fn merge_manifest(path: &Path, fresh: Vec<ManifestEntry>) -> Result<Vec<ManifestEntry>> {
    if !path.exists() {
        return Ok(fresh);
    }
    let existing = text_io::read_label_manifest(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let replaced: HashSet<&str> = fresh.iter().map(|e| e.filename.as_str()).collect();
    let mut merged: Vec<ManifestEntry> = existing
        .into_iter()
        .filter(|e| !replaced.contains(e.filename.as_str()))
        .collect();
    merged.extend(fresh);
    Ok(merged)
}

fn cmd_label(
    input: Option<&Path>,
    sr: Option<f64>,
    global_mean: Option<f64>,
    global_std: Option<f64>,
    config: Option<&Path>,
) -> Result<()> {
    let cfg = load_config(config, None)?;
    let fs_hz = resolve_rate(sr, input)?;
    let samples = read_samples(input)?;
    let outcome = label(
        &samples,
        fs_hz,
        global_mean.unwrap_or_else(|| mean(&samples)),
        global_std.unwrap_or_else(|| std_dev(&samples)),
        &cfg.labeler,
    );
    println!("{}", serde_json::to_string(&outcome)?);
    Ok(())
}
