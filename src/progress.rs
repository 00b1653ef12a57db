//! Seeding progress reporting.
//!
//! Reports what `catalog-chat seed` is doing so users can follow a long run.
//! Progress is emitted on **stderr** so stdout (the inserted product listing)
//! stays parseable for scripts.

use std::io::Write;

/// A single progress event for seeding.
#[derive(Clone, Debug, PartialEq)]
pub enum SeedProgressEvent {
    /// Existing products are being deleted.
    Clearing,
    /// Batch `batch` of `batches` was committed; `n` of `total` products stored.
    Inserted {
        batch: u64,
        batches: u64,
        n: u64,
        total: u64,
    },
}

/// Receives seeding progress. Implementations write to stderr (human or JSON).
pub trait SeedProgressReporter: Send + Sync {
    fn report(&self, event: SeedProgressEvent);
}

/// Human-friendly progress on stderr: "seed  batch 3/10  1,500 / 5,000 products".
pub struct StderrProgress;

impl SeedProgressReporter for StderrProgress {
    fn report(&self, event: SeedProgressEvent) {
        let line = match &event {
            SeedProgressEvent::Clearing => "seed  clearing existing products...\n".to_string(),
            SeedProgressEvent::Inserted {
                batch,
                batches,
                n,
                total,
            } => format!(
                "seed  batch {}/{}  {} / {} products\n",
                batch,
                batches,
                format_number(*n),
                format_number(*total)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl SeedProgressReporter for JsonProgress {
    fn report(&self, event: SeedProgressEvent) {
        let obj = match &event {
            SeedProgressEvent::Clearing => serde_json::json!({
                "event": "progress",
                "phase": "clearing"
            }),
            SeedProgressEvent::Inserted {
                batch,
                batches,
                n,
                total,
            } => serde_json::json!({
                "event": "progress",
                "phase": "inserting",
                "batch": batch,
                "batches": batches,
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl SeedProgressReporter for NoProgress {
    fn report(&self, _event: SeedProgressEvent) {}
}

pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn SeedProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
