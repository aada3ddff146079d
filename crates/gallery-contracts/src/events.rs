use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::result::ExtractionResult;
use crate::trace::ExtractionTrace;

/// One gallery action, written as a JSON line tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GalleryEvent {
    PromptExtracted {
        image: String,
        text_chars: usize,
        trace: ExtractionTrace,
    },
    ImagePicked {
        directory: String,
        filename: Option<String>,
        seed: u64,
        randomize: bool,
        prompt_chars: usize,
    },
    ThumbnailWritten {
        image: String,
        out: String,
        mime: String,
        bytes: usize,
    },
}

impl GalleryEvent {
    /// Counts characters, not bytes.
    pub fn prompt_extracted(image: &Path, result: &ExtractionResult) -> Self {
        Self::PromptExtracted {
            image: image.display().to_string(),
            text_chars: result.text.chars().count(),
            trace: result.trace.clone(),
        }
    }
}

#[derive(Serialize)]
struct EventLine<'a> {
    #[serde(flatten)]
    event: &'a GalleryEvent,
    session_id: &'a str,
    ts: String,
}

/// Append-only JSON-lines log for one CLI session.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
    session_id: String,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            session_id: session_id.into(),
        }
    }

    pub fn record(&self, event: &GalleryEvent) -> Result<()> {
        let line = serde_json::to_string(&EventLine {
            event,
            session_id: &self.session_id,
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        })?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open event log {}", self.path.display()))?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}
