use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::extractor::PromptExtractor;
use crate::gallery::{list_images, select_image};

/// One node invocation from the host application.
#[derive(Debug, Clone, Default)]
pub struct HostRequest {
    pub directory: String,
    pub filename: Option<String>,
    pub seed: u64,
    pub randomize: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostResponse {
    pub prompt: String,
    pub trace: String,
}

impl HostResponse {
    fn new(prompt: impl Into<String>, trace: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            trace: trace.into(),
        }
    }
}

pub fn process(request: &HostRequest) -> HostResponse {
    process_with(&PromptExtractor::new(), request)
}

pub fn process_with(extractor: &PromptExtractor, request: &HostRequest) -> HostResponse {
    let directory = request.directory.trim();
    let requested = request
        .filename
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());
    if directory.is_empty() || (requested.is_none() && !request.randomize) {
        return HostResponse::new("", "No image data");
    }

    let mut picked_randomly = false;
    let filename = if request.randomize {
        // An unreadable directory behaves like an empty one.
        let files = list_images(Path::new(directory)).unwrap_or_else(|err| {
            warn!(directory, error = %format!("{err:#}"), "listing failed");
            Vec::new()
        });
        match select_image(&files, requested, request.seed, true) {
            Some(file) => {
                picked_randomly = true;
                file
            }
            None => return HostResponse::new("", format!("No images found in {directory}")),
        }
    } else {
        match requested {
            Some(file) => file.to_string(),
            None => return HostResponse::new("", "No image data"),
        }
    };

    let path = PathBuf::from(directory).join(&filename);
    if !path.exists() {
        let shown = path.display();
        return HostResponse::new(
            format!("Error: File not found {shown}"),
            format!("Path checked: {shown}"),
        );
    }

    info!(image = %path.display(), randomize = request.randomize, "processing image");
    let (prompt, trace) = extractor.extract(&path).into_pair();
    if picked_randomly {
        return HostResponse::new(prompt, format!("Selected: {filename}\n{trace}"));
    }
    HostResponse::new(prompt, trace)
}
