use serde::Serialize;

use crate::trace::ExtractionTrace;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    pub text: String,
    pub trace: ExtractionTrace,
}

impl ExtractionResult {
    pub fn new(text: impl Into<String>, trace: ExtractionTrace) -> Self {
        Self {
            text: text.into(),
            trace,
        }
    }

    /// `(prompt text, rendered trace)` as handed to a host.
    pub fn into_pair(self) -> (String, String) {
        let trace = self.trace.render();
        (self.text, trace)
    }
}
