use std::fmt;

use serde::Serialize;

/// Ordered, append-only log of the decisions made while extracting a prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExtractionTrace {
    lines: Vec<String>,
}

impl ExtractionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn extend<I>(&mut self, lines: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.lines.extend(lines.into_iter().map(Into::into));
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.contains(needle))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for ExtractionTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::ExtractionTrace;

    #[test]
    fn render_joins_lines_in_order() {
        let mut trace = ExtractionTrace::new();
        trace.push("Exif Make found. Length: 12");
        trace.extend(["  -> Used Make content as 'prompt'", "done"]);
        assert_eq!(trace.len(), 3);
        assert_eq!(
            trace.render(),
            "Exif Make found. Length: 12\n  -> Used Make content as 'prompt'\ndone"
        );
        assert!(trace.contains("Used Make"));
    }

    #[test]
    fn serializes_as_plain_array() -> anyhow::Result<()> {
        let mut trace = ExtractionTrace::new();
        trace.push("one");
        assert_eq!(serde_json::to_string(&trace)?, "[\"one\"]");
        Ok(())
    }
}
