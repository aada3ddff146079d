use indexmap::IndexMap;

/// Field names the classifier merges decoded metadata into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    Prompt,
    Workflow,
    Parameters,
    UserCommentPrompt,
}

impl CanonicalField {
    pub fn key(self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::Workflow => "workflow",
            Self::Parameters => "parameters",
            Self::UserCommentPrompt => "usercomment_prompt",
        }
    }
}

/// Metadata collected for a single image.
///
/// Seeded from the container's native text fields, then augmented as EXIF
/// tags are decoded. Canonical fields are first-writer-wins: once set they
/// are never replaced by later decoding steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataBag {
    fields: IndexMap<String, String>,
}

impl MetadataBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_native<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn canonical(&self, field: CanonicalField) -> Option<&str> {
        self.get(field.key())
    }

    pub fn contains(&self, field: CanonicalField) -> bool {
        self.fields.contains_key(field.key())
    }

    /// Returns `true` when the value was stored.
    pub fn set_if_absent(&mut self, field: CanonicalField, value: impl Into<String>) -> bool {
        if self.contains(field) {
            return false;
        }
        self.fields.insert(field.key().to_string(), value.into());
        true
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
