//! Step identifiers
//!
//! Generated IDs use the format: `{6-char-hex}-step-{slug}`
//! Example: `019430-step-send-welcome-email`
//!
//! IDs coming from a backend are kept verbatim; only steps that arrive
//! without one get a generated ID.

/// Generate a step ID from a step title
pub fn generate_step_id(title: &str) -> String {
    let uuid = uuid::Uuid::now_v7();
    let hex_prefix = &uuid.simple().to_string()[..6];
    let slug = slugify(title);
    if slug.is_empty() {
        format!("{}-step", hex_prefix)
    } else {
        format!("{}-step-{}", hex_prefix, slug)
    }
}

/// Slugify a title for use in IDs
fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c == '\'' || c == '\u{2019}' || c == '\u{2018}' {
                None
            } else {
                Some('-')
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Identity of a step; immutable for the lifetime of the step
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepId(String);

impl StepId {
    /// Generate a fresh ID for a step with the given title
    pub fn generate(title: &str) -> Self {
        Self(generate_step_id(title))
    }

    /// Get the full ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the ID is empty (backend omitted it)
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Check whether a user-typed reference points at this ID
    ///
    /// Matches the exact ID, any prefix, or a fragment of the slug portion.
    pub fn matches(&self, reference: &str) -> bool {
        if reference.is_empty() {
            return false;
        }
        if self.0 == reference || self.0.starts_with(reference) {
            return true;
        }
        match self.0.find('-') {
            Some(slug_start) => self.0[slug_start + 1..].contains(reference),
            None => false,
        }
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for StepId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StepId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for StepId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for StepId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for StepId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self(s))
    }
}
