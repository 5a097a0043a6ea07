use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::Cursor;
use std::sync::Arc;

/// One file handed over by the upload layer. The contents are shared and
/// can be re-read from the start any number of times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    name: String,
    contents: Arc<[u8]>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            contents: Arc::from(contents.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without any leading folder components.
    pub fn base_name(&self) -> &str {
        base_name(&self.name)
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    pub fn reader(&self) -> Cursor<&[u8]> {
        Cursor::new(self.contents())
    }

    pub fn has_extension(&self, extension: &str) -> bool {
        self.name
            .to_ascii_lowercase()
            .ends_with(&extension.to_ascii_lowercase())
    }

    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.name.hash(&mut hasher);
        self.contents.hash(&mut hasher);
        hasher.finish()
    }
}

pub(crate) fn base_name(name: &str) -> &str {
    name.rsplit(&['/', '\\'][..]).next().unwrap_or(name)
}

/// Identity of an uploaded set, used to key cached summaries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchKey(Vec<(String, u64)>);

impl BatchKey {
    pub fn of(uploads: &[UploadedFile]) -> Self {
        Self(
            uploads
                .iter()
                .map(|upload| (upload.name.clone(), upload.fingerprint()))
                .collect(),
        )
    }
}
