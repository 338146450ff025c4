use crate::models::SkipReason;
use unicode_normalization::UnicodeNormalization;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

const SEPARATORS: [char; 2] = ['-', '_'];

/// Directory names that mark a key as already handled. Matching is done on
/// NFC-normalized lowercase segments so `traité` matches whether the bucket
/// stored it composed or decomposed.
#[derive(Debug, Clone)]
pub struct ProcessedMarkers {
    markers: Vec<String>,
}

impl ProcessedMarkers {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let markers = markers
            .into_iter()
            .map(|m| normalize_segment(m.as_ref()))
            .filter(|m| !m.is_empty())
            .collect();
        Self { markers }
    }

    /// Segment used when archiving objects after ingestion.
    pub fn archive_segment(&self) -> &str {
        self.markers.first().map(String::as_str).unwrap_or("traite")
    }

    /// True when any directory segment of `key` is a processed marker.
    pub fn is_processed(&self, key: &str) -> bool {
        let (directory, _) = split_key(key);
        directory
            .split('/')
            .map(normalize_segment)
            .any(|segment| self.markers.contains(&segment))
    }
}

impl Default for ProcessedMarkers {
    fn default() -> Self {
        Self::new(["traite", "traité"])
    }
}

fn normalize_segment(segment: &str) -> String {
    segment.trim().nfc().collect::<String>().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryImage {
    pub key: String,
    /// Key prefix up to and including the last `/`; empty at bucket root.
    pub directory: String,
    pub file_name: String,
    pub extension: String,
    pub sku: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Primary(PrimaryImage),
    Skip(SkipReason),
}

/// Gates run in order: processed marker, extension, primary-only, SKU.
pub fn classify(key: &str, markers: &ProcessedMarkers) -> Classification {
    if markers.is_processed(key) {
        return Classification::Skip(SkipReason::AlreadyProcessed);
    }

    let (directory, file_name) = split_key(key);
    let extension = file_extension(file_name);
    if !is_image_extension(&extension) {
        return Classification::Skip(SkipReason::UnsupportedExtension { extension });
    }

    if is_secondary_name(file_name) {
        return Classification::Skip(SkipReason::SecondaryImage);
    }

    match extract_sku(file_name) {
        Some(sku) => Classification::Primary(PrimaryImage {
            key: key.to_string(),
            directory: directory.to_string(),
            file_name: file_name.to_string(),
            extension,
            sku,
        }),
        None => Classification::Skip(SkipReason::EmptySku),
    }
}

/// Whether a listed key belongs to the same image set as `primary`.
pub fn is_sibling_of(key: &str, primary: &PrimaryImage, markers: &ProcessedMarkers) -> bool {
    if markers.is_processed(key) {
        return false;
    }
    let (directory, file_name) = split_key(key);
    directory == primary.directory
        && is_image_extension(&file_extension(file_name))
        && extract_sku(file_name).as_deref() == Some(primary.sku.as_str())
}

pub fn split_key(key: &str) -> (&str, &str) {
    match key.rfind('/') {
        Some(idx) => key.split_at(idx + 1),
        None => ("", key),
    }
}

/// Lowercased text after the last dot; the whole name when there is none.
pub fn file_extension(file_name: &str) -> String {
    file_name
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

pub fn is_image_extension(extension: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&extension)
}

pub fn strip_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) if idx + 1 < file_name.len() => &file_name[..idx],
        _ => file_name,
    }
}

pub fn is_secondary_name(file_name: &str) -> bool {
    strip_extension(file_name).contains(SEPARATORS)
}

pub fn extract_sku(file_name: &str) -> Option<String> {
    strip_extension(file_name)
        .split(SEPARATORS)
        .next()
        .map(str::trim)
        .filter(|sku| !sku.is_empty())
        .map(str::to_string)
}
