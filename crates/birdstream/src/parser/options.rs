use serde::Deserialize;

/// Deepest nesting `serde_json` will decode. Larger `max_depth` settings are
/// clamped to it.
pub const DECODE_DEPTH_LIMIT: usize = 127;

/// Default bound on container nesting.
pub const DEFAULT_MAX_DEPTH: usize = DECODE_DEPTH_LIMIT;

/// Configuration options for [`ValueExtractor`](crate::ValueExtractor).
///
/// The streaming endpoints never send anything nested more than a handful of
/// levels deep, but the byte stream is untrusted. These limits bound how much
/// state a single top-level value can pin in memory.
///
/// # Examples
///
/// ```rust
/// use birdstream::{ExtractorOptions, ValueExtractor};
///
/// let options = ExtractorOptions {
///     max_value_bytes: Some(1 << 20),
///     ..Default::default()
/// };
/// let extractor: ValueExtractor = ValueExtractor::new(options);
/// assert!(extractor.is_between_values());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExtractorOptions {
    /// Maximum number of simultaneously open objects and arrays, at most
    /// [`DECODE_DEPTH_LIMIT`].
    ///
    /// # Default
    ///
    /// `127`
    pub max_depth: usize,

    /// Maximum size in bytes of one top-level value, measured from its first
    /// byte to its last. `None` disables the check.
    ///
    /// # Default
    ///
    /// `None`
    pub max_value_bytes: Option<usize>,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_value_bytes: None,
        }
    }
}
