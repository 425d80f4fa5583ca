//! Codec options for reading and writing geom documents

/// Default per-component tolerance for derived-value checks.
pub const DEFAULT_TOLERANCE: f32 = 1e-4;

/// Options shared by the read and write paths.
///
/// # Example
///
/// ```
/// use dstsgeom::formats::geom::CodecOptions;
///
/// // Document embedded 0x200 bytes into a larger archive
/// let options = CodecOptions::new()
///     .with_base_offset(0x200)
///     .with_tolerance(1e-3);
/// assert_eq!(options.base_offset, 0x200);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodecOptions {
    /// Source position of the document header. Every document offset is
    /// relative to it.
    pub base_offset: u64,

    /// Largest per-component difference accepted when a recomputed bounding
    /// box, bind pose or transform is compared with the stored one.
    pub tolerance: f32,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecOptions {
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_offset: 0,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    #[must_use]
    pub fn with_base_offset(mut self, base_offset: u64) -> Self {
        self.base_offset = base_offset;
        self
    }

    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }
}
