use crate::log::Verbosity;

/// Chunk size used when the caller does not pick one.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// The unmatched window may grow to this many chunks before the parse aborts.
pub const WINDOW_FACTOR: usize = 2;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Compression {
    #[default]
    Plain,
    Zstd,
}

impl Compression {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let normalized = raw.trim();
        if normalized.eq_ignore_ascii_case("zstd") {
            Ok(Self::Zstd)
        } else if normalized.eq_ignore_ascii_case("plain") || normalized.eq_ignore_ascii_case("null")
        {
            Ok(Self::Plain)
        } else {
            Err(format!(
                "Invalid compression value '{}'. Supported values: 'zstd', 'plain' or NULL/omitted.",
                normalized
            ))
        }
    }
}

/// Knobs consumed by [`GameExtractor`](crate::GameExtractor).
#[derive(Clone, Debug)]
pub struct ExtractorConfig {
    pub buffer_size: usize,
    /// Overrides `WINDOW_FACTOR * buffer_size`.
    pub max_window: Option<usize>,
    pub compression: Compression,
    pub verbosity: Verbosity,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_window: None,
            compression: Compression::Plain,
            verbosity: Verbosity::from_env(),
        }
    }
}

impl ExtractorConfig {
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_max_window(mut self, max_window: usize) -> Self {
        self.max_window = Some(max_window);
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn max_window(&self) -> usize {
        self.max_window
            .unwrap_or_else(|| self.buffer_size.saturating_mul(WINDOW_FACTOR))
    }
}
