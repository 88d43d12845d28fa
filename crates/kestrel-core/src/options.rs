//! Runtime configuration

/// Environment variable holding the heap limit in bytes
pub const MAX_HEAP_ENV: &str = "KESTREL_MAX_HEAP_BYTES";

/// Options for a [`Runtime`](crate::Runtime)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeOptions {
    /// Maximum heap size in bytes (None = unlimited)
    pub max_heap_bytes: Option<usize>,
}

impl RuntimeOptions {
    /// Create unlimited options
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Create options with a specific heap size
    pub fn with_heap_limit(max_heap_bytes: usize) -> Self {
        Self {
            max_heap_bytes: Some(max_heap_bytes),
        }
    }

    /// Read options from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read options through a key lookup
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let max_heap_bytes = lookup(MAX_HEAP_ENV).and_then(|raw| match raw.trim().parse() {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                tracing::warn!(%raw, %err, "ignoring {}", MAX_HEAP_ENV);
                None
            }
        });
        Self { max_heap_bytes }
    }
}
