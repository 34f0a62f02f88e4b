//! Provider configuration.

/// Default per-direction buffer of an in-memory pipe.
pub const DEFAULT_PIPE_BUFFER_SIZE: usize = 64 * 1024;

/// Configuration for a [`Provider`](crate::Provider).
///
/// ```
/// use memnet::ProviderConfig;
///
/// let config = ProviderConfig::isolated();
/// assert!(!config.fallback_enabled);
/// ```
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Bytes a writer may queue before blocking on the reader.
    pub pipe_buffer_size: usize,

    /// Defer unrecognised networks to the real network stack.
    ///
    /// When disabled they fail with
    /// [`ErrorKind::UnknownNetwork`](crate::ErrorKind::UnknownNetwork), so
    /// the provider never touches the OS.
    pub fallback_enabled: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            pipe_buffer_size: DEFAULT_PIPE_BUFFER_SIZE,
            fallback_enabled: true,
        }
    }
}

impl ProviderConfig {
    /// In-memory networks only; unknown networks are rejected.
    pub fn isolated() -> Self {
        Self {
            fallback_enabled: false,
            ..Self::default()
        }
    }

    /// Set the pipe buffer size. Zero is raised to one byte.
    pub fn with_pipe_buffer_size(mut self, size: usize) -> Self {
        self.pipe_buffer_size = size.max(1);
        self
    }
}
