//! Writer configuration.

/// Default name given to worker threads.
pub const DEFAULT_THREAD_NAME: &str = "onewriter-worker";

/// Configuration for an [`ExclusiveWriter`](crate::ExclusiveWriter).
///
/// Nothing here changes scheduling: there is always exactly one worker.
/// The settings only shape the threads that worker runs on.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Name given to each spawned worker thread.
    pub thread_name: String,

    /// Stack size for worker threads (`None` = platform default).
    pub stack_size: Option<usize>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            stack_size: None,
        }
    }
}

impl WriterConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the worker thread name.
    #[must_use]
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Sets the worker thread stack size in bytes.
    #[must_use]
    pub const fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = WriterConfig::default();
        assert_eq!(config.thread_name, DEFAULT_THREAD_NAME);
        assert!(config.stack_size.is_none());
    }

    #[test]
    fn builder_pattern() {
        let config = WriterConfig::new()
            .thread_name("db-writer")
            .stack_size(256 * 1024);

        assert_eq!(config.thread_name, "db-writer");
        assert_eq!(config.stack_size, Some(256 * 1024));
    }
}
