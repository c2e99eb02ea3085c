// ============================================================================
// Runtime Configuration
// ============================================================================

/// Settings for the thread-per-actor scheduler
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Prefix of every actor thread name; the actor name is appended
    pub thread_name_prefix: String,
    /// Stack size for actor threads; `None` keeps the platform default
    pub stack_size: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            thread_name_prefix: "actor-".to_string(),
            stack_size: None,
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Config for many small actors (reduced stacks)
    pub fn compact() -> Self {
        Self {
            stack_size: Some(256 * 1024),
            ..Self::default()
        }
    }

    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    pub(crate) fn thread_name(&self, actor: &str) -> String {
        format!("{}{}", self.thread_name_prefix, actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert_eq!(config.thread_name("counter"), "actor-counter");
        assert!(config.stack_size.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let config = RuntimeConfig::new().thread_name_prefix("svc/").stack_size(64 * 1024);
        assert_eq!(config.thread_name("router"), "svc/router");
        assert_eq!(config.stack_size, Some(64 * 1024));
        assert_eq!(RuntimeConfig::compact().stack_size, Some(256 * 1024));
    }
}
