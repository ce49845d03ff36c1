use std::collections::BTreeMap;

/// Read-only access to environment variables.
pub trait Environment: Send + Sync + 'static {
    /// Returns the value of the variable `name`, or [`None`] if it is not set or not valid
    /// unicode.
    fn var(&self, name: &str) -> Option<String>;
}

/// The environment of the running process.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// A fixed set of variables, mostly useful in tests.
impl Environment for BTreeMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}
