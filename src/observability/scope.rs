//! OperationScope for automatic begin/complete logging

use std::time::Instant;

use tracing::Level;

use super::emit;

/// A scope that logs the begin and end of a long operation
///
/// # Usage
///
/// ```ignore
/// let scope = OperationScope::with_fields("RESTORE", &[("database", "shop")]);
/// // ... do work ...
/// scope.complete(); // logs RESTORE_COMPLETE
/// // if neither completed nor failed, logs RESTORE_INCOMPLETE on drop
/// ```
///
/// - `{name}_BEGIN` on creation (INFO)
/// - `{name}_COMPLETE` on `complete()` (INFO, with `elapsed_ms`)
/// - `{name}_FAILED` on `fail()` (ERROR)
/// - `{name}_INCOMPLETE` on drop if unresolved (WARN)
pub struct OperationScope {
    name: &'static str,
    fields: Vec<(&'static str, String)>,
    started: Instant,
    resolved: bool,
}

impl OperationScope {
    pub fn new(name: &'static str) -> Self {
        Self::with_fields(name, &[])
    }

    pub fn with_fields(name: &'static str, fields: &[(&'static str, &str)]) -> Self {
        let fields: Vec<(&'static str, String)> =
            fields.iter().map(|(k, v)| (*k, v.to_string())).collect();
        emit(Level::INFO, &format!("{}_BEGIN", name), &borrowed(&fields));

        Self {
            name,
            fields,
            started: Instant::now(),
            resolved: false,
        }
    }

    /// Attach a field reported with every later event of this scope
    pub fn record(&mut self, key: &'static str, value: impl Into<String>) {
        self.fields.push((key, value.into()));
    }

    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    pub fn complete_with_fields(mut self, extra: &[(&str, &str)]) {
        self.resolved = true;
        let elapsed = self.started.elapsed().as_millis().to_string();
        let mut fields = borrowed(&self.fields);
        fields.extend(extra.iter().copied());
        fields.push(("elapsed_ms", elapsed.as_str()));
        emit(Level::INFO, &format!("{}_COMPLETE", self.name), &fields);
    }

    pub fn fail(mut self, reason: &str) {
        self.resolved = true;
        let mut fields = borrowed(&self.fields);
        fields.push(("reason", reason));
        emit(Level::ERROR, &format!("{}_FAILED", self.name), &fields);
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }
}

impl Drop for OperationScope {
    fn drop(&mut self) {
        if !self.resolved {
            let mut fields = borrowed(&self.fields);
            fields.push(("reason", "scope dropped without completion"));
            emit(Level::WARN, &format!("{}_INCOMPLETE", self.name), &fields);
        }
    }
}

fn borrowed<'a>(fields: &'a [(&'static str, String)]) -> Vec<(&'a str, &'a str)> {
    fields.iter().map(|(k, v)| (*k, v.as_str())).collect()
}
