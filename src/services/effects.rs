//! Ledger of the independent effects a notification triggers.
//!
//! Each effect reports its own result. Only primary effects decide whether
//! the notification succeeded; secondary failures are logged and kept for
//! inspection but never escalated.

use crate::domain::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectRole {
    Primary,
    Secondary,
}

#[derive(Debug, Clone)]
pub struct EffectRecord {
    pub name: &'static str,
    pub role: EffectRole,
    pub error: Option<String>,
}

impl EffectRecord {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Default)]
pub struct Effects {
    records: Vec<EffectRecord>,
    primary_failure: Option<PipelineError>,
}

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a primary effect. The first primary failure is kept and
    /// returned by [`Effects::finish`]; later effects still run.
    pub fn primary<T>(&mut self, name: &'static str, result: Result<T, PipelineError>) -> Option<T> {
        match result {
            Ok(value) => {
                self.push(name, EffectRole::Primary, None);
                Some(value)
            }
            Err(e) => {
                tracing::error!(effect = name, error = %e, "primary effect failed");
                self.push(name, EffectRole::Primary, Some(e.to_string()));
                if self.primary_failure.is_none() {
                    self.primary_failure = Some(e);
                }
                None
            }
        }
    }

    /// Records a secondary effect; failures are swallowed.
    pub fn secondary<T>(&mut self, name: &'static str, result: Result<T, PipelineError>) -> Option<T> {
        match result {
            Ok(value) => {
                self.push(name, EffectRole::Secondary, None);
                Some(value)
            }
            Err(e) => {
                tracing::warn!(effect = name, error = %e, "secondary effect failed, continuing");
                self.push(name, EffectRole::Secondary, Some(e.to_string()));
                None
            }
        }
    }

    fn push(&mut self, name: &'static str, role: EffectRole, error: Option<String>) {
        self.records.push(EffectRecord { name, role, error });
    }

    pub fn records(&self) -> &[EffectRecord] {
        &self.records
    }

    pub fn has_primary_failure(&self) -> bool {
        self.primary_failure.is_some()
    }

    /// Overall outcome: `Err` with the first primary failure, else `Ok(value)`.
    pub fn finish<T>(self, value: T) -> Result<T, PipelineError> {
        let failed = self.records.iter().filter(|r| !r.succeeded()).count();
        tracing::debug!(effects = self.records.len(), failed, "effects settled");
        match self.primary_failure {
            Some(e) => Err(e),
            None => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secondary_failure_does_not_fail_the_whole() {
        let mut fx = Effects::new();
        fx.primary("order", Ok::<_, PipelineError>(()));
        fx.secondary::<()>("stats", Err(PipelineError::Store("boom".into())));
        assert_eq!(fx.records().len(), 2);
        assert!(!fx.records()[1].succeeded());
        assert!(fx.finish("ok").is_ok());
    }

    #[test]
    fn first_primary_failure_wins() {
        let mut fx = Effects::new();
        fx.primary::<()>("order", Err(PipelineError::Store("first".into())));
        fx.secondary("listing", Ok::<_, PipelineError>(true));
        fx.primary::<()>("tracking", Err(PipelineError::Store("second".into())));
        let err = fx.finish(()).unwrap_err();
        assert!(err.to_string().contains("first"));
    }
}
