//! Results of stages that recover from failure locally.

/// The result of a stage that substitutes a fallback instead of failing.
///
/// A `Degraded` value is usable output, but it is not what the caller asked
/// for. Callers that report on the result must check which variant they got.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum Outcome<T> {
    /// The stage produced its intended result.
    Complete(T),
    /// The stage failed and `value` is the fallback it substituted.
    Degraded {
        value: T,
        /// Why the stage fell back.
        reason: String,
    },
}

impl<T> Outcome<T> {
    /// Builds a degraded outcome.
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        Self::Degraded {
            value,
            reason: reason.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// Borrows the payload, fallback or not.
    pub fn value(&self) -> &T {
        match self {
            Self::Complete(value) | Self::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Complete(value) | Self::Degraded { value, .. } => value,
        }
    }

    /// Returns the fallback reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Complete(_) => None,
            Self::Degraded { reason, .. } => Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degraded_carries_reason_and_value() {
        let outcome = Outcome::degraded("fallback", "quota exceeded");
        assert!(outcome.is_degraded());
        assert_eq!(outcome.reason(), Some("quota exceeded"));
        assert_eq!(outcome.into_value(), "fallback");
    }

    #[test]
    fn complete_has_no_reason() {
        let outcome = Outcome::Complete(7);
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.reason(), None);
        assert_eq!(*outcome.value(), 7);
    }
}
