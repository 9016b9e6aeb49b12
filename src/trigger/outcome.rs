use std::fmt;

use crate::providers::gitlab::types::Status;

/// Final verdict on a finished pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
}

impl Outcome {
    /// Classifies a terminal pipeline status.
    ///
    /// Only `success` and `manual` count as success. Anything else,
    /// including statuses this tool does not know about, is a failure.
    pub fn classify(status: &Status) -> Self {
        match status {
            Status::Success | Status::Manual => Self::Succeeded,
            _ => Self::Failed,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Succeeded
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => f.write_str("succeeded"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_and_manual_succeed() {
        assert_eq!(Outcome::classify(&Status::Success), Outcome::Succeeded);
        assert_eq!(Outcome::classify(&Status::Manual), Outcome::Succeeded);
    }

    #[test]
    fn test_failed_canceled_skipped_fail() {
        for status in [Status::Failed, Status::Canceled, Status::Skipped] {
            assert_eq!(Outcome::classify(&status), Outcome::Failed, "{status}");
        }
    }

    #[test]
    fn test_unknown_status_fails_closed() {
        let status = Status::from("some_future_status");
        assert_eq!(Outcome::classify(&status), Outcome::Failed);
    }

    #[test]
    fn test_classify_from_raw_strings() {
        let classify = |raw: &str| Outcome::classify(&Status::from(raw));
        assert!(classify("success").is_success());
        assert!(classify("manual").is_success());
        assert!(!classify("failed").is_success());
        assert!(!classify("canceled").is_success());
        assert!(!classify("skipped").is_success());
    }
}
