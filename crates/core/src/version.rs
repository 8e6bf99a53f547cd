//! Optimistic concurrency expectations for event streams.

use crate::error::{LedgerError, LedgerResult};

/// Expected version of a stream at append time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ExpectedVersion {
    /// Skip version checking.
    Any,
    /// Require the stream to be at an exact version (0 = empty stream).
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, stream: &str, actual: u64) -> LedgerResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(LedgerError::conflict(format!(
                "optimistic concurrency check failed on `{stream}` (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_version_mismatch_is_a_conflict() {
        assert!(ExpectedVersion::Any.check("asset:player:coins", 7).is_ok());
        assert!(ExpectedVersion::Exact(7).check("asset:player:coins", 7).is_ok());
        let err = ExpectedVersion::Exact(6).check("asset:player:coins", 7).unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
    }
}
