//! Runtime configuration.

use std::time::Duration;

use assetlog_core::{LedgerError, LedgerResult};
use assetlog_events::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT, Pagination};

pub const ENV_PUBLISH_TIMEOUT_MS: &str = "ASSETLOG_PUBLISH_TIMEOUT_MS";
pub const ENV_QUERY_TIMEOUT_MS: &str = "ASSETLOG_QUERY_TIMEOUT_MS";
pub const ENV_DEFAULT_PAGE_LIMIT: &str = "ASSETLOG_DEFAULT_PAGE_LIMIT";
pub const ENV_MAX_PAGE_LIMIT: &str = "ASSETLOG_MAX_PAGE_LIMIT";

/// Ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Bound on the durable append inside `publish`.
    pub publish_timeout: Duration,
    /// Bound on history reads.
    pub query_timeout: Duration,
    /// Page size used when a caller does not pick one.
    pub default_page_limit: u32,
    /// Largest page a caller may request.
    pub max_page_limit: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            publish_timeout: Duration::from_secs(5),
            query_timeout: Duration::from_secs(5),
            default_page_limit: DEFAULT_PAGE_LIMIT,
            max_page_limit: MAX_PAGE_LIMIT,
        }
    }
}

impl LedgerConfig {
    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn with_page_limits(mut self, default_limit: u32, max_limit: u32) -> Self {
        self.default_page_limit = default_limit;
        self.max_page_limit = max_limit;
        self
    }

    /// Read overrides from the process environment.
    pub fn from_env() -> LedgerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`. Absent keys keep their defaults;
    /// unparsable values are rejected.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> LedgerResult<Self> {
        let mut config = Self::default();

        if let Some(ms) = parse_var::<u64>(&lookup, ENV_PUBLISH_TIMEOUT_MS)? {
            config.publish_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_QUERY_TIMEOUT_MS)? {
            config.query_timeout = Duration::from_millis(ms);
        }
        if let Some(limit) = parse_var::<u32>(&lookup, ENV_DEFAULT_PAGE_LIMIT)? {
            config.default_page_limit = limit;
        }
        if let Some(limit) = parse_var::<u32>(&lookup, ENV_MAX_PAGE_LIMIT)? {
            config.max_page_limit = limit;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if self.publish_timeout.is_zero() {
            return Err(LedgerError::invalid_argument("publish_timeout must be positive"));
        }
        if self.query_timeout.is_zero() {
            return Err(LedgerError::invalid_argument("query_timeout must be positive"));
        }
        if self.max_page_limit == 0 {
            return Err(LedgerError::invalid_argument("max_page_limit must be positive"));
        }
        if self.default_page_limit == 0 || self.default_page_limit > self.max_page_limit {
            return Err(LedgerError::invalid_argument(format!(
                "default_page_limit must be within 1..={}",
                self.max_page_limit
            )));
        }
        Ok(())
    }

    /// Apply this configuration's caps to a caller-supplied page.
    pub fn page(&self, pagination: Option<Pagination>) -> Pagination {
        pagination
            .unwrap_or(Pagination {
                limit: self.default_page_limit,
                offset: 0,
            })
            .capped(self.max_page_limit)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> LedgerResult<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| LedgerError::invalid_argument(format!("{key}: cannot parse `{raw}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn absent_variables_keep_defaults() {
        assert_eq!(LedgerConfig::from_lookup(lookup(&[])).unwrap(), LedgerConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = LedgerConfig::from_lookup(lookup(&[
            (ENV_PUBLISH_TIMEOUT_MS, "250"),
            (ENV_DEFAULT_PAGE_LIMIT, "20"),
            (ENV_MAX_PAGE_LIMIT, "200"),
        ]))
        .unwrap();
        assert_eq!(config.publish_timeout, Duration::from_millis(250));
        assert_eq!(config.query_timeout, Duration::from_secs(5));
        assert_eq!(config.page(None).limit, 20);
        assert_eq!(config.page(Some(Pagination::new(Some(900), None))).limit, 200);
    }

    #[test]
    fn garbage_is_rejected_not_defaulted() {
        assert!(LedgerConfig::from_lookup(lookup(&[(ENV_QUERY_TIMEOUT_MS, "soon")])).is_err());
        assert!(LedgerConfig::from_lookup(lookup(&[(ENV_PUBLISH_TIMEOUT_MS, "0")])).is_err());
        assert!(LedgerConfig::from_lookup(lookup(&[(ENV_DEFAULT_PAGE_LIMIT, "5000")])).is_err());
    }
}
