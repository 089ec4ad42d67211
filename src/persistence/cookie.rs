//! Cookie-jar adapter
//!
//! Mirrors how a browser stores cookies: values are URL-encoded JSON,
//! each cookie has an expiry and a path, and a single cookie may not
//! exceed [`MAX_COOKIE_BYTES`]. Expired cookies read as absent and are
//! purged lazily.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{PersistenceAdapter, PersistenceError, PersistenceResult, WriteOptions};

/// Largest `name=value` pair a single cookie may hold
pub const MAX_COOKIE_BYTES: usize = 4096;

const DEFAULT_MAX_AGE_DAYS: i64 = 30;

#[derive(Debug, Clone)]
struct Cookie {
    encoded: String,
    path: String,
    expires: DateTime<Utc>,
}

/// Adapter with browser cookie semantics
#[derive(Debug)]
pub struct CookieAdapter {
    jar: Mutex<BTreeMap<String, Cookie>>,
    clock: fn() -> DateTime<Utc>,
}

impl CookieAdapter {
    pub fn new() -> Self {
        Self::with_clock(Utc::now)
    }

    /// Use a custom time source for expiry checks
    pub fn with_clock(clock: fn() -> DateTime<Utc>) -> Self {
        Self {
            jar: Mutex::new(BTreeMap::new()),
            clock,
        }
    }

    /// Render the live cookies as a `Cookie:` request header value
    pub fn cookie_header(&self) -> PersistenceResult<String> {
        let mut jar = self.lock()?;
        self.purge_expired(&mut jar);
        Ok(jar
            .iter()
            .map(|(name, cookie)| format!("{}={}", name, cookie.encoded))
            .collect::<Vec<_>>()
            .join("; "))
    }

    /// Render the live cookies as `Set-Cookie` header lines
    pub fn set_cookie_headers(&self) -> PersistenceResult<Vec<String>> {
        let mut jar = self.lock()?;
        self.purge_expired(&mut jar);
        Ok(jar
            .iter()
            .map(|(name, cookie)| {
                format!(
                    "{}={}; Expires={}; Path={}",
                    name,
                    cookie.encoded,
                    cookie.expires.format("%a, %d %b %Y %H:%M:%S GMT"),
                    cookie.path
                )
            })
            .collect())
    }

    fn lock(&self) -> PersistenceResult<std::sync::MutexGuard<'_, BTreeMap<String, Cookie>>> {
        self.jar
            .lock()
            .map_err(|e| PersistenceError::Lock(format!("Failed to lock cookie jar: {}", e)))
    }

    fn purge_expired(&self, jar: &mut BTreeMap<String, Cookie>) {
        let now = (self.clock)();
        jar.retain(|_, cookie| cookie.expires > now);
    }
}

impl Default for CookieAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistenceAdapter for CookieAdapter {
    fn name(&self) -> &str {
        "cookie"
    }

    fn get(&self, key: &str) -> PersistenceResult<Option<Value>> {
        let mut jar = self.lock()?;
        self.purge_expired(&mut jar);

        let Some(cookie) = jar.get(key) else {
            return Ok(None);
        };
        let decoded = urlencoding::decode(&cookie.encoded)
            .map_err(|e| PersistenceError::Serialization(e.to_string()))?;
        Ok(Some(serde_json::from_str(&decoded)?))
    }

    fn set(&self, key: &str, value: &Value, options: &WriteOptions) -> PersistenceResult<()> {
        let encoded = urlencoding::encode(&serde_json::to_string(value)?).into_owned();
        let size = key.len() + 1 + encoded.len();
        if size > MAX_COOKIE_BYTES {
            return Err(PersistenceError::Quota {
                key: key.to_string(),
                size,
                limit: MAX_COOKIE_BYTES,
            });
        }

        let max_age = options.max_age_days.unwrap_or(DEFAULT_MAX_AGE_DAYS);
        let mut jar = self.lock()?;
        // A non-positive max age deletes the cookie, like a browser does.
        if max_age <= 0 {
            jar.remove(key);
            return Ok(());
        }

        jar.insert(
            key.to_string(),
            Cookie {
                encoded,
                path: options.path.clone().unwrap_or_else(|| "/".to_string()),
                expires: (self.clock)() + Duration::days(max_age),
            },
        );
        Ok(())
    }

    fn remove(&self, key: &str) -> PersistenceResult<bool> {
        let mut jar = self.lock()?;
        self.purge_expired(&mut jar);
        Ok(jar.remove(key).is_some())
    }

    fn keys(&self) -> PersistenceResult<Vec<String>> {
        let mut jar = self.lock()?;
        self.purge_expired(&mut jar);
        Ok(jar.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn far_future() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_roundtrip_with_special_characters() {
        let adapter = CookieAdapter::new();
        let value = json!({"note": "a; b=c, d", "n": 1});
        adapter.set("prefs", &value, &WriteOptions::default()).unwrap();
        assert_eq!(adapter.get("prefs").unwrap(), Some(value));

        let header = adapter.cookie_header().unwrap();
        assert!(header.starts_with("prefs="));
        assert!(!header.contains("; "));
    }

    #[test]
    fn test_quota_exceeded() {
        let adapter = CookieAdapter::new();
        let big = json!("x".repeat(MAX_COOKIE_BYTES));
        let err = adapter.set("big", &big, &WriteOptions::default()).unwrap_err();
        assert!(matches!(err, PersistenceError::Quota { .. }));
        assert!(!adapter.exists("big").unwrap());
    }

    #[test]
    fn test_non_positive_max_age_deletes() {
        let adapter = CookieAdapter::new();
        adapter.set("k", &json!(1), &WriteOptions::default()).unwrap();

        let expire_now = WriteOptions {
            max_age_days: Some(0),
            path: None,
        };
        adapter.set("k", &json!(2), &expire_now).unwrap();
        assert_eq!(adapter.get("k").unwrap(), None);
    }

    #[test]
    fn test_expired_cookie_reads_absent() {
        let writer = CookieAdapter::with_clock(fixed_now);
        let opts = WriteOptions {
            max_age_days: Some(1),
            path: Some("/app".to_string()),
        };
        writer.set("short", &json!(true), &opts).unwrap();
        assert!(writer.exists("short").unwrap());
        assert!(writer.set_cookie_headers().unwrap()[0].contains("Path=/app"));

        // Move the same jar into the future.
        let jar = writer.jar.into_inner().unwrap();
        let later = CookieAdapter {
            jar: Mutex::new(jar),
            clock: far_future,
        };
        assert_eq!(later.get("short").unwrap(), None);
        assert!(later.keys().unwrap().is_empty());
    }
}
