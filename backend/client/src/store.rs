//! # Local Store
//!
//! Advisory key-value storage on the visitor's side.
//!
//! Everything kept here (ids, fingerprint, votes, own posts, email, theme) is a cache of
//! what this visitor claims, not a record anyone else trusts. Clearing it, or editing it,
//! resets the visitor's voting history.
//!
//! Writes never fail from the caller's point of view: storage problems are logged and the
//! value is simply not remembered.
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Duration, Utc};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use tracing::{debug, warn};

pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str);

    fn remove(&mut self, key: &str);
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }
}

pub const COOKIE_LIFETIME_DAYS: i64 = 365;

/// Characters that cannot appear raw in a cookie value.
const COOKIE_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b',')
    .add(b';')
    .add(b'\\');

#[derive(Debug, Clone, PartialEq, Eq)]
struct Cookie {
    value: String,
    expires: DateTime<Utc>,
}

/// Cookies scoped to `path=/` with `SameSite=Lax`, as a browser would hold them.
#[derive(Debug, Clone)]
pub struct CookieJar {
    cookies: BTreeMap<String, Cookie>,
    lifetime: Duration,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::with_lifetime(Duration::days(COOKIE_LIFETIME_DAYS))
    }

    pub fn with_lifetime(lifetime: Duration) -> Self {
        Self {
            cookies: BTreeMap::new(),
            lifetime,
        }
    }

    /// Reads a `Cookie` request header (`a=1; b=2`). Pairs without `=` are skipped.
    pub fn parse(header: &str) -> Self {
        let mut jar = Self::new();
        let expires = Utc::now() + jar.lifetime;

        for pair in header.split(';') {
            let pair = pair.trim_start();
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            if name.is_empty() {
                continue;
            }

            jar.cookies.insert(
                name.to_string(),
                Cookie {
                    value: value.to_string(),
                    expires,
                },
            );
        }

        jar
    }

    /// Live cookies as a `Cookie` request header.
    pub fn header(&self) -> String {
        self.header_at(Utc::now())
    }

    pub fn header_at(&self, now: DateTime<Utc>) -> String {
        self.cookies
            .iter()
            .filter(|(_, cookie)| cookie.expires > now)
            .map(|(name, cookie)| format!("{name}={}", cookie.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// One `Set-Cookie` value per cookie, expired ones included so deletions propagate.
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.cookies
            .iter()
            .map(|(name, cookie)| {
                format!(
                    "{name}={};expires={};path=/;SameSite=Lax",
                    cookie.value,
                    cookie.expires.format("%a, %d %b %Y %H:%M:%S GMT")
                )
            })
            .collect()
    }

    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<String> {
        let cookie = self.cookies.get(key)?;

        if cookie.expires <= now {
            return None;
        }

        match percent_decode_str(&cookie.value).decode_utf8() {
            Ok(value) => Some(value.into_owned()),
            Err(e) => {
                debug!("Ignoring undecodable cookie {key}: {e}");
                None
            }
        }
    }

    pub fn set_at(&mut self, key: &str, value: &str, now: DateTime<Utc>) {
        self.cookies.insert(
            key.to_string(),
            Cookie {
                value: utf8_percent_encode(value, COOKIE_VALUE).to_string(),
                expires: now + self.lifetime,
            },
        );
    }
}

impl Default for CookieJar {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStore for CookieJar {
    fn get(&self, key: &str) -> Option<String> {
        self.get_at(key, Utc::now())
    }

    fn set(&mut self, key: &str, value: &str) {
        self.set_at(key, value, Utc::now());
    }

    /// Expires the cookie in the past rather than forgetting it.
    fn remove(&mut self, key: &str) {
        if let Some(cookie) = self.cookies.get_mut(key) {
            cookie.value.clear();
            cookie.expires = DateTime::<Utc>::UNIX_EPOCH;
        }
    }
}

/// JSON object on disk, rewritten on every change. Used by the `wall` CLI.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    /// A missing or unreadable file opens as an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let values = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Ignoring malformed store {}: {e}", path.display());
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };

        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) {
        let raw = match serde_json::to_string_pretty(&self.values) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to encode store: {e}");
                return;
            }
        };

        if let Err(e) = fs::write(&self.path, raw) {
            warn!("Failed to write store {}: {e}", self.path.display());
        }
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
        self.persist();
    }

    fn remove(&mut self, key: &str) {
        if self.values.remove(key).is_some() {
            self.persist();
        }
    }
}
