//! # Device Fingerprint
//!
//! A short, semi-stable label folded from environment signals.
//!
//! The fold is a 32-bit string hash (`h = h * 31 + unit` over UTF-16 code units, wrapping),
//! printed as the absolute value in base 36. It collides easily and anyone can change the
//! inputs, so it only helps tell apart honest visitors who cleared their client id.
use std::env;

use chrono::Local;

/// Environment signals, in the order they are folded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSignals {
    pub user_agent: String,
    pub language: String,
    pub screen_width: u32,
    pub screen_height: u32,
    /// Minutes from local time to UTC, positive west of Greenwich.
    pub timezone_offset_minutes: i32,
    /// Output of a fixed render on this device.
    pub canvas: String,
}

impl DeviceSignals {
    /// Signals available to a terminal session. The terminal capabilities stand in for a
    /// canvas render, and the terminal size for the screen.
    pub fn detect() -> Self {
        let var = |key: &str| env::var(key).unwrap_or_default();
        let dimension = |key: &str, fallback: u32| var(key).parse().unwrap_or(fallback);

        Self {
            user_agent: format!(
                "wall/{} ({}; {})",
                env!("CARGO_PKG_VERSION"),
                env::consts::OS,
                env::consts::ARCH
            ),
            language: var("LANG")
                .split('.')
                .next()
                .unwrap_or_default()
                .replace('_', "-"),
            screen_width: dimension("COLUMNS", 80),
            screen_height: dimension("LINES", 24),
            timezone_offset_minutes: -Local::now().offset().local_minus_utc() / 60,
            canvas: format!("{}:{}", var("TERM"), var("COLORTERM")),
        }
    }

    pub fn joined(&self) -> String {
        [
            self.user_agent.clone(),
            self.language.clone(),
            format!("{}x{}", self.screen_width, self.screen_height),
            self.timezone_offset_minutes.to_string(),
            self.canvas.clone(),
        ]
        .join("|")
    }

    pub fn fingerprint(&self) -> String {
        to_base36(fold_hash(&self.joined()).unsigned_abs().into())
    }
}

pub fn fold_hash(input: &str) -> i32 {
    input.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit))
    })
}

pub fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();

    String::from_utf8(digits).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals() -> DeviceSignals {
        DeviceSignals {
            user_agent: "Mozilla/5.0".to_string(),
            language: "en-US".to_string(),
            screen_width: 1920,
            screen_height: 1080,
            timezone_offset_minutes: -60,
            canvas: "data:image/png;base64,AAAA".to_string(),
        }
    }

    #[test]
    fn test_fold_hash_known_values() {
        assert_eq!(fold_hash(""), 0);
        assert_eq!(fold_hash("a"), 97);
        assert_eq!(fold_hash("ab"), 97 * 31 + 98);
        // Same result as a Java String#hashCode
        assert_eq!(fold_hash("hello"), 99162322);
    }

    #[test]
    fn test_fold_hash_wraps() {
        assert_eq!(fold_hash("polygenelubricants"), i32::MIN);
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(2_147_483_648), "zik0zk");
    }

    #[test]
    fn test_joined_order() {
        assert_eq!(
            signals().joined(),
            "Mozilla/5.0|en-US|1920x1080|-60|data:image/png;base64,AAAA"
        );
    }

    #[test]
    fn test_fingerprint_stable_and_sensitive() {
        let a = signals();
        assert_eq!(a.fingerprint(), a.fingerprint());

        let mut b = signals();
        b.screen_width = 1280;
        assert_ne!(a.fingerprint(), b.fingerprint());

        assert!(
            a.fingerprint()
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
        );
    }
}
