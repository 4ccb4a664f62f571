use std::ops::Deref;

use serde::Deserialize;

/// A duration written as whitespace separated parts like `"1h 30m"`.
/// Supported units are `s`, `m`, `h` and `d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration(pub std::time::Duration);

impl From<Duration> for std::time::Duration {
    fn from(value: Duration) -> Self {
        value.0
    }
}

impl Deref for Duration {
    type Target = std::time::Duration;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map(Self).map_err(serde::de::Error::custom)
    }
}

fn parse(s: &str) -> Result<std::time::Duration, &'static str> {
    let mut out = std::time::Duration::default();
    for part in s.split_whitespace() {
        let unit = part.chars().next_back().ok_or("Invalid duration")?;
        let digits = &part[..part.len() - unit.len_utf8()];
        let factor = match unit {
            's' => 1,
            'm' => 60,
            'h' => 3600,
            'd' => 24 * 3600,
            _ => return Err("Invalid duration"),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err("Invalid duration");
        }
        out = digits
            .parse::<u64>()
            .ok()
            .and_then(|value| value.checked_mul(factor))
            .and_then(|secs| out.checked_add(std::time::Duration::from_secs(secs)))
            .ok_or("Duration out of range")?;
    }
    Ok(out)
}
