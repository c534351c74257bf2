//! Human-readable byte sizes for limits in config and log output

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid size format: {0}")]
    InvalidFormat(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Invalid unit: {0}")]
    InvalidUnit(String),

    #[error("Size out of range: {0}")]
    Overflow(String),
}

const KIB: u64 = 1024;
const UNITS: [(&str, u64); 4] = [
    ("GB", KIB * KIB * KIB),
    ("MB", KIB * KIB),
    ("KB", KIB),
    ("B", 1),
];

/// Byte count that deserializes from `"200MB"`, `"1.5GB"` or a plain integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Largest unit that keeps the value >= 1, with at most one decimal
    pub fn to_human_readable(&self) -> String {
        let (unit, divisor) = UNITS
            .iter()
            .copied()
            .find(|&(_, divisor)| self.0 >= divisor)
            .unwrap_or(("B", 1));

        let whole = self.0 / divisor;
        let tenths = (self.0 % divisor) * 10 / divisor;
        if tenths == 0 {
            format!("{whole}{unit}")
        } else {
            format!("{whole}.{tenths}{unit}")
        }
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ByteSizeVisitor;

        impl serde::de::Visitor<'_> for ByteSizeVisitor {
            type Value = ByteSize;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a byte size as string (e.g., \"64KB\", \"200MB\") or integer")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(ByteSize(v))
            }

            // TOML and environment sources hand integers over as i64
            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(ByteSize)
                    .map_err(|_| E::custom(format!("byte size must not be negative: {v}")))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse::<ByteSize>().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_any(ByteSizeVisitor)
    }
}

impl FromStr for ByteSize {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        if normalized.is_empty() {
            return Err(ParseError::InvalidFormat(s.to_string()));
        }

        let split = normalized
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(normalized.len());
        let (number, unit) = normalized.split_at(split);
        if number.is_empty() {
            return Err(ParseError::InvalidFormat(s.to_string()));
        }

        let multiplier = match unit.trim() {
            "" | "B" => 1,
            "K" | "KB" | "KIB" => KIB,
            "M" | "MB" | "MIB" => KIB * KIB,
            "G" | "GB" | "GIB" => KIB * KIB * KIB,
            other => return Err(ParseError::InvalidUnit(other.to_string())),
        };

        match number.split_once('.') {
            None => {
                let whole: u64 = number
                    .parse()
                    .map_err(|_| ParseError::InvalidNumber(number.to_string()))?;
                whole
                    .checked_mul(multiplier)
                    .map(ByteSize)
                    .ok_or_else(|| ParseError::Overflow(s.to_string()))
            }
            Some(_) => {
                let value: f64 = number
                    .parse()
                    .map_err(|_| ParseError::InvalidNumber(number.to_string()))?;
                let bytes = (value * multiplier as f64).round();
                if bytes > u64::MAX as f64 {
                    return Err(ParseError::Overflow(s.to_string()));
                }
                Ok(ByteSize(bytes as u64))
            }
        }
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_human_readable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_and_units() {
        assert_eq!("1024".parse::<ByteSize>().unwrap().as_u64(), 1024);
        assert_eq!("64kb".parse::<ByteSize>().unwrap().as_u64(), 64 * 1024);
        assert_eq!("200MB".parse::<ByteSize>().unwrap().as_u64(), 200 * 1024 * 1024);
        assert_eq!("2 GiB".parse::<ByteSize>().unwrap().as_u64(), 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_parse_fractional() {
        assert_eq!("1.5MB".parse::<ByteSize>().unwrap().as_u64(), 1536 * 1024);
        assert_eq!("0.5KB".parse::<ByteSize>().unwrap().as_u64(), 512);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!("".parse::<ByteSize>(), Err(ParseError::InvalidFormat(_))));
        assert!(matches!("MB".parse::<ByteSize>(), Err(ParseError::InvalidFormat(_))));
        assert!(matches!("5PB".parse::<ByteSize>(), Err(ParseError::InvalidUnit(_))));
        assert!(matches!("1.2.3MB".parse::<ByteSize>(), Err(ParseError::InvalidNumber(_))));
    }

    #[test]
    fn test_to_human_readable() {
        assert_eq!(ByteSize(0).to_human_readable(), "0B");
        assert_eq!(ByteSize(512).to_human_readable(), "512B");
        assert_eq!(ByteSize(1024).to_human_readable(), "1KB");
        assert_eq!(ByteSize(1536 * 1024).to_human_readable(), "1.5MB");
        assert_eq!(ByteSize(200 * 1024 * 1024).to_human_readable(), "200MB");
    }

    #[test]
    fn test_deserialize_string_and_number() {
        #[derive(Deserialize)]
        struct Limits {
            download: ByteSize,
            payload: ByteSize,
        }

        let json = r#"{"download": "10MB", "payload": 4096}"#;
        let parsed: Limits = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.download.as_u64(), 10 * 1024 * 1024);
        assert_eq!(parsed.payload.as_u64(), 4096);
    }

    #[test]
    fn test_deserialize_negative_rejected() {
        let result: Result<ByteSize, _> = serde_json::from_str("-1");
        assert!(result.is_err());
    }
}
