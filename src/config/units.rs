//! Serde adapters for human-readable units.

/// `Duration` as a humantime string (`"1s"`, `"250ms"`, `"1m 30s"`).
pub mod duration {
    use std::time::Duration;

    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde::{Deserialize, Serialize};

    #[derive(Debug, Deserialize, Serialize)]
    struct Wrapper {
        #[serde(with = "super::duration")]
        period: Duration,
    }

    #[test]
    fn test_parse_duration() {
        let w: Wrapper = serde_json::from_str(r#"{"period": "1m 30s"}"#).unwrap();
        assert_eq!(w.period, Duration::from_secs(90));

        assert!(serde_json::from_str::<Wrapper>(r#"{"period": "soon"}"#).is_err());
    }

    #[test]
    fn test_format_duration() {
        let json = serde_json::to_string(&Wrapper { period: Duration::from_millis(250) }).unwrap();
        assert_eq!(json, r#"{"period":"250ms"}"#);
    }
}
