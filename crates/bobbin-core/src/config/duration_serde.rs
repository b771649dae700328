//! Human-readable durations for serde (`"250ms"`, `"5s"`, `"1h30m"`).
//!
//! Plain integers are read as whole seconds.

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::{fmt, time::Duration};

pub mod duration {
    use super::*;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let rendered = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&rendered)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DurationVisitor;

        impl<'de> Visitor<'de> for DurationVisitor {
            type Value = Duration;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a duration as seconds (number) or human-readable string (e.g., '250ms', '5s', '1m')")
            }

            fn visit_u64<E>(self, seconds: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Duration::from_secs(seconds))
            }

            fn visit_i64<E>(self, seconds: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                u64::try_from(seconds)
                    .map(Duration::from_secs)
                    .map_err(|_| de::Error::custom(format!("negative duration: {seconds}")))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                humantime::parse_duration(value)
                    .map_err(|e| de::Error::custom(format!("Invalid duration '{value}': {e}")))
            }
        }

        deserializer.deserialize_any(DurationVisitor)
    }
}

/// `Option<Duration>` in the same format; `null` or a missing field is `None`.
pub mod option_duration {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    #[derive(Serialize, Deserialize)]
    #[serde(transparent)]
    struct Human(#[serde(with = "super::duration")] Duration);

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.map(Human).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Human>::deserialize(deserializer)?.map(|Human(duration)| duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "duration")]
        every: Duration,
        #[serde(default, with = "option_duration")]
        limit: Option<Duration>,
    }

    #[test]
    fn accepts_strings_and_seconds() {
        let parsed: Wrapper = serde_json::from_str(r#"{"every": "250ms", "limit": 3}"#).unwrap();
        assert_eq!(parsed.every, Duration::from_millis(250));
        assert_eq!(parsed.limit, Some(Duration::from_secs(3)));

        let parsed: Wrapper = serde_json::from_str(r#"{"every": 2}"#).unwrap();
        assert_eq!(parsed.every, Duration::from_secs(2));
        assert_eq!(parsed.limit, None);

        let parsed: Wrapper = serde_json::from_str(r#"{"every": 2, "limit": null}"#).unwrap();
        assert_eq!(parsed.limit, None);
    }

    #[test]
    fn serializes_human_readable() {
        let wrapper = Wrapper {
            every: Duration::from_millis(1500),
            limit: None,
        };
        let json = serde_json::to_value(&wrapper).unwrap();
        assert_eq!(json["every"], "1s 500ms");
        assert!(json["limit"].is_null());

        let wrapper = Wrapper {
            limit: Some(Duration::from_secs(90)),
            ..wrapper
        };
        let json = serde_json::to_value(&wrapper).unwrap();
        assert_eq!(json["limit"], "1m 30s");
    }

    #[test]
    fn rejects_garbage() {
        let err = serde_json::from_str::<Wrapper>(r#"{"every": "soon"}"#).unwrap_err();
        assert!(err.to_string().contains("Invalid duration 'soon'"));
    }
}
