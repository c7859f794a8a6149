//! Tagged JSON codecs for the packet envelope column.
//!
//! Values that plain JSON cannot represent round-trip as
//! `{"__type__": "datetime", "value": <epoch seconds>}` and
//! `{"__type__": "set", "value": [...]}`.
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Serialize, Deserialize)]
struct Wrapper<T> {
    __type__: String,
    value: T,
}

pub mod datetime {
    use super::*;

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        Wrapper {
            __type__: "datetime".to_string(),
            value: value.timestamp(),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let wrapper = Wrapper::<i64>::deserialize(deserializer)?;
        if wrapper.__type__ != "datetime" {
            return Err(D::Error::custom(format!(
                "expected a datetime tag, got {}",
                wrapper.__type__
            )));
        }
        DateTime::from_timestamp(wrapper.value, 0)
            .ok_or_else(|| D::Error::custom("timestamp out of range"))
    }
}

pub mod set {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &BTreeSet<String>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        Wrapper {
            __type__: "set".to_string(),
            value: value.iter().collect::<Vec<_>>(),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeSet<String>, D::Error> {
        let wrapper = Wrapper::<BTreeSet<String>>::deserialize(deserializer)?;
        if wrapper.__type__ != "set" {
            return Err(D::Error::custom(format!(
                "expected a set tag, got {}",
                wrapper.__type__
            )));
        }
        Ok(wrapper.value)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Sample {
        #[serde(with = "datetime")]
        when: DateTime<Utc>,
        #[serde(with = "set")]
        tags: BTreeSet<String>,
    }

    #[test]
    fn tagged_round_trip() {
        let sample = Sample {
            when: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            tags: ["DX".to_string(), "POTA".to_string()].into(),
        };
        let json = serde_json::to_string(&sample).unwrap();
        assert!(json.contains(r#""__type__":"datetime""#));
        assert!(json.contains(r#""__type__":"set""#));
        assert_eq!(serde_json::from_str::<Sample>(&json).unwrap(), sample);
    }
}
