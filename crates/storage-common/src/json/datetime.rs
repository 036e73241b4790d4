//! `#[serde(with = "...")]` helpers for the platform's date formats.
//!
//! Date-times are written as `yyyy-MM-dd HH:mm:ss` in the local time zone and
//! dates as `yyyy-MM-dd`, never as timestamps. The `option` variants write
//! `None` through `serialize_none`, so absent values still get the null
//! placeholder of the field.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

pub const NORM_DATETIME_PATTERN: &str = "%Y-%m-%d %H:%M:%S";
pub const NORM_DATE_PATTERN: &str = "%Y-%m-%d";

fn parse_local<E: serde::de::Error>(s: &str) -> Result<DateTime<Local>, E> {
    let naive = NaiveDateTime::parse_from_str(s, NORM_DATETIME_PATTERN).map_err(E::custom)?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| E::custom(format!("{s} does not exist in the local time zone")))
}

/// Zoned date-times, rendered in the local time zone.
pub mod local {
    use super::*;

    pub fn serialize<S, Tz>(value: &DateTime<Tz>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        Tz: TimeZone,
    {
        let local = value.with_timezone(&Local);
        serializer.collect_str(&local.format(NORM_DATETIME_PATTERN))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Local>, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_local(&s)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S, Tz>(
            value: &Option<DateTime<Tz>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
            Tz: TimeZone,
        {
            match value {
                Some(value) => {
                    let local = value.with_timezone(&Local);
                    serializer.serialize_some(&local.format(NORM_DATETIME_PATTERN).to_string())
                }
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Local>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(s) if !s.is_empty() => parse_local(&s).map(Some),
                _ => Ok(None),
            }
        }
    }
}

/// Date-times without a zone.
pub mod naive {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &NaiveDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(NORM_DATETIME_PATTERN))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<NaiveDateTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, NORM_DATETIME_PATTERN).map_err(D::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<NaiveDateTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => {
                    serializer.serialize_some(&value.format(NORM_DATETIME_PATTERN).to_string())
                }
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveDateTime>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(s) if !s.is_empty() => NaiveDateTime::parse_from_str(&s, NORM_DATETIME_PATTERN)
                    .map(Some)
                    .map_err(D::Error::custom),
                _ => Ok(None),
            }
        }
    }
}

/// Calendar dates.
pub mod date {
    use super::*;

    pub fn serialize<S: Serializer>(value: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(NORM_DATE_PATTERN))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&s, NORM_DATE_PATTERN).map_err(D::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<NaiveDate>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => serializer.serialize_some(&value.format(NORM_DATE_PATTERN).to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveDate>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(s) if !s.is_empty() => NaiveDate::parse_from_str(&s, NORM_DATE_PATTERN)
                    .map(Some)
                    .map_err(D::Error::custom),
                _ => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Upload {
        #[serde(with = "naive")]
        started: NaiveDateTime,
        #[serde(with = "naive::option", default)]
        finished: Option<NaiveDateTime>,
        #[serde(with = "date::option", default)]
        expires: Option<NaiveDate>,
    }

    fn started() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 0)
            .unwrap()
    }

    #[test]
    fn test_naive_formats() {
        let upload = Upload {
            started: started(),
            finished: None,
            expires: NaiveDate::from_ymd_opt(2024, 12, 31),
        };
        let json = serde_json::to_string(&upload).unwrap();
        assert_eq!(
            json,
            r#"{"started":"2024-03-09 07:05:00","finished":null,"expires":"2024-12-31"}"#
        );

        let back: Upload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, upload);
    }

    #[test]
    fn test_empty_string_reads_as_none() {
        let back: Upload = serde_json::from_str(
            r#"{"started":"2024-03-09 07:05:00","finished":"","expires":""}"#,
        )
        .unwrap();
        assert_eq!(back.finished, None);
        assert_eq!(back.expires, None);
    }

    #[test]
    fn test_rejects_timestamps() {
        let err = serde_json::from_str::<Upload>(r#"{"started":1709967900}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_local_round_trip() {
        #[derive(Serialize, Deserialize)]
        struct Stamp {
            #[serde(with = "local")]
            at: DateTime<Local>,
        }

        let at = Local.from_local_datetime(&started()).earliest().unwrap();
        let json = serde_json::to_string(&Stamp { at }).unwrap();
        assert_eq!(json, r#"{"at":"2024-03-09 07:05:00"}"#);

        let back: Stamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back.at, at);
    }
}
