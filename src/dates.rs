use time::{format_description::FormatItem, macros::format_description, Date};

/// Wire format for calendar dates. Inputs are accepted if they parse,
/// there is no regex gate in front of this.
pub const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

pub fn parse_date(s: &str) -> Result<Date, time::error::Parse> {
    Date::parse(s, DATE_FORMAT)
}

pub fn format_date(d: Date) -> String {
    d.format(DATE_FORMAT).unwrap_or_default()
}

/// serde adapter for required `Date` fields.
pub mod date {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(value: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_date(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_date(&s).map_err(de::Error::custom)
    }
}

/// serde adapter for optional `Date` fields.
pub mod date_option {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(
        value: &Option<Date>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&super::format_date(*d)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Date>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) => super::parse_date(&s).map(Some).map_err(de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_dates() {
        let d = parse_date("2024-01-31").unwrap();
        assert_eq!(format_date(d), "2024-01-31");
    }

    #[test]
    fn rejects_garbage_and_impossible_dates() {
        assert!(parse_date("not-a-date").is_err());
        assert!(parse_date("2024-02-30").is_err());
        assert!(parse_date("31/01/2024").is_err());
    }

    #[test]
    fn optional_adapter_roundtrips_null() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Probe {
            #[serde(default, with = "super::date_option")]
            date: Option<time::Date>,
        }

        let p: Probe = serde_json::from_str(r#"{"date": null}"#).unwrap();
        assert!(p.date.is_none());
        let p: Probe = serde_json::from_str(r#"{}"#).unwrap();
        assert!(p.date.is_none());
        let p: Probe = serde_json::from_str(r#"{"date": "2024-06-01"}"#).unwrap();
        assert_eq!(format_date(p.date.unwrap()), "2024-06-01");
    }
}
