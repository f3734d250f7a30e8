//! Lenient JSON helpers over `serde_json`.
//!
//! These never fail: errors are logged and replaced by a neutral value.
//! Call `serde_json` directly when the caller needs the error.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::error;

/// Serialize `value`, or `"{}"` if serialization fails.
pub fn to_json<T>(value: &T) -> String
where
    T: Serialize + ?Sized,
{
    serde_json::to_string(value).unwrap_or_else(|e| {
        error!(error = %e, "JSON serialization failed");
        "{}".to_string()
    })
}

/// Deserialize `input`, or `None` if it is not valid JSON for `T`.
pub fn from_json<T>(input: &str) -> Option<T>
where
    T: DeserializeOwned,
{
    serde_json::from_str(input)
        .map_err(|e| error!(error = %e, "JSON deserialization failed"))
        .ok()
}

/// Whether `input` parses as any JSON value.
#[must_use]
pub fn is_valid_json(input: &str) -> bool {
    serde_json::from_str::<serde::de::IgnoredAny>(input).is_ok()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde::ser::Error as _;
    use serde::{Deserialize, Serializer};

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Page {
        url: String,
        depth: u32,
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("refused"))
        }
    }

    #[test]
    fn test_to_json_struct() {
        let page = Page {
            url: "https://example.com".into(),
            depth: 2,
        };
        assert_eq!(to_json(&page), r#"{"url":"https://example.com","depth":2}"#);
    }

    #[test]
    fn test_to_json_failure_falls_back() {
        assert_eq!(to_json(&Unserializable), "{}");
    }

    #[test]
    fn test_from_json() {
        let page: Option<Page> = from_json(r#"{"url":"/a","depth":1}"#);
        assert_eq!(
            page,
            Some(Page {
                url: "/a".into(),
                depth: 1
            })
        );
        assert!(from_json::<Page>(r#"{"url":"/a"}"#).is_none());
        assert!(from_json::<BTreeMap<String, u32>>("not json").is_none());
    }

    #[test]
    fn test_is_valid_json() {
        assert!(is_valid_json(r#"{"a":[1,2,{"b":null}]}"#));
        assert!(is_valid_json("42"));
        assert!(!is_valid_json("{a:1}"));
        assert!(!is_valid_json(""));
    }
}
