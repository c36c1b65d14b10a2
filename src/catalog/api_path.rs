//! Dotted paths into an API response, with optional bracketed array indices.
//!
//! `list[0].components.pm2_5` reads the `pm2_5` member of `components` inside
//! the first element of the top-level `list` array.

use crate::catalog::error::CatalogError;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Why a path could not be resolved against a particular response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathMiss {
    #[error("key '{0}' is missing")]
    MissingKey(String),
    #[error("expected an object before key '{0}'")]
    NotAnObject(String),
    #[error("expected an array before index [{0}]")]
    NotAnArray(usize),
    #[error("index [{index}] is out of range for array of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPath {
    raw: String,
    segments: Vec<PathSegment>,
}

impl ApiPath {
    pub fn parse(raw: &str) -> Result<Self, CatalogError> {
        let invalid = |reason| CatalogError::InvalidApiPath {
            path: raw.to_string(),
            reason,
        };

        if raw.trim().is_empty() {
            return Err(invalid("path is empty"));
        }

        let mut segments = Vec::new();
        for part in raw.split('.') {
            let (key, mut rest) = match part.find('[') {
                Some(pos) => (&part[..pos], &part[pos..]),
                None => (part, ""),
            };
            if key.is_empty() {
                return Err(invalid("every segment must start with a key"));
            }
            if key.contains(']') || key.chars().any(char::is_whitespace) {
                return Err(invalid("keys may not contain brackets or whitespace"));
            }
            segments.push(PathSegment::Key(key.to_string()));

            while !rest.is_empty() {
                let Some(stripped) = rest.strip_prefix('[') else {
                    return Err(invalid("unexpected text after index"));
                };
                let Some(close) = stripped.find(']') else {
                    return Err(invalid("unterminated index"));
                };
                let index = stripped[..close]
                    .parse::<usize>()
                    .map_err(|_| invalid("index must be a non-negative integer"))?;
                segments.push(PathSegment::Index(index));
                rest = &stripped[close + 1..];
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Walks the path through `root`, returning the value it points at.
    pub fn lookup<'a>(&self, root: &'a Value) -> Result<&'a Value, PathMiss> {
        let mut current = root;
        for segment in &self.segments {
            current = match segment {
                PathSegment::Key(key) => {
                    let object = current
                        .as_object()
                        .ok_or_else(|| PathMiss::NotAnObject(key.clone()))?;
                    object
                        .get(key)
                        .ok_or_else(|| PathMiss::MissingKey(key.clone()))?
                }
                PathSegment::Index(index) => {
                    let array = current.as_array().ok_or(PathMiss::NotAnArray(*index))?;
                    array.get(*index).ok_or(PathMiss::IndexOutOfRange {
                        index: *index,
                        len: array.len(),
                    })?
                }
            };
        }
        Ok(current)
    }
}

impl fmt::Display for ApiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_dotted_and_indexed_segments() -> Result<(), CatalogError> {
        let path = ApiPath::parse("list[0].components.pm2_5")?;
        assert_eq!(
            path.segments(),
            [
                PathSegment::Key("list".into()),
                PathSegment::Index(0),
                PathSegment::Key("components".into()),
                PathSegment::Key("pm2_5".into()),
            ]
        );

        let nested = ApiPath::parse("grid[1][2]")?;
        assert_eq!(
            nested.segments(),
            [
                PathSegment::Key("grid".into()),
                PathSegment::Index(1),
                PathSegment::Index(2),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_parse_rejects_malformed_paths() {
        for raw in ["", "main..temp", "[0].x", "list[a]", "list[0", "list[0]x", "list[-1]"] {
            assert!(ApiPath::parse(raw).is_err(), "expected '{raw}' to be rejected");
        }
    }

    #[test]
    fn test_lookup_walks_objects_and_arrays() -> Result<(), CatalogError> {
        let body = json!({
            "weather": [{"id": 803, "main": "Clouds"}],
            "rain": {"1h": 0.25}
        });
        assert_eq!(
            ApiPath::parse("weather[0].main")?.lookup(&body),
            Ok(&json!("Clouds"))
        );
        assert_eq!(ApiPath::parse("rain.1h")?.lookup(&body), Ok(&json!(0.25)));
        Ok(())
    }

    #[test]
    fn test_lookup_reports_misses() -> Result<(), CatalogError> {
        let body = json!({"weather": [], "main": 3});
        assert_eq!(
            ApiPath::parse("weather[0].main")?.lookup(&body),
            Err(PathMiss::IndexOutOfRange { index: 0, len: 0 })
        );
        assert_eq!(
            ApiPath::parse("main.temp")?.lookup(&body),
            Err(PathMiss::NotAnObject("temp".into()))
        );
        assert_eq!(
            ApiPath::parse("snow.1h")?.lookup(&body),
            Err(PathMiss::MissingKey("snow".into()))
        );
        assert_eq!(
            ApiPath::parse("main[0]")?.lookup(&body),
            Err(PathMiss::NotAnArray(0))
        );
        Ok(())
    }
}
