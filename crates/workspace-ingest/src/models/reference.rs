//! Cross-references held by metadata documents.

use serde::{Deserialize, Serialize};

/// What a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    /// A data resource.
    #[default]
    Resource,
    /// Another metadata document.
    Metadata,
    /// A landing or search page; never resolved.
    Page,
    /// An informational resource.
    Info,
}

/// One reference inside one metadata document.
///
/// `id` is unique within the owning document and is how rewrites find the
/// reference again. Empty tokens are treated as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(rename = "type", default)]
    pub ref_type: ReferenceType,
}

/// Which tokens a reference carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceShape<'a> {
    PathOnly { location: &'a str },
    UriOnly { uri: &'a str },
    Both { location: &'a str, uri: &'a str },
    Neither,
}

impl<'a> ReferenceShape<'a> {
    pub fn location(&self) -> Option<&'a str> {
        match *self {
            ReferenceShape::PathOnly { location } | ReferenceShape::Both { location, .. } => {
                Some(location)
            }
            _ => None,
        }
    }

    pub fn uri(&self) -> Option<&'a str> {
        match *self {
            ReferenceShape::UriOnly { uri } | ReferenceShape::Both { uri, .. } => Some(uri),
            _ => None,
        }
    }
}

impl Reference {
    pub fn new(id: impl Into<String>, ref_type: ReferenceType) -> Self {
        Self {
            id: id.into(),
            location: None,
            uri: None,
            ref_type,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Classify the tokens this reference carries.
    pub fn shape(&self) -> ReferenceShape<'_> {
        let location = non_empty(&self.location);
        let uri = non_empty(&self.uri);
        match (location, uri) {
            (Some(location), Some(uri)) => ReferenceShape::Both { location, uri },
            (Some(location), None) => ReferenceShape::PathOnly { location },
            (None, Some(uri)) => ReferenceShape::UriOnly { uri },
            (None, None) => ReferenceShape::Neither,
        }
    }

    pub fn is_page(&self) -> bool {
        self.ref_type == ReferenceType::Page
    }

    pub fn is_info(&self) -> bool {
        self.ref_type == ReferenceType::Info
    }

    /// Short human-readable description for problem reports.
    pub fn describe(&self) -> String {
        match self.shape() {
            ReferenceShape::PathOnly { location } => format!("{} ({})", self.id, location),
            ReferenceShape::UriOnly { uri } => format!("{} ({})", self.id, uri),
            ReferenceShape::Both { location, uri } => {
                format!("{} ({}, {})", self.id, location, uri)
            }
            ReferenceShape::Neither => self.id.clone(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape() {
        let r = Reference::new("r1", ReferenceType::Resource);
        assert_eq!(r.shape(), ReferenceShape::Neither);

        let r = r.with_location("audio.wav");
        assert_eq!(r.shape(), ReferenceShape::PathOnly { location: "audio.wav" });

        let r = r.with_uri("hdl:11142/x");
        assert_eq!(
            r.shape(),
            ReferenceShape::Both {
                location: "audio.wav",
                uri: "hdl:11142/x"
            }
        );
    }

    #[test]
    fn test_empty_tokens_are_absent() {
        let r = Reference::new("r1", ReferenceType::Metadata)
            .with_location("  ")
            .with_uri("hdl:11142/x");
        assert_eq!(r.shape(), ReferenceShape::UriOnly { uri: "hdl:11142/x" });
    }

    #[test]
    fn test_deserialize_default_type() {
        let r: Reference = serde_json::from_str(r#"{"id":"r2","location":"a.wav"}"#).unwrap();
        assert_eq!(r.ref_type, ReferenceType::Resource);
        assert!(r.uri.is_none());
    }
}
