use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// A single image entry of a cached feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFeedImage {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub url: Url,
}

impl LocalFeedImage {
    pub fn new(id: Uuid, url: Url) -> Self {
        Self {
            id,
            description: None,
            location: None,
            url,
        }
    }

    /// Create an image with a freshly generated id.
    pub fn with_random_id(url: Url) -> Self {
        Self::new(Uuid::new_v4(), url)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// What a retrieve observed in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedFeed {
    Empty,
    Found {
        feed: Vec<LocalFeedImage>,
        timestamp: DateTime<Utc>,
    },
}

impl CachedFeed {
    pub fn is_empty(&self) -> bool {
        matches!(self, CachedFeed::Empty)
    }

    pub fn feed(&self) -> Option<&[LocalFeedImage]> {
        match self {
            CachedFeed::Empty => None,
            CachedFeed::Found { feed, .. } => Some(feed),
        }
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            CachedFeed::Empty => None,
            CachedFeed::Found { timestamp, .. } => Some(*timestamp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> LocalFeedImage {
        LocalFeedImage::with_random_id(Url::parse("https://example.com/a.png").unwrap())
    }

    #[test]
    fn test_builder_sets_optional_fields() {
        let image = image().with_description("a lake").with_location("Helsinki");
        assert_eq!(image.description.as_deref(), Some("a lake"));
        assert_eq!(image.location.as_deref(), Some("Helsinki"));
    }

    #[test]
    fn test_random_ids_are_unique() {
        assert_ne!(image().id, image().id);
    }

    #[test]
    fn test_cached_feed_accessors() {
        assert!(CachedFeed::Empty.is_empty());
        assert!(CachedFeed::Empty.feed().is_none());

        let timestamp = Utc::now();
        let found = CachedFeed::Found {
            feed: vec![image()],
            timestamp,
        };
        assert!(!found.is_empty());
        assert_eq!(found.feed().map(|f| f.len()), Some(1));
        assert_eq!(found.timestamp(), Some(timestamp));
    }

    #[test]
    fn test_json_omits_absent_fields() {
        let json = serde_json::to_string(&image()).unwrap();
        assert!(!json.contains("description"));
        assert!(!json.contains("location"));
    }
}
