//! Persisted representation of the cached feed.
//!
//! The store keeps exactly one [`CacheRecord`], keyed by [`CACHE_ID`]. Images
//! are stored with their id and url as plain strings, so a record read back
//! from disk may not map to a valid [`LocalFeedImage`] any more.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::feed::{CachedFeed, LocalFeedImage};

/// Primary key of the single cache record.
pub const CACHE_ID: &str = "cache";

/// Stored form of a [`LocalFeedImage`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFeedImage {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub url: String,
}

impl From<&LocalFeedImage> for StoredFeedImage {
    fn from(image: &LocalFeedImage) -> Self {
        Self {
            id: image.id.to_string(),
            description: image.description.clone(),
            location: image.location.clone(),
            url: image.url.to_string(),
        }
    }
}

impl StoredFeedImage {
    /// Map back to the domain type, or `None` if the id or url no longer parse.
    pub fn to_local(&self) -> Option<LocalFeedImage> {
        let id = Uuid::parse_str(&self.id).ok()?;
        let url = Url::parse(&self.url).ok()?;

        Some(LocalFeedImage {
            id,
            description: self.description.clone(),
            location: self.location.clone(),
            url,
        })
    }
}

/// The cache aggregate: an ordered feed plus the time it was cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub id: String,
    pub feed: Vec<StoredFeedImage>,
    pub timestamp: DateTime<Utc>,
}

impl CacheRecord {
    pub fn new(feed: &[LocalFeedImage], timestamp: DateTime<Utc>) -> Self {
        Self {
            id: CACHE_ID.to_string(),
            feed: feed.iter().map(StoredFeedImage::from).collect(),
            timestamp,
        }
    }

    /// Map every stored image back to the domain type.
    ///
    /// Fails on the first image that does not map; a partial feed is never
    /// returned.
    pub fn local_feed(&self) -> Result<Vec<LocalFeedImage>> {
        self.feed
            .iter()
            .enumerate()
            .map(|(index, stored)| {
                stored.to_local().ok_or_else(|| {
                    Error::CorruptRecord(format!(
                        "image {} has id '{}' and url '{}'",
                        index, stored.id, stored.url
                    ))
                })
            })
            .collect()
    }

    pub fn to_cached_feed(&self) -> Result<CachedFeed> {
        Ok(CachedFeed::Found {
            feed: self.local_feed()?,
            timestamp: self.timestamp,
        })
    }
}
