//! Shared fixtures for the store integration tests
#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use feed_store::LocalFeedImage;
use url::Url;
use uuid::Uuid;

/// Image with every field set and a fresh id
pub fn unique_image() -> LocalFeedImage {
    LocalFeedImage::with_random_id(Url::parse("https://any-url.com/image.png").unwrap())
        .with_description("any description")
        .with_location("any location")
}

/// Image with only the required fields
pub fn bare_image() -> LocalFeedImage {
    LocalFeedImage::new(Uuid::new_v4(), Url::parse("https://another-url.com/").unwrap())
}

pub fn unique_image_feed() -> Vec<LocalFeedImage> {
    vec![unique_image(), bare_image(), unique_image()]
}

/// A timestamp distinct from "now" so stale reads are noticed
pub fn past_timestamp(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

pub const SAMPLE_FEED_JSON: &str = r#"[
    {
        "id": "2f1c1f36-5e76-4c1c-9a55-6a4e3f0b2b11",
        "description": "Sunset over the bay",
        "location": "Helsinki",
        "url": "https://images.example.com/sunset.jpg"
    },
    {
        "id": "8f8e7c58-1b0a-4f0e-a1d5-7d4b2f6e9c22",
        "url": "https://images.example.com/harbour.jpg"
    }
]"#;
