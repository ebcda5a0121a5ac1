use std::fs;
use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};
use crate::feed::{CachedFeed, LocalFeedImage};
use crate::storage::{FeedStoreExt, LocalFeedStore};

/// Write a default configuration file
pub async fn init(config_file: PathBuf) -> Result<()> {
    if config_file.exists() {
        warn!("Configuration file already exists: {}", config_file.display());
        println!("Configuration already exists: {}", config_file.display());
        return Ok(());
    }

    let config = Config::default();
    config.save(&config_file)?;
    info!("Created default configuration: {}", config_file.display());

    println!("✅ feed-store initialized");
    println!("   Config file: {}", config_file.display());
    println!("   Store file:  {}", config.store.path.display());
    Ok(())
}

#[derive(Serialize)]
struct CacheReport<'a> {
    location: &'a str,
    timestamp: Option<DateTime<Utc>>,
    feed: &'a [LocalFeedImage],
}

/// Print the cached feed
pub async fn show(config: &Config, json: bool) -> Result<()> {
    let store = LocalFeedStore::from_config(config)?;
    let cached = store.retrieve().await?;

    if json {
        let report = CacheReport {
            location: store.location(),
            timestamp: cached.timestamp(),
            feed: cached.feed().unwrap_or_default(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match cached {
        CachedFeed::Empty => {
            println!("📭 No cached feed in {}", store.location());
        }
        CachedFeed::Found { feed, timestamp } => {
            println!("📦 Cached feed in {}", store.location());
            println!("   Cached at: {}", timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
            println!("   Images:    {}", feed.len());
            for image in &feed {
                println!("   • {} {}", image.id, image.url);
                if let Some(description) = &image.description {
                    println!("       {}", description);
                }
                if let Some(location) = &image.location {
                    println!("       📍 {}", location);
                }
            }
        }
    }

    Ok(())
}

/// Replace the cached feed with the images in `input`
pub async fn insert(config: &Config, input: PathBuf, timestamp: DateTime<Utc>) -> Result<()> {
    let feed = read_feed_file(&input)?;
    let count = feed.len();

    let store = LocalFeedStore::from_config(config)?;
    store.insert(feed, timestamp).await?;

    println!("✅ Cached {} images in {}", count, store.location());
    Ok(())
}

/// Delete the cached feed
pub async fn delete(config: &Config) -> Result<()> {
    let store = LocalFeedStore::from_config(config)?;
    store.delete_cached_feed().await?;

    println!("🗑️  Deleted cached feed in {}", store.location());
    Ok(())
}

/// Read a JSON array of images
pub fn read_feed_file(path: &Path) -> Result<Vec<LocalFeedImage>> {
    let content = fs::read_to_string(path)
        .map_err(|_| Error::NotFound(path.display().to_string()))?;
    let feed: Vec<LocalFeedImage> = serde_json::from_str(&content)?;
    debug!(images = feed.len(), "Read feed file {}", path.display());
    Ok(feed)
}

/// Initialize logging based on verbosity flags and the logging configuration
pub fn init_logging(
    debug: bool,
    verbose: bool,
    logging: &LoggingConfig,
) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
    };

    let init_failed = |e: Box<dyn std::error::Error + Send + Sync>| {
        Error::Config(format!("Failed to initialize logging: {}", e))
    };

    if logging.log_to_file {
        let log_path = Path::new(&logging.log_file);
        let dir = log_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file_name = log_path
            .file_name()
            .ok_or_else(|| Error::Config(format!("Invalid log file: {}", logging.log_file)))?;
        fs::create_dir_all(dir)?;

        let (writer, guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
        let builder = fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .with_target(false);

        if logging.json_format {
            builder.json().try_init().map_err(init_failed)?;
        } else {
            builder.try_init().map_err(init_failed)?;
        }

        debug!("Logging initialized");
        return Ok(Some(guard));
    }

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(debug)
        .with_line_number(debug);

    if logging.json_format {
        builder.json().try_init().map_err(init_failed)?;
    } else {
        builder.try_init().map_err(init_failed)?;
    }

    debug!("Logging initialized");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.store.path = dir.path().join("feed.store");
        config
    }

    #[test]
    fn test_read_feed_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("feed.json");
        fs::write(
            &path,
            r#"[
                {"id": "2f1c1f36-5e76-4c1c-9a55-6a4e3f0b2b11", "url": "https://example.com/1.png"},
                {"id": "8f8e7c58-1b0a-4f0e-a1d5-7d4b2f6e9c22", "description": "lake",
                 "location": "Oulu", "url": "https://example.com/2.png"}
            ]"#,
        )
        .unwrap();

        let feed = read_feed_file(&path).unwrap();
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].description, None);
        assert_eq!(feed[1].location.as_deref(), Some("Oulu"));
    }

    #[test]
    fn test_read_feed_file_rejects_bad_ids() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("feed.json");
        fs::write(&path, r#"[{"id": "nope", "url": "https://example.com/1.png"}]"#).unwrap();

        assert!(matches!(read_feed_file(&path), Err(Error::Serialization(_))));
        assert!(matches!(
            read_feed_file(&temp_dir.path().join("missing.json")),
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_insert_show_delete() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);
        let input = temp_dir.path().join("feed.json");
        fs::write(
            &input,
            r#"[{"id": "2f1c1f36-5e76-4c1c-9a55-6a4e3f0b2b11", "url": "https://example.com/1.png"}]"#,
        )
        .unwrap();

        insert(&config, input, Utc::now()).await.unwrap();
        show(&config, true).await.unwrap();
        show(&config, false).await.unwrap();
        delete(&config).await.unwrap();

        let store = LocalFeedStore::from_config(&config).unwrap();
        assert!(store.retrieve().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_init_writes_config_once() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        init(path.clone()).await.unwrap();
        assert!(path.exists());
        let written = fs::read_to_string(&path).unwrap();

        init(path.clone()).await.unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), written);
    }
}
