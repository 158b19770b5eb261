use anyhow::{bail, Result};
use chrono_tz::Tz;
use std::str::FromStr;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:./tasks.db?mode=rwc";

/// Which searcher serves `GET /tasks`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBackend {
    Database,
    Typesense,
    /// In-process index, fed by the listener and resync loop of `serve`
    Memory,
}

impl FromStr for SearchBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "database" | "db" => Ok(SearchBackend::Database),
            "typesense" => Ok(SearchBackend::Typesense),
            "memory" => Ok(SearchBackend::Memory),
            other => bail!(
                "Unknown search backend '{}', expected database, typesense or memory",
                other
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TypesenseConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub search_backend: SearchBackend,
    /// Present when both `TYPESENSE_URL` and `TYPESENSE_API_KEY` are set
    pub typesense: Option<TypesenseConfig>,
    pub index_collection: String,
    pub index_sync_interval_secs: u64,
    pub max_items_per_page: i64,
    pub default_timezone: Tz,
    pub event_bus_capacity: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        fn parse<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T>
        where
            T::Err: std::fmt::Display,
        {
            match value {
                None => Ok(default),
                Some(raw) => raw
                    .trim()
                    .parse::<T>()
                    .map_err(|e| anyhow::anyhow!("Invalid {} '{}': {}", key, raw, e)),
            }
        }

        let search_backend = match get("SEARCH_BACKEND") {
            Some(raw) => raw.parse::<SearchBackend>()?,
            None => SearchBackend::Database,
        };

        let typesense = match (get("TYPESENSE_URL"), get("TYPESENSE_API_KEY")) {
            (Some(url), Some(api_key)) => Some(TypesenseConfig { url, api_key }),
            _ => None,
        };
        if search_backend == SearchBackend::Typesense && typesense.is_none() {
            bail!("SEARCH_BACKEND=typesense requires TYPESENSE_URL and TYPESENSE_API_KEY");
        }

        let timezone = get("DEFAULT_TIMEZONE").unwrap_or_else(|| "UTC".to_string());
        let default_timezone = timezone
            .trim()
            .parse::<Tz>()
            .map_err(|_| anyhow::anyhow!("Invalid DEFAULT_TIMEZONE '{}'", timezone))?;

        let max_items_per_page = parse("MAX_ITEMS_PER_PAGE", get("MAX_ITEMS_PER_PAGE"), 50i64)?;
        if max_items_per_page < 1 {
            bail!("MAX_ITEMS_PER_PAGE must be positive, got {}", max_items_per_page);
        }
        let event_bus_capacity = parse("EVENT_BUS_CAPACITY", get("EVENT_BUS_CAPACITY"), 1024usize)?;
        if event_bus_capacity == 0 {
            bail!("EVENT_BUS_CAPACITY must be positive");
        }

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            port: parse("PORT", get("PORT"), 8080u16)?,
            search_backend,
            typesense,
            index_collection: get("INDEX_COLLECTION").unwrap_or_else(|| "tasks".to_string()),
            index_sync_interval_secs: parse(
                "INDEX_SYNC_INTERVAL_SECS",
                get("INDEX_SYNC_INTERVAL_SECS"),
                300u64,
            )?,
            max_items_per_page,
            default_timezone,
            event_bus_capacity,
        })
    }
}
