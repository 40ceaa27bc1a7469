use std::path::PathBuf;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Deserialize;

use crate::nav::{PairMode, PairingConfig, ReadingDirection};
use crate::page::PlaceholderSpec;
use crate::preload::PreloadConfig;
use crate::session::SessionConfig;
use crate::sort::SortStrategy;

// ---------------------------------------------------------------------------
// ConfigFile — deserialized from TOML (all fields optional)
// ---------------------------------------------------------------------------

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub sort: Option<SortStrategy>,
    pub cache: CacheConfigFile,
    pub preload: PreloadConfigFile,
    pub book: BookConfigFile,
    pub placeholder: PlaceholderConfigFile,
    pub viewer: ViewerConfigFile,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct CacheConfigFile {
    pub capacity: Option<usize>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct PreloadConfigFile {
    pub enabled: Option<bool>,
    pub depth: Option<usize>,
    pub queue_capacity: Option<usize>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct BookConfigFile {
    pub enabled: Option<bool>,
    pub rtl: Option<bool>,
    pub aspect_min: Option<f64>,
    pub aspect_max: Option<f64>,
    pub ratio_threshold: Option<f64>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct PlaceholderConfigFile {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ViewerConfigFile {
    pub watch: Option<bool>,
    pub watch_debounce_ms: Option<u64>,
}

/// Values given on the command line. `None` / `false` means "not given".
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub sort: Option<SortStrategy>,
    pub cache_size: Option<usize>,
    pub preload_depth: Option<usize>,
    pub no_preload: bool,
    pub book: bool,
    pub rtl: bool,
    pub no_watch: bool,
}

// ---------------------------------------------------------------------------
// Config — resolved (all fields concrete)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub session: SessionConfig,
    pub viewer: ViewerConfig,
}

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub watch: bool,
    pub watch_debounce: Duration,
}

impl ConfigFile {
    /// Merge CLI values (overwrites fields the user gave).
    pub fn merge_cli(&mut self, cli: &CliOverrides) {
        if let Some(v) = cli.sort {
            debug!("config: CLI override sort={v}");
            self.sort = Some(v);
        }
        if let Some(v) = cli.cache_size {
            debug!("config: CLI override cache.capacity={v}");
            self.cache.capacity = Some(v);
        }
        if let Some(v) = cli.preload_depth {
            debug!("config: CLI override preload.depth={v}");
            self.preload.depth = Some(v);
        }
        if cli.no_preload {
            debug!("config: CLI override preload.enabled=false");
            self.preload.enabled = Some(false);
        }
        if cli.book {
            debug!("config: CLI override book.enabled=true");
            self.book.enabled = Some(true);
        }
        if cli.rtl {
            debug!("config: CLI override book.rtl=true");
            self.book.rtl = Some(true);
        }
        if cli.no_watch {
            debug!("config: CLI override viewer.watch=false");
            self.viewer.watch = Some(false);
        }
    }

    /// Resolve to a Config by applying defaults to missing fields.
    pub fn resolve(self) -> Config {
        let pairing_default = PairingConfig::default();
        let placeholder_default = PlaceholderSpec::default();
        let preload_default = PreloadConfig::default();

        let mut pairing = PairingConfig {
            aspect_min: self.book.aspect_min.unwrap_or(pairing_default.aspect_min),
            aspect_max: self.book.aspect_max.unwrap_or(pairing_default.aspect_max),
            ratio_threshold: self
                .book
                .ratio_threshold
                .unwrap_or(pairing_default.ratio_threshold),
        };
        let thresholds_valid = pairing.aspect_min > 0.0
            && pairing.aspect_min <= pairing.aspect_max
            && pairing.ratio_threshold >= 1.0;
        if !thresholds_valid {
            warn!(
                "config: invalid book thresholds (aspect {}-{}, ratio {}), using defaults",
                pairing.aspect_min, pairing.aspect_max, pairing.ratio_threshold
            );
            pairing = pairing_default;
        }

        let placeholder = PlaceholderSpec {
            width: self.placeholder.width.unwrap_or(placeholder_default.width),
            height: self.placeholder.height.unwrap_or(placeholder_default.height),
        };
        let session = SessionConfig {
            sort: self.sort.unwrap_or_default(),
            cache_capacity: self.cache.capacity.unwrap_or(crate::cache::DEFAULT_CAPACITY),
            preload: PreloadConfig {
                enabled: self.preload.enabled.unwrap_or(preload_default.enabled),
                depth: self.preload.depth.unwrap_or(preload_default.depth),
                queue_capacity: self
                    .preload
                    .queue_capacity
                    .unwrap_or(preload_default.queue_capacity),
                placeholder,
            },
            pair_mode: if self.book.enabled.unwrap_or(false) {
                PairMode::Book
            } else {
                PairMode::Single
            },
            reading_direction: if self.book.rtl.unwrap_or(false) {
                ReadingDirection::Rtl
            } else {
                ReadingDirection::Ltr
            },
            pairing,
            placeholder,
        };
        let config = Config {
            session,
            viewer: ViewerConfig {
                watch: self.viewer.watch.unwrap_or(true),
                watch_debounce: Duration::from_millis(
                    self.viewer.watch_debounce_ms.unwrap_or(200),
                ),
            },
        };

        let s = &config.session;
        info!(
            "config: resolved sort={}, cache={}, preload={} (depth={}, queue={}), \
             mode={:?}, direction={:?}, aspect={}-{}, ratio={}, placeholder={}x{}, \
             watch={}, debounce={}ms",
            s.sort,
            s.cache_capacity,
            s.preload.enabled,
            s.preload.depth,
            s.preload.queue_capacity,
            s.pair_mode,
            s.reading_direction,
            s.pairing.aspect_min,
            s.pairing.aspect_max,
            s.pairing.ratio_threshold,
            s.placeholder.width,
            s.placeholder.height,
            config.viewer.watch,
            config.viewer.watch_debounce.as_millis(),
        );
        config
    }
}

/// Resolve the XDG config path for koma.
fn config_path() -> Option<PathBuf> {
    let config_dir = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(config_dir.join("koma").join("config.toml"))
}

/// Load config file. Returns `ConfigFile::default()` if no file exists.
/// Returns an error if the file exists but cannot be parsed.
pub fn load_config() -> anyhow::Result<ConfigFile> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            info!("config: no HOME or XDG_CONFIG_HOME set, using defaults");
            return Ok(ConfigFile::default());
        }
    };
    debug!("config: looking for {}", path.display());
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            info!("config: loaded from {}", path.display());
            let cfg: ConfigFile = toml::from_str(&text)
                .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("config: {} not found, using defaults", path.display());
            Ok(ConfigFile::default())
        }
        Err(e) => Err(anyhow::anyhow!("failed to read {}: {e}", path.display())),
    }
}
