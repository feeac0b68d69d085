use crate::codec::CodecKind;
use crate::{Error, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_CODEC: &str = "TYPEDKV_CODEC";
pub const ENV_DEFAULT_TTL: &str = "TYPEDKV_DEFAULT_TTL";
pub const ENV_BACKEND: &str = "TYPEDKV_BACKEND";
pub const ENV_PATH: &str = "TYPEDKV_PATH";
pub const ENV_LOCK_POLL_MS: &str = "TYPEDKV_LOCK_POLL_MS";

const DEFAULT_PATH: &str = "typedkv.db";
const DEFAULT_LOCK_POLL: Duration = Duration::from_millis(10);

#[allow(non_camel_case_types)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendKind {
    memory,
    sled,
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "memory" => Ok(BackendKind::memory),
            "sled" => Ok(BackendKind::sled),
            _ => Err(Error::Config(format!("Invalid backend: {}", s))),
        }
    }
}

/// Settings handed to backend and store constructors.
#[derive(Clone, Debug)]
pub struct Config {
    pub codec: CodecKind,
    /// Records may be dropped this long after their last write, on engines
    /// that support expiry.
    pub default_ttl: Option<Duration>,
    pub backend: BackendKind,
    /// Database directory for on-disk engines.
    pub path: PathBuf,
    /// How often a blocked lock wait re-checks its context.
    pub lock_poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            codec: CodecKind::default(),
            default_ttl: None,
            backend: BackendKind::memory,
            path: PathBuf::from(DEFAULT_PATH),
            lock_poll_interval: DEFAULT_LOCK_POLL,
        }
    }
}

impl Config {
    /// Reads `TYPEDKV_*` variables over the defaults.
    pub fn from_env() -> Result<Config> {
        Config::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        if let Some(codec) = lookup(ENV_CODEC) {
            config.codec = codec.trim().parse()?;
        }
        if let Some(ttl) = lookup(ENV_DEFAULT_TTL) {
            let ttl = parse_duration(ttl.trim())?;
            config.default_ttl = if ttl.is_zero() { None } else { Some(ttl) };
        }
        if let Some(backend) = lookup(ENV_BACKEND) {
            config.backend = backend.trim().parse()?;
        }
        if let Some(path) = lookup(ENV_PATH) {
            config.path = PathBuf::from(path);
        }
        if let Some(ms) = lookup(ENV_LOCK_POLL_MS) {
            let ms = ms
                .trim()
                .parse::<u64>()
                .map_err(|e| Error::Config(format!("{}: {}", ENV_LOCK_POLL_MS, e)))?;
            config.lock_poll_interval = Duration::from_millis(ms.max(1));
        }
        Ok(config)
    }

    pub fn with_codec(mut self, codec: CodecKind) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }
}

/// Parses `500ms`, `30s`, `5m`, `1h`, or a bare number of seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let n = digits
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("Invalid duration: {:?}", s)))?;
    let secs = |scale: u64| {
        n.checked_mul(scale)
            .map(Duration::from_secs)
            .ok_or_else(|| Error::Config(format!("Duration out of range: {:?}", s)))
    };
    match unit {
        "" | "s" => secs(1),
        "ms" => Ok(Duration::from_millis(n)),
        "m" => secs(60),
        "h" => secs(3600),
        _ => Err(Error::Config(format!("Invalid duration unit: {:?}", s))),
    }
}
