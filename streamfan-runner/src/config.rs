//! Serializable launch configuration.
//!
//! A [`LaunchConfig`] is built once at startup, either from command-line
//! flags or from a TOML file, validated, and then only ever borrowed.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use streamfan_core::{BindTarget, Endpoint, EndpointError, StreamerOptions};
use thiserror::Error;

/// Errors from loading or validating a launch configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("thread count must be at least 1")]
    NoThreads,

    #[error("{which} program name must not be empty")]
    EmptyProgram { which: &'static str },

    #[error("{threads} instances do not fit the destination range: {source}")]
    DestinationRange {
        threads: usize,
        #[source]
        source: EndpointError,
    },
}

/// Where each instance's input file comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileSource {
    /// Every instance streams the same file.
    File(PathBuf),
    /// Each instance elects a file from a weighted CSV manifest.
    Manifest(PathBuf),
}

/// Everything needed to plan and launch a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// PCR PID passed to the ingest step.
    #[serde(default = "default_pcr_pid")]
    pub pcr_pid: u16,

    /// Number of streamer instances (and worker pool size).
    #[serde(default = "default_threads")]
    pub threads: usize,

    #[serde(default = "default_connect_ip")]
    pub connect_ip: Ipv4Addr,

    #[serde(default = "default_connect_port")]
    pub connect_port: u16,

    /// Bind address; `false` in TOML means no bind suffix at all.
    #[serde(default = "default_bind_ip", with = "bind_ip_or_false")]
    pub bind_ip: Option<Ipv4Addr>,

    #[serde(default)]
    pub bind_port: Option<u16>,

    /// Delay before each submission, in milliseconds.
    #[serde(default = "default_stagger_ms")]
    pub stagger_ms: u64,

    /// Advance the last octet of the connect address per instance.
    #[serde(default)]
    pub increment_ip: bool,

    /// Advance the connect port per instance.
    #[serde(default)]
    pub increment_port: bool,

    /// Restart the streamer every time it exits cleanly.
    #[serde(default)]
    pub loop_playback: bool,

    #[serde(default = "default_streamer_bin")]
    pub streamer_bin: String,

    #[serde(default = "default_ingest_bin")]
    pub ingest_bin: String,

    /// Run the ingest step for files without an `.aux` index.
    #[serde(default = "default_true")]
    pub ingest: bool,

    /// Seed for file elections; entropy-seeded when absent.
    #[serde(default)]
    pub seed: Option<u64>,

    // Table-valued fields must stay last for TOML serialization.
    pub source: FileSource,

    #[serde(default)]
    pub streamer: StreamerOptions,
}

fn default_pcr_pid() -> u16 {
    33
}

fn default_threads() -> usize {
    1
}

fn default_connect_ip() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}

fn default_connect_port() -> u16 {
    5001
}

fn default_bind_ip() -> Option<Ipv4Addr> {
    Some(Ipv4Addr::new(10, 10, 111, 2))
}

/// TOML has no null, so a disabled bind address is written as `false`.
mod bind_ip_or_false {
    use std::net::Ipv4Addr;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Address(String),
        Enabled(bool),
    }

    pub fn serialize<S: Serializer>(value: &Option<Ipv4Addr>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(ip) => s.collect_str(ip),
            None => s.serialize_bool(false),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Ipv4Addr>, D::Error> {
        match Repr::deserialize(d)? {
            Repr::Address(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("invalid bind_ip address '{raw}'"))),
            Repr::Enabled(false) => Ok(None),
            Repr::Enabled(true) => Err(D::Error::custom(
                "bind_ip must be an IPv4 address or false",
            )),
        }
    }
}

fn default_stagger_ms() -> u64 {
    500
}

fn default_streamer_bin() -> String {
    "multicat".to_string()
}

fn default_ingest_bin() -> String {
    "ingests".to_string()
}

fn default_true() -> bool {
    true
}

impl LaunchConfig {
    /// A configuration with every option at its default.
    pub fn new(source: FileSource) -> Self {
        Self {
            source,
            pcr_pid: default_pcr_pid(),
            threads: default_threads(),
            connect_ip: default_connect_ip(),
            connect_port: default_connect_port(),
            bind_ip: default_bind_ip(),
            bind_port: None,
            stagger_ms: default_stagger_ms(),
            increment_ip: false,
            increment_port: false,
            loop_playback: false,
            streamer: StreamerOptions::default(),
            streamer_bin: default_streamer_bin(),
            ingest_bin: default_ingest_bin(),
            ingest: true,
            seed: None,
        }
    }

    /// Load and validate a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration can be launched as-is.
    ///
    /// The destination of the last instance must still be a valid address
    /// and port once per-instance increments are applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::NoThreads);
        }
        if self.streamer_bin.trim().is_empty() {
            return Err(ConfigError::EmptyProgram { which: "streamer" });
        }
        if self.ingest && self.ingest_bin.trim().is_empty() {
            return Err(ConfigError::EmptyProgram { which: "ingest" });
        }
        self.connect()
            .offset(self.threads - 1, self.increment_ip, self.increment_port)
            .map_err(|source| ConfigError::DestinationRange {
                threads: self.threads,
                source,
            })?;
        Ok(())
    }

    /// Base connect endpoint (instance 0).
    pub fn connect(&self) -> Endpoint {
        Endpoint::new(self.connect_ip, self.connect_port)
    }

    pub fn bind(&self) -> BindTarget {
        BindTarget {
            ip: self.bind_ip,
            port: self.bind_port,
        }
    }

    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }

    pub fn uses_manifest(&self) -> bool {
        matches!(self.source, FileSource::Manifest(_))
    }
}
