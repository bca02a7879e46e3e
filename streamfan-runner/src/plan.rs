//! Launch planning: turns a [`LaunchConfig`] into one [`LaunchJob`] per instance.
//!
//! Jobs are produced one at a time by the coordinating thread. When the
//! config names a manifest, each job elects its file right before it is
//! handed to the pool, so elections are strictly sequential.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use streamfan_core::{
    load_manifest, BindTarget, ElectionError, Endpoint, EndpointError, IngestInvocation,
    ManifestError, StreamerInvocation, WeightedCollection,
};
use thiserror::Error;

use crate::config::{FileSource, LaunchConfig};

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("file election failed: {0}")]
    Election(#[from] ElectionError),

    #[error("destination error: {0}")]
    Endpoint(#[from] EndpointError),
}

/// Files available to the planner.
#[derive(Debug, Clone)]
pub enum FileChoice {
    Single(String),
    Weighted(WeightedCollection),
}

/// Everything one worker needs to run one streamer instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchJob {
    /// 1-based instance number.
    pub thread_no: usize,
    pub file: String,
    pub connect: Endpoint,
    pub bind: BindTarget,
    pub streamer: StreamerInvocation,
    /// Present when the ingest step is enabled.
    pub ingest: Option<IngestInvocation>,
}

/// Produces the jobs of a run, in order.
pub struct LaunchPlanner<'a> {
    config: &'a LaunchConfig,
    files: FileChoice,
    rng: StdRng,
    next_index: usize,
}

impl<'a> LaunchPlanner<'a> {
    pub fn new(config: &'a LaunchConfig, files: FileChoice) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            files,
            rng,
            next_index: 0,
        }
    }

    /// Resolve the config's file source, loading the manifest if there is one.
    ///
    /// An empty manifest fails here, before any job exists.
    pub fn from_config(config: &'a LaunchConfig) -> Result<Self, PlanError> {
        let files = match &config.source {
            FileSource::File(path) => FileChoice::Single(path.to_string_lossy().into_owned()),
            FileSource::Manifest(path) => {
                let collection = load_manifest(path)?;
                if collection.is_empty() {
                    return Err(PlanError::Election(ElectionError::Empty));
                }
                log::debug!(
                    "loaded manifest {} ({} entries, total weight {})",
                    path.display(),
                    collection.len(),
                    collection.total_weight()
                );
                FileChoice::Weighted(collection)
            }
        };
        Ok(Self::new(config, files))
    }

    pub fn config(&self) -> &'a LaunchConfig {
        self.config
    }

    /// Jobs not yet produced.
    pub fn remaining(&self) -> usize {
        self.config.threads.saturating_sub(self.next_index)
    }

    /// Produce the next job, or `None` once every instance has been planned.
    pub fn next_job(&mut self) -> Result<Option<LaunchJob>, PlanError> {
        if self.remaining() == 0 {
            return Ok(None);
        }
        let index = self.next_index;
        let connect = self.config.connect().offset(
            index,
            self.config.increment_ip,
            self.config.increment_port,
        )?;
        let file = match &mut self.files {
            FileChoice::Single(file) => file.clone(),
            FileChoice::Weighted(collection) => collection.elect_with(&mut self.rng)?,
        };

        let bind = self.config.bind();
        let streamer = StreamerInvocation::new(
            &self.config.streamer_bin,
            &self.config.streamer,
            &file,
            connect,
            bind,
        );
        let ingest = self
            .config
            .ingest
            .then(|| IngestInvocation::new(&self.config.ingest_bin, self.config.pcr_pid, &file));

        self.next_index += 1;
        Ok(Some(LaunchJob {
            thread_no: index + 1,
            file,
            connect,
            bind,
            streamer,
            ingest,
        }))
    }

    /// Election tallies so far; `None` when no manifest is in use.
    pub fn selections(&self) -> Option<&BTreeMap<String, u64>> {
        match &self.files {
            FileChoice::Single(_) => None,
            FileChoice::Weighted(collection) => Some(collection.selections()),
        }
    }
}
