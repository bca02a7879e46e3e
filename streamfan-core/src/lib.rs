//! Streamfan Core: the pieces every launch is built from.
//!
//! This crate contains:
//! - Weighted file election with per-identifier selection accounting
//! - Manifest loading (CSV rows of `identifier,weight`)
//! - Connect/bind endpoint arithmetic for per-instance destinations
//! - Streamer flag validation and argument-vector construction
//! - Ingest (auxiliary index) detection and command construction

pub mod command;
pub mod election;
pub mod endpoint;
pub mod ingest;
pub mod manifest;

pub use command::{FlagError, StreamerFlag, StreamerInvocation, StreamerOptions, ALLOWED_FLAGS};
pub use election::{ElectionError, WeightedCollection, WeightedItem, MAX_TOTAL_WEIGHT};
pub use endpoint::{increment_ip, increment_port, BindTarget, Endpoint, EndpointError};
pub use ingest::{aux_path_for, IngestInvocation};
pub use manifest::{load_manifest, parse_manifest, ManifestError};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: values handed to worker threads are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<WeightedCollection>();
        require_sync::<WeightedCollection>();
        require_send::<StreamerInvocation>();
        require_sync::<StreamerInvocation>();
        require_send::<IngestInvocation>();
        require_sync::<IngestInvocation>();
        require_send::<Endpoint>();
        require_sync::<Endpoint>();
    }
}
