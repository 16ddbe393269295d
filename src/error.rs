//! Crate-level error type.
//!
//! Each module defines its own focused error enum; [`Error`] wraps them for
//! callers that drive a whole pipeline run and do not care which layer
//! failed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Vision(#[from] crate::vision::VisionError),

    #[error(transparent)]
    Store(#[from] crate::store::StoreError),

    #[error(transparent)]
    Parse(#[from] crate::attrs::ParseError),

    #[error(transparent)]
    Recon(#[from] crate::recon::ReconError),

    #[error(transparent)]
    Fetch(#[from] crate::pipeline::FetchError),
}
