//! Definitions included by all the files in this crate.
//!
//! This forms the dialect of Rust we use for implementing the engine and its
//! adapters, with an emphasis on `tokio`, `anyhow` and structured logging via
//! `tracing`.

#[allow(unused_imports)]
pub(crate) use anyhow::{format_err, Context as _};
#[allow(unused_imports)]
pub(crate) use async_trait::async_trait;
#[allow(unused_imports)]
pub(crate) use bytes::Bytes;
#[allow(unused_imports)]
pub(crate) use tracing::{debug, error, instrument, trace};

pub(crate) use crate::{Error, Result};
