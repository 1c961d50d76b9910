//! Core plumbing for tigo-rs.
//!
//! This crate holds everything the Tigo API client needs below the level of
//! individual endpoints:
//!
//! - **Configuration**: `TigoConfig` with serde defaults and `TIGO_*`
//!   environment overrides, plus `Credentials`
//! - **Authentication**: `TigoAuthenticator` performs the Basic-auth login,
//!   keeps the bearer token and renews it after a `401`
//! - **Transport**: `ApiTransport` issues authenticated GETs with retries,
//!   backoff and conditional requests
//! - **Cache**: `ResponseCache` keeps recent bodies with their validators
//! - **Errors**: `TigoError` shared by all tigo-rs crates
//!
//! # Examples
//!
//! ```no_run
//! use tigo_core::{ApiTransport, Credentials, TigoConfig};
//!
//! # async fn example() -> tigo_core::Result<()> {
//! let transport = ApiTransport::new(Credentials::from_env()?, TigoConfig::from_env()?)?;
//! let body = transport.get_text("/systems", &[]).await?;
//! println!("{}", body);
//! transport.auth().logout().await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod transport;

pub use auth::{Session, TigoAuthenticator};
pub use cache::{CachedResponse, ResponseCache};
pub use config::{CacheConfig, Credentials, RangeLimits, TigoConfig};
pub use error::{Result, TigoError};
pub use transport::ApiTransport;
