//! Authenticated REST request pipeline: refresh-token lifecycle, response classification,
//! rate-limit aware retries, and proactive quota throttling over a pluggable transport.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod classify;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod obs;
pub mod request;
pub mod retry;
pub mod throttle;

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use oauth2::http::{HeaderMap, HeaderValue, Method, StatusCode};
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
