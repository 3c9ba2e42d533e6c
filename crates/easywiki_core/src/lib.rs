//! Blocking client for the MediaWiki Action API.
//!
//! ```no_run
//! use easywiki_core::{ClientConfig, Params, WikiClient};
//!
//! let config = ClientConfig::new("https://wiki.example.org/w/api.php")
//!     .with_credentials("Bot@task", "bot-password");
//! let mut wiki = WikiClient::connect(&config)?;
//! let text = wiki.get_wikitext("Main Page", Params::new())?;
//! wiki.append("Sandbox", "\n* appended", Params::new().with("summary", "test"), "")?;
//! # let _ = text;
//! # Ok::<(), easywiki_core::Error>(())
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod navigator;
pub mod params;
pub mod transport;

pub use client::{SessionState, WikiClient};
pub use config::{ClientConfig, Credentials, WikiConfig, load_config};
pub use error::{Error, Result};
pub use params::{PageRef, ParamValue, Params};
pub use transport::{HttpMethod, HttpTransport, Transport, TransportError};
