//! devserve - development server for single-page apps.
//!
//! Wraps a bundler's output in an HTTP server that reloads browsers on
//! rebuilds, forwards API calls to a backend and can interpose a server-side
//! render hook.
//!
//! # Architecture
//!
//! - [`config`] - layered settings plus `package.json`, frozen per session
//! - [`port`] - free-port detection and the "use another port?" prompt
//! - [`urls`] - local and LAN URLs for the chosen endpoint
//! - [`proxy`] - proxy declarations turned into rules, and forwarding
//! - [`features`] - ordering of the request pipeline stages
//! - [`compiler`] - the bundler seam and its terminal reporting
//! - [`server`] - the lifecycle state machine and the request pipeline
//! - [`preflight`] - checks that run before anything listens
//! - [`error`], [`logger`], [`ui`] - ambient plumbing
//!
//! # Example
//!
//! ```rust
//! use devserve::features::{select_plan, Feature, FeatureFlags};
//!
//! let plan = select_plan(&FeatureFlags {
//!     compress: true,
//!     ..FeatureFlags::default()
//! });
//! assert_eq!(plan.features().first(), Some(&Feature::Compress));
//! ```

pub mod browser;
pub mod cli;
pub mod commands;
pub mod compiler;
pub mod config;
pub mod error;
pub mod features;
pub mod logger;
pub mod port;
pub mod preflight;
pub mod proxy;
pub mod server;
pub mod ui;
pub mod urls;
pub mod watcher;

pub use error::{ConfigError, DevServerError, Result, ResultExt};
