//! Device automation runtime: endpoint abstraction and HTTP transport.
//!
//! This crate provides the low-level layer between the orchestration core
//! and a remote automation server:
//!
//! - **Endpoint**: the [`Endpoint`] trait (open / set-default-wait / reset / close / execute)
//! - **Handle**: [`RemoteHandle`], the exclusive reference to one remote session
//! - **Transport**: [`WebDriverEndpoint`], W3C WebDriver / Appium over HTTP
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │   devsess   │  Session, supervisor, retry, reporting
//! └──────┬──────┘
//!        │ depends on Endpoint only
//! ┌──────▼──────┐
//! │   runtime   │  This crate
//! │  ┌────────┐ │
//! │  │Endpoint│ │  Trait seam
//! │  └────────┘ │
//! │  ┌────────┐ │
//! │  │WebDrvr │ │  HTTP transport
//! │  └────────┘ │
//! └─────────────┘
//! ```

pub mod endpoint;
pub mod error;
pub mod webdriver;

pub use endpoint::{Endpoint, RemoteHandle};
pub use error::{Error, Result};
pub use webdriver::WebDriverEndpoint;
