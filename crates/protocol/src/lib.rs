//! Wire types for the remote device automation protocol.
//!
//! This crate contains the serde-serializable shapes exchanged with an
//! Appium-style automation server over W3C WebDriver HTTP:
//!
//! - **Platform**: the closed set of supported device platforms
//! - **Capabilities**: the validated capability set sent on session creation
//! - **Wire envelopes**: `{"value": ...}` responses, error payloads and raw commands
//!
//! Types here are pure data. Session lifecycle lives in `devsess-runtime`
//! (transport) and `devsess` (orchestration).

pub mod capabilities;
pub mod types;
pub mod wire;

pub use capabilities::*;
pub use types::*;
pub use wire::*;
