//! Wire types for quill.
//!
//! This crate contains the serde-serializable types shared between the
//! automation core, the CDP runtime and the HTTP surface:
//!
//! * [`cdp`]: Chrome DevTools Protocol request/response/event envelopes
//! * [`cookie`]: cookies captured from and restored into a browser
//! * [`session`]: persisted session status and user data
//! * [`api`]: request and response bodies of the HTTP surface
//! * [`envelope`]: the `{ok, op, data, error}` result wrapper and error codes
//!
//! Types in this crate are pure data. Behavior lives in `quill-runtime` and
//! `quill-core`.

pub mod api;
pub mod cdp;
pub mod cookie;
pub mod envelope;
pub mod session;

pub use api::*;
pub use cdp::*;
pub use cookie::*;
pub use envelope::*;
pub use session::*;
