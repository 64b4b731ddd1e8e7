//! License policy decisions for vendored packages.
//!
//! - [`classifier`] — decides whether a single package's declared license
//!   expression or pinned license file is acceptable under the
//!   [`Policy`](crate::config::Policy) tables.

pub mod classifier;
