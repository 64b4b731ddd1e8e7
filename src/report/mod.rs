//! Report renderers for vendoring scan results.
//!
//! - [`terminal`] — colored, tabular output with a summary box; respects
//!   `--verbose` / `--quiet`.

pub mod terminal;
