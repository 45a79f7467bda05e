//! Demand partner adapters.
//!
//! Each partner module exposes a `register_adapters` builder that the
//! auction catalog calls with the loaded settings.

pub mod rubicon;
