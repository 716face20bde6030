// # Record Source Implementations
//
// Sources that ship with the core. Sources that need an external API
// live in their own crates.

pub mod static_list;

pub use static_list::{StaticRecordSource, StaticSourceFactory};
