//! Built-in backend descriptors.
//!
//! Each backend module exposes its registry name and the element types its
//! array constructor accepts. [`crate::registry::Registry::standard`] turns
//! them into registry entries.

pub mod plain;
pub mod symbolic;
