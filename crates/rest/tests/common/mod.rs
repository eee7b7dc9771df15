//! Common test utilities for adapter testing.
//!
//! - [`harness`] - In-memory fake transport
//! - [`fixtures`] - Resource models and records

#![allow(dead_code)]

pub mod fixtures;
pub mod harness;
