//! Shared test helpers for `tidewater-core` integration tests.
//!
//! These helpers provide in-memory fakes for every core port so scenario
//! tests can focus on behaviour instead of boilerplate.

#![allow(dead_code)]

pub mod bus;
pub mod crypto;
pub mod fixtures;
pub mod runner;
pub mod stores;
