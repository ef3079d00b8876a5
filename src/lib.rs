//! Prerequisite dependency resolution and execution planning for test suites.
//!
//! Test cases carry prerequisites: setup profiles, other tests, state-setup
//! and cleanup actions. This crate turns them into a dependency graph,
//! validates it, orders it, fixes common suite mistakes and caches
//! expensive prerequisite runs.

pub mod cache;
pub mod cli;
pub mod config;
pub mod emit;
pub mod engine;
pub mod fix;
pub mod graph;
pub mod logging;
pub mod model;
pub mod plan;
pub mod runner;
pub mod store;
pub mod validate;

#[cfg(test)]
mod testing;
