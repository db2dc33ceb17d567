// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Pure model of the orchestrator: decomposed artifacts, classification,
//! lifecycle requests and states, the tool invocation contract, catalog
//! records, configuration and errors. Nothing here spawns processes.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer

pub mod artifact;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod errors;
pub mod invocation;
pub mod lifecycle;
pub mod path_sanitizer;
pub mod resources;
