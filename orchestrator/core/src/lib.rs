// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Qlik Orchestrator Core
//!
//! Lifecycle orchestration for Qlik Sense apps on top of `qlik-cli`:
//! decomposition (unbuild) and recomposition (build), export, import, copy
//! and publish, with pre-validation, verification and cleanup of partial
//! artifacts.
//!
//! # Architecture
//!
//! - **Layer:** Core System

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
