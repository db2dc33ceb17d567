// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod catalog;
pub mod contexts;
pub mod decomposition;
pub mod directory_resolver;
pub mod gateway;
pub mod lifecycle;
pub mod partial_artifact;
pub mod result_assembler;

// Re-export use cases for convenience
pub use catalog::{CatalogService, SearchResults};
pub use contexts::{ContextList, ContextService};
pub use decomposition::{
    BuildFromDirectoryRequest, BuildOptions, BuildReport, BuildRequest, DecompositionService, UnbuildOutput,
    UnbuildRequest,
};
pub use directory_resolver::{DirectoryResolver, ResolvedPath};
pub use gateway::{AppListQuery, QlikGateway};
pub use lifecycle::{LifecycleOrchestrator, LifecycleResult};
pub use result_assembler::{assemble_decomposition, assemble_failure, assemble_outcome, StructuredResult};
