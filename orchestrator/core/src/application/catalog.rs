// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! App and space discovery use cases.

use serde::Serialize;

use crate::application::gateway::{AppListQuery, QlikGateway};
use crate::domain::catalog::{search_apps, AppRecord, SearchFilters, SearchHit, SpaceRecord, SpaceType};
use crate::domain::errors::{OrchestratorError, OrchestratorResult};

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub hits: Vec<SearchHit>,
    /// How many apps were scanned
    pub searched: usize,
}

pub struct CatalogService {
    gateway: QlikGateway,
}

impl CatalogService {
    pub fn new(gateway: QlikGateway) -> Self {
        Self { gateway }
    }

    pub async fn list_apps(&self, query: AppListQuery) -> OrchestratorResult<Vec<AppRecord>> {
        let apps = self.gateway.list_apps(&query).await?;
        tracing::info!(count = apps.len(), space = ?query.space_id, "Listed apps");
        Ok(apps)
    }

    pub async fn get_app(&self, app_id: &str) -> OrchestratorResult<AppRecord> {
        self.gateway.get_app(app_id).await
    }

    /// Relevance search. The CLI has no server-side search, so a wider page
    /// of apps is listed and matched locally.
    pub async fn search_apps(
        &self,
        query: &str,
        filters: SearchFilters,
        limit: usize,
    ) -> OrchestratorResult<SearchResults> {
        if query.trim().is_empty() {
            return Err(OrchestratorError::invalid_request("Search query cannot be empty"));
        }

        let scan = (limit.saturating_mul(5)).max(100) as u32;
        let apps = self
            .gateway
            .list_apps(&AppListQuery {
                limit: Some(scan),
                ..Default::default()
            })
            .await?;

        let hits = search_apps(&apps, query, &filters, limit);
        tracing::info!(query = %query, hits = hits.len(), searched = apps.len(), "Searched apps");
        Ok(SearchResults {
            query: query.to_string(),
            hits,
            searched: apps.len(),
        })
    }

    pub async fn list_spaces(&self, space_type: Option<SpaceType>) -> OrchestratorResult<Vec<SpaceRecord>> {
        self.gateway.list_spaces(space_type).await
    }
}
