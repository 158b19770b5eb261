//! Expansion of pseudo-scopes (favorites, saved filters, link shares) into
//! the concrete options a searcher runs with.

use super::coerce::{compile_filter, resolve_timezone};
use super::error::SearchError;
use super::sort::resolve_sort;
use super::types::{SearchOptions, SearchScope, TaskSearchRequest};
use crate::auth::Principal;
use async_trait::async_trait;
use chrono_tz::Tz;
use std::sync::Arc;

/// Scope id of the virtual "favorites" project
pub const FAVORITES_PSEUDO_PROJECT_ID: i64 = -1;

/// Saved filter `n` is addressed as scope `-(n + 1)`
pub fn saved_filter_id_from_scope(scope: i64) -> Option<i64> {
    (scope < FAVORITES_PSEUDO_PROJECT_ID).then(|| -scope - 1)
}

pub fn scope_from_saved_filter_id(filter_id: i64) -> i64 {
    -(filter_id + 1)
}

/// Project permissions, owned by the surrounding application
#[async_trait]
pub trait ScopeAuthorizer: Send + Sync {
    async fn list_readable_projects(&self, principal: &Principal) -> anyhow::Result<Vec<i64>>;

    async fn can_read(&self, principal: &Principal, project_id: i64) -> anyhow::Result<bool>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavedFilter {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub filter: String,
    pub sort_by: Vec<String>,
    pub order_by: Vec<String>,
    pub include_nulls: bool,
    pub timezone: String,
}

#[async_trait]
pub trait SavedFilterStore: Send + Sync {
    async fn get_saved_filter(&self, id: i64) -> anyhow::Result<Option<SavedFilter>>;
}

pub struct ScopeResolver {
    authorizer: Arc<dyn ScopeAuthorizer>,
    saved_filters: Arc<dyn SavedFilterStore>,
    default_timezone: Tz,
    max_per_page: i64,
}

impl ScopeResolver {
    pub fn new(
        authorizer: Arc<dyn ScopeAuthorizer>,
        saved_filters: Arc<dyn SavedFilterStore>,
        default_timezone: Tz,
        max_per_page: i64,
    ) -> Self {
        Self {
            authorizer,
            saved_filters,
            default_timezone,
            max_per_page,
        }
    }

    /// Turn a caller request into immutable search options
    pub async fn resolve(
        &self,
        principal: &Principal,
        request: TaskSearchRequest,
    ) -> Result<SearchOptions, SearchError> {
        let (request, stored_timezone) = self.expand_saved_filter(principal, request).await?;

        let timezone = self.request_timezone(principal, &request, stored_timezone.as_deref())?;
        let scope = self.resolve_scope(principal, request.scope).await?;
        let filter = compile_filter(&request.filter, timezone)?;
        let sort = resolve_sort(&request.sort_by, &request.order_by, request.project_view_id)?;

        let per_page = if request.per_page < 1 {
            self.max_per_page
        } else {
            request.per_page.min(self.max_per_page)
        };
        // Keeps the row offset within i64
        let page = request.page.clamp(1, i64::MAX / per_page.max(1));

        Ok(SearchOptions {
            filter,
            sort,
            scope,
            include_nulls: request.include_nulls,
            timezone,
            search: request.search.trim().to_string(),
            page,
            per_page,
        })
    }

    /// Replace a saved-filter scope with the stored filter, merged with
    /// whatever the caller supplied. The returned request has no scope, so
    /// it resolves like a plain search over every readable project.
    async fn expand_saved_filter(
        &self,
        principal: &Principal,
        mut request: TaskSearchRequest,
    ) -> Result<(TaskSearchRequest, Option<String>), SearchError> {
        let Some(filter_id) = request.scope.and_then(saved_filter_id_from_scope) else {
            return Ok((request, None));
        };
        // Link shares are pinned to their project regardless of scope
        let Some(user) = principal.user() else {
            return Ok((request, None));
        };

        let saved = self
            .saved_filters
            .get_saved_filter(filter_id)
            .await
            .map_err(SearchError::Database)?
            .filter(|f| f.owner_id == user.id)
            .ok_or(SearchError::SavedFilterNotFound { id: filter_id })?;

        tracing::debug!("Expanding saved filter {} ({})", saved.id, saved.title);

        request.filter = match (saved.filter.trim(), request.filter.trim()) {
            ("", caller) => caller.to_string(),
            (stored, "") => stored.to_string(),
            (stored, caller) => format!("({}) && ({})", stored, caller),
        };

        let mut sort_by = Vec::with_capacity(request.sort_by.len() + saved.sort_by.len());
        let mut order_by = Vec::with_capacity(sort_by.capacity());
        for (i, field) in request.sort_by.iter().enumerate() {
            sort_by.push(field.clone());
            order_by.push(request.order_by.get(i).cloned().unwrap_or_default());
        }
        for (i, field) in saved.sort_by.iter().enumerate() {
            if sort_by.iter().any(|f| f.eq_ignore_ascii_case(field)) {
                continue;
            }
            sort_by.push(field.clone());
            order_by.push(saved.order_by.get(i).cloned().unwrap_or_default());
        }
        request.sort_by = sort_by;
        request.order_by = order_by;

        request.include_nulls |= saved.include_nulls;
        request.scope = None;

        Ok((request, Some(saved.timezone)))
    }

    /// Caller timezone, then profile timezone, then the saved filter's, then
    /// the configured default
    fn request_timezone(
        &self,
        principal: &Principal,
        request: &TaskSearchRequest,
        stored_timezone: Option<&str>,
    ) -> Result<Tz, SearchError> {
        if !request.filter_timezone.trim().is_empty() {
            return resolve_timezone(&request.filter_timezone, self.default_timezone);
        }

        let candidates = principal
            .user()
            .map(|u| u.timezone.as_str())
            .into_iter()
            .chain(stored_timezone);
        for candidate in candidates {
            if candidate.trim().is_empty() {
                continue;
            }
            match resolve_timezone(candidate, self.default_timezone) {
                Ok(tz) => return Ok(tz),
                Err(e) => tracing::warn!("Ignoring stored timezone: {}", e),
            }
        }

        Ok(self.default_timezone)
    }

    async fn resolve_scope(
        &self,
        principal: &Principal,
        scope: Option<i64>,
    ) -> Result<SearchScope, SearchError> {
        if let Principal::LinkShare(share) = principal {
            return Ok(SearchScope::projects(vec![share.project_id]));
        }

        match scope {
            None => {
                let projects = self
                    .authorizer
                    .list_readable_projects(principal)
                    .await
                    .map_err(SearchError::Database)?;
                Ok(SearchScope::projects(projects))
            }
            Some(FAVORITES_PSEUDO_PROJECT_ID) => match principal.user() {
                Some(user) => Ok(SearchScope::favorites(user.id)),
                None => Err(SearchError::ScopeNotReadable {
                    scope: FAVORITES_PSEUDO_PROJECT_ID,
                }),
            },
            Some(project_id) if project_id >= 0 => {
                let readable = self
                    .authorizer
                    .can_read(principal, project_id)
                    .await
                    .map_err(SearchError::Database)?;
                if readable {
                    Ok(SearchScope::projects(vec![project_id]))
                } else {
                    Err(SearchError::ScopeNotReadable { scope: project_id })
                }
            }
            // Saved filters were expanded before we got here
            Some(other) => Err(SearchError::ScopeNotReadable { scope: other }),
        }
    }
}
