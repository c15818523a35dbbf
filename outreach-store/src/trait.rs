use std::collections::HashMap;

use async_trait::async_trait;
use outreach_common::{FollowUpStatus, LeadStatus};

use crate::{FollowUp, FollowUpId, FollowUpQuery, Lead, LeadId, LeadPatch, LeadQuery};

/// Row store for leads.
///
/// Each call is atomic for a single row. No multi-row transactions are
/// offered; callers that need a precondition use
/// [`LeadPatch::when_status`].
#[async_trait]
pub trait LeadStore: Send + Sync + std::fmt::Debug {
    /// Add a lead, keeping its id.
    async fn insert(&self, lead: &Lead) -> crate::Result<LeadId>;

    async fn get(&self, id: &LeadId) -> crate::Result<Lead>;

    /// Matching leads in id (ingestion) order.
    async fn query(&self, query: &LeadQuery) -> crate::Result<Vec<Lead>>;

    /// Apply `patch` and return the updated row.
    ///
    /// Fails with [`StoreError::Conflict`](crate::StoreError::Conflict) if the
    /// patch carries an expected status that the row no longer has.
    async fn update(&self, id: &LeadId, patch: &LeadPatch) -> crate::Result<Lead>;

    async fn count(&self, query: &LeadQuery) -> crate::Result<usize> {
        Ok(self.query(query).await?.len())
    }

    async fn count_by_status(&self) -> crate::Result<HashMap<LeadStatus, usize>> {
        let mut counts: HashMap<_, _> = LeadStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for lead in self.query(&LeadQuery::default()).await? {
            *counts.entry(lead.status).or_default() += 1;
        }
        Ok(counts)
    }
}

/// Row store for scheduled follow-ups.
#[async_trait]
pub trait FollowUpStore: Send + Sync + std::fmt::Debug {
    /// Add a pending follow-up.
    ///
    /// Fails with [`StoreError::AlreadyExists`](crate::StoreError::AlreadyExists)
    /// if a pending follow-up for the same lead, stage and originating send exists.
    async fn insert_followup(&self, followup: &FollowUp) -> crate::Result<FollowUpId>;

    async fn get_followup(&self, id: &FollowUpId) -> crate::Result<FollowUp>;

    /// Matching follow-ups ordered by due date.
    async fn query_followups(&self, query: &FollowUpQuery) -> crate::Result<Vec<FollowUp>>;

    /// Move a pending follow-up to `status`.
    ///
    /// A follow-up that is already `sent` or `cancelled` is returned unchanged.
    async fn transition_followup(
        &self,
        id: &FollowUpId,
        status: FollowUpStatus,
        note: Option<String>,
    ) -> crate::Result<FollowUp>;
}

/// A backend holding both tables.
pub trait Store: LeadStore + FollowUpStore {}

impl<T: LeadStore + FollowUpStore + ?Sized> Store for T {}
