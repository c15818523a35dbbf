use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use chrono::Utc;
use outreach_common::FollowUpStatus;

use crate::{
    FollowUp, FollowUpId, FollowUpQuery, Lead, LeadId, LeadPatch, LeadQuery, StoreError,
    r#trait::{FollowUpStore, LeadStore},
};

#[derive(Debug, Default)]
pub(crate) struct Tables {
    pub(crate) leads: HashMap<LeadId, Lead>,
    pub(crate) followups: HashMap<FollowUpId, FollowUp>,
}

/// In-memory lead store
///
/// Both tables live behind one `RwLock`, so every row operation is atomic and
/// a conditional update observes the same state it writes to. Suitable for
/// tests and short-lived runs; use the file backend to survive restarts.
///
/// # Capacity Management
/// An optional lead limit turns an unbounded table into a bounded one.
/// Inserting past the limit fails with `CapacityExceeded`.
#[derive(Debug, Clone, Default)]
pub struct MemoryLeadStore {
    pub(crate) tables: Arc<RwLock<Tables>>,
    capacity: Option<usize>,
}

impl MemoryLeadStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tables: Arc::default(),
            capacity: Some(capacity),
        }
    }

    pub(crate) fn from_tables(tables: Tables, capacity: Option<usize>) -> Self {
        Self {
            tables: Arc::new(RwLock::new(tables)),
            capacity,
        }
    }

    /// Number of leads held. Recovers the data from a poisoned lock.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .leads
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub(crate) fn snapshot(&self) -> crate::Result<(Vec<Lead>, Vec<FollowUp>)> {
        let tables = self.tables.read()?;
        let mut leads: Vec<_> = tables.leads.values().cloned().collect();
        let mut followups: Vec<_> = tables.followups.values().cloned().collect();
        leads.sort_by_key(|lead| lead.id);
        followups.sort_by_key(|followup| followup.id);
        Ok((leads, followups))
    }

    /// Put lead `id` back to `previous`, removing it when `None`.
    pub(crate) fn restore_lead(&self, id: LeadId, previous: Option<Lead>) -> crate::Result<()> {
        let mut tables = self.tables.write()?;
        match previous {
            Some(lead) => tables.leads.insert(id, lead),
            None => tables.leads.remove(&id),
        };
        Ok(())
    }

    /// Put follow-up `id` back to `previous`, removing it when `None`.
    pub(crate) fn restore_followup(
        &self,
        id: FollowUpId,
        previous: Option<FollowUp>,
    ) -> crate::Result<()> {
        let mut tables = self.tables.write()?;
        match previous {
            Some(followup) => tables.followups.insert(id, followup),
            None => tables.followups.remove(&id),
        };
        Ok(())
    }
}

#[async_trait]
impl LeadStore for MemoryLeadStore {
    async fn insert(&self, lead: &Lead) -> crate::Result<LeadId> {
        let mut tables = self.tables.write()?;

        if tables.leads.contains_key(&lead.id) {
            return Err(StoreError::AlreadyExists(lead.id.to_string()));
        }

        if let Some(capacity) = self.capacity
            && tables.leads.len() >= capacity
        {
            return Err(StoreError::CapacityExceeded {
                current: tables.leads.len(),
                capacity,
            });
        }

        tables.leads.insert(lead.id, lead.clone());
        Ok(lead.id)
    }

    async fn get(&self, id: &LeadId) -> crate::Result<Lead> {
        self.tables
            .read()?
            .leads
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn query(&self, query: &LeadQuery) -> crate::Result<Vec<Lead>> {
        let mut leads: Vec<_> = self
            .tables
            .read()?
            .leads
            .values()
            .filter(|lead| query.matches(lead))
            .cloned()
            .collect();

        leads.sort_by_key(|lead| lead.id);

        Ok(leads)
    }

    async fn update(&self, id: &LeadId, patch: &LeadPatch) -> crate::Result<Lead> {
        let mut tables = self.tables.write()?;
        let lead = tables
            .leads
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Some(expected) = patch.expected_status
            && lead.status != expected
        {
            return Err(StoreError::Conflict {
                id: id.to_string(),
                expected,
                actual: lead.status,
            });
        }

        patch.apply(lead);
        lead.updated_at = Utc::now();

        Ok(lead.clone())
    }
}

#[async_trait]
impl FollowUpStore for MemoryLeadStore {
    async fn insert_followup(&self, followup: &FollowUp) -> crate::Result<FollowUpId> {
        let mut tables = self.tables.write()?;

        let duplicate = tables.followups.values().any(|existing| {
            existing.id == followup.id
                || (existing.status == FollowUpStatus::Pending && existing.same_origin(followup))
        });
        if duplicate {
            return Err(StoreError::AlreadyExists(format!(
                "{} follow-up for lead {}",
                followup.stage, followup.lead_id
            )));
        }

        tables.followups.insert(followup.id, followup.clone());
        Ok(followup.id)
    }

    async fn get_followup(&self, id: &FollowUpId) -> crate::Result<FollowUp> {
        self.tables
            .read()?
            .followups
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn query_followups(&self, query: &FollowUpQuery) -> crate::Result<Vec<FollowUp>> {
        let mut followups: Vec<_> = self
            .tables
            .read()?
            .followups
            .values()
            .filter(|followup| query.matches(followup))
            .cloned()
            .collect();

        followups.sort_by_key(|followup| (followup.due_at, followup.id));

        Ok(followups)
    }

    async fn transition_followup(
        &self,
        id: &FollowUpId,
        status: FollowUpStatus,
        note: Option<String>,
    ) -> crate::Result<FollowUp> {
        let mut tables = self.tables.write()?;
        let followup = tables
            .followups
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if followup.status.is_terminal() {
            return Ok(followup.clone());
        }

        followup.status = status;
        if note.is_some() {
            followup.note = note;
        }
        followup.updated_at = Utc::now();

        Ok(followup.clone())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use outreach_common::{EmailType, FollowUpStage, LeadStatus};

    use super::*;

    fn lead(email: &str) -> Lead {
        Lead::new(Some(email.to_string()))
    }

    #[tokio::test]
    async fn test_memory_store_basic_operations() {
        let store = MemoryLeadStore::new();
        let lead = lead("a@example.com");

        let id = store.insert(&lead).await.expect("Failed to insert");
        assert_eq!(id, lead.id);

        let read = store.get(&id).await.expect("Failed to read");
        assert_eq!(read.email.as_deref(), Some("a@example.com"));
        assert_eq!(read.status, LeadStatus::New);

        let updated = store
            .update(&id, &LeadPatch::new().status(LeadStatus::Scheduled))
            .await
            .expect("Failed to update");
        assert_eq!(updated.status, LeadStatus::Scheduled);
        assert_eq!(store.get(&id).await.unwrap().status, LeadStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = MemoryLeadStore::new();
        let lead = lead("a@example.com");

        store.insert(&lead).await.unwrap();
        let err = store.insert(&lead).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_missing_lead() {
        let store = MemoryLeadStore::new();
        let err = store.get(&LeadId::generate()).await.unwrap_err();
        assert!(err.is_not_found());

        let err = store
            .update(&LeadId::generate(), &LeadPatch::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_conditional_update() {
        let store = MemoryLeadStore::new();
        let id = store.insert(&lead("a@example.com")).await.unwrap();

        let err = store
            .update(
                &id,
                &LeadPatch::new()
                    .when_status(LeadStatus::Sent)
                    .status(LeadStatus::Scheduled),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict {
                expected: LeadStatus::Sent,
                actual: LeadStatus::New,
                ..
            }
        ));
        assert_eq!(store.get(&id).await.unwrap().status, LeadStatus::New);
    }

    #[tokio::test]
    async fn test_capacity_limit() {
        let store = MemoryLeadStore::with_capacity(2);

        store.insert(&lead("a@example.com")).await.unwrap();
        store.insert(&lead("b@example.com")).await.unwrap();

        let err = store.insert(&lead("c@example.com")).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::CapacityExceeded {
                current: 2,
                capacity: 2
            }
        ));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_count_by_status() {
        let store = MemoryLeadStore::new();
        let now = Utc::now();

        store.insert(&lead("a@example.com")).await.unwrap();
        store
            .insert(&lead("b@example.com").scheduled(EmailType::Initial, now))
            .await
            .unwrap();
        store
            .insert(&lead("c@example.com").scheduled(EmailType::Initial, now))
            .await
            .unwrap();

        let counts = store.count_by_status().await.unwrap();
        assert_eq!(counts[&LeadStatus::New], 1);
        assert_eq!(counts[&LeadStatus::Scheduled], 2);
        assert_eq!(counts[&LeadStatus::Bounced], 0);
    }

    #[tokio::test]
    async fn test_one_pending_followup_per_origin() {
        let store = MemoryLeadStore::new();
        let lead_id = LeadId::generate();
        let sent_at = Utc::now();

        let first = FollowUp::pending(
            lead_id,
            FollowUpStage::FiveDay,
            sent_at,
            None,
            sent_at + Duration::days(5),
        );
        store.insert_followup(&first).await.unwrap();

        let again = FollowUp::pending(
            lead_id,
            FollowUpStage::FiveDay,
            sent_at,
            None,
            sent_at + Duration::days(5),
        );
        assert!(matches!(
            store.insert_followup(&again).await,
            Err(StoreError::AlreadyExists(_))
        ));

        let other_stage = FollowUp::pending(
            lead_id,
            FollowUpStage::TenDay,
            sent_at,
            None,
            sent_at + Duration::days(10),
        );
        store.insert_followup(&other_stage).await.unwrap();

        let pending = store
            .query_followups(&FollowUpQuery::pending().for_lead(lead_id))
            .await
            .unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].stage, FollowUpStage::FiveDay);
    }

    #[tokio::test]
    async fn test_transition_is_idempotent_once_terminal() {
        let store = MemoryLeadStore::new();
        let now = Utc::now();
        let followup = FollowUp::pending(LeadId::generate(), FollowUpStage::FiveDay, now, None, now);
        let id = store.insert_followup(&followup).await.unwrap();

        let cancelled = store
            .transition_followup(&id, FollowUpStatus::Cancelled, Some("admin".to_string()))
            .await
            .unwrap();
        assert_eq!(cancelled.status, FollowUpStatus::Cancelled);

        let again = store
            .transition_followup(&id, FollowUpStatus::Sent, None)
            .await
            .unwrap();
        assert_eq!(again.status, FollowUpStatus::Cancelled);
        assert_eq!(again.note.as_deref(), Some("admin"));
    }
}
