//! Lead store that fails selected writes on request
#![allow(dead_code)] // Test utility module - not all methods used in every test

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use outreach_common::FollowUpStatus;
use outreach_store::{
    FollowUp, FollowUpId, FollowUpQuery, FollowUpStore, Lead, LeadId, LeadPatch, LeadQuery,
    LeadStore, StoreError, TestLeadStore,
};

#[derive(Debug, Default)]
struct Faults {
    followup_inserts: AtomicBool,
    sent_transitions: AtomicUsize,
}

#[derive(Debug, Clone, Default)]
pub struct FaultyStore {
    inner: TestLeadStore,
    faults: Arc<Faults>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn inner(&self) -> &TestLeadStore {
        &self.inner
    }

    pub fn fail_followup_inserts(&self, fail: bool) {
        self.faults.followup_inserts.store(fail, Ordering::SeqCst);
    }

    /// Fail the next `count` transitions of a follow-up to `sent`.
    pub fn fail_sent_transitions(&self, count: usize) {
        self.faults.sent_transitions.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl LeadStore for FaultyStore {
    async fn insert(&self, lead: &Lead) -> outreach_store::Result<LeadId> {
        self.inner.insert(lead).await
    }

    async fn get(&self, id: &LeadId) -> outreach_store::Result<Lead> {
        self.inner.get(id).await
    }

    async fn query(&self, query: &LeadQuery) -> outreach_store::Result<Vec<Lead>> {
        self.inner.query(query).await
    }

    async fn update(&self, id: &LeadId, patch: &LeadPatch) -> outreach_store::Result<Lead> {
        self.inner.update(id, patch).await
    }
}

#[async_trait]
impl FollowUpStore for FaultyStore {
    async fn insert_followup(&self, followup: &FollowUp) -> outreach_store::Result<FollowUpId> {
        if self.faults.followup_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Internal("scripted follow-up insert failure".into()));
        }
        self.inner.insert_followup(followup).await
    }

    async fn get_followup(&self, id: &FollowUpId) -> outreach_store::Result<FollowUp> {
        self.inner.get_followup(id).await
    }

    async fn query_followups(
        &self,
        query: &FollowUpQuery,
    ) -> outreach_store::Result<Vec<FollowUp>> {
        self.inner.query_followups(query).await
    }

    async fn transition_followup(
        &self,
        id: &FollowUpId,
        status: FollowUpStatus,
        note: Option<String>,
    ) -> outreach_store::Result<FollowUp> {
        let scripted = status == FollowUpStatus::Sent
            && self
                .faults
                .sent_transitions
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
        if scripted {
            return Err(StoreError::Internal("scripted transition failure".into()));
        }
        self.inner.transition_followup(id, status, note).await
    }
}
