use chrono::{DateTime, NaiveDate, Utc};
use outreach_common::{FollowUpStage, FollowUpStatus};
use serde::{Deserialize, Serialize};

use crate::{FollowUpId, LeadId};

/// A future re-engagement derived from a successful send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUp {
    pub id: FollowUpId,
    pub lead_id: LeadId,
    pub stage: FollowUpStage,
    /// Becomes due on this instant's UTC calendar day.
    pub due_at: DateTime<Utc>,
    pub status: FollowUpStatus,

    /// `sent_at` of the send this follow-up was derived from.
    pub origin_sent_at: DateTime<Utc>,
    pub origin_message_id: Option<String>,

    /// Why the follow-up was cancelled, when it was.
    pub note: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FollowUp {
    #[must_use]
    pub fn pending(
        lead_id: LeadId,
        stage: FollowUpStage,
        origin_sent_at: DateTime<Utc>,
        origin_message_id: Option<String>,
        due_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: FollowUpId::generate(),
            lead_id,
            stage,
            due_at,
            status: FollowUpStatus::Pending,
            origin_sent_at,
            origin_message_id,
            note: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Two follow-ups stem from the same send and stage.
    #[must_use]
    pub fn same_origin(&self, other: &Self) -> bool {
        self.lead_id == other.lead_id
            && self.stage == other.stage
            && self.origin_sent_at == other.origin_sent_at
    }

    #[must_use]
    pub fn is_due_on(&self, day: NaiveDate) -> bool {
        self.due_at.date_naive() <= day
    }
}

/// Filter for [`FollowUpStore::query_followups`](crate::FollowUpStore::query_followups).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowUpQuery {
    pub status: Option<FollowUpStatus>,
    pub lead_id: Option<LeadId>,
    /// Due on or before this calendar day.
    pub due_on_or_before: Option<NaiveDate>,
}

impl FollowUpQuery {
    #[must_use]
    pub fn pending() -> Self {
        Self {
            status: Some(FollowUpStatus::Pending),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn for_lead(mut self, lead_id: LeadId) -> Self {
        self.lead_id = Some(lead_id);
        self
    }

    #[must_use]
    pub const fn due_on_or_before(mut self, day: NaiveDate) -> Self {
        self.due_on_or_before = Some(day);
        self
    }

    #[must_use]
    pub fn matches(&self, followup: &FollowUp) -> bool {
        self.status.is_none_or(|status| followup.status == status)
            && self.lead_id.is_none_or(|lead| followup.lead_id == lead)
            && self
                .due_on_or_before
                .is_none_or(|day| followup.is_due_on(day))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    #[test]
    fn test_due_compares_calendar_days() {
        let sent = Utc
            .with_ymd_and_hms(2025, 3, 4, 23, 30, 0)
            .single()
            .unwrap_or_default();
        let followup = FollowUp::pending(
            LeadId::generate(),
            FollowUpStage::FiveDay,
            sent,
            None,
            sent + Duration::days(5),
        );

        let day_before = NaiveDate::from_ymd_opt(2025, 3, 8).unwrap_or_default();
        let due_day = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap_or_default();

        assert!(!followup.is_due_on(day_before));
        assert!(followup.is_due_on(due_day));
    }

    #[test]
    fn test_query_filters() {
        let lead = LeadId::generate();
        let now = Utc::now();
        let mut followup = FollowUp::pending(lead, FollowUpStage::TenDay, now, None, now);

        assert!(FollowUpQuery::pending().for_lead(lead).matches(&followup));
        assert!(!FollowUpQuery::pending()
            .for_lead(LeadId::generate())
            .matches(&followup));

        followup.status = FollowUpStatus::Cancelled;
        assert!(!FollowUpQuery::pending().matches(&followup));
        assert!(FollowUpQuery::default().matches(&followup));
    }
}
