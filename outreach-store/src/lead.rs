use chrono::{DateTime, Utc};
use outreach_common::{EmailType, LeadStatus};
use serde::{Deserialize, Serialize};

use crate::LeadId;

/// One prospect and the lifecycle state of the email currently addressed to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,

    /// Contact address. Absent until enrichment finds one.
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company_name: Option<String>,
    pub company_website: Option<String>,
    /// Free-form region indicator used for timezone resolution.
    pub country: Option<String>,
    /// Page text scraped from the company website, if any.
    pub website_context: Option<String>,

    pub status: LeadStatus,
    pub email_type: EmailType,
    /// Generated content for `email_type`. Cleared whenever the type changes.
    pub subject: Option<String>,
    pub body: Option<String>,
    /// The lead may not be sent before this instant. `None` means immediately.
    pub scheduled_time: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub gmail_message_id: Option<String>,
    pub gmail_thread_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// A freshly ingested lead with status `new`.
    #[must_use]
    pub fn new(email: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: LeadId::generate(),
            email,
            first_name: None,
            last_name: None,
            company_name: None,
            company_website: None,
            country: None,
            website_context: None,
            status: LeadStatus::New,
            email_type: EmailType::Initial,
            subject: None,
            body: None,
            scheduled_time: None,
            retry_count: 0,
            next_retry_at: None,
            error_message: None,
            sent_at: None,
            gmail_message_id: None,
            gmail_thread_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn with_name(mut self, first: &str, last: &str) -> Self {
        self.first_name = Some(first.to_string());
        self.last_name = Some(last.to_string());
        self
    }

    #[must_use]
    pub fn with_company(mut self, name: &str, website: Option<&str>) -> Self {
        self.company_name = Some(name.to_string());
        self.company_website = website.map(ToString::to_string);
        self
    }

    #[must_use]
    pub fn with_country(mut self, country: &str) -> Self {
        self.country = Some(country.to_string());
        self
    }

    #[must_use]
    pub fn with_website_context(mut self, context: &str) -> Self {
        self.website_context = Some(context.to_string());
        self
    }

    /// Queue the lead for `email_type` at `at`.
    #[must_use]
    pub const fn scheduled(mut self, email_type: EmailType, at: DateTime<Utc>) -> Self {
        self.status = LeadStatus::Scheduled;
        self.email_type = email_type;
        self.scheduled_time = Some(at);
        self
    }

    /// The trimmed contact address, if one is present and non-empty.
    #[must_use]
    pub fn recipient(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }

    /// Best-effort greeting name: first name, then company.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.first_name
            .as_deref()
            .or(self.company_name.as_deref())
            .unwrap_or("there")
    }

    /// Subject and body, when both have been generated.
    #[must_use]
    pub fn content(&self) -> Option<(&str, &str)> {
        self.subject.as_deref().zip(self.body.as_deref())
    }
}

/// A partial update to a lead row.
///
/// `None` leaves a column untouched. For nullable columns the inner `Option`
/// is the new value, so `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadPatch {
    /// Reject the update unless the row currently has this status.
    pub expected_status: Option<LeadStatus>,

    pub status: Option<LeadStatus>,
    pub email_type: Option<EmailType>,
    pub subject: Option<Option<String>>,
    pub body: Option<Option<String>>,
    pub scheduled_time: Option<Option<DateTime<Utc>>>,
    pub retry_count: Option<u32>,
    pub next_retry_at: Option<Option<DateTime<Utc>>>,
    pub error_message: Option<Option<String>>,
    pub sent_at: Option<Option<DateTime<Utc>>>,
    pub gmail_message_id: Option<Option<String>>,
    pub gmail_thread_id: Option<Option<String>>,
}

impl LeadPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn when_status(mut self, status: LeadStatus) -> Self {
        self.expected_status = Some(status);
        self
    }

    #[must_use]
    pub const fn status(mut self, status: LeadStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub const fn email_type(mut self, email_type: EmailType) -> Self {
        self.email_type = Some(email_type);
        self
    }

    #[must_use]
    pub fn content(mut self, subject: Option<String>, body: Option<String>) -> Self {
        self.subject = Some(subject);
        self.body = Some(body);
        self
    }

    #[must_use]
    pub const fn scheduled_time(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.scheduled_time = Some(at);
        self
    }

    #[must_use]
    pub const fn retry(mut self, count: u32, next_at: Option<DateTime<Utc>>) -> Self {
        self.retry_count = Some(count);
        self.next_retry_at = Some(next_at);
        self
    }

    #[must_use]
    pub fn error_message(mut self, message: Option<String>) -> Self {
        self.error_message = Some(message);
        self
    }

    #[must_use]
    pub fn sent(
        mut self,
        at: Option<DateTime<Utc>>,
        message_id: Option<String>,
        thread_id: Option<String>,
    ) -> Self {
        self.sent_at = Some(at);
        self.gmail_message_id = Some(message_id);
        self.gmail_thread_id = Some(thread_id);
        self
    }

    /// Write every set column into `lead`.
    pub fn apply(&self, lead: &mut Lead) {
        fn set<T: Clone>(target: &mut T, value: Option<&T>) {
            if let Some(value) = value {
                target.clone_from(value);
            }
        }

        set(&mut lead.status, self.status.as_ref());
        set(&mut lead.email_type, self.email_type.as_ref());
        set(&mut lead.subject, self.subject.as_ref());
        set(&mut lead.body, self.body.as_ref());
        set(&mut lead.scheduled_time, self.scheduled_time.as_ref());
        set(&mut lead.retry_count, self.retry_count.as_ref());
        set(&mut lead.next_retry_at, self.next_retry_at.as_ref());
        set(&mut lead.error_message, self.error_message.as_ref());
        set(&mut lead.sent_at, self.sent_at.as_ref());
        set(&mut lead.gmail_message_id, self.gmail_message_id.as_ref());
        set(&mut lead.gmail_thread_id, self.gmail_thread_id.as_ref());
    }
}

/// Filter for [`LeadStore::query`](crate::LeadStore::query).
///
/// All set conditions must hold. An empty `statuses` list matches any status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadQuery {
    pub statuses: Vec<LeadStatus>,
    /// `scheduled_time` is unset or at or before this instant.
    pub scheduled_before: Option<DateTime<Utc>>,
    /// `next_retry_at` is set and at or before this instant.
    pub retry_due_before: Option<DateTime<Utc>>,
}

impl LeadQuery {
    #[must_use]
    pub fn status(status: LeadStatus) -> Self {
        Self {
            statuses: vec![status],
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn scheduled_before(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_before = Some(at);
        self
    }

    #[must_use]
    pub const fn retry_due_before(mut self, at: DateTime<Utc>) -> Self {
        self.retry_due_before = Some(at);
        self
    }

    #[must_use]
    pub fn matches(&self, lead: &Lead) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&lead.status) {
            return false;
        }

        if let Some(before) = self.scheduled_before
            && lead.scheduled_time.is_some_and(|at| at > before)
        {
            return false;
        }

        if let Some(before) = self.retry_due_before
            && !lead.next_retry_at.is_some_and(|at| at <= before)
        {
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 4, hour, 0, 0)
            .single()
            .unwrap_or_default()
    }

    #[test]
    fn test_patch_only_touches_set_columns() {
        let mut lead = Lead::new(Some("a@example.com".to_string()));
        lead.error_message = Some("previous".to_string());
        let before = lead.clone();

        LeadPatch::new().status(LeadStatus::Failed).apply(&mut lead);

        assert_eq!(lead.status, LeadStatus::Failed);
        assert_eq!(lead.error_message, before.error_message);
        assert_eq!(lead.email_type, before.email_type);
    }

    #[test]
    fn test_patch_clears_nullable_columns() {
        let mut lead = Lead::new(None);
        lead.next_retry_at = Some(at(10));
        lead.error_message = Some("boom".to_string());

        LeadPatch::new()
            .retry(0, None)
            .error_message(None)
            .apply(&mut lead);

        assert_eq!(lead.next_retry_at, None);
        assert_eq!(lead.error_message, None);
        assert_eq!(lead.retry_count, 0);
    }

    #[test]
    fn test_recipient_trims_and_rejects_blank() {
        assert_eq!(
            Lead::new(Some("  a@example.com ".to_string())).recipient(),
            Some("a@example.com")
        );
        assert_eq!(Lead::new(Some("   ".to_string())).recipient(), None);
        assert_eq!(Lead::new(None).recipient(), None);
    }

    #[test]
    fn test_query_scheduled_before() {
        let query = LeadQuery::status(LeadStatus::Scheduled).scheduled_before(at(10));

        let due = Lead::new(None).scheduled(EmailType::Initial, at(9));
        let later = Lead::new(None).scheduled(EmailType::Initial, at(11));
        let mut unscheduled = Lead::new(None);
        unscheduled.status = LeadStatus::Scheduled;

        assert!(query.matches(&due));
        assert!(!query.matches(&later));
        assert!(query.matches(&unscheduled));
        assert!(!query.matches(&Lead::new(None)));
    }

    #[test]
    fn test_query_retry_due_requires_timestamp() {
        let query = LeadQuery::status(LeadStatus::Failed).retry_due_before(at(10));

        let mut lead = Lead::new(None);
        lead.status = LeadStatus::Failed;
        assert!(!query.matches(&lead));

        lead.next_retry_at = Some(at(10));
        assert!(query.matches(&lead));

        lead.next_retry_at = Some(at(12));
        assert!(!query.matches(&lead));
    }
}
