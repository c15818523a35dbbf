//! Local template rendering.
//!
//! Placeholders are `{{Name}}` tokens substituted from the lead:
//!
//! | Placeholder     | Source                                   |
//! |-----------------|------------------------------------------|
//! | `{{LeadName}}`  | first name, else company, else "there"   |
//! | `{{FirstName}}` | first name                               |
//! | `{{Company}}`   | company name, else "your company"        |
//! | `{{Website}}`   | company website                          |
//! | `{{Context}}`   | the first sentence of the website text   |

use ahash::AHashMap;
use async_trait::async_trait;
use outreach_common::EmailType;
use outreach_store::Lead;
use serde::{Deserialize, Serialize};

use super::{ContentGenerator, GeneratedEmail};
use crate::error::{DeliveryError, TemporaryError};

/// Longest context sentence substituted into a template.
const MAX_CONTEXT_CHARS: usize = 160;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub subject: String,
    pub body: String,
}

impl EmailTemplate {
    fn builtin(email_type: EmailType) -> Self {
        let (subject, body) = match email_type {
            EmailType::Initial => (
                "Quick question for {{Company}}",
                "Hi {{LeadName}},\n\n\
                 I came across {{Company}} recently. {{Context}}\n\n\
                 We help teams like yours turn more of their website visitors into \
                 conversations. Would you be open to a short call next week?\n\n\
                 Best regards",
            ),
            EmailType::Followup5Day => (
                "Re: Quick question for {{Company}}",
                "Hi {{LeadName}},\n\n\
                 Just bringing my previous note back to the top of your inbox. \
                 Is improving lead flow for {{Company}} on your radar this quarter?\n\n\
                 Best regards",
            ),
            EmailType::Followup10Day => (
                "Closing the loop",
                "Hi {{LeadName}},\n\n\
                 I haven't heard back, so I'll assume the timing isn't right. \
                 If that changes, just reply to this email and I'll pick it up.\n\n\
                 Best regards",
            ),
        };

        Self {
            subject: subject.to_string(),
            body: body.to_string(),
        }
    }
}

/// Renders emails from templates, one per [`EmailType`].
///
/// Types without a configured template use a built-in default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateGenerator {
    #[serde(default)]
    pub templates: AHashMap<EmailType, EmailTemplate>,
}

impl TemplateGenerator {
    #[must_use]
    pub fn with_template(mut self, email_type: EmailType, template: EmailTemplate) -> Self {
        self.templates.insert(email_type, template);
        self
    }

    /// Render the template for `email_type` against `lead`.
    ///
    /// # Errors
    /// If the rendered subject or body is blank.
    pub fn render(
        &self,
        lead: &Lead,
        website_context: Option<&str>,
        email_type: EmailType,
    ) -> Result<GeneratedEmail, DeliveryError> {
        let template = self
            .templates
            .get(&email_type)
            .cloned()
            .unwrap_or_else(|| EmailTemplate::builtin(email_type));

        let values = placeholders(lead, website_context);
        let subject = substitute(&template.subject, &values);
        let body = substitute(&template.body, &values);

        if subject.trim().is_empty() || body.trim().is_empty() {
            return Err(TemporaryError::GenerationFailed(format!(
                "template for {email_type} rendered an empty subject or body"
            ))
            .into());
        }

        Ok(GeneratedEmail {
            subject: subject.trim().to_string(),
            body: body.trim().to_string(),
        })
    }
}

#[async_trait]
impl ContentGenerator for TemplateGenerator {
    async fn generate(
        &self,
        lead: &Lead,
        website_context: Option<&str>,
        email_type: EmailType,
    ) -> Result<GeneratedEmail, DeliveryError> {
        self.render(lead, website_context, email_type)
    }
}

fn placeholders(lead: &Lead, website_context: Option<&str>) -> [(&'static str, String); 5] {
    [
        ("{{LeadName}}", lead.display_name().to_string()),
        ("{{FirstName}}", lead.first_name.clone().unwrap_or_default()),
        (
            "{{Company}}",
            lead.company_name
                .clone()
                .unwrap_or_else(|| "your company".to_string()),
        ),
        ("{{Website}}", lead.company_website.clone().unwrap_or_default()),
        (
            "{{Context}}",
            website_context.map(first_sentence).unwrap_or_default(),
        ),
    ]
}

fn substitute(template: &str, values: &[(&str, String)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |text, (token, value)| {
            text.replace(*token, value)
        })
}

fn first_sentence(text: &str) -> String {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let sentence = text
        .find(". ")
        .map_or(text.as_str(), |end| &text[..=end]);

    sentence.chars().take(MAX_CONTEXT_CHARS).collect()
}
