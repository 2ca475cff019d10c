//! Per-channel processors: resolve recipients, resolve content, deliver.
//!
//! Outcomes map onto the consumer's settlement:
//! - no recipients or no content → `Ok` (acknowledged, nothing delivered)
//! - per-recipient delivery failure → logged, next recipient
//! - sink-wide failure or store failure → transient error (requeued)

use async_trait::async_trait;
use event_bus::{EventHandler, ProcessingError};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::channels::Channel;
use crate::content::{ContentGenerator, ExplicitContent, GeneratedContent};
use crate::context::PipelineContext;
use crate::error::{DeliveryError, NotificationError, NotificationResult};
use crate::events::{Correlation, EmailEvent, EventType, NotificationEvent};
use crate::models::{DeliveryReport, Employee, NewNotification, OutboundEmail};
use crate::registry::{EventRules, RecipientRule};
use crate::resolver::RecipientResolver;
use crate::templates::RenderedMessage;

fn rules_for(context: &PipelineContext, event_type: EventType) -> Result<EventRules, ProcessingError> {
    context
        .registry()
        .rules(event_type)
        .copied()
        .ok_or_else(|| ProcessingError::permanent(format!("no rules registered for {}", event_type)))
}

fn store_failure(e: NotificationError) -> ProcessingError {
    ProcessingError::transient(format!("entity store failed: {}", e))
}

/// Explicit recipients verbatim when present, otherwise the resolver's set.
async fn resolve_recipients(
    resolver: &RecipientResolver,
    explicit: BTreeSet<String>,
    rule: RecipientRule,
    correlation: &Correlation,
) -> Result<BTreeSet<String>, ProcessingError> {
    if !explicit.is_empty() {
        return Ok(explicit);
    }
    resolver.resolve(rule, correlation).await.map_err(store_failure)
}

async fn resolve_content(
    generator: &ContentGenerator,
    channel: Channel,
    event_type: EventType,
    rules: &EventRules,
    correlation: &Correlation,
    explicit: ExplicitContent<'_>,
) -> Option<RenderedMessage> {
    match generator
        .resolve(channel, event_type, rules.content, correlation, explicit)
        .await
    {
        GeneratedContent::Content(message) => Some(message),
        GeneratedContent::NoContent(reason) => {
            info!(
                event_type = %event_type,
                channel = channel.as_str(),
                reason = %reason,
                "No content for event, acknowledging without delivery"
            );
            None
        }
    }
}

/// Employee by internal id, then by business code.
async fn lookup_employee(context: &PipelineContext, id: &str) -> NotificationResult<Option<Employee>> {
    match context.store().find_employee(id).await? {
        Some(employee) => Ok(Some(employee)),
        None => context.store().find_employee_by_code(id).await,
    }
}

/// Record a sink result. A sink-wide failure aborts the message.
fn tally<T>(
    report: &mut DeliveryReport,
    recipient: &str,
    result: Result<T, DeliveryError>,
) -> Result<(), ProcessingError> {
    match result {
        Ok(_) => {
            report.delivered += 1;
            debug!(recipient = %recipient, "Delivered");
            Ok(())
        }
        Err(e) if e.is_sink_wide() => {
            warn!(recipient = %recipient, error = %e, "Delivery sink unavailable, message will be redelivered");
            Err(ProcessingError::transient(e.to_string()))
        }
        Err(e) => {
            report.failed += 1;
            warn!(recipient = %recipient, error = %e, "Delivery to recipient failed, continuing");
            Ok(())
        }
    }
}

/// Turns notification events into notification rows.
pub struct NotificationProcessor {
    context: PipelineContext,
    resolver: RecipientResolver,
    generator: ContentGenerator,
}

impl NotificationProcessor {
    pub fn new(context: &PipelineContext) -> Self {
        Self {
            context: context.clone(),
            resolver: context.resolver(),
            generator: context.generator(),
        }
    }

    pub async fn process(&self, event: &NotificationEvent) -> Result<DeliveryReport, ProcessingError> {
        let event_type = event.event_type;
        let rules = rules_for(&self.context, event_type)?;
        let correlation = event.correlation();

        let recipients = resolve_recipients(
            &self.resolver,
            event.explicit_recipients(),
            rules.recipients,
            &correlation,
        )
        .await?;
        if recipients.is_empty() {
            info!(event_type = %event_type, "No recipients resolved, acknowledging without delivery");
            return Ok(DeliveryReport::default());
        }

        let explicit = ExplicitContent {
            subject: event.title.as_deref(),
            body: event.content.as_deref(),
        };
        let Some(message) = resolve_content(
            &self.generator,
            Channel::Notification,
            event_type,
            &rules,
            &correlation,
            explicit,
        )
        .await
        else {
            return Ok(DeliveryReport::default());
        };

        let mut report = DeliveryReport::default();
        for recipient in &recipients {
            let employee_id = self.normalize_recipient(recipient).await?;
            let row = NewNotification {
                employee_id,
                title: message.subject.clone(),
                content: message.body.clone(),
                notification_type: event
                    .notification_type
                    .unwrap_or(rules.defaults.notification_type),
                category: event
                    .category
                    .clone()
                    .unwrap_or_else(|| rules.defaults.category.to_string()),
                priority: event.priority.unwrap_or(rules.defaults.priority),
                related_id: event.related_id.clone(),
                related_type: event.related_type.clone(),
            };
            let result = self.context.notifications().insert_notification(row).await;
            tally(&mut report, recipient, result)?;
        }

        info!(
            event_type = %event_type,
            recipients = recipients.len(),
            delivered = report.delivered,
            failed = report.failed,
            "Notification event processed"
        );
        Ok(report)
    }

    /// Map a business code to the internal employee id; unknown ids pass through.
    async fn normalize_recipient(&self, recipient: &str) -> Result<String, ProcessingError> {
        let employee = lookup_employee(&self.context, recipient)
            .await
            .map_err(store_failure)?;
        Ok(employee.map(|e| e.id).unwrap_or_else(|| recipient.to_string()))
    }
}

#[async_trait]
impl EventHandler<NotificationEvent> for NotificationProcessor {
    async fn handle(&self, event: &NotificationEvent) -> Result<(), ProcessingError> {
        self.process(event).await.map(|_| ())
    }

    fn name(&self) -> &'static str {
        "NotificationProcessor"
    }
}

/// Where an email goes: a literal address, or an employee to look up.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum EmailTarget {
    Address(String),
    Employee(String),
}

/// Turns email events into sent emails.
pub struct EmailProcessor {
    context: PipelineContext,
    resolver: RecipientResolver,
    generator: ContentGenerator,
}

impl EmailProcessor {
    pub fn new(context: &PipelineContext) -> Self {
        Self {
            context: context.clone(),
            resolver: context.resolver(),
            generator: context.generator(),
        }
    }

    pub async fn process(&self, event: &EmailEvent) -> Result<DeliveryReport, ProcessingError> {
        let event_type = event.event_type;
        let rules = rules_for(&self.context, event_type)?;
        let correlation = event.correlation();

        let explicit = event.explicit_recipients();
        let targets: Vec<EmailTarget> = if explicit.is_empty() {
            resolve_recipients(&self.resolver, explicit, rules.recipients, &correlation)
                .await?
                .into_iter()
                .map(EmailTarget::Employee)
                .collect()
        } else {
            explicit.into_iter().map(EmailTarget::Address).collect()
        };
        if targets.is_empty() {
            info!(event_type = %event_type, "No recipients resolved, acknowledging without delivery");
            return Ok(DeliveryReport::default());
        }

        let explicit_content = ExplicitContent {
            subject: event.subject.as_deref(),
            body: event.body.as_deref(),
        };
        let Some(message) = resolve_content(
            &self.generator,
            Channel::Email,
            event_type,
            &rules,
            &correlation,
            explicit_content,
        )
        .await
        else {
            return Ok(DeliveryReport::default());
        };

        let is_html = if event.body.is_some() {
            event.is_html
        } else {
            self.context.templates().body_is_html(Channel::Email)
        };

        let mut report = DeliveryReport::default();
        for target in &targets {
            let (label, address) = match target {
                EmailTarget::Address(address) => (address.as_str(), Some((address.clone(), String::new()))),
                EmailTarget::Employee(id) => (id.as_str(), self.employee_address(id, &mut report).await?),
            };
            let Some((to_email, to_name)) = address else {
                continue;
            };

            let email = OutboundEmail {
                to_email,
                to_name,
                subject: message.subject.clone(),
                body: message.body.clone(),
                is_html,
            };
            let result = self.context.email().send(&email).await;
            tally(&mut report, label, result)?;
        }

        info!(
            event_type = %event_type,
            recipients = targets.len(),
            delivered = report.delivered,
            failed = report.failed,
            provider = self.context.email().name(),
            "Email event processed"
        );
        Ok(report)
    }

    /// Address and display name for an employee. A missing employee or
    /// email is counted as a failed recipient.
    async fn employee_address(
        &self,
        employee_id: &str,
        report: &mut DeliveryReport,
    ) -> Result<Option<(String, String)>, ProcessingError> {
        let employee = lookup_employee(&self.context, employee_id)
            .await
            .map_err(store_failure)?;

        let Some(employee) = employee else {
            report.failed += 1;
            warn!(employee_id = %employee_id, "Recipient employee not found, skipping");
            return Ok(None);
        };

        match employee.email.filter(|e| !e.trim().is_empty()) {
            Some(email) => Ok(Some((email, employee.real_name))),
            None => {
                report.failed += 1;
                warn!(employee_id = %employee_id, "Recipient employee has no email address, skipping");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl EventHandler<EmailEvent> for EmailProcessor {
    async fn handle(&self, event: &EmailEvent) -> Result<(), ProcessingError> {
        self.process(event).await.map(|_| ())
    }

    fn name(&self) -> &'static str {
        "EmailProcessor"
    }
}
