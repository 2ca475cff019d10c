//! Read-only entities the pipeline walks, and the records it hands to sinks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub creator_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNode {
    pub id: String,
    pub task_id: String,
    pub name: String,
    pub leader_id: Option<String>,
    pub executor_id: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    /// Completion percentage, 0..=100.
    pub progress: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    /// Internal primary key.
    pub id: String,
    /// External business employee code.
    pub code: Option<String>,
    pub real_name: String,
    pub email: Option<String>,
    pub department_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handover {
    pub id: String,
    pub from_employee_id: String,
    pub to_employee_id: String,
    pub task_id: Option<String>,
    pub remark: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: String,
    pub company_id: String,
    pub name: String,
}

/// Persisted in-app notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    /// Internal employee primary key, never the business code.
    pub employee_id: String,
    pub title: String,
    pub content: String,
    pub notification_type: i32,
    pub category: String,
    pub priority: i32,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub related_id: Option<String>,
    pub related_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One (event, recipient) notification row to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub employee_id: String,
    pub title: String,
    pub content: String,
    pub notification_type: i32,
    pub category: String,
    pub priority: i32,
    pub related_id: Option<String>,
    pub related_type: Option<String>,
}

impl NewNotification {
    /// Materialize the row the way a sink stores it.
    pub fn into_notification(self) -> Notification {
        let now = Utc::now();
        Notification {
            id: Uuid::now_v7(),
            employee_id: self.employee_id,
            title: self.title,
            content: self.content,
            notification_type: self.notification_type,
            category: self.category,
            priority: self.priority,
            is_read: false,
            read_at: None,
            related_id: self.related_id,
            related_type: self.related_type,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Email content ready for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutboundEmail {
    pub to_email: String,
    /// Recipient display name, empty when unknown.
    pub to_name: String,
    pub subject: String,
    pub body: String,
    pub is_html: bool,
}

/// A sent email with the provider's message ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub message_id: Option<String>,
    pub accepted: bool,
}

/// Per-message delivery tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

impl DeliveryReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }
}
