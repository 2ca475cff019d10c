//! Dependency container for the pipeline.

use std::sync::Arc;

use crate::content::ContentGenerator;
use crate::error::NotificationResult;
use crate::providers::EmailProvider;
use crate::registry::EventRegistry;
use crate::repository::{EntityStore, NotificationSink};
use crate::resolver::RecipientResolver;
use crate::templates::TemplateEngine;

/// Everything a processor needs, built once at startup and never mutated.
///
/// Cloning shares the underlying handles.
#[derive(Clone)]
pub struct PipelineContext {
    store: Arc<dyn EntityStore>,
    notifications: Arc<dyn NotificationSink>,
    email: Arc<dyn EmailProvider>,
    templates: Arc<TemplateEngine>,
    registry: Arc<EventRegistry>,
}

impl PipelineContext {
    pub fn new(
        store: Arc<dyn EntityStore>,
        notifications: Arc<dyn NotificationSink>,
        email: Arc<dyn EmailProvider>,
        templates: TemplateEngine,
        registry: EventRegistry,
    ) -> Self {
        Self {
            store,
            notifications,
            email,
            templates: Arc::new(templates),
            registry: Arc::new(registry),
        }
    }

    /// Fail fast when an event type lacks rules or templates.
    pub fn validate(&self) -> NotificationResult<()> {
        self.registry.validate(&self.templates)
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub fn notifications(&self) -> &Arc<dyn NotificationSink> {
        &self.notifications
    }

    pub fn email(&self) -> &Arc<dyn EmailProvider> {
        &self.email
    }

    pub fn templates(&self) -> &TemplateEngine {
        &self.templates
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> RecipientResolver {
        RecipientResolver::new(Arc::clone(&self.store))
    }

    pub fn generator(&self) -> ContentGenerator {
        ContentGenerator::new(Arc::clone(&self.store), Arc::clone(&self.templates))
    }
}
