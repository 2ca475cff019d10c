//! Recipient resolution: walk the entity graph from an event's correlation
//! ids to the set of employee ids that should hear about it.
//!
//! Results are sets, so duplicates across branches collapse and the output
//! does not depend on lookup order. An id that resolves to nothing
//! contributes nothing.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::error::NotificationResult;
use crate::events::Correlation;
use crate::registry::RecipientRule;
use crate::repository::EntityStore;

#[derive(Clone)]
pub struct RecipientResolver {
    store: Arc<dyn EntityStore>,
}

impl RecipientResolver {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Resolve recipients for `rule`. Store failures propagate.
    pub async fn resolve(
        &self,
        rule: RecipientRule,
        correlation: &Correlation,
    ) -> NotificationResult<BTreeSet<String>> {
        let mut recipients = BTreeSet::new();

        match rule {
            RecipientRule::TaskParticipants => {
                if let Some(task_id) = correlation.task_ref() {
                    self.task_participants(task_id, &mut recipients).await?;
                }
            }
            RecipientRule::NodeLeaderOrNamed => match correlation.employee_ref() {
                Some(employee_id) => add(&mut recipients, Some(employee_id)),
                None => {
                    if let Some(node) = self.node(correlation).await? {
                        add(&mut recipients, node.leader_id.as_deref());
                    }
                }
            },
            RecipientRule::NodeLeaderAndExecutor => {
                if let Some(node) = self.node(correlation).await? {
                    add(&mut recipients, node.leader_id.as_deref());
                    add(&mut recipients, node.executor_id.as_deref());
                }
            }
            RecipientRule::NodeExecutor => {
                if let Some(node) = self.node(correlation).await? {
                    add(&mut recipients, node.executor_id.as_deref());
                }
            }
            RecipientRule::HandoverParties => {
                if let Some(handover_id) = correlation.related_ref() {
                    if let Some(handover) = self.store.find_handover(handover_id).await? {
                        let named = correlation.employee_ref().filter(|id| {
                            *id == handover.from_employee_id || *id == handover.to_employee_id
                        });
                        match named {
                            Some(side) => add(&mut recipients, Some(side)),
                            None => {
                                add(&mut recipients, Some(&handover.from_employee_id));
                                add(&mut recipients, Some(&handover.to_employee_id));
                            }
                        }
                    }
                }
            }
            RecipientRule::ExplicitEmployees => {
                for id in &correlation.employee_ids {
                    add(&mut recipients, Some(id));
                }
                add(&mut recipients, correlation.employee_ref());
            }
            RecipientRule::DepartmentMembers => {
                if let Some(department_id) = correlation.related_ref() {
                    self.department_members(department_id, &mut recipients).await?;
                }
            }
            RecipientRule::CompanyMembers => {
                if let Some(company_id) = correlation.related_ref() {
                    for department in self.store.find_departments_by_company_id(company_id).await? {
                        self.department_members(&department.id, &mut recipients).await?;
                    }
                }
            }
        }

        debug!(rule = ?rule, count = recipients.len(), "Resolved recipients");
        Ok(recipients)
    }

    async fn task_participants(
        &self,
        task_id: &str,
        recipients: &mut BTreeSet<String>,
    ) -> NotificationResult<()> {
        if let Some(task) = self.store.find_task(task_id).await? {
            add(recipients, task.creator_id.as_deref());
        }
        for node in self.store.find_task_nodes_by_task_id(task_id).await? {
            add(recipients, node.leader_id.as_deref());
            add(recipients, node.executor_id.as_deref());
        }
        Ok(())
    }

    async fn department_members(
        &self,
        department_id: &str,
        recipients: &mut BTreeSet<String>,
    ) -> NotificationResult<()> {
        for employee in self.store.find_employees_by_department_id(department_id).await? {
            add(recipients, Some(&employee.id));
        }
        Ok(())
    }

    async fn node(&self, correlation: &Correlation) -> NotificationResult<Option<crate::models::TaskNode>> {
        match correlation.node_ref() {
            Some(node_id) => self.store.find_task_node(node_id).await,
            None => Ok(None),
        }
    }
}

fn add(recipients: &mut BTreeSet<String>, id: Option<&str>) {
    if let Some(id) = id.map(str::trim).filter(|id| !id.is_empty()) {
        recipients.insert(id.to_string());
    }
}
