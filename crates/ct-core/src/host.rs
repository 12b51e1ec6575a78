//! Queries answered by the board that hosts the tracker.
//!
//! The host owns names, lists and labels. The tracker only reads them (live,
//! so renamed or relabeled cards always show current values) and pings
//! [`BoardHost::touch`] after a mutation so badges can refresh.

use std::collections::HashMap;

use thiserror::Error;

use crate::model::{Category, ItemSnapshot, Person, WorkItem};
use crate::types::{GroupId, PersonId, WorkItemId};

/// Host metadata could not be read.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("host unavailable: {0}")]
    Unavailable(String),
    #[error("host returned malformed metadata: {0}")]
    Malformed(String),
}

pub trait BoardHost {
    /// The person acting in this session.
    fn current_person(&self) -> Result<Person, HostError>;

    /// The work item currently open in the host UI, if any.
    fn current_work_item(&self) -> Result<Option<WorkItem>, HostError>;

    fn current_group(&self) -> Result<GroupId, HostError>;

    fn group_members(&self) -> Result<Vec<Person>, HostError>;

    fn all_work_items(&self) -> Result<Vec<WorkItem>, HostError>;

    fn all_categories(&self) -> Result<Vec<Category>, HostError>;

    /// Notification hint after a mutation on `work_item`. Never fails.
    fn touch(&self, work_item: &WorkItemId);
}

/// One read of the host's board metadata, indexed for the aggregator.
#[derive(Debug, Clone, Default)]
pub struct BoardMetadata {
    pub items: Vec<WorkItem>,
    pub categories: Vec<Category>,
    pub members: Vec<Person>,
}

impl BoardMetadata {
    /// Reads everything the aggregator needs. Any failure aborts the read.
    pub fn load<H: BoardHost + ?Sized>(host: &H) -> Result<Self, HostError> {
        Ok(Self {
            items: host.all_work_items()?,
            categories: host.all_categories()?,
            members: host.group_members()?,
        })
    }

    pub fn item(&self, id: &WorkItemId) -> Option<&WorkItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn category_name(&self, category_id: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|category| category.id == category_id)
            .map(|category| category.name.as_str())
    }

    pub fn member_names(&self) -> HashMap<&PersonId, &str> {
        self.members
            .iter()
            .map(|person| (&person.id, person.name.as_str()))
            .collect()
    }

    /// Write-time snapshot for `id`; unknown items snapshot as their raw id.
    pub fn snapshot(&self, id: &WorkItemId) -> ItemSnapshot {
        self.item(id).map_or_else(
            || ItemSnapshot {
                item_name: id.to_string(),
                ..ItemSnapshot::default()
            },
            |item| ItemSnapshot::of(item, &self.categories),
        )
    }
}
