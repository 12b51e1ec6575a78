//! File-backed board host.
//!
//! The board is described by a JSON document:
//!
//! ```json
//! {
//!   "group": "board-1",
//!   "me": "ada",
//!   "current_item": "card-1",
//!   "members": [{ "id": "ada", "name": "Ada" }],
//!   "categories": [{ "id": "list-1", "name": "Doing" }],
//!   "items": [
//!     { "id": "card-1", "name": "Login page", "category_id": "list-1",
//!       "labels": [{ "name": "UI", "color": "blue" }] }
//!   ]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use ct_core::{BoardHost, Category, GroupId, HostError, Person, PersonId, WorkItem, WorkItemId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardFile {
    pub group: GroupId,
    /// The acting member.
    pub me: PersonId,
    #[serde(default)]
    pub current_item: Option<WorkItemId>,
    #[serde(default)]
    pub members: Vec<Person>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub items: Vec<WorkItem>,
}

impl BoardFile {
    /// Reads a board description.
    ///
    /// A missing or unreadable file is [`HostError::Unavailable`]; invalid
    /// JSON is [`HostError::Malformed`].
    pub fn load(path: &Path) -> Result<Self, HostError> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| HostError::Unavailable(format!("{}: {err}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|err| HostError::Malformed(format!("{}: {err}", path.display())))
    }
}

impl BoardHost for BoardFile {
    fn current_person(&self) -> Result<Person, HostError> {
        self.members
            .iter()
            .find(|person| person.id == self.me)
            .cloned()
            .ok_or_else(|| HostError::Malformed(format!("{} is not a board member", self.me)))
    }

    fn current_work_item(&self) -> Result<Option<WorkItem>, HostError> {
        let Some(id) = &self.current_item else {
            return Ok(None);
        };
        self.items
            .iter()
            .find(|item| &item.id == id)
            .cloned()
            .map(Some)
            .ok_or_else(|| HostError::Malformed(format!("current item {id} is not on the board")))
    }

    fn current_group(&self) -> Result<GroupId, HostError> {
        Ok(self.group.clone())
    }

    fn group_members(&self) -> Result<Vec<Person>, HostError> {
        Ok(self.members.clone())
    }

    fn all_work_items(&self) -> Result<Vec<WorkItem>, HostError> {
        Ok(self.items.clone())
    }

    fn all_categories(&self) -> Result<Vec<Category>, HostError> {
        Ok(self.categories.clone())
    }

    fn touch(&self, work_item: &WorkItemId) {
        tracing::debug!(item = %work_item, "touched work item");
    }
}
