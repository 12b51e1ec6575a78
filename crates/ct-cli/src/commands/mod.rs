//! CLI subcommand implementations.

pub mod adjust;
pub mod estimate;
pub mod export;
pub mod period;
pub mod report;
pub mod reset;
pub mod status;
pub mod stop_all;
pub mod timer;
pub mod util;
pub mod watch;

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, TimeZone, Utc};
    use ct_core::{Category, GroupId, Label, Person, PersonId, WorkItem, WorkItemId};
    use ct_db::Database;

    use crate::{BoardFile, Tracker};

    pub fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
    }

    fn person(id: &str, name: &str) -> Person {
        Person {
            id: PersonId::new(id).unwrap(),
            name: name.to_string(),
        }
    }

    fn item(id: &str, name: &str, category: &str, labels: Vec<Label>) -> WorkItem {
        WorkItem {
            id: WorkItemId::new(id).unwrap(),
            name: name.to_string(),
            category_id: Some(category.to_string()),
            labels,
        }
    }

    pub fn board() -> BoardFile {
        BoardFile {
            group: GroupId::new("board-1").unwrap(),
            me: PersonId::new("ada").unwrap(),
            current_item: Some(WorkItemId::new("card-1").unwrap()),
            members: vec![person("ada", "Ada"), person("grace", "Grace")],
            categories: vec![
                Category {
                    id: "list-1".to_string(),
                    name: "Doing".to_string(),
                },
                Category {
                    id: "list-2".to_string(),
                    name: "Done".to_string(),
                },
            ],
            items: vec![
                item(
                    "card-1",
                    "Login page",
                    "list-1",
                    vec![Label {
                        name: "UI".to_string(),
                        color: "blue".to_string(),
                    }],
                ),
                item("card-2", "Billing", "list-2", Vec::new()),
            ],
        }
    }

    /// A tracker over an in-memory database and a two-member board.
    pub fn tracker() -> Tracker<BoardFile> {
        Tracker::new(Database::open_in_memory().unwrap(), board())
    }
}
