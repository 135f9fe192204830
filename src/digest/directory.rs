use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::slack::{MessagingPlatform, PlatformError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub is_bot: bool,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroup {
    pub id: String,
    pub handle: String,
    pub members: Vec<String>,
}

/// Users and groups of one workspace, fetched once at run start and handed
/// to every collector call by reference.
#[derive(Debug, Clone)]
pub struct WorkspaceDirectory {
    self_user_id: String,
    users: HashMap<String, DirectoryUser>,
    groups: Vec<UserGroup>,
}

impl WorkspaceDirectory {
    pub fn load(platform: &dyn MessagingPlatform) -> Result<Self, PlatformError> {
        let self_user_id = platform.self_user_id()?;
        let users = platform.list_users()?;
        let groups = platform.list_user_groups()?;
        let directory = Self::from_parts(self_user_id, users, groups);
        info!(
            self_user_id = directory.self_user_id.as_str(),
            users = directory.users.len(),
            groups = directory.groups.len(),
            "workspace directory loaded"
        );
        Ok(directory)
    }

    pub fn from_parts(
        self_user_id: impl Into<String>,
        users: Vec<DirectoryUser>,
        groups: Vec<UserGroup>,
    ) -> Self {
        Self {
            self_user_id: self_user_id.into(),
            users: users.into_iter().map(|u| (u.id.clone(), u)).collect(),
            groups,
        }
    }

    pub fn self_user_id(&self) -> &str {
        &self.self_user_id
    }

    pub fn user(&self, id: &str) -> Option<&DirectoryUser> {
        self.users.get(id)
    }

    pub fn group(&self, id: &str) -> Option<&UserGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// Groups the run's own identity belongs to, in platform order.
    pub fn my_groups(&self) -> Vec<&UserGroup> {
        self.groups
            .iter()
            .filter(|g| g.members.iter().any(|m| m == &self.self_user_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{DirectoryUser, UserGroup, WorkspaceDirectory};

    fn user(id: &str, is_bot: bool) -> DirectoryUser {
        DirectoryUser {
            id: id.to_string(),
            name: id.to_lowercase(),
            display_name: String::new(),
            is_bot,
            deleted: false,
        }
    }

    #[test]
    fn my_groups_only_lists_memberships_of_self() {
        let dir = WorkspaceDirectory::from_parts(
            "U1",
            vec![user("U1", false), user("U2", false)],
            vec![
                UserGroup {
                    id: "S1".into(),
                    handle: "oncall".into(),
                    members: vec!["U2".into(), "U1".into()],
                },
                UserGroup {
                    id: "S2".into(),
                    handle: "design".into(),
                    members: vec!["U2".into()],
                },
            ],
        );
        let ids: Vec<&str> = dir.my_groups().iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["S1"]);
        assert!(dir.user("U2").is_some());
        assert!(dir.user("U9").is_none());
    }
}
