use serde::{Deserialize, Serialize};

/// A team as accepted by `POST /api/v1/team/add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub team_name: String,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: String,
    pub username: String,
    pub is_active: bool,
}

impl Member {
    pub fn active(user_id: &str, username: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            username: username.to_string(),
            is_active: true,
        }
    }
}

/// The teams seeded during setup and used to parameterize scenarios.
pub fn default_teams() -> Vec<Team> {
    vec![
        Team {
            team_name: "backend".to_string(),
            members: vec![Member::active("alice", "Alice"), Member::active("bob", "Bob")],
        },
        Team {
            team_name: "frontend".to_string(),
            members: vec![
                Member::active("charlie", "Charlie"),
                Member::active("david", "David"),
            ],
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePullRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePullRequest {
    pub pull_request_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignReviewer {
    pub pull_request_id: String,
    pub old_user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetIsActive {
    pub user_id: String,
    pub is_active: bool,
}
