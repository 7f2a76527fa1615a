//! In-memory teams, users and pull requests with the service's business rules.
use axum::http::StatusCode;
use rand::seq::SliceRandom;
use rand::Rng;
use revload_core::{CreatePullRequest, Member, Team};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

const MAX_REVIEWERS: usize = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("team {0} already exists")]
    TeamExists(String),
    #[error("{0}")]
    InvalidTeam(&'static str),
    #[error("team not found")]
    TeamNotFound,
    #[error("user not found")]
    UserNotFound,
    #[error("PR id already exists")]
    PrExists,
    #[error("pull request not found")]
    PrNotFound,
    #[error("cannot modify merged pull request")]
    PrMerged,
    #[error("user is not assigned to this pull request")]
    NotAssigned,
    #[error("no active replacement candidate available")]
    NoCandidate,
}

impl StoreError {
    pub fn status(&self) -> StatusCode {
        match self {
            StoreError::TeamExists(_) | StoreError::InvalidTeam(_) => StatusCode::BAD_REQUEST,
            StoreError::TeamNotFound
            | StoreError::UserNotFound
            | StoreError::PrNotFound => StatusCode::NOT_FOUND,
            StoreError::PrExists
            | StoreError::PrMerged
            | StoreError::NotAssigned
            | StoreError::NoCandidate => StatusCode::CONFLICT,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            StoreError::TeamExists(_) => "TEAM_EXISTS",
            StoreError::PrExists => "PR_EXISTS",
            StoreError::PrMerged => "PR_MERGED",
            StoreError::NotAssigned => "NOT_ASSIGNED",
            StoreError::NoCandidate => "NO_CANDIDATE",
            _ => "NOT_FOUND",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub team_name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrStatus {
    Open,
    Merged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: PrStatus,
    pub assigned_reviewers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestShort {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: PrStatus,
}

impl From<&PullRequest> for PullRequestShort {
    fn from(pr: &PullRequest) -> Self {
        Self {
            pull_request_id: pr.pull_request_id.clone(),
            pull_request_name: pr.pull_request_name.clone(),
            author_id: pr.author_id.clone(),
            status: pr.status,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrStats {
    pub total_prs: u64,
    pub open_prs: u64,
    pub merged_prs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub assignments_by_user: BTreeMap<String, u64>,
    pub pull_requests: PrStats,
}

#[derive(Debug, Default)]
pub struct Store {
    teams: BTreeMap<String, Vec<String>>,
    users: HashMap<String, User>,
    pull_requests: HashMap<String, PullRequest>,
}

impl Store {
    /// Create a team, creating or moving its members.
    pub fn add_team(&mut self, team: Team) -> Result<Team, StoreError> {
        if team.team_name.is_empty() {
            return Err(StoreError::InvalidTeam("team_name is required"));
        }
        if team.members.is_empty() {
            return Err(StoreError::InvalidTeam("team must have at least one member"));
        }
        if self.teams.contains_key(&team.team_name) {
            return Err(StoreError::TeamExists(team.team_name));
        }

        for member in &team.members {
            if let Some(previous) = self.users.get(&member.user_id) {
                if let Some(ids) = self.teams.get_mut(&previous.team_name) {
                    ids.retain(|id| id != &member.user_id);
                }
            }
            self.users.insert(
                member.user_id.clone(),
                User {
                    user_id: member.user_id.clone(),
                    username: member.username.clone(),
                    team_name: team.team_name.clone(),
                    is_active: member.is_active,
                },
            );
        }
        self.teams.insert(
            team.team_name.clone(),
            team.members.iter().map(|m| m.user_id.clone()).collect(),
        );

        Ok(team)
    }

    pub fn get_team(&self, team_name: &str) -> Result<Team, StoreError> {
        let ids = self.teams.get(team_name).ok_or(StoreError::TeamNotFound)?;
        let members = ids
            .iter()
            .filter_map(|id| self.users.get(id))
            .map(|u| Member {
                user_id: u.user_id.clone(),
                username: u.username.clone(),
                is_active: u.is_active,
            })
            .collect();

        Ok(Team {
            team_name: team_name.to_string(),
            members,
        })
    }

    pub fn set_is_active(&mut self, user_id: &str, is_active: bool) -> Result<User, StoreError> {
        let user = self.users.get_mut(user_id).ok_or(StoreError::UserNotFound)?;
        user.is_active = is_active;
        Ok(user.clone())
    }

    /// Pull requests `user_id` reviews. Unknown users simply have none.
    pub fn reviews(&self, user_id: &str) -> Vec<PullRequestShort> {
        let mut prs: Vec<_> = self
            .pull_requests
            .values()
            .filter(|pr| pr.assigned_reviewers.iter().any(|r| r == user_id))
            .map(PullRequestShort::from)
            .collect();
        prs.sort_by(|a, b| a.pull_request_id.cmp(&b.pull_request_id));
        prs
    }

    /// Open a pull request with up to two random active teammates of the author as reviewers.
    pub fn create_pull_request<R: Rng>(
        &mut self,
        req: CreatePullRequest,
        rng: &mut R,
    ) -> Result<PullRequest, StoreError> {
        if self.pull_requests.contains_key(&req.pull_request_id) {
            return Err(StoreError::PrExists);
        }
        let author = self
            .users
            .get(&req.author_id)
            .ok_or(StoreError::UserNotFound)?;

        let candidates = self.active_teammates(&author.team_name, |id| id != req.author_id);
        let assigned_reviewers = candidates
            .choose_multiple(rng, MAX_REVIEWERS)
            .cloned()
            .collect();

        let pr = PullRequest {
            pull_request_id: req.pull_request_id,
            pull_request_name: req.pull_request_name,
            author_id: req.author_id,
            status: PrStatus::Open,
            assigned_reviewers,
        };
        self.pull_requests
            .insert(pr.pull_request_id.clone(), pr.clone());
        Ok(pr)
    }

    /// Idempotent.
    pub fn merge_pull_request(&mut self, id: &str) -> Result<PullRequest, StoreError> {
        let pr = self.pull_requests.get_mut(id).ok_or(StoreError::PrNotFound)?;
        pr.status = PrStatus::Merged;
        Ok(pr.clone())
    }

    /// Replace `old_user_id` with a random active teammate not already involved.
    pub fn reassign_reviewer<R: Rng>(
        &mut self,
        id: &str,
        old_user_id: &str,
        rng: &mut R,
    ) -> Result<(PullRequest, String), StoreError> {
        let pr = self.pull_requests.get(id).ok_or(StoreError::PrNotFound)?;
        if pr.status == PrStatus::Merged {
            return Err(StoreError::PrMerged);
        }
        if !pr.assigned_reviewers.iter().any(|r| r == old_user_id) {
            return Err(StoreError::NotAssigned);
        }
        let old = self.users.get(old_user_id).ok_or(StoreError::UserNotFound)?;

        let candidates = self.active_teammates(&old.team_name, |id| {
            id != old_user_id && id != pr.author_id && !pr.assigned_reviewers.iter().any(|r| r == id)
        });
        let replacement = candidates
            .choose(rng)
            .cloned()
            .ok_or(StoreError::NoCandidate)?;

        let pr = self
            .pull_requests
            .get_mut(id)
            .ok_or(StoreError::PrNotFound)?;
        for reviewer in pr.assigned_reviewers.iter_mut() {
            if reviewer == old_user_id {
                *reviewer = replacement.clone();
                break;
            }
        }
        Ok((pr.clone(), replacement))
    }

    pub fn statistics(&self) -> Statistics {
        let mut assignments_by_user: BTreeMap<String, u64> = self
            .users
            .values()
            .map(|u| (u.username.clone(), 0))
            .collect();
        for pr in self.pull_requests.values() {
            for reviewer in &pr.assigned_reviewers {
                if let Some(user) = self.users.get(reviewer) {
                    *assignments_by_user.entry(user.username.clone()).or_default() += 1;
                }
            }
        }

        let total_prs = self.pull_requests.len() as u64;
        let merged_prs = self
            .pull_requests
            .values()
            .filter(|pr| pr.status == PrStatus::Merged)
            .count() as u64;

        Statistics {
            assignments_by_user,
            pull_requests: PrStats {
                total_prs,
                open_prs: total_prs - merged_prs,
                merged_prs,
            },
        }
    }

    fn active_teammates(&self, team_name: &str, keep: impl Fn(&str) -> bool) -> Vec<String> {
        self.teams
            .get(team_name)
            .into_iter()
            .flatten()
            .filter(|id| keep(id))
            .filter(|id| self.users.get(*id).is_some_and(|u| u.is_active))
            .cloned()
            .collect()
    }
}
