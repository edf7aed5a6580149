// Copyright (c) 2025 MovieMind
// Licensed under the MIT License. See LICENSE file for details.

//! Canonical types used across the MovieMind client.
//!
//! This module provides unified wire-type definitions to avoid duplication.

use serde::{Deserialize, Serialize};

/// Profile snapshot as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: String,
}

fn default_true() -> bool {
    true
}

/// Registration payload for `POST /auth/register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreate {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// Credentials payload for `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLogin {
    pub email: String,
    pub password: String,
}

/// Partial profile update for `PUT /users/me`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

/// Bearer credential issued by the auth endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    /// Declared lifetime in seconds.
    pub expires_in: i64,
    pub user: User,
}

/// A movie candidate produced by the recommendation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub year: u16,
    #[serde(default)]
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default)]
    pub poster: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub director: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cast: Option<Vec<String>>,
}

impl Movie {
    /// Minimal constructor, mostly useful in tests and fixtures.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            summary: String::new(),
            genres: Vec::new(),
            year: 0,
            duration: String::new(),
            rating: None,
            poster: String::new(),
            director: None,
            cast: None,
        }
    }
}

/// One of the three discrete decisions a user can take on a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeAction {
    /// Rightward swipe. Keep it in mind.
    Like,
    /// Leftward swipe. Not interested.
    Dislike,
    /// Upward fling. Session-ending pick.
    Love,
}

impl SwipeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
            Self::Love => "love",
        }
    }
}

impl std::fmt::Display for SwipeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Follower/following counts for a profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowStats {
    pub user_id: String,
    pub followers_count: u64,
    pub following_count: u64,
}

/// Answer to `GET /users/{id}/is-following`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsFollowingResponse {
    pub is_following: bool,
    pub follower_id: String,
    pub followed_id: String,
}

/// Answer to `GET /users/mutual-follows/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutualFollowsResponse {
    pub user_id: String,
    pub target_user_id: String,
    pub is_following: bool,
    pub is_followed_by: bool,
    pub is_mutual: bool,
}

/// Answer to `GET /users/suggested`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedUsersResponse {
    pub suggestions: Vec<User>,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swipe_action_roundtrip() {
        let json = serde_json::to_string(&SwipeAction::Love).unwrap();
        assert_eq!(json, "\"love\"");
        let back: SwipeAction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SwipeAction::Love);
    }

    #[test]
    fn test_user_optional_fields_default() {
        let user: User = serde_json::from_str(
            r#"{"_id":"u1","username":"alex","email":"alex@example.com"}"#,
        )
        .unwrap();
        assert!(user.is_active);
        assert!(user.bio.is_none());
        assert_eq!(user.id, "u1");
    }

    #[test]
    fn test_movie_tolerates_sparse_payload() {
        let movie: Movie = serde_json::from_str(r#"{"id":"m1","title":"Alien"}"#).unwrap();
        assert_eq!(movie.title, "Alien");
        assert!(movie.genres.is_empty());
        assert!(movie.rating.is_none());
    }
}
