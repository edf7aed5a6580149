// Copyright (c) 2025 MovieMind
// Licensed under the MIT License. See LICENSE file for details.

//! Typed client for the social surface of the backend.
//!
//! Thin wrappers over the [`Gateway`]: every call here is authenticated
//! CRUD against `/users/...`. No state is held client-side.

use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::gateway::{Gateway, RequestOptions};
use crate::types::{
    FollowStats, IsFollowingResponse, MutualFollowsResponse, SuggestedUsersResponse, User,
    UserUpdate,
};

/// Backend acknowledgement for follow/unfollow.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Clone)]
pub struct SocialClient {
    gateway: Gateway,
}

impl SocialClient {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub async fn my_profile(&self) -> Result<User, ApiError> {
        self.gateway
            .get("/users/me", RequestOptions::authenticated())
            .await
    }

    pub async fn update_my_profile(&self, update: &UserUpdate) -> Result<User, ApiError> {
        let body = serde_json::to_value(update)
            .map_err(|e| ApiError::Validation(format!("Invalid profile update: {}", e)))?;
        self.gateway
            .put("/users/me", body, RequestOptions::authenticated())
            .await
    }

    pub async fn user_profile(&self, user_id: &str) -> Result<User, ApiError> {
        self.gateway
            .get(
                &format!("/users/{}", user_id),
                RequestOptions::authenticated(),
            )
            .await
    }

    pub async fn suggested_users(&self, limit: usize) -> Result<SuggestedUsersResponse, ApiError> {
        self.gateway
            .get(
                &format!("/users/suggested?limit={}", limit),
                RequestOptions::authenticated(),
            )
            .await
    }

    pub async fn follow(&self, user_id: &str) -> Result<MessageResponse, ApiError> {
        self.gateway
            .post(
                &format!("/users/{}/follow", user_id),
                json!({}),
                RequestOptions::authenticated(),
            )
            .await
    }

    pub async fn unfollow(&self, user_id: &str) -> Result<MessageResponse, ApiError> {
        self.gateway
            .delete(
                &format!("/users/{}/follow", user_id),
                RequestOptions::authenticated(),
            )
            .await
    }

    pub async fn followers(&self, user_id: &str) -> Result<Vec<User>, ApiError> {
        self.gateway
            .get(
                &format!("/users/{}/followers", user_id),
                RequestOptions::authenticated(),
            )
            .await
    }

    pub async fn following(&self, user_id: &str) -> Result<Vec<User>, ApiError> {
        self.gateway
            .get(
                &format!("/users/{}/following", user_id),
                RequestOptions::authenticated(),
            )
            .await
    }

    pub async fn follow_stats(&self, user_id: &str) -> Result<FollowStats, ApiError> {
        self.gateway
            .get(
                &format!("/users/{}/follow-stats", user_id),
                RequestOptions::authenticated(),
            )
            .await
    }

    pub async fn is_following(&self, user_id: &str) -> Result<IsFollowingResponse, ApiError> {
        self.gateway
            .get(
                &format!("/users/{}/is-following", user_id),
                RequestOptions::authenticated(),
            )
            .await
    }

    pub async fn mutual_follows(&self, user_id: &str) -> Result<MutualFollowsResponse, ApiError> {
        self.gateway
            .get(
                &format!("/users/mutual-follows/{}", user_id),
                RequestOptions::authenticated(),
            )
            .await
    }

    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<User>, ApiError> {
        let encoded: String = url_encode(query);
        self.gateway
            .get(
                &format!("/users/search?q={}&limit={}", encoded, limit),
                RequestOptions::authenticated(),
            )
            .await
    }
}

/// Minimal percent-encoding for a query component.
fn url_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
