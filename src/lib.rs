// Copyright (c) 2025 MovieMind
// Licensed under the MIT License. See LICENSE file for details.

//! moviemind - Movie discovery client library
//!
//! Swipe through recommendations, keep your session alive.
//!
//! MovieMind wraps a REST backend with a resilient client core: token
//! lifecycle management with proactive refresh, a request gateway that
//! recovers transparently from expired credentials, and a swipe-driven
//! discovery loop over recommended movies.
//!
//! # Core Modules
//!
//! - [`session`] - Token lifecycle: login, refresh scheduling, persistence
//! - [`gateway`] - Authenticated HTTP with 401 refresh-and-retry
//! - [`swipe`] - Gesture classification and per-card state machine
//! - [`discovery`] - Candidate queue, preference tally, prompt refinement
//! - [`social`] - Follow graph and profile endpoints
//! - [`config`] - Client configuration and defaults
//! - [`error`] - The error taxonomy shared across the client

pub mod config;
pub mod discovery;
pub mod error;
pub mod gateway;
pub mod session;
pub mod social;
pub mod swipe;
pub mod types;

// Re-export the types callers touch constantly
pub use config::ClientConfig;
pub use error::ApiError;
pub use types::{Movie, SwipeAction, Token, User, UserCreate, UserLogin, UserUpdate};

// Session surface
pub use session::{CredentialStore, SessionEvent, SessionManager, StoredSession, TokenMetadata};

// Gateway surface
pub use gateway::{BackendClient, Gateway, Method, RequestOptions};

// Swipe surface
pub use swipe::{classify_release, CardPhase, Gesture, SwipeCard};

// Discovery surface
pub use discovery::{
    build_refined_prompt, DiscoveryError, DiscoverySession, GatewayRecommendations, Outcome,
    PreferenceTally, RecommendationSource,
};

// Social surface
pub use social::SocialClient;
