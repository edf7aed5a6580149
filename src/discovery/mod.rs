// Copyright (c) 2025 MovieMind
// Licensed under the MIT License. See LICENSE file for details.

//! Discovery loop: the candidate queue, the preference tally, and
//! refinement.
//!
//! A [`DiscoverySession`] owns an ordered queue of movie candidates and a
//! cursor. Decisions come in from the swipe layer one at a time; likes and
//! dislikes advance the cursor, a love ends the session with a selection.
//! Once the cursor passes the last index the session is exhausted and the
//! caller can [`refine`](DiscoverySession::refine) against a
//! [`RecommendationSource`] to get a fresh queue.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::types::{Movie, SwipeAction};

/// Opaque recommendation backend. The loop only builds the prompt and
/// consumes the resulting list.
#[async_trait]
pub trait RecommendationSource: Send + Sync {
    async fn recommend(&self, prompt: &str, group_mode: bool) -> Result<Vec<Movie>, ApiError>;
}

/// Errors surfaced by the discovery loop itself. Backend failures pass
/// through as [`ApiError`] from `refine`.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryError {
    /// The queue is spent; supply a new one via `refine` first.
    Exhausted,
    /// A love already ended this session with a selection.
    SessionEnded,
    /// The same movie was already tallied in this session.
    AlreadyDecided(String),
}

impl std::fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryError::Exhausted => write!(f, "Candidate queue exhausted"),
            DiscoveryError::SessionEnded => write!(f, "Discovery session already ended"),
            DiscoveryError::AlreadyDecided(title) => {
                write!(f, "Movie already decided this session: {}", title)
            }
        }
    }
}

impl std::error::Error for DiscoveryError {}

/// Where the loop stands after a decision.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Cursor advanced, more candidates remain.
    Advanced,
    /// Cursor passed the last index.
    Exhausted,
    /// A love ended the session with this pick.
    Selected(Movie),
}

/// Append-only per-session record of decisions.
///
/// A movie lands in exactly one of the three lists; a second decision on
/// the same title is rejected rather than double-counted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreferenceTally {
    liked: Vec<Movie>,
    disliked: Vec<Movie>,
    loved: Vec<Movie>,
}

impl PreferenceTally {
    pub fn liked(&self) -> &[Movie] {
        &self.liked
    }

    pub fn disliked(&self) -> &[Movie] {
        &self.disliked
    }

    pub fn loved(&self) -> &[Movie] {
        &self.loved
    }

    pub fn is_empty(&self) -> bool {
        self.liked.is_empty() && self.disliked.is_empty() && self.loved.is_empty()
    }

    fn contains(&self, title: &str) -> bool {
        self.liked
            .iter()
            .chain(&self.disliked)
            .chain(&self.loved)
            .any(|m| m.title == title)
    }

    fn record(&mut self, action: SwipeAction, movie: Movie) -> Result<(), DiscoveryError> {
        if self.contains(&movie.title) {
            return Err(DiscoveryError::AlreadyDecided(movie.title));
        }
        match action {
            SwipeAction::Like => self.liked.push(movie),
            SwipeAction::Dislike => self.disliked.push(movie),
            SwipeAction::Love => self.loved.push(movie),
        }
        Ok(())
    }
}

/// Build the enriched recommendation prompt. Parts in order: original
/// prompt, free-text refinement, liked-titles clause, disliked-titles
/// clause. Empty parts are omitted entirely.
pub fn build_refined_prompt(base: &str, refinement: &str, tally: &PreferenceTally) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !base.trim().is_empty() {
        parts.push(base.trim().to_string());
    }
    if !refinement.trim().is_empty() {
        parts.push(refinement.trim().to_string());
    }
    if !tally.liked.is_empty() {
        let titles: Vec<&str> = tally.liked.iter().map(|m| m.title.as_str()).collect();
        parts.push(format!("(films aimés: {})", titles.join(", ")));
    }
    if !tally.disliked.is_empty() {
        let titles: Vec<&str> = tally.disliked.iter().map(|m| m.title.as_str()).collect();
        parts.push(format!("(films rejetés: {})", titles.join(", ")));
    }
    parts.join(" ")
}

/// Recommendation source backed by the gateway.
#[derive(Clone)]
pub struct GatewayRecommendations {
    gateway: crate::gateway::Gateway,
}

impl GatewayRecommendations {
    pub fn new(gateway: crate::gateway::Gateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl RecommendationSource for GatewayRecommendations {
    async fn recommend(&self, prompt: &str, group_mode: bool) -> Result<Vec<Movie>, ApiError> {
        self.gateway
            .post(
                "/ai/recommendations",
                serde_json::json!({ "prompt": prompt, "group_mode": group_mode }),
                crate::gateway::RequestOptions::authenticated(),
            )
            .await
    }
}

/// One discovery session: a queue, a cursor, a tally, and at most one
/// selection.
#[derive(Debug, Clone)]
pub struct DiscoverySession {
    prompt: String,
    group_mode: bool,
    queue: Vec<Movie>,
    cursor: usize,
    tally: PreferenceTally,
    selected: Option<Movie>,
}

impl DiscoverySession {
    pub fn new(prompt: impl Into<String>, group_mode: bool, queue: Vec<Movie>) -> Self {
        Self {
            prompt: prompt.into(),
            group_mode,
            queue,
            cursor: 0,
            tally: PreferenceTally::default(),
            selected: None,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn tally(&self) -> &PreferenceTally {
        &self.tally
    }

    /// The loved pick that ended the session, if any.
    pub fn selection(&self) -> Option<&Movie> {
        self.selected.as_ref()
    }

    /// Candidate under the cursor.
    pub fn current(&self) -> Option<&Movie> {
        if self.selected.is_some() {
            return None;
        }
        self.queue.get(self.cursor)
    }

    /// Candidate after the current one. Used only to pre-render the
    /// upcoming card.
    pub fn peek_next(&self) -> Option<&Movie> {
        if self.selected.is_some() {
            return None;
        }
        self.queue.get(self.cursor + 1)
    }

    pub fn remaining(&self) -> usize {
        self.queue.len().saturating_sub(self.cursor)
    }

    pub fn is_exhausted(&self) -> bool {
        self.selected.is_none() && self.cursor >= self.queue.len()
    }

    /// Apply a decision to the current candidate.
    ///
    /// Like and dislike tally the movie and advance the cursor. Love
    /// tallies it and ends the session with a selection; the cursor does
    /// not advance. Rejected outright once the session has ended or the
    /// queue is spent.
    pub fn decide(&mut self, action: SwipeAction) -> Result<Outcome, DiscoveryError> {
        if self.selected.is_some() {
            return Err(DiscoveryError::SessionEnded);
        }
        let movie = self
            .queue
            .get(self.cursor)
            .cloned()
            .ok_or(DiscoveryError::Exhausted)?;

        self.tally.record(action, movie.clone())?;
        tracing::info!(
            "DISCOVERY_DECISION | action={} title={} cursor={}",
            action,
            movie.title,
            self.cursor
        );

        match action {
            SwipeAction::Love => {
                self.selected = Some(movie.clone());
                Ok(Outcome::Selected(movie))
            }
            SwipeAction::Like | SwipeAction::Dislike => {
                self.cursor += 1;
                if self.cursor >= self.queue.len() {
                    Ok(Outcome::Exhausted)
                } else {
                    Ok(Outcome::Advanced)
                }
            }
        }
    }

    /// Fetch a fresh queue from the recommendation source using the
    /// enriched prompt. On success the queue is replaced and the cursor
    /// reset to 0; on failure everything is left untouched and the error
    /// is surfaced.
    pub async fn refine<S: RecommendationSource + ?Sized>(
        &mut self,
        source: &S,
        refinement: &str,
    ) -> Result<usize, ApiError> {
        let prompt = build_refined_prompt(&self.prompt, refinement, &self.tally);
        tracing::info!("DISCOVERY_REFINE | prompt_len={}", prompt.len());

        let queue = source.recommend(&prompt, self.group_mode).await?;
        let count = queue.len();
        self.queue = queue;
        self.cursor = 0;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movies(titles: &[&str]) -> Vec<Movie> {
        titles
            .iter()
            .enumerate()
            .map(|(i, t)| Movie::new(format!("m{}", i + 1), *t))
            .collect()
    }

    struct FixedSource(Vec<Movie>);

    #[async_trait]
    impl RecommendationSource for FixedSource {
        async fn recommend(&self, _prompt: &str, _group: bool) -> Result<Vec<Movie>, ApiError> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl RecommendationSource for FailingSource {
        async fn recommend(&self, _prompt: &str, _group: bool) -> Result<Vec<Movie>, ApiError> {
            Err(ApiError::Network("connection refused".into()))
        }
    }

    struct CapturingSource(std::sync::Mutex<Option<String>>);

    #[async_trait]
    impl RecommendationSource for CapturingSource {
        async fn recommend(&self, prompt: &str, _group: bool) -> Result<Vec<Movie>, ApiError> {
            *self.0.lock().unwrap() = Some(prompt.to_string());
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_prompt_with_liked_only() {
        let mut tally = PreferenceTally::default();
        tally.record(SwipeAction::Like, Movie::new("m1", "A")).unwrap();
        tally.record(SwipeAction::Like, Movie::new("m2", "B")).unwrap();

        assert_eq!(
            build_refined_prompt("P", "R", &tally),
            "P R (films aimés: A, B)"
        );
    }

    #[test]
    fn test_prompt_omits_empty_clauses() {
        let tally = PreferenceTally::default();
        assert_eq!(build_refined_prompt("P", "", &tally), "P");
        assert_eq!(build_refined_prompt("P", "R", &tally), "P R");
    }

    #[test]
    fn test_prompt_with_both_clauses() {
        let mut tally = PreferenceTally::default();
        tally.record(SwipeAction::Like, Movie::new("m1", "A")).unwrap();
        tally
            .record(SwipeAction::Dislike, Movie::new("m2", "C"))
            .unwrap();

        assert_eq!(
            build_refined_prompt("P", "", &tally),
            "P (films aimés: A) (films rejetés: C)"
        );
    }

    #[test]
    fn test_cursor_advances_on_like_and_dislike() {
        let mut session = DiscoverySession::new("sci-fi", false, movies(&["A", "B", "C"]));
        assert_eq!(session.current().unwrap().title, "A");
        assert_eq!(session.peek_next().unwrap().title, "B");

        assert_eq!(session.decide(SwipeAction::Like).unwrap(), Outcome::Advanced);
        assert_eq!(session.current().unwrap().title, "B");
        assert_eq!(
            session.decide(SwipeAction::Dislike).unwrap(),
            Outcome::Advanced
        );
        assert_eq!(session.current().unwrap().title, "C");
        assert!(session.peek_next().is_none());
    }

    #[test]
    fn test_exhaustion_after_queue_fully_decided() {
        let mut session = DiscoverySession::new("p", false, movies(&["A", "B", "C"]));
        session.decide(SwipeAction::Like).unwrap();
        session.decide(SwipeAction::Dislike).unwrap();
        assert_eq!(
            session.decide(SwipeAction::Like).unwrap(),
            Outcome::Exhausted
        );

        assert!(session.is_exhausted());
        assert!(session.current().is_none());
        assert_eq!(
            session.decide(SwipeAction::Like),
            Err(DiscoveryError::Exhausted)
        );
    }

    #[test]
    fn test_love_ends_session_without_advancing() {
        let mut session = DiscoverySession::new("p", false, movies(&["A", "B"]));
        let outcome = session.decide(SwipeAction::Love).unwrap();
        assert_eq!(outcome, Outcome::Selected(Movie::new("m1", "A")));

        assert_eq!(session.selection().unwrap().title, "A");
        assert!(session.current().is_none());
        assert_eq!(
            session.decide(SwipeAction::Like),
            Err(DiscoveryError::SessionEnded)
        );
        assert_eq!(session.tally().loved().len(), 1);
    }

    #[test]
    fn test_duplicate_title_rejected_across_lists() {
        let mut tally = PreferenceTally::default();
        tally.record(SwipeAction::Like, Movie::new("m1", "A")).unwrap();
        assert_eq!(
            tally.record(SwipeAction::Dislike, Movie::new("m1", "A")),
            Err(DiscoveryError::AlreadyDecided("A".into()))
        );
        assert!(tally.disliked().is_empty());
    }

    #[tokio::test]
    async fn test_refine_replaces_queue_and_resets_cursor() {
        let mut session = DiscoverySession::new("p", false, movies(&["A", "B"]));
        session.decide(SwipeAction::Like).unwrap();
        session.decide(SwipeAction::Dislike).unwrap();
        assert!(session.is_exhausted());

        let source = FixedSource(movies(&["X", "Y", "Z"]));
        let count = session.refine(&source, "plus récent").await.unwrap();
        assert_eq!(count, 3);
        assert!(!session.is_exhausted());
        assert_eq!(session.current().unwrap().title, "X");
        assert_eq!(session.remaining(), 3);
        // Tally survives refinement.
        assert_eq!(session.tally().liked().len(), 1);
    }

    #[tokio::test]
    async fn test_refine_failure_leaves_state_untouched() {
        let mut session = DiscoverySession::new("p", false, movies(&["A", "B"]));
        session.decide(SwipeAction::Like).unwrap();

        let err = session.refine(&FailingSource, "").await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
        assert_eq!(session.current().unwrap().title, "B");
        assert_eq!(session.remaining(), 1);
    }

    #[tokio::test]
    async fn test_refine_sends_enriched_prompt() {
        let mut session = DiscoverySession::new("P", false, movies(&["A", "B"]));
        session.decide(SwipeAction::Like).unwrap();
        session.decide(SwipeAction::Dislike).unwrap();

        let source = CapturingSource(std::sync::Mutex::new(None));
        session.refine(&source, "R").await.unwrap();
        assert_eq!(
            source.0.lock().unwrap().as_deref(),
            Some("P R (films aimés: A) (films rejetés: B)")
        );
    }
}
