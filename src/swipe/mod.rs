// Copyright (c) 2025 MovieMind
// Licensed under the MIT License. See LICENSE file for details.

//! Swipe gesture classification.
//!
//! Maps a drag gesture (offset + release velocity) or a discrete button
//! press onto one of the three [`SwipeAction`]s. The classifier is a pure
//! function; [`SwipeCard`] adds the tiny per-card state machine around it:
//!
//! `Idle -> Dragging -> { Decided, Idle }`
//!
//! A decided card is terminal. The caller-supplied handler runs exactly
//! once per card; sequencing through the deck is the discovery loop's job,
//! not this module's.

use serde::{Deserialize, Serialize};

use crate::types::SwipeAction;

/// Drag distance (in logical pixels) past which a release decides.
pub const SWIPE_DISTANCE_THRESHOLD: f32 = 100.0;

/// Release velocity (logical pixels per second) past which a fling decides
/// even under the distance threshold.
pub const SWIPE_VELOCITY_THRESHOLD: f32 = 500.0;

/// Magnitude of the exit vector handed to the release animation.
const EXIT_DISTANCE: f32 = 300.0;

/// Two-axis gesture measurement at release time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Gesture {
    /// Horizontal offset from the rest position.
    pub dx: f32,
    /// Vertical offset from the rest position. Negative is up.
    pub dy: f32,
    /// Instantaneous horizontal velocity at release.
    pub vx: f32,
    /// Instantaneous vertical velocity at release.
    pub vy: f32,
}

impl Gesture {
    pub fn offset(dx: f32, dy: f32) -> Self {
        Self {
            dx,
            dy,
            ..Self::default()
        }
    }
}

/// Classify a release gesture.
///
/// Horizontal checks take priority over vertical: a diagonal fling that
/// crosses both thresholds is a like/dislike, never a love. Only upward
/// motion maps to love; downward motion has no bound action. `None` means
/// the card springs back.
pub fn classify_release(gesture: Gesture) -> Option<SwipeAction> {
    if gesture.dx.abs() > SWIPE_DISTANCE_THRESHOLD || gesture.vx.abs() > SWIPE_VELOCITY_THRESHOLD {
        if gesture.dx > 0.0 {
            Some(SwipeAction::Like)
        } else {
            Some(SwipeAction::Dislike)
        }
    } else if gesture.dy < -SWIPE_DISTANCE_THRESHOLD || gesture.vy < -SWIPE_VELOCITY_THRESHOLD {
        Some(SwipeAction::Love)
    } else {
        None
    }
}

/// Exit direction for the release animation. Presentation-only; not part
/// of the decision contract.
pub fn exit_vector(action: SwipeAction) -> (f32, f32) {
    match action {
        SwipeAction::Like => (EXIT_DISTANCE, 0.0),
        SwipeAction::Dislike => (-EXIT_DISTANCE, 0.0),
        SwipeAction::Love => (0.0, -EXIT_DISTANCE),
    }
}

/// Lifecycle of one visible card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardPhase {
    /// At rest, accepting input.
    Idle,
    /// A drag is in progress.
    Dragging,
    /// A decision was made. Terminal.
    Decided,
}

impl CardPhase {
    pub fn is_decided(&self) -> bool {
        matches!(self, CardPhase::Decided)
    }
}

impl std::fmt::Display for CardPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CardPhase::Idle => write!(f, "IDLE"),
            CardPhase::Dragging => write!(f, "DRAGGING"),
            CardPhase::Decided => write!(f, "DECIDED"),
        }
    }
}

/// Per-card gesture state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwipeCard {
    phase: CardPhase,
    offset: (f32, f32),
    exit: (f32, f32),
}

impl Default for SwipeCard {
    fn default() -> Self {
        Self::new()
    }
}

impl SwipeCard {
    pub fn new() -> Self {
        Self {
            phase: CardPhase::Idle,
            offset: (0.0, 0.0),
            exit: (0.0, 0.0),
        }
    }

    pub fn phase(&self) -> CardPhase {
        self.phase
    }

    /// Current drag offset, for rendering the card under the pointer.
    pub fn offset(&self) -> (f32, f32) {
        self.offset
    }

    /// Exit vector set by the deciding gesture or button, for the release
    /// animation.
    pub fn exit(&self) -> (f32, f32) {
        self.exit
    }

    /// Pointer down. Ignored once decided.
    pub fn drag_start(&mut self) {
        if self.phase == CardPhase::Idle {
            self.phase = CardPhase::Dragging;
        }
    }

    /// Pointer moved while dragging.
    pub fn drag_move(&mut self, dx: f32, dy: f32) {
        if self.phase == CardPhase::Dragging {
            self.offset = (dx, dy);
        }
    }

    /// Pointer up. Returns the decision, if the gesture crossed a
    /// threshold; otherwise the card springs back to idle at zero offset.
    pub fn release(&mut self, gesture: Gesture) -> Option<SwipeAction> {
        if self.phase != CardPhase::Dragging {
            return None;
        }

        match classify_release(gesture) {
            Some(action) => {
                self.decide(action);
                Some(action)
            }
            None => {
                self.phase = CardPhase::Idle;
                self.offset = (0.0, 0.0);
                None
            }
        }
    }

    /// Discrete button trigger. Bypasses the drag math, produces the same
    /// decision outcomes. Returns `None` once decided.
    pub fn press(&mut self, action: SwipeAction) -> Option<SwipeAction> {
        if self.phase.is_decided() {
            return None;
        }
        self.decide(action);
        Some(action)
    }

    fn decide(&mut self, action: SwipeAction) {
        self.phase = CardPhase::Decided;
        self.exit = exit_vector(action);
        tracing::debug!("SWIPE_DECIDED | action={} exit={:?}", action, self.exit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_like_on_right_offset() {
        assert_eq!(
            classify_release(Gesture::offset(150.0, 0.0)),
            Some(SwipeAction::Like)
        );
    }

    #[test]
    fn test_classify_dislike_on_left_offset() {
        assert_eq!(
            classify_release(Gesture::offset(-150.0, 0.0)),
            Some(SwipeAction::Dislike)
        );
    }

    #[test]
    fn test_classify_love_on_upward_offset() {
        assert_eq!(
            classify_release(Gesture::offset(0.0, -150.0)),
            Some(SwipeAction::Love)
        );
    }

    #[test]
    fn test_under_threshold_is_no_decision() {
        assert_eq!(classify_release(Gesture::offset(30.0, -30.0)), None);
    }

    #[test]
    fn test_velocity_alone_decides() {
        // Velocity crosses the threshold; direction still comes from the
        // offset sign, so zero horizontal offset lands on the dislike side.
        let fling_right = Gesture {
            dx: 40.0,
            vx: 600.0,
            ..Gesture::default()
        };
        assert_eq!(classify_release(fling_right), Some(SwipeAction::Like));

        let fling_flat = Gesture {
            vx: 600.0,
            ..Gesture::default()
        };
        assert_eq!(classify_release(fling_flat), Some(SwipeAction::Dislike));

        let fling_up = Gesture {
            vy: -600.0,
            ..Gesture::default()
        };
        assert_eq!(classify_release(fling_up), Some(SwipeAction::Love));
    }

    #[test]
    fn test_horizontal_takes_priority_over_vertical() {
        // Diagonal gesture crossing both thresholds decides horizontally.
        assert_eq!(
            classify_release(Gesture::offset(150.0, -150.0)),
            Some(SwipeAction::Like)
        );
        assert_eq!(
            classify_release(Gesture::offset(-150.0, -150.0)),
            Some(SwipeAction::Dislike)
        );
    }

    #[test]
    fn test_downward_motion_has_no_action() {
        assert_eq!(classify_release(Gesture::offset(0.0, 150.0)), None);
        let fling_down = Gesture {
            vy: 600.0,
            ..Gesture::default()
        };
        assert_eq!(classify_release(fling_down), None);
    }

    #[test]
    fn test_exact_threshold_does_not_decide() {
        // Strict inequality: exactly 100 springs back.
        assert_eq!(classify_release(Gesture::offset(100.0, 0.0)), None);
        assert_eq!(classify_release(Gesture::offset(0.0, -100.0)), None);
    }

    #[test]
    fn test_spring_back_resets_offset() {
        let mut card = SwipeCard::new();
        card.drag_start();
        card.drag_move(40.0, -10.0);
        assert_eq!(card.offset(), (40.0, -10.0));

        assert_eq!(card.release(Gesture::offset(40.0, -10.0)), None);
        assert_eq!(card.phase(), CardPhase::Idle);
        assert_eq!(card.offset(), (0.0, 0.0));
    }

    #[test]
    fn test_decided_card_is_terminal() {
        let mut card = SwipeCard::new();
        card.drag_start();
        assert_eq!(
            card.release(Gesture::offset(150.0, 0.0)),
            Some(SwipeAction::Like)
        );
        assert!(card.phase().is_decided());

        // No path back to idle, no second decision.
        card.drag_start();
        assert_eq!(card.phase(), CardPhase::Decided);
        assert_eq!(card.release(Gesture::offset(-150.0, 0.0)), None);
        assert_eq!(card.press(SwipeAction::Love), None);
    }

    #[test]
    fn test_button_press_sets_exit_vector() {
        let mut card = SwipeCard::new();
        assert_eq!(card.press(SwipeAction::Dislike), Some(SwipeAction::Dislike));
        assert_eq!(card.exit(), (-300.0, 0.0));
        assert!(card.phase().is_decided());
    }

    #[test]
    fn test_exit_vectors_per_action() {
        assert_eq!(exit_vector(SwipeAction::Like), (300.0, 0.0));
        assert_eq!(exit_vector(SwipeAction::Dislike), (-300.0, 0.0));
        assert_eq!(exit_vector(SwipeAction::Love), (0.0, -300.0));
    }
}
