//! crates/deliberation_core/src/gesture.rs
//!
//! Maps raw pointer movement on the current comment card into vote or advance intents.
//!
//! Deltas are measured start-minus-end: dragging left gives a positive `dx`,
//! dragging up gives a positive `dy`.

use crate::domain::VoteValue;

/// Minimum drag distance, in pointer units, before a swipe counts.
pub const SWIPE_THRESHOLD: f64 = 100.0;
/// The card never follows the finger further than this share of the viewport.
pub const MAX_SWIPE_OFFSET_PERCENT: f64 = 30.0;
/// Offset beyond which the card is tinted with the pending reaction.
pub const TINT_THRESHOLD_PERCENT: f64 = 15.0;
/// Viewports at most this wide are treated as touch surfaces.
pub const TOUCH_VIEWPORT_MAX_WIDTH: f64 = 768.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// What a finished gesture asks the session to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureIntent {
    Vote(VoteValue),
    /// Skip the current comment without voting.
    Advance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Touch,
    Pointer,
}

impl Surface {
    pub fn from_viewport_width(width: f64) -> Self {
        if width <= TOUCH_VIEWPORT_MAX_WIDTH {
            Surface::Touch
        } else {
            Surface::Pointer
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeTint {
    None,
    Agree,
    Disagree,
}

/// Presentation hint while a horizontal drag is in progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwipeFeedback {
    /// Card offset as a percentage of viewport width; positive moves right.
    pub offset_percent: f64,
    pub tint: SwipeTint,
}

/// Classifies a completed drag from `start` to `end`.
pub fn classify(start: Point, end: Point) -> Option<GestureIntent> {
    let dx = start.x - end.x;
    let dy = start.y - end.y;

    if dx.abs() > dy.abs() {
        if dx.abs() <= SWIPE_THRESHOLD {
            return None;
        }
        if dx > 0.0 {
            Some(GestureIntent::Vote(VoteValue::Disagree))
        } else {
            Some(GestureIntent::Vote(VoteValue::Agree))
        }
    } else if dy > SWIPE_THRESHOLD {
        Some(GestureIntent::Advance)
    } else {
        None
    }
}

/// A tap votes neutral on touch surfaces, unless the vote is already neutral.
pub fn tap_intent(surface: Surface, current_vote: Option<VoteValue>) -> Option<GestureIntent> {
    match (surface, current_vote) {
        (Surface::Pointer, _) => None,
        (Surface::Touch, Some(VoteValue::Neutral)) => None,
        (Surface::Touch, _) => Some(GestureIntent::Vote(VoteValue::Neutral)),
    }
}

/// Follows one pointer gesture from press to release.
#[derive(Debug, Clone)]
pub struct GestureInterpreter {
    surface: Surface,
    viewport_width: f64,
    start: Option<Point>,
}

impl GestureInterpreter {
    pub fn new(viewport_width: f64) -> Self {
        Self {
            surface: Surface::from_viewport_width(viewport_width),
            viewport_width,
            start: None,
        }
    }

    pub fn surface(&self) -> Surface {
        self.surface
    }

    pub fn is_active(&self) -> bool {
        self.start.is_some()
    }

    pub fn begin(&mut self, at: Point) {
        self.start = Some(at);
    }

    /// Feedback for an in-progress move; `None` when idle or moving vertically.
    pub fn update(&self, at: Point) -> Option<SwipeFeedback> {
        let start = self.start?;
        let dx = start.x - at.x;
        let dy = start.y - at.y;
        if dx.abs() <= dy.abs() {
            return None;
        }

        let width = self.viewport_width.max(1.0);
        let percent = (dx / width * 100.0).clamp(-MAX_SWIPE_OFFSET_PERCENT, MAX_SWIPE_OFFSET_PERCENT);
        let tint = if percent > TINT_THRESHOLD_PERCENT {
            SwipeTint::Disagree
        } else if percent < -TINT_THRESHOLD_PERCENT {
            SwipeTint::Agree
        } else {
            SwipeTint::None
        };

        Some(SwipeFeedback {
            offset_percent: -percent,
            tint,
        })
    }

    /// Finishes the gesture. Releasing without a prior press yields nothing.
    pub fn end(&mut self, at: Point) -> Option<GestureIntent> {
        let start = self.start.take()?;
        classify(start, at)
    }

    pub fn cancel(&mut self) {
        self.start = None;
    }
}
