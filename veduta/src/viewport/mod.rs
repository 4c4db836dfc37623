//! The viewport: a structured approach to organizing camera management
//! logic into states and transitions between them.
//!
//! At any given time the viewport is either idle (not updating the camera),
//! in a state (camera managed by a [`ViewportState`]), or transitioning
//! (camera managed by a [`ViewportTransition`] on its way to a state).
//! The [`Viewport`] coordinator owns the current status and serializes all
//! changes to it; see its documentation for the exact transition semantics.

use std::rc::Rc;

use crate::camera::CameraOptions;
use crate::cancel::Cancelable;

mod coordinator;
mod follow_puck;
mod overview;
mod transitions;

pub use coordinator::Viewport;
pub use follow_puck::{FollowPuckViewportState, FollowPuckViewportStateBearing, FollowPuckViewportStateOptions};
pub use overview::{OverviewViewportState, OverviewViewportStateOptions};
pub use transitions::{DefaultViewportTransition, ImmediateViewportTransition};

/// A camera-following behavior, such as tracking the user's location or
/// framing a region.
///
/// States are compared by reference identity: the same `Rc` is the same
/// state. A state exposes the camera it currently wants through
/// [`observe_camera`](ViewportState::observe_camera) and applies it itself
/// while the viewport has made it current, between
/// [`start_updating_camera`](ViewportState::start_updating_camera) and
/// [`stop_updating_camera`](ViewportState::stop_updating_camera) calls.
pub trait ViewportState {
    /// Subscribes to the camera this state wants. The latest camera, if
    /// any, is delivered synchronously. The handler returns `false` to stop
    /// observing.
    fn observe_camera(&self, handler: Box<dyn FnMut(&CameraOptions) -> bool>) -> Cancelable;
    /// The state becomes responsible for updating the camera.
    fn start_updating_camera(&self);
    /// The state stops updating the camera.
    fn stop_updating_camera(&self);
}

/// Completion callback of a transition run: `true` means the transition ran
/// to its end, `false` that it failed or was interrupted.
pub type TransitionCompletion = Box<dyn FnOnce(bool)>;

/// A strategy that moves the camera from wherever it is to a target state.
pub trait ViewportTransition {
    /// Starts animating toward `to_state`.
    ///
    /// The returned handle cancels the run. The transition must invoke
    /// `completion` exactly once unless it is canceled first; it may do so
    /// synchronously from within `run`.
    fn run(&self, to_state: Rc<dyn ViewportState>, completion: TransitionCompletion)
        -> Cancelable;
}

/// What the viewport is currently doing.
#[derive(Clone)]
pub enum ViewportStatus {
    /// Not updating the camera.
    Idle,
    /// The camera is managed by a state.
    State(Rc<dyn ViewportState>),
    /// The camera is being animated toward a state.
    Transition {
        /// The running transition.
        transition: Rc<dyn ViewportTransition>,
        /// The state the transition leads to.
        to_state: Rc<dyn ViewportState>,
    },
}

impl PartialEq for ViewportStatus {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ViewportStatus::Idle, ViewportStatus::Idle) => true,
            (ViewportStatus::State(a), ViewportStatus::State(b)) => Rc::ptr_eq(a, b),
            (
                ViewportStatus::Transition {
                    transition: transition_a,
                    to_state: state_a,
                },
                ViewportStatus::Transition {
                    transition: transition_b,
                    to_state: state_b,
                },
            ) => Rc::ptr_eq(transition_a, transition_b) && Rc::ptr_eq(state_a, state_b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for ViewportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewportStatus::Idle => write!(f, "Idle"),
            ViewportStatus::State(state) => {
                write!(f, "State({:p})", Rc::as_ptr(state))
            }
            ViewportStatus::Transition {
                transition,
                to_state,
            } => write!(
                f,
                "Transition({:p} -> {:p})",
                Rc::as_ptr(transition),
                Rc::as_ptr(to_state)
            ),
        }
    }
}

/// Why the viewport status changed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ViewportStatusChangeReason {
    /// [`Viewport::idle`] was called.
    IdleRequested,
    /// A transition started running.
    TransitionStarted,
    /// A transition ran to completion.
    TransitionSucceeded,
    /// A transition failed or was interrupted externally.
    TransitionFailed,
    /// The user interacted with the map.
    UserInteraction,
}

/// Receiver of viewport status change notifications.
///
/// Notifications are delivered asynchronously through the viewport's task
/// queue, in the order the changes happened, never from inside the call
/// that caused them.
pub trait ViewportStatusObserver {
    /// The viewport status changed from `from` to `to`.
    fn viewport_status_did_change(
        &self,
        from: &ViewportStatus,
        to: &ViewportStatus,
        reason: ViewportStatusChangeReason,
    );
}

/// Configuration of the [`Viewport`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ViewportOptions {
    /// Whether the viewport goes idle when the user interacts with the map.
    pub transitions_to_idle_upon_user_interaction: bool,
}

impl Default for ViewportOptions {
    fn default() -> Self {
        Self {
            transitions_to_idle_upon_user_interaction: true,
        }
    }
}
