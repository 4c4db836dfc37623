//! Veduta is the camera coordination core of a map renderer. It decides
//! what the camera should be doing - following the user, framing a region,
//! flying between places - while the actual rendering engine stays on the
//! other side of a handful of narrow traits.
//!
//! # Main components
//!
//! * The [`Viewport`](viewport::Viewport) coordinator owns the current
//!   camera-following behavior. At any moment it is idle, in a
//!   [`ViewportState`](viewport::ViewportState) (such as
//!   [`FollowPuckViewportState`](viewport::FollowPuckViewportState) or
//!   [`OverviewViewportState`](viewport::OverviewViewportState)), or running
//!   a [`ViewportTransition`](viewport::ViewportTransition) between states.
//! * [`camera`] holds the camera value types and the animators that change
//!   the camera over time, including the van Wijk
//!   [fly-to](camera::FlyToInterpolator) flight path, all driven once per
//!   frame by the [`CameraAnimatorsRunner`](camera::CameraAnimatorsRunner).
//! * [`location`] turns raw platform location/heading pushes into smooth
//!   per-frame snapshots, and [`puck`] renders those snapshots through the
//!   style engine with fast-path/full-path property diffing.
//!
//! # External collaborators
//!
//! The embedding application supplies implementations of
//! [`CameraSurface`](camera::CameraSurface) (camera get/set),
//! [`StyleSurface`](style::StyleSurface) (layer/image mutations),
//! [`FrameDriver`](driver::FrameDriver) (per-frame ticks) and
//! [`LocationProvider`](location::LocationProvider) (location services).
//! Everything runs on a single thread; deferred work (most notably viewport
//! status notifications) goes through a [`TaskQueue`] that the application
//! drains once per turn of its event loop.

#![warn(clippy::unwrap_used)]
#![warn(missing_docs)]

pub mod camera;
mod cancel;
mod clock;
mod color;
pub mod driver;
mod easing;
pub mod error;
pub mod geo;
pub mod interpolate;
pub mod location;
pub mod puck;
mod registry;
mod signal;
pub mod style;
mod task_queue;
pub mod viewport;

#[cfg(test)]
pub(crate) mod tests;

pub use cancel::Cancelable;
pub use clock::{Clock, SystemClock};
pub use color::Color;
pub use easing::{TimingCurve, UnitBezier};
pub use error::VedutaError;
pub use signal::{Signal, StateSignal};
pub use task_queue::{DeferredTaskQueue, TaskQueue};
