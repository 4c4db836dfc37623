//! Interface to the external display-refresh driver.

use crate::cancel::Cancelable;
use crate::signal::Signal;

/// Source of per-frame ticks.
///
/// The embedding application owns the actual vsync source (a display link, a
/// winit event loop, a timer) and forwards its ticks through this trait.
/// Animators, the location interpolator and the puck renderer all advance on
/// these ticks and at no other time.
pub trait FrameDriver {
    /// Subscribes to ticks. Canceling the returned handle stops them.
    fn observe(&self, tick: Box<dyn FnMut()>) -> Cancelable;
}

/// A [`FrameDriver`] pumped by hand.
///
/// Used in tests and by headless embedders that call [`ManualFrameDriver::tick`]
/// from their own loop.
#[derive(Default)]
pub struct ManualFrameDriver {
    ticks: Signal<()>,
}

impl ManualFrameDriver {
    /// Creates a driver with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers one tick to every subscriber.
    pub fn tick(&self) {
        self.ticks.notify(&());
    }

    /// Number of active subscriptions.
    pub fn observer_count(&self) -> usize {
        self.ticks.observer_count()
    }
}

impl FrameDriver for ManualFrameDriver {
    fn observe(&self, mut tick: Box<dyn FnMut()>) -> Cancelable {
        self.ticks.observe(move |()| tick())
    }
}
