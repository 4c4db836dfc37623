//! A viewport state that keeps the camera on the user's location.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::camera::{CameraOptions, CameraSurface, Padding};
use crate::cancel::Cancelable;
use crate::location::{InterpolatedLocationProducer, PuckRenderingData};
use crate::viewport::ViewportState;

/// Where the camera bearing comes from while following the puck.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum FollowPuckViewportStateBearing {
    /// The device heading.
    Heading,
    /// The direction of travel.
    Course,
    /// A fixed bearing in degrees.
    Constant(f64),
}

/// Configuration of [`FollowPuckViewportState`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FollowPuckViewportStateOptions {
    /// Camera zoom. `None` keeps the current zoom.
    pub zoom: Option<f64>,
    /// Camera pitch. `None` keeps the current pitch.
    pub pitch: Option<f64>,
    /// Camera padding. `None` keeps the current padding.
    pub padding: Option<Padding>,
    /// Camera bearing source. `None` keeps the current bearing.
    pub bearing: Option<FollowPuckViewportStateBearing>,
}

impl Default for FollowPuckViewportStateOptions {
    fn default() -> Self {
        Self {
            zoom: Some(16.35),
            pitch: Some(45.0),
            padding: None,
            bearing: Some(FollowPuckViewportStateBearing::Heading),
        }
    }
}

/// A [`ViewportState`] that follows the interpolated location stream.
///
/// While the state is updating the camera, every emission of the stream is
/// turned into a camera change according to the options.
pub struct FollowPuckViewportState {
    camera: Rc<dyn CameraSurface>,
    data: Rc<InterpolatedLocationProducer>,
    options: RefCell<FollowPuckViewportStateOptions>,
    update_token: RefCell<Option<Cancelable>>,
    weak_self: RefCell<Weak<FollowPuckViewportState>>,
}

impl FollowPuckViewportState {
    /// Creates a follow-puck state.
    pub fn new(
        camera: Rc<dyn CameraSurface>,
        data: Rc<InterpolatedLocationProducer>,
        options: FollowPuckViewportStateOptions,
    ) -> Rc<Self> {
        let state = Rc::new(Self {
            camera,
            data,
            options: RefCell::new(options),
            update_token: RefCell::new(None),
            weak_self: RefCell::new(Weak::new()),
        });
        *state.weak_self.borrow_mut() = Rc::downgrade(&state);
        state
    }

    /// The current options.
    pub fn options(&self) -> FollowPuckViewportStateOptions {
        *self.options.borrow()
    }

    /// Replaces the options. Takes effect on the next location emission.
    pub fn set_options(&self, options: FollowPuckViewportStateOptions) {
        *self.options.borrow_mut() = options;
    }

    fn camera_for(&self, data: &PuckRenderingData) -> CameraOptions {
        let options = self.options.borrow();
        CameraOptions {
            center: Some(data.location.point),
            zoom: options.zoom,
            pitch: options.pitch,
            padding: options.padding,
            bearing: options.bearing.map(|bearing| match bearing {
                FollowPuckViewportStateBearing::Heading => data.heading.unwrap_or(0.0),
                FollowPuckViewportStateBearing::Course => data.location.course.unwrap_or(0.0),
                FollowPuckViewportStateBearing::Constant(value) => value,
            }),
            anchor: None,
        }
    }
}

impl ViewportState for FollowPuckViewportState {
    fn observe_camera(&self, mut handler: Box<dyn FnMut(&CameraOptions) -> bool>) -> Cancelable {
        let weak = self.weak_self.borrow().clone();
        let done = Rc::new(Cell::new(false));
        let token: Rc<RefCell<Option<Cancelable>>> = Rc::new(RefCell::new(None));

        let done_clone = done.clone();
        let token_clone = token.clone();
        let subscription = self.data.observe(move |data| {
            if done_clone.get() {
                return;
            }
            let Some(state) = weak.upgrade() else {
                return;
            };
            if !handler(&state.camera_for(data)) {
                done_clone.set(true);
                if let Some(token) = token_clone.borrow_mut().take() {
                    token.cancel();
                }
            }
        });

        // The handler may have finished on the synchronous initial delivery,
        // before the subscription token was in place.
        if done.get() {
            subscription.cancel();
            return Cancelable::empty();
        }
        *token.borrow_mut() = Some(subscription);

        Cancelable::new(move || {
            if let Some(token) = token.borrow_mut().take() {
                token.cancel();
            }
        })
    }

    fn start_updating_camera(&self) {
        if self.update_token.borrow().is_some() {
            return;
        }
        let weak = self.weak_self.borrow().clone();
        let token = self.data.observe(move |data: &PuckRenderingData| {
            if let Some(state) = weak.upgrade() {
                state.camera.set_camera(&state.camera_for(data));
            }
        });
        *self.update_token.borrow_mut() = Some(token);
    }

    fn stop_updating_camera(&self) {
        if let Some(token) = self.update_token.borrow_mut().take() {
            token.cancel();
        }
    }
}
