//! A viewport state that frames a geometry.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::camera::{camera_for_coordinates, CameraOptions, CameraSurface, Padding};
use crate::cancel::Cancelable;
use crate::geo::GeoPoint;
use crate::signal::StateSignal;
use crate::viewport::ViewportState;

/// Configuration of [`OverviewViewportState`].
#[derive(Debug, Clone, PartialEq)]
pub struct OverviewViewportStateOptions {
    /// The coordinates to keep in view.
    pub geometry: Vec<GeoPoint>,
    /// Padding to keep clear around the geometry.
    pub padding: Padding,
    /// Camera bearing. `None` keeps the current bearing.
    pub bearing: Option<f64>,
    /// Camera pitch. `None` keeps the current pitch.
    pub pitch: Option<f64>,
}

impl Default for OverviewViewportStateOptions {
    fn default() -> Self {
        Self {
            geometry: Vec::new(),
            padding: Padding::default(),
            bearing: Some(0.0),
            pitch: Some(0.0),
        }
    }
}

/// A [`ViewportState`] that shows an overview of a geometry.
///
/// The camera is computed from the options and the viewport size; it only
/// changes when the options do.
pub struct OverviewViewportState {
    camera: Rc<dyn CameraSurface>,
    options: RefCell<OverviewViewportStateOptions>,
    camera_signal: StateSignal<CameraOptions>,
    update_token: RefCell<Option<Cancelable>>,
}

impl OverviewViewportState {
    /// Creates an overview state framing the geometry in `options`.
    pub fn new(camera: Rc<dyn CameraSurface>, options: OverviewViewportStateOptions) -> Rc<Self> {
        let state = Rc::new(Self {
            camera,
            options: RefCell::new(options),
            camera_signal: StateSignal::new(),
            update_token: RefCell::new(None),
        });
        state.recompute_camera();
        state
    }

    /// The current options.
    pub fn options(&self) -> OverviewViewportStateOptions {
        self.options.borrow().clone()
    }

    /// Replaces the options and recomputes the camera.
    pub fn set_options(&self, options: OverviewViewportStateOptions) {
        *self.options.borrow_mut() = options;
        self.recompute_camera();
    }

    fn recompute_camera(&self) {
        let options = self.options.borrow();
        let camera = camera_for_coordinates(
            &options.geometry,
            options.padding,
            options.bearing,
            options.pitch,
            self.camera.size(),
        );
        drop(options);
        if let Some(camera) = camera {
            self.camera_signal.set(camera);
        }
    }
}

impl ViewportState for OverviewViewportState {
    fn observe_camera(&self, mut handler: Box<dyn FnMut(&CameraOptions) -> bool>) -> Cancelable {
        let done = Rc::new(Cell::new(false));
        let token: Rc<RefCell<Option<Cancelable>>> = Rc::new(RefCell::new(None));

        let done_clone = done.clone();
        let token_clone = token.clone();
        let subscription = self.camera_signal.observe(move |camera| {
            if done_clone.get() {
                return;
            }
            if !handler(camera) {
                done_clone.set(true);
                if let Some(token) = token_clone.borrow_mut().take() {
                    token.cancel();
                }
            }
        });

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
        let camera = self.camera.clone();
        let token = self
            .camera_signal
            .observe(move |options: &CameraOptions| camera.set_camera(options));
        *self.update_token.borrow_mut() = Some(token);
    }

    fn stop_updating_camera(&self) {
        if let Some(token) = self.update_token.borrow_mut().take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::tests::MockCameraSurface;

    fn options(geometry: Vec<GeoPoint>) -> OverviewViewportStateOptions {
        OverviewViewportStateOptions {
            geometry,
            ..Default::default()
        }
    }

    #[test]
    fn applies_the_framing_camera_while_active() {
        let camera = Rc::new(MockCameraSurface::new());
        let state = OverviewViewportState::new(
            camera.clone(),
            options(vec![GeoPoint::new(10.0, 10.0), GeoPoint::new(20.0, 20.0)]),
        );

        state.start_updating_camera();
        let applied = camera.last_set_camera().expect("camera should be set");
        assert_abs_diff_eq!(applied.center.expect("center").lon(), 15.0, epsilon = 1e-9);

        state.stop_updating_camera();
        state.set_options(options(vec![GeoPoint::new(30.0, 30.0), GeoPoint::new(40.0, 40.0)]));
        let after_stop = camera.last_set_camera().expect("camera");
        assert_abs_diff_eq!(after_stop.center.expect("center").lon(), 15.0, epsilon = 1e-9);
    }

    #[test]
    fn option_changes_reach_active_observers() {
        let camera = Rc::new(MockCameraSurface::new());
        let state = OverviewViewportState::new(
            camera,
            options(vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(2.0, 2.0)]),
        );

        let emissions = Rc::new(RefCell::new(Vec::new()));
        let emissions_clone = emissions.clone();
        let _token = state.observe_camera(Box::new(move |camera| {
            emissions_clone.borrow_mut().push(*camera);
            true
        }));
        // The current camera arrives synchronously.
        assert_eq!(emissions.borrow().len(), 1);

        state.set_options(options(vec![GeoPoint::new(10.0, 10.0), GeoPoint::new(12.0, 12.0)]));
        assert_eq!(emissions.borrow().len(), 2);

        // Setting identical options does not emit again.
        state.set_options(options(vec![GeoPoint::new(10.0, 10.0), GeoPoint::new(12.0, 12.0)]));
        assert_eq!(emissions.borrow().len(), 2);
    }
}
