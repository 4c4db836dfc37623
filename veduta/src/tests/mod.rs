//! Shared mock collaborators for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Weak;
use std::time::Duration;

use web_time::SystemTime;

use crate::camera::{
    CameraBounds, CameraOptions, CameraState, CameraSurface, Padding, ScreenPoint, ScreenSize,
};
use crate::clock::Clock;
use crate::error::VedutaError;
use crate::geo::GeoPoint;
use crate::location::{
    AccuracyAuthorization, Heading, Location, LocationProvider, LocationProviderDelegate,
};
use crate::style::{Image, StyleProperties, StyleSurface};

/// A clock advanced by hand.
pub(crate) struct ManualClock {
    now: Cell<SystemTime>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Cell::new(SystemTime::UNIX_EPOCH),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        self.now.get()
    }
}

/// A camera surface that applies deltas to an in-memory state and records
/// every call.
pub(crate) struct MockCameraSurface {
    state: RefCell<CameraState>,
    bounds: Cell<CameraBounds>,
    size: Cell<ScreenSize>,
    set_camera_log: RefCell<Vec<CameraOptions>>,
    begin_count: Cell<usize>,
    end_count: Cell<usize>,
}

impl MockCameraSurface {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(CameraState {
                center: GeoPoint::new(0.0, 0.0),
                zoom: 0.0,
                bearing: 0.0,
                pitch: 0.0,
                padding: Padding::default(),
            }),
            bounds: Cell::new(CameraBounds::default()),
            size: Cell::new(ScreenSize::new(800.0, 600.0)),
            set_camera_log: RefCell::new(Vec::new()),
            begin_count: Cell::new(0),
            end_count: Cell::new(0),
        }
    }

    pub fn set_state(&self, update: impl FnOnce(&mut CameraState)) {
        update(&mut self.state.borrow_mut());
    }

    pub fn last_set_camera(&self) -> Option<CameraOptions> {
        self.set_camera_log.borrow().last().copied()
    }

    pub fn set_camera_count(&self) -> usize {
        self.set_camera_log.borrow().len()
    }

    pub fn begin_animation_count(&self) -> usize {
        self.begin_count.get()
    }

    pub fn end_animation_count(&self) -> usize {
        self.end_count.get()
    }
}

impl CameraSurface for MockCameraSurface {
    fn camera_state(&self) -> CameraState {
        *self.state.borrow()
    }

    fn set_camera(&self, options: &CameraOptions) {
        let mut state = self.state.borrow_mut();
        if let Some(center) = options.center {
            state.center = center;
        }
        if let Some(zoom) = options.zoom {
            state.zoom = zoom;
        }
        if let Some(bearing) = options.bearing {
            state.bearing = bearing;
        }
        if let Some(pitch) = options.pitch {
            state.pitch = pitch;
        }
        if let Some(padding) = options.padding {
            state.padding = padding;
        }
        drop(state);
        self.set_camera_log.borrow_mut().push(*options);
    }

    fn camera_bounds(&self) -> CameraBounds {
        self.bounds.get()
    }

    fn size(&self) -> ScreenSize {
        self.size.get()
    }

    fn anchor(&self) -> ScreenPoint {
        let size = self.size.get();
        ScreenPoint::new(size.width / 2.0, size.height / 2.0)
    }

    fn begin_animation(&self) {
        self.begin_count.set(self.begin_count.get() + 1);
    }

    fn end_animation(&self) {
        self.end_count.set(self.end_count.get() + 1);
    }
}

/// A location provider that records start/stop calls and pushes updates on
/// demand.
pub(crate) struct MockLocationProvider {
    delegate: RefCell<Option<Weak<dyn LocationProviderDelegate>>>,
    start_location: Cell<usize>,
    stop_location: Cell<usize>,
    start_heading: Cell<usize>,
    stop_heading: Cell<usize>,
    authorization: Cell<AccuracyAuthorization>,
}

impl MockLocationProvider {
    pub fn new() -> Self {
        Self {
            delegate: RefCell::new(None),
            start_location: Cell::new(0),
            stop_location: Cell::new(0),
            start_heading: Cell::new(0),
            stop_heading: Cell::new(0),
            authorization: Cell::new(AccuracyAuthorization::Full),
        }
    }

    fn with_delegate(&self, action: impl FnOnce(&dyn LocationProviderDelegate)) {
        let delegate = self.delegate.borrow().clone();
        if let Some(delegate) = delegate.and_then(|weak| weak.upgrade()) {
            action(&*delegate);
        }
    }

    pub fn push_location(&self, location: Location) {
        self.push_locations(&[location]);
    }

    pub fn push_locations(&self, locations: &[Location]) {
        self.with_delegate(|delegate| delegate.did_update_locations(locations));
    }

    pub fn push_heading(&self, heading: Heading) {
        self.with_delegate(|delegate| delegate.did_update_heading(&heading));
    }

    pub fn fail(&self, message: &str) {
        self.with_delegate(|delegate| delegate.did_fail(VedutaError::Provider(message.into())));
    }

    pub fn change_authorization(&self, authorization: AccuracyAuthorization) {
        self.authorization.set(authorization);
        self.with_delegate(|delegate| delegate.did_change_authorization());
    }

    pub fn start_location_count(&self) -> usize {
        self.start_location.get()
    }

    pub fn stop_location_count(&self) -> usize {
        self.stop_location.get()
    }

    pub fn start_heading_count(&self) -> usize {
        self.start_heading.get()
    }

    pub fn stop_heading_count(&self) -> usize {
        self.stop_heading.get()
    }
}

impl LocationProvider for MockLocationProvider {
    fn set_delegate(&self, delegate: Weak<dyn LocationProviderDelegate>) {
        *self.delegate.borrow_mut() = Some(delegate);
    }

    fn start_updating_location(&self) {
        self.start_location.set(self.start_location.get() + 1);
    }

    fn stop_updating_location(&self) {
        self.stop_location.set(self.stop_location.get() + 1);
    }

    fn start_updating_heading(&self) {
        self.start_heading.set(self.start_heading.get() + 1);
    }

    fn stop_updating_heading(&self) {
        self.stop_heading.set(self.stop_heading.get() + 1);
    }

    fn accuracy_authorization(&self) -> AccuracyAuthorization {
        self.authorization.get()
    }
}

/// A style surface backed by in-memory maps.
pub(crate) struct MockStyleSurface {
    layers: RefCell<HashMap<String, StyleProperties>>,
    sources: RefCell<HashMap<String, StyleProperties>>,
    images: RefCell<HashMap<String, Image>>,
    add_layer_count: Cell<usize>,
    set_properties_log: RefCell<Vec<(String, StyleProperties)>>,
}

impl MockStyleSurface {
    pub fn new() -> Self {
        Self {
            layers: RefCell::new(HashMap::new()),
            sources: RefCell::new(HashMap::new()),
            images: RefCell::new(HashMap::new()),
            add_layer_count: Cell::new(0),
            set_properties_log: RefCell::new(Vec::new()),
        }
    }

    pub fn add_layer_count(&self) -> usize {
        self.add_layer_count.get()
    }

    /// The properties of the most recent `set_layer_properties` call for the
    /// given layer.
    pub fn last_set_properties(&self, id: &str) -> Option<StyleProperties> {
        self.set_properties_log
            .borrow()
            .iter()
            .rev()
            .find(|(layer_id, _)| layer_id == id)
            .map(|(_, properties)| properties.clone())
    }

    /// Like [`last_set_properties`](Self::last_set_properties), but falls
    /// back to the properties the layer was added with.
    pub fn last_set_or_added_properties(&self, id: &str) -> Option<StyleProperties> {
        self.last_set_properties(id)
            .or_else(|| self.layers.borrow().get(id).cloned())
    }
}

impl StyleSurface for MockStyleSurface {
    fn add_persistent_layer(&self, properties: StyleProperties) -> Result<(), VedutaError> {
        let id = properties
            .get("id")
            .and_then(|value| value.as_str())
            .ok_or_else(|| VedutaError::StyleMutation("layer is missing an id".into()))?
            .to_owned();
        self.layers.borrow_mut().insert(id, properties);
        self.add_layer_count.set(self.add_layer_count.get() + 1);
        Ok(())
    }

    fn remove_layer(&self, id: &str) -> Result<(), VedutaError> {
        self.layers
            .borrow_mut()
            .remove(id)
            .map(|_| ())
            .ok_or(VedutaError::NotFound)
    }

    fn set_layer_properties(
        &self,
        id: &str,
        properties: StyleProperties,
    ) -> Result<(), VedutaError> {
        let mut layers = self.layers.borrow_mut();
        let layer = layers
            .get_mut(id)
            .ok_or_else(|| VedutaError::StyleMutation(format!("no layer with id {id}")))?;
        for (key, value) in &properties {
            layer.insert(key.clone(), value.clone());
        }
        drop(layers);
        self.set_properties_log
            .borrow_mut()
            .push((id.to_owned(), properties));
        Ok(())
    }

    fn layer_exists(&self, id: &str) -> bool {
        self.layers.borrow().contains_key(id)
    }

    fn layer_property_default(&self, _layer_type: &str, _property: &str) -> serde_json::Value {
        serde_json::Value::Null
    }

    fn add_source(&self, id: &str, properties: StyleProperties) -> Result<(), VedutaError> {
        self.sources.borrow_mut().insert(id.to_owned(), properties);
        Ok(())
    }

    fn remove_source(&self, id: &str) -> Result<(), VedutaError> {
        self.sources
            .borrow_mut()
            .remove(id)
            .map(|_| ())
            .ok_or(VedutaError::NotFound)
    }

    fn set_source_properties(
        &self,
        id: &str,
        properties: StyleProperties,
    ) -> Result<(), VedutaError> {
        let mut sources = self.sources.borrow_mut();
        let source = sources
            .get_mut(id)
            .ok_or_else(|| VedutaError::StyleMutation(format!("no source with id {id}")))?;
        for (key, value) in &properties {
            source.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    fn add_image(&self, id: &str, image: &Image) -> Result<(), VedutaError> {
        let mut images = self.images.borrow_mut();
        if images.contains_key(id) {
            return Err(VedutaError::StyleMutation(format!(
                "image {id} already exists"
            )));
        }
        images.insert(id.to_owned(), image.clone());
        Ok(())
    }

    fn remove_image(&self, id: &str) -> Result<(), VedutaError> {
        self.images
            .borrow_mut()
            .remove(id)
            .map(|_| ())
            .ok_or(VedutaError::NotFound)
    }

    fn image_exists(&self, id: &str) -> bool {
        self.images.borrow().contains_key(id)
    }
}
