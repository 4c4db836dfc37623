//! Rendering of the location puck through the external style engine.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};
use std::time::Duration;

use serde_json::json;
use web_time::SystemTime;

use crate::camera::CameraSurface;
use crate::cancel::Cancelable;
use crate::clock::Clock;
use crate::color::Color;
use crate::easing::{TimingCurve, UnitBezier};
use crate::error::VedutaError;
use crate::geo::meters_per_pixel;
use crate::location::{AccuracyAuthorization, InterpolatedLocationProducer, PuckRenderingData};
use crate::style::{Image, StyleProperties, StyleSurface};

const LAYER_ID: &str = "puck";
const LAYER_TYPE: &str = "location-indicator";
const TOP_IMAGE_ID: &str = "location-indicator-top-image";
const BEARING_IMAGE_ID: &str = "location-indicator-bearing-image";
const SHADOW_IMAGE_ID: &str = "location-indicator-shadow-image";

const PULSING_DURATION: Duration = Duration::from_secs(3);

/// Where the puck's rendered bearing comes from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PuckBearing {
    /// The device heading.
    #[default]
    Heading,
    /// The direction of travel.
    Course,
}

/// Pulsing halo radius.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PulsingRadius {
    /// A fixed radius in pixels.
    Constant(f64),
    /// The location's horizontal accuracy radius.
    Accuracy,
}

/// Configuration of the pulsing halo around the puck.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Pulsing {
    /// Halo color; the alpha channel is animated.
    pub color: Color,
    /// Halo radius at the end of a pulse.
    pub radius: PulsingRadius,
}

impl Default for Pulsing {
    fn default() -> Self {
        Self {
            color: Color::BLUE,
            radius: PulsingRadius::Constant(10.0),
        }
    }
}

/// Appearance of the 2D location puck.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Puck2dConfiguration {
    /// Image drawn on top of the stack.
    pub top_image: Option<Image>,
    /// Image rotated with the bearing.
    pub bearing_image: Option<Image>,
    /// Image drawn below the others.
    pub shadow_image: Option<Image>,
    /// Scale applied to all images.
    pub scale: Option<f64>,
    /// Opacity of the whole indicator. `None` keeps the engine default.
    pub opacity: Option<f64>,
    /// Whether to draw the accuracy ring.
    pub shows_accuracy_ring: bool,
    /// Fill color of the accuracy ring.
    pub accuracy_ring_color: Option<Color>,
    /// Border color of the accuracy ring.
    pub accuracy_ring_border_color: Option<Color>,
    /// Pulsing halo configuration; `None` disables pulsing.
    pub pulsing: Option<Pulsing>,
}

impl Puck2dConfiguration {
    fn resolved_opacity(&self) -> f64 {
        self.opacity.unwrap_or(1.0)
    }

    fn resolved_accuracy_ring_color(&self) -> Color {
        self.accuracy_ring_color
            .unwrap_or(Color::BLUE.with_alpha(0.3))
    }

    fn resolved_accuracy_ring_border_color(&self) -> Color {
        self.accuracy_ring_border_color.unwrap_or(Color::BLUE)
    }
}

struct RendererState {
    active: bool,
    configuration: Puck2dConfiguration,
    puck_bearing: PuckBearing,
    puck_bearing_enabled: bool,
    force_full_path: bool,
    needs_update_top_image: bool,
    needs_update_bearing_image: bool,
    needs_update_shadow_image: bool,
    /// Keys of the style properties set during the previous full sync; used
    /// to reset properties that are no longer customized to their defaults.
    previously_set_keys: BTreeSet<String>,
    pulsing_start: Option<SystemTime>,
    current_accuracy_authorization: Option<AccuracyAuthorization>,
    subscription: Option<Cancelable>,
}

impl RendererState {
    fn reset(&mut self) {
        self.force_full_path = true;
        self.needs_update_top_image = true;
        self.needs_update_bearing_image = true;
        self.needs_update_shadow_image = true;
        self.previously_set_keys.clear();
        self.pulsing_start = None;
        self.current_accuracy_authorization = None;
    }
}

/// Renders the location puck by mutating a `location-indicator` style layer.
///
/// While active, the renderer follows the interpolated location stream and
/// updates the layer once per emission. Two update paths keep the per-frame
/// style traffic small: the full path rebuilds every property (used after
/// activation, configuration or accuracy authorization changes), the fast
/// path only writes position, accuracy radius and bearing.
pub struct Puck2dRenderer {
    style: Rc<dyn StyleSurface>,
    camera: Rc<dyn CameraSurface>,
    clock: Rc<dyn Clock>,
    data: Rc<InterpolatedLocationProducer>,
    pulsing_curve: UnitBezier,
    state: RefCell<RendererState>,
    weak_self: RefCell<Weak<Puck2dRenderer>>,
}

impl Puck2dRenderer {
    /// Creates an inactive renderer.
    pub fn new(
        configuration: Puck2dConfiguration,
        style: Rc<dyn StyleSurface>,
        camera: Rc<dyn CameraSurface>,
        data: Rc<InterpolatedLocationProducer>,
        clock: Rc<dyn Clock>,
    ) -> Rc<Self> {
        let renderer = Rc::new(Self {
            style,
            camera,
            clock,
            data,
            pulsing_curve: UnitBezier::new(TimingCurve {
                p1: (0.0, 0.0),
                p2: (0.25, 1.0),
            }),
            state: RefCell::new(RendererState {
                active: false,
                configuration,
                puck_bearing: PuckBearing::default(),
                puck_bearing_enabled: false,
                force_full_path: true,
                needs_update_top_image: true,
                needs_update_bearing_image: true,
                needs_update_shadow_image: true,
                previously_set_keys: BTreeSet::new(),
                pulsing_start: None,
                current_accuracy_authorization: None,
                subscription: None,
            }),
            weak_self: RefCell::new(Weak::new()),
        });
        *renderer.weak_self.borrow_mut() = Rc::downgrade(&renderer);
        renderer
    }

    /// Activates or deactivates the renderer.
    ///
    /// Deactivation removes the layer and its images from the style and
    /// resets all diffing state.
    pub fn set_active(&self, active: bool) {
        let was_active = self.state.borrow().active;
        if active == was_active {
            return;
        }
        self.state.borrow_mut().active = active;

        if active {
            let weak = self.weak_self.borrow().clone();
            let subscription = self.data.observe(move |data: &PuckRenderingData| {
                if let Some(renderer) = weak.upgrade() {
                    renderer.render(data);
                }
            });
            self.state.borrow_mut().subscription = Some(subscription);
        } else {
            let subscription = self.state.borrow_mut().subscription.take();
            if let Some(subscription) = subscription {
                subscription.cancel();
            }
            self.style.remove_layer(LAYER_ID).ok();
            self.style.remove_image(TOP_IMAGE_ID).ok();
            self.style.remove_image(BEARING_IMAGE_ID).ok();
            self.style.remove_image(SHADOW_IMAGE_ID).ok();
            self.state.borrow_mut().reset();
        }
    }

    /// Replaces the puck configuration. Takes effect on the next render.
    pub fn set_configuration(&self, configuration: Puck2dConfiguration) {
        let mut state = self.state.borrow_mut();
        if configuration == state.configuration {
            return;
        }
        state.force_full_path = true;
        state.needs_update_top_image |= configuration.top_image != state.configuration.top_image;
        state.needs_update_bearing_image |=
            configuration.bearing_image != state.configuration.bearing_image;
        state.needs_update_shadow_image |=
            configuration.shadow_image != state.configuration.shadow_image;
        state.configuration = configuration;
    }

    /// Selects the bearing source. Takes effect on the next render.
    pub fn set_puck_bearing(&self, bearing: PuckBearing) {
        self.state.borrow_mut().puck_bearing = bearing;
    }

    /// Enables or disables bearing rendering. Takes effect on the next full
    /// render.
    pub fn set_puck_bearing_enabled(&self, enabled: bool) {
        let mut state = self.state.borrow_mut();
        if state.puck_bearing_enabled != enabled {
            state.puck_bearing_enabled = enabled;
            state.force_full_path = true;
        }
    }

    fn render(&self, data: &PuckRenderingData) {
        {
            let mut state = self.state.borrow_mut();
            if !state.active {
                return;
            }
            let authorization = Some(data.location.accuracy_authorization);
            if state.current_accuracy_authorization != authorization {
                state.current_accuracy_authorization = authorization;
                state.force_full_path = true;
            }
        }

        let full_path = self.state.borrow().force_full_path;
        let result = if full_path {
            self.update_layer(data)
        } else {
            self.update_layer_fast_path(data)
        };
        // The next render takes the fast path until the configuration
        // changes again.
        self.state.borrow_mut().force_full_path = false;

        let result = result.and_then(|()| self.render_pulsing(data));
        if let Err(error) = result {
            log::error!("failed to update puck layer properties: {error}");
        }
    }

    fn update_layer(&self, data: &PuckRenderingData) -> Result<(), VedutaError> {
        let mut properties = StyleProperties::new();
        let location = data.location;

        properties.insert(
            "location".into(),
            json!([location.point.lat(), location.point.lon(), 0.0]),
        );

        {
            let state = self.state.borrow();
            let configuration = &state.configuration;
            match location.accuracy_authorization {
                AccuracyAuthorization::Full => {
                    let immediate = json!({ "duration": 0, "delay": 0 });

                    if configuration.top_image.is_some() {
                        properties.insert("top-image".into(), json!(TOP_IMAGE_ID));
                    }
                    if configuration.bearing_image.is_some() {
                        properties.insert("bearing-image".into(), json!(BEARING_IMAGE_ID));
                    }
                    if configuration.shadow_image.is_some() {
                        properties.insert("shadow-image".into(), json!(SHADOW_IMAGE_ID));
                    }

                    properties.insert("location-transition".into(), immediate.clone());
                    if let Some(scale) = configuration.scale {
                        properties.insert("top-image-size".into(), json!(scale));
                        properties.insert("bearing-image-size".into(), json!(scale));
                        properties.insert("shadow-image-size".into(), json!(scale));
                    }
                    properties.insert("emphasis-circle-radius-transition".into(), immediate.clone());
                    properties.insert("bearing-transition".into(), immediate.clone());
                    properties.insert(
                        "location-indicator-opacity".into(),
                        json!(configuration.resolved_opacity()),
                    );
                    properties.insert("location-indicator-opacity-transition".into(), immediate);

                    if configuration.shows_accuracy_ring {
                        properties.insert(
                            "accuracy-radius".into(),
                            json!(location.horizontal_accuracy),
                        );
                        properties.insert(
                            "accuracy-radius-color".into(),
                            configuration.resolved_accuracy_ring_color().to_style_value(),
                        );
                        properties.insert(
                            "accuracy-radius-border-color".into(),
                            configuration
                                .resolved_accuracy_ring_border_color()
                                .to_style_value(),
                        );
                    }

                    if state.puck_bearing_enabled {
                        let bearing = match state.puck_bearing {
                            PuckBearing::Heading => data.heading.unwrap_or(0.0),
                            PuckBearing::Course => location.course.unwrap_or(0.0),
                        };
                        properties.insert("bearing".into(), json!(bearing));
                    }
                }
                AccuracyAuthorization::Reduced => {
                    self.insert_reduced_accuracy_properties(&mut properties, data, configuration);
                }
            }
        }

        // Reset properties that were customized by the previous sync but are
        // no longer used to their default values.
        let mut state = self.state.borrow_mut();
        let new_keys: BTreeSet<String> = properties.keys().cloned().collect();
        for unused in state.previously_set_keys.difference(&new_keys) {
            properties.insert(
                unused.clone(),
                self.style.layer_property_default(LAYER_TYPE, unused),
            );
        }
        state.previously_set_keys = new_keys;
        drop(state);

        self.add_images()?;

        if self.style.layer_exists(LAYER_ID) {
            self.style.set_layer_properties(LAYER_ID, properties)
        } else {
            properties.insert("id".into(), json!(LAYER_ID));
            properties.insert("type".into(), json!(LAYER_TYPE));
            self.style.add_persistent_layer(properties)
        }
    }

    fn update_layer_fast_path(&self, data: &PuckRenderingData) -> Result<(), VedutaError> {
        let mut properties = StyleProperties::new();
        let location = data.location;
        properties.insert(
            "location".into(),
            json!([location.point.lat(), location.point.lon(), 0.0]),
        );

        let state = self.state.borrow();
        if location.accuracy_authorization == AccuracyAuthorization::Full {
            if state.configuration.shows_accuracy_ring {
                properties.insert("accuracy-radius".into(), json!(location.horizontal_accuracy));
            }
            if state.puck_bearing_enabled {
                let bearing = match state.puck_bearing {
                    PuckBearing::Heading => data.heading.unwrap_or(0.0),
                    PuckBearing::Course => location.course.unwrap_or(0.0),
                };
                properties.insert("bearing".into(), json!(bearing));
            }
        }
        drop(state);

        self.style.set_layer_properties(LAYER_ID, properties)
    }

    /// Reduced accuracy renders a zoom-dependent crossfade between the
    /// accuracy ring and a fixed-size emphasis circle, so the indicator
    /// stays visible at any zoom level without sudden radius jumps.
    fn insert_reduced_accuracy_properties(
        &self,
        properties: &mut StyleProperties,
        data: &PuckRenderingData,
        configuration: &Puck2dConfiguration,
    ) {
        const ZOOM_CUTOFF_RANGE: (f64, f64) = (4.0, 7.5);
        const ACCURACY_RANGE: (f64, f64) = (1000.0, 20_000.0);
        const MIN_PUCK_RADIUS_PX: f64 = 11.0;

        let horizontal_accuracy = data.location.horizontal_accuracy.unwrap_or(1000.0);
        let cutoff_zoom = ZOOM_CUTOFF_RANGE.1
            - (ZOOM_CUTOFF_RANGE.1 - ZOOM_CUTOFF_RANGE.0) * (horizontal_accuracy - ACCURACY_RANGE.0)
                / (ACCURACY_RANGE.1 - ACCURACY_RANGE.0);
        let min_radius_meters =
            MIN_PUCK_RADIUS_PX * meters_per_pixel(data.location.point.lat(), cutoff_zoom);

        let ring_color = configuration.resolved_accuracy_ring_color().to_style_value();
        let ring_border_color = configuration
            .resolved_accuracy_ring_border_color()
            .to_style_value();
        let clear = Color::TRANSPARENT.to_style_value();

        properties.insert(
            "accuracy-radius".into(),
            json!([
                "interpolate",
                ["linear"],
                ["zoom"],
                cutoff_zoom,
                min_radius_meters,
                cutoff_zoom + 1.0,
                horizontal_accuracy
            ]),
        );
        properties.insert(
            "accuracy-radius-color".into(),
            json!(["step", ["zoom"], clear, cutoff_zoom, ring_color]),
        );
        properties.insert(
            "accuracy-radius-border-color".into(),
            json!(["step", ["zoom"], clear, cutoff_zoom, ring_border_color]),
        );
        properties.insert(
            "emphasis-circle-color".into(),
            json!(["step", ["zoom"], ring_color, cutoff_zoom, clear]),
        );
        properties.insert("emphasis-circle-radius".into(), json!(MIN_PUCK_RADIUS_PX));
    }

    fn add_images(&self) -> Result<(), VedutaError> {
        let mut state = self.state.borrow_mut();
        let configuration = state.configuration.clone();

        if state.needs_update_top_image {
            self.replace_image(TOP_IMAGE_ID, configuration.top_image.as_ref())?;
        }
        if state.needs_update_bearing_image {
            self.replace_image(BEARING_IMAGE_ID, configuration.bearing_image.as_ref())?;
        }
        if state.needs_update_shadow_image {
            self.replace_image(SHADOW_IMAGE_ID, configuration.shadow_image.as_ref())?;
        }

        state.needs_update_top_image = false;
        state.needs_update_bearing_image = false;
        state.needs_update_shadow_image = false;
        Ok(())
    }

    fn replace_image(&self, id: &str, image: Option<&Image>) -> Result<(), VedutaError> {
        if self.style.image_exists(id) {
            self.style.remove_image(id)?;
        }
        if let Some(image) = image {
            self.style.add_image(id, image)?;
        }
        Ok(())
    }

    fn render_pulsing(&self, data: &PuckRenderingData) -> Result<(), VedutaError> {
        let mut state = self.state.borrow_mut();
        let Some(pulsing) = state.configuration.pulsing else {
            // Remove the halo once when pulsing gets disabled.
            if state.pulsing_start.take().is_some() {
                drop(state);
                let mut properties = StyleProperties::new();
                properties.insert("emphasis-circle-radius".into(), json!(0.0));
                return self.style.set_layer_properties(LAYER_ID, properties);
            }
            return Ok(());
        };

        let now = self.clock.now();
        let Some(start) = state.pulsing_start else {
            state.pulsing_start = Some(now);
            return Ok(());
        };

        let elapsed = now.duration_since(start).unwrap_or_default();
        let progress = (elapsed.as_secs_f64() / PULSING_DURATION.as_secs_f64()).min(1.0);
        let curved = self.pulsing_curve.solve(progress, 1e-6);

        let base_radius = match pulsing.radius {
            PulsingRadius::Constant(radius) => radius,
            PulsingRadius::Accuracy => {
                data.location.horizontal_accuracy.unwrap_or(0.0)
                    / meters_per_pixel(
                        data.location.point.lat(),
                        self.camera.camera_state().zoom,
                    )
            }
        };

        let radius = base_radius * curved;
        let alpha = if curved <= 0.1 { 0.0 } else { 1.0 - curved };
        let color = pulsing.color.with_alpha(alpha);

        if progress >= 1.0 {
            state.pulsing_start = Some(now);
        }
        drop(state);

        let mut properties = StyleProperties::new();
        properties.insert("emphasis-circle-radius".into(), json!(radius));
        properties.insert("emphasis-circle-color".into(), color.to_style_value());
        self.style.set_layer_properties(LAYER_ID, properties)
    }
}
