//! Frame-rate interpolation of location and heading updates.
//!
//! Raw provider fixes arrive about once a second; rendering them directly
//! makes the puck jump. [`InterpolatedLocationProducer`] keeps a pair of
//! keyframes per stream and, on every display tick, composes a smooth
//! [`PuckRenderingData`] snapshot, suppressing emissions when nothing
//! changed.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use web_time::SystemTime;

use crate::cancel::Cancelable;
use crate::clock::Clock;
use crate::driver::FrameDriver;
use crate::geo::GeoPoint;
use crate::interpolate::{interpolate_direction, Interpolate};
use crate::location::{
    AccuracyAuthorization, Heading, HeadingConsumer, Location, LocationConsumer, LocationProducer,
};
use crate::signal::StateSignal;

/// Interpolation window for location fixes. Slightly longer than the
/// expected 1 s update interval to avoid pauses between updates.
const LOCATION_DURATION: Duration = Duration::from_millis(1100);

/// Time to animate one full rotation of the heading. The per-update window
/// is proportional to the magnitude of the change so that the rotation
/// speed stays constant.
const FULL_ROTATION_DURATION: Duration = Duration::from_millis(1100);

/// A location snapshot interpolated for the current frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct InterpolatedLocation {
    /// Interpolated position.
    pub point: GeoPoint,
    /// Interpolated horizontal accuracy radius in meters.
    pub horizontal_accuracy: Option<f64>,
    /// Interpolated direction of travel in degrees.
    pub course: Option<f64>,
    /// Accuracy authorization of the newest contributing fix.
    pub accuracy_authorization: AccuracyAuthorization,
}

impl From<Location> for InterpolatedLocation {
    fn from(location: Location) -> Self {
        Self {
            point: location.point,
            horizontal_accuracy: location.horizontal_accuracy,
            course: location.course,
            accuracy_authorization: location.accuracy_authorization,
        }
    }
}

impl Interpolate for InterpolatedLocation {
    fn interpolate(&self, to: &Self, fraction: f64) -> Self {
        Self {
            point: self.point.interpolate(&to.point, fraction),
            horizontal_accuracy: match (self.horizontal_accuracy, to.horizontal_accuracy) {
                (Some(from), Some(to)) => Some(from.interpolate(&to, fraction)),
                _ => to.horizontal_accuracy,
            },
            course: match (self.course, to.course) {
                (Some(from), Some(to)) => Some(interpolate_direction(from, to, fraction)),
                _ => to.course,
            },
            accuracy_authorization: to.accuracy_authorization,
        }
    }
}

impl Interpolate for Heading {
    fn interpolate(&self, to: &Self, fraction: f64) -> Self {
        Self {
            magnetic_heading: interpolate_direction(self.magnetic_heading, to.magnetic_heading, fraction),
            true_heading: interpolate_direction(self.true_heading, to.true_heading, fraction),
            accuracy: self.accuracy.interpolate(&to.accuracy, fraction),
        }
    }
}

/// The per-frame snapshot the puck renders from.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PuckRenderingData {
    /// The interpolated location.
    pub location: InterpolatedLocation,
    /// The interpolated heading direction, if a heading stream is active.
    pub heading: Option<f64>,
}

#[derive(Default)]
struct Keyframes {
    start_date: Option<SystemTime>,
    end_date: Option<SystemTime>,
    start_location: Option<InterpolatedLocation>,
    end_location: Option<InterpolatedLocation>,

    heading_start_date: Option<SystemTime>,
    heading_end_date: Option<SystemTime>,
    start_heading: Option<Heading>,
    end_heading: Option<Heading>,
}

/// Composes location and heading streams into deduplicated per-frame
/// snapshots.
///
/// The producer is lazy: it only registers itself with the
/// [`LocationProducer`] and the frame driver while at least one observer is
/// subscribed, detaching both again when the last observer leaves.
pub struct InterpolatedLocationProducer {
    producer: Rc<LocationProducer>,
    driver: Rc<dyn FrameDriver>,
    clock: Rc<dyn Clock>,
    data: StateSignal<PuckRenderingData>,
    keyframes: RefCell<Keyframes>,
    driver_token: RefCell<Option<Cancelable>>,
    heading_enabled: Cell<bool>,
    weak_self: RefCell<Weak<InterpolatedLocationProducer>>,
}

impl InterpolatedLocationProducer {
    /// Creates a detached producer.
    pub fn new(
        producer: Rc<LocationProducer>,
        driver: Rc<dyn FrameDriver>,
        clock: Rc<dyn Clock>,
    ) -> Rc<Self> {
        let this = Rc::new(Self {
            producer,
            driver,
            clock,
            data: StateSignal::new(),
            keyframes: RefCell::new(Keyframes::default()),
            driver_token: RefCell::new(None),
            heading_enabled: Cell::new(false),
            weak_self: RefCell::new(Weak::new()),
        });
        *this.weak_self.borrow_mut() = Rc::downgrade(&this);

        let weak = Rc::downgrade(&this);
        this.data.set_on_first_subscribe(move || {
            if let Some(this) = weak.upgrade() {
                this.attach();
            }
        });
        let weak = Rc::downgrade(&this);
        this.data.set_on_last_unsubscribe(move || {
            if let Some(this) = weak.upgrade() {
                this.detach();
            }
        });
        this
    }

    /// Subscribes to snapshots. The latest snapshot, if any, is delivered
    /// synchronously.
    pub fn observe(&self, callback: impl FnMut(&PuckRenderingData) + 'static) -> Cancelable {
        self.data.observe(callback)
    }

    /// The latest composed snapshot.
    pub fn current(&self) -> Option<PuckRenderingData> {
        self.data.value()
    }

    /// Enables or disables the heading stream.
    pub fn set_heading_enabled(&self, enabled: bool) {
        if self.heading_enabled.replace(enabled) == enabled {
            return;
        }
        // Only touch the producer while attached; attach() will pick the
        // flag up otherwise.
        let this = self.weak_self.borrow().upgrade();
        if let (Some(this), true) = (this, self.driver_token.borrow().is_some()) {
            let consumer = this as Rc<dyn HeadingConsumer>;
            if enabled {
                self.producer.add_heading_consumer(&consumer);
            } else {
                self.producer.remove_heading_consumer(&consumer);
            }
        }
        if !enabled {
            let mut keyframes = self.keyframes.borrow_mut();
            keyframes.start_heading = None;
            keyframes.end_heading = None;
            keyframes.heading_start_date = None;
            keyframes.heading_end_date = None;
        }
    }

    fn attach(&self) {
        let Some(this) = self.weak_self.borrow().upgrade() else {
            return;
        };
        self.producer
            .add_consumer(&(this.clone() as Rc<dyn LocationConsumer>));
        if self.heading_enabled.get() {
            self.producer
                .add_heading_consumer(&(this.clone() as Rc<dyn HeadingConsumer>));
        }
        let weak = Rc::downgrade(&this);
        let token = self.driver.observe(Box::new(move || {
            if let Some(this) = weak.upgrade() {
                this.participate();
            }
        }));
        *self.driver_token.borrow_mut() = Some(token);
    }

    fn detach(&self) {
        let Some(this) = self.weak_self.borrow().upgrade() else {
            return;
        };
        self.producer
            .remove_consumer(&(this.clone() as Rc<dyn LocationConsumer>));
        self.producer
            .remove_heading_consumer(&(this as Rc<dyn HeadingConsumer>));
        if let Some(token) = self.driver_token.borrow_mut().take() {
            token.cancel();
        }
    }

    /// Composes and publishes the snapshot for the current frame.
    fn participate(&self) {
        let now = self.clock.now();
        let keyframes = self.keyframes.borrow();
        let Some(location) = interpolated_location(&keyframes, now) else {
            return;
        };
        let heading = interpolated_heading(&keyframes, now).map(|heading| heading.direction());
        drop(keyframes);

        self.data.set(PuckRenderingData { location, heading });
    }
}

impl LocationConsumer for InterpolatedLocationProducer {
    fn location_update(&self, location: &Location) {
        let now = self.clock.now();
        let mut keyframes = self.keyframes.borrow_mut();

        if let Some(current) = interpolated_location(&keyframes, now) {
            // Re-anchor the interpolation at the currently rendered value.
            keyframes.start_location = Some(current);
            keyframes.start_date = Some(now);
            keyframes.end_location = Some(InterpolatedLocation::from(*location));
            keyframes.end_date = Some(now + LOCATION_DURATION);
        } else {
            // First location: no interpolation until the next update.
            let initial = InterpolatedLocation::from(*location);
            keyframes.start_location = Some(initial);
            keyframes.start_date = Some(now - LOCATION_DURATION);
            keyframes.end_location = Some(initial);
            keyframes.end_date = Some(now);
        }
    }
}

impl HeadingConsumer for InterpolatedLocationProducer {
    fn heading_update(&self, heading: &Heading) {
        let now = self.clock.now();
        let mut keyframes = self.keyframes.borrow_mut();

        let Some(current) = interpolated_heading(&keyframes, now) else {
            // First heading: no interpolation until the next update.
            keyframes.start_heading = Some(*heading);
            keyframes.heading_start_date = Some(now - FULL_ROTATION_DURATION);
            keyframes.end_heading = Some(*heading);
            keyframes.heading_end_date = Some(now);
            return;
        };

        // The window is proportional to the magnitude of the change so the
        // rotation speed stays constant: small corrections are near-instant,
        // full turns are quick but smooth.
        let difference =
            180.0 - ((current.direction() - heading.direction()).abs() - 180.0).abs();
        let duration = FULL_ROTATION_DURATION.mul_f64(difference / 360.0);

        keyframes.start_heading = Some(current);
        keyframes.heading_start_date = Some(now);
        keyframes.end_heading = Some(*heading);
        keyframes.heading_end_date = Some(now + duration);
    }
}

fn fraction_between(start: SystemTime, end: SystemTime, date: SystemTime) -> f64 {
    let total = end.duration_since(start).unwrap_or_default().as_secs_f64();
    if total <= 0.0 {
        return 1.0;
    }
    date.duration_since(start).unwrap_or_default().as_secs_f64() / total
}

fn interpolated_location(keyframes: &Keyframes, date: SystemTime) -> Option<InterpolatedLocation> {
    let (start_date, end_date, start, end) = (
        keyframes.start_date?,
        keyframes.end_date?,
        keyframes.start_location?,
        keyframes.end_location?,
    );
    let fraction = fraction_between(start_date, end_date, date);
    if fraction >= 1.0 {
        return Some(end);
    }
    Some(start.interpolate(&end, fraction))
}

fn interpolated_heading(keyframes: &Keyframes, date: SystemTime) -> Option<Heading> {
    let (start_date, end_date, start, end) = (
        keyframes.heading_start_date?,
        keyframes.heading_end_date?,
        keyframes.start_heading?,
        keyframes.end_heading?,
    );
    let fraction = fraction_between(start_date, end_date, date);
    if fraction >= 1.0 {
        return Some(end);
    }
    Some(start.interpolate(&end, fraction))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::driver::ManualFrameDriver;
    use crate::tests::{ManualClock, MockLocationProvider};

    struct Harness {
        provider: Rc<MockLocationProvider>,
        driver: Rc<ManualFrameDriver>,
        clock: Rc<ManualClock>,
        interpolated: Rc<InterpolatedLocationProducer>,
    }

    fn harness() -> Harness {
        let provider = Rc::new(MockLocationProvider::new());
        let producer = LocationProducer::new(provider.clone());
        let driver = Rc::new(ManualFrameDriver::new());
        let clock = Rc::new(ManualClock::new());
        let interpolated =
            InterpolatedLocationProducer::new(producer, driver.clone(), clock.clone());
        Harness {
            provider,
            driver,
            clock,
            interpolated,
        }
    }

    fn location(lat: f64, lon: f64) -> Location {
        Location {
            point: GeoPoint::new(lat, lon),
            horizontal_accuracy: Some(10.0),
            course: None,
            accuracy_authorization: AccuracyAuthorization::Full,
        }
    }

    #[test]
    fn attaches_on_first_observer_and_detaches_on_last() {
        let h = harness();
        assert_eq!(h.provider.start_location_count(), 0);
        assert_eq!(h.driver.observer_count(), 0);

        let token = h.interpolated.observe(|_| {});
        assert_eq!(h.provider.start_location_count(), 1);
        assert_eq!(h.driver.observer_count(), 1);

        token.cancel();
        assert_eq!(h.provider.stop_location_count(), 1);
        assert_eq!(h.driver.observer_count(), 0);
    }

    #[test]
    fn identical_ticks_emit_once() {
        let h = harness();
        let emissions = Rc::new(RefCell::new(0));
        let emissions_clone = emissions.clone();
        let _token = h
            .interpolated
            .observe(move |_| *emissions_clone.borrow_mut() += 1);

        h.provider.push_location(location(10.0, 10.0));
        h.driver.tick();
        h.driver.tick();

        assert_eq!(*emissions.borrow(), 1);
    }

    #[test]
    fn interpolates_between_fixes() {
        let h = harness();
        let latest = Rc::new(RefCell::new(None));
        let latest_clone = latest.clone();
        let _token = h
            .interpolated
            .observe(move |data: &PuckRenderingData| *latest_clone.borrow_mut() = Some(*data));

        h.provider.push_location(location(10.0, 10.0));
        h.driver.tick();
        let first = latest.borrow().expect("snapshot should be emitted");
        assert_abs_diff_eq!(first.location.point.lat(), 10.0);

        h.provider.push_location(location(10.0, 11.0));
        h.clock.advance(Duration::from_millis(550));
        h.driver.tick();
        let halfway = latest.borrow().expect("snapshot should be emitted");
        assert_abs_diff_eq!(halfway.location.point.lon(), 10.5, epsilon = 1e-9);

        h.clock.advance(Duration::from_secs(2));
        h.driver.tick();
        let settled = latest.borrow().expect("snapshot should be emitted");
        assert_abs_diff_eq!(settled.location.point.lon(), 11.0, epsilon = 1e-9);
    }

    #[test]
    fn heading_is_composed_when_enabled() {
        let h = harness();
        h.interpolated.set_heading_enabled(true);
        let latest = Rc::new(RefCell::new(None));
        let latest_clone = latest.clone();
        let _token = h
            .interpolated
            .observe(move |data: &PuckRenderingData| *latest_clone.borrow_mut() = Some(*data));
        assert_eq!(h.provider.start_heading_count(), 1);

        h.provider.push_location(location(10.0, 10.0));
        h.driver.tick();
        assert_eq!(latest.borrow().expect("snapshot").heading, None);

        h.provider.push_heading(Heading {
            magnetic_heading: 90.0,
            true_heading: 90.0,
            accuracy: 5.0,
        });
        h.driver.tick();
        let heading = latest.borrow().expect("snapshot").heading;
        assert_abs_diff_eq!(heading.expect("heading should be set"), 90.0);
    }

    #[test]
    fn heading_turns_at_constant_speed() {
        let h = harness();
        h.interpolated.set_heading_enabled(true);
        let _token = h.interpolated.observe(|_| {});

        h.provider.push_location(location(0.0, 0.0));
        h.provider.push_heading(Heading {
            magnetic_heading: 0.0,
            true_heading: 0.0,
            accuracy: 5.0,
        });
        // A 90 degree change takes a quarter of the full rotation duration.
        h.provider.push_heading(Heading {
            magnetic_heading: 90.0,
            true_heading: 90.0,
            accuracy: 5.0,
        });

        h.clock.advance(Duration::from_millis(1100 / 8));
        h.driver.tick();
        let halfway = h.interpolated.current().expect("snapshot").heading;
        assert_abs_diff_eq!(halfway.expect("heading"), 45.0, epsilon = 1.0);
    }

    #[test]
    fn disabling_heading_stops_the_stream() {
        let h = harness();
        h.interpolated.set_heading_enabled(true);
        let token = h.interpolated.observe(|_| {});
        assert_eq!(h.provider.start_heading_count(), 1);

        h.interpolated.set_heading_enabled(false);
        assert_eq!(h.provider.stop_heading_count(), 1);
        token.cancel();
    }

    #[test]
    fn course_is_rendered_without_a_heading_stream() {
        let h = harness();
        let _token = h.interpolated.observe(|_| {});

        h.provider.push_location(Location {
            course: Some(42.0),
            ..location(10.0, 10.0)
        });
        h.driver.tick();

        let data = h.interpolated.current().expect("snapshot");
        assert_eq!(data.heading, None);
        assert_abs_diff_eq!(data.location.course.expect("course"), 42.0);
    }
}
