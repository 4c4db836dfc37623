//! Location and heading plumbing between the platform provider and the
//! rest of the engine.
//!
//! The platform's location services are reached through the
//! [`LocationProvider`] trait. [`LocationProducer`] sits on top of it and
//! fans updates out to weakly-held consumers, starting and stopping the
//! underlying services based on whether anyone is actually listening.
//! Provider callbacks must be delivered on the engine thread; embedders
//! whose providers report from background threads marshal the calls over
//! before forwarding them.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::cancel::Cancelable;
use crate::error::VedutaError;
use crate::geo::GeoPoint;
use crate::registry::WeakRegistry;
use crate::signal::Signal;

mod interpolated;

pub use interpolated::{InterpolatedLocation, InterpolatedLocationProducer, PuckRenderingData};

/// How precisely the platform is allowed to report the user's location.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AccuracyAuthorization {
    /// Precise location.
    Full,
    /// Coarse location only.
    Reduced,
}

/// A location fix.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Location {
    /// Position of the fix.
    pub point: GeoPoint,
    /// Estimated horizontal accuracy radius in meters.
    pub horizontal_accuracy: Option<f64>,
    /// Direction of travel in degrees clockwise from north.
    pub course: Option<f64>,
    /// Accuracy authorization in effect when the fix was made.
    pub accuracy_authorization: AccuracyAuthorization,
}

/// A device heading sample.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Heading {
    /// Heading relative to magnetic north, in degrees.
    pub magnetic_heading: f64,
    /// Heading relative to true north, in degrees; negative when invalid.
    pub true_heading: f64,
    /// Maximum deviation of the reported heading, in degrees.
    pub accuracy: f64,
}

impl Heading {
    /// The direction to use for rendering: true heading when valid,
    /// magnetic otherwise.
    pub fn direction(&self) -> f64 {
        if self.true_heading >= 0.0 {
            self.true_heading
        } else {
            self.magnetic_heading
        }
    }
}

/// Receiver of location updates.
pub trait LocationConsumer {
    /// Called with the latest location.
    fn location_update(&self, location: &Location);
}

/// Receiver of heading updates.
pub trait HeadingConsumer {
    /// Called with the latest heading.
    fn heading_update(&self, heading: &Heading);
}

/// Interface to the platform's location services.
///
/// Start/stop calls may arrive redundantly balanced; the provider only sees
/// an edge when the producer's consumer count crosses zero.
pub trait LocationProvider {
    /// Registers the receiver of provider callbacks.
    fn set_delegate(&self, delegate: Weak<dyn LocationProviderDelegate>);
    /// Starts location updates.
    fn start_updating_location(&self);
    /// Stops location updates.
    fn stop_updating_location(&self);
    /// Starts heading updates.
    fn start_updating_heading(&self);
    /// Stops heading updates.
    fn stop_updating_heading(&self);
    /// The current accuracy authorization.
    fn accuracy_authorization(&self) -> AccuracyAuthorization;
}

/// Callbacks a [`LocationProvider`] delivers, on the engine thread.
pub trait LocationProviderDelegate {
    /// New location fixes, oldest first.
    fn did_update_locations(&self, locations: &[Location]);
    /// A new heading sample.
    fn did_update_heading(&self, heading: &Heading);
    /// The provider failed.
    fn did_fail(&self, error: VedutaError);
    /// The authorization state changed.
    fn did_change_authorization(&self);
}

/// Fans provider updates out to weakly-held consumers.
///
/// The producer requests location (and heading) updates from the provider
/// while at least one live consumer is registered and stops them when the
/// last one goes away. Consumers are held weakly and may be dropped without
/// being removed, so liveness is re-checked on every mutation and every
/// provider callback.
pub struct LocationProducer {
    provider: Rc<dyn LocationProvider>,
    location_consumers: WeakRegistry<dyn LocationConsumer>,
    heading_consumers: WeakRegistry<dyn HeadingConsumer>,
    latest_location: RefCell<Option<Location>>,
    latest_heading: RefCell<Option<Heading>>,
    is_updating_location: Cell<bool>,
    is_updating_heading: Cell<bool>,
    errors: Signal<VedutaError>,
    authorization_changes: Signal<AccuracyAuthorization>,
}

impl LocationProducer {
    /// Creates a producer on top of `provider` and registers itself as the
    /// provider's delegate.
    pub fn new(provider: Rc<dyn LocationProvider>) -> Rc<Self> {
        let producer = Rc::new(Self {
            provider: provider.clone(),
            location_consumers: WeakRegistry::new(),
            heading_consumers: WeakRegistry::new(),
            latest_location: RefCell::new(None),
            latest_heading: RefCell::new(None),
            is_updating_location: Cell::new(false),
            is_updating_heading: Cell::new(false),
            errors: Signal::new(),
            authorization_changes: Signal::new(),
        });
        let delegate: Weak<dyn LocationProviderDelegate> =
            Rc::downgrade(&(producer.clone() as Rc<dyn LocationProviderDelegate>));
        provider.set_delegate(delegate);
        producer
    }

    /// The latest location received from the provider.
    pub fn latest_location(&self) -> Option<Location> {
        *self.latest_location.borrow()
    }

    /// The latest heading received from the provider.
    pub fn latest_heading(&self) -> Option<Heading> {
        *self.latest_heading.borrow()
    }

    /// Registers a location consumer. The producer holds it weakly; the
    /// caller keeps it alive.
    pub fn add_consumer(&self, consumer: &Rc<dyn LocationConsumer>) {
        self.location_consumers.add(consumer);
        self.sync_is_updating_location();
    }

    /// Removes a location consumer.
    pub fn remove_consumer(&self, consumer: &Rc<dyn LocationConsumer>) {
        self.location_consumers.remove(consumer);
        self.sync_is_updating_location();
    }

    /// Registers a heading consumer. The producer holds it weakly.
    pub fn add_heading_consumer(&self, consumer: &Rc<dyn HeadingConsumer>) {
        self.heading_consumers.add(consumer);
        self.sync_is_updating_heading();
    }

    /// Removes a heading consumer.
    pub fn remove_heading_consumer(&self, consumer: &Rc<dyn HeadingConsumer>) {
        self.heading_consumers.remove(consumer);
        self.sync_is_updating_heading();
    }

    /// Subscribes to provider failures.
    pub fn on_error(&self, callback: impl FnMut(&VedutaError) + 'static) -> Cancelable {
        self.errors.observe(callback)
    }

    /// Subscribes to accuracy authorization changes.
    pub fn on_authorization_change(
        &self,
        callback: impl FnMut(&AccuracyAuthorization) + 'static,
    ) -> Cancelable {
        self.authorization_changes.observe(callback)
    }

    fn sync_is_updating_location(&self) {
        let should_update = self.location_consumers.has_live();
        if should_update == self.is_updating_location.get() {
            return;
        }
        self.is_updating_location.set(should_update);
        if should_update {
            self.provider.start_updating_location();
        } else {
            self.provider.stop_updating_location();
        }
    }

    fn sync_is_updating_heading(&self) {
        let should_update = self.heading_consumers.has_live();
        if should_update == self.is_updating_heading.get() {
            return;
        }
        self.is_updating_heading.set(should_update);
        if should_update {
            self.provider.start_updating_heading();
        } else {
            self.provider.stop_updating_heading();
        }
    }
}

impl LocationProviderDelegate for LocationProducer {
    fn did_update_locations(&self, locations: &[Location]) {
        // Consumers may have been dropped without removing themselves.
        self.sync_is_updating_location();
        let Some(latest) = locations.last() else {
            return;
        };
        *self.latest_location.borrow_mut() = Some(*latest);
        if !self.is_updating_location.get() {
            return;
        }
        for consumer in self.location_consumers.live() {
            consumer.location_update(latest);
        }
    }

    fn did_update_heading(&self, heading: &Heading) {
        self.sync_is_updating_heading();
        *self.latest_heading.borrow_mut() = Some(*heading);
        if !self.is_updating_heading.get() {
            return;
        }
        for consumer in self.heading_consumers.live() {
            consumer.heading_update(heading);
        }
    }

    fn did_fail(&self, error: VedutaError) {
        self.sync_is_updating_location();
        log::error!("location provider failed: {error}");
        self.errors.notify(&error);
    }

    fn did_change_authorization(&self) {
        self.sync_is_updating_location();
        self.authorization_changes
            .notify(&self.provider.accuracy_authorization());
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::tests::MockLocationProvider;

    struct RecordingConsumer {
        locations: RefCell<Vec<Location>>,
    }

    impl RecordingConsumer {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                locations: RefCell::new(Vec::new()),
            })
        }
    }

    impl LocationConsumer for RecordingConsumer {
        fn location_update(&self, location: &Location) {
            self.locations.borrow_mut().push(*location);
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
    fn updates_start_with_first_consumer_and_stop_with_last() {
        let provider = Rc::new(MockLocationProvider::new());
        let producer = LocationProducer::new(provider.clone());

        let first = RecordingConsumer::new();
        let second = RecordingConsumer::new();
        producer.add_consumer(&(first.clone() as Rc<dyn LocationConsumer>));
        producer.add_consumer(&(second.clone() as Rc<dyn LocationConsumer>));
        assert_eq!(provider.start_location_count(), 1);

        producer.remove_consumer(&(first as Rc<dyn LocationConsumer>));
        assert_eq!(provider.stop_location_count(), 0);
        producer.remove_consumer(&(second as Rc<dyn LocationConsumer>));
        assert_eq!(provider.stop_location_count(), 1);
    }

    #[test]
    fn dropped_consumer_stops_updates_on_next_callback() {
        let provider = Rc::new(MockLocationProvider::new());
        let producer = LocationProducer::new(provider.clone());

        let consumer = RecordingConsumer::new();
        producer.add_consumer(&(consumer.clone() as Rc<dyn LocationConsumer>));
        assert_eq!(provider.start_location_count(), 1);

        drop(consumer);
        provider.push_location(location(1.0, 2.0));
        assert_eq!(provider.stop_location_count(), 1);
    }

    #[test]
    fn consumers_receive_the_latest_fix() {
        let provider = Rc::new(MockLocationProvider::new());
        let producer = LocationProducer::new(provider.clone());

        let consumer = RecordingConsumer::new();
        producer.add_consumer(&(consumer.clone() as Rc<dyn LocationConsumer>));

        provider.push_locations(&[location(1.0, 1.0), location(2.0, 2.0)]);
        let received = consumer.locations.borrow();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].point, GeoPoint::new(2.0, 2.0));
        assert_eq!(producer.latest_location().map(|l| l.point), Some(GeoPoint::new(2.0, 2.0)));
    }

    #[test]
    fn authorization_changes_reach_observers() {
        let provider = Rc::new(MockLocationProvider::new());
        let producer = LocationProducer::new(provider.clone());

        let changes = Rc::new(RefCell::new(Vec::new()));
        let changes_clone = changes.clone();
        let _token = producer
            .on_authorization_change(move |authorization| changes_clone.borrow_mut().push(*authorization));

        provider.change_authorization(AccuracyAuthorization::Reduced);
        assert_eq!(*changes.borrow(), vec![AccuracyAuthorization::Reduced]);
    }

    #[test]
    fn provider_failures_reach_error_observers() {
        let provider = Rc::new(MockLocationProvider::new());
        let producer = LocationProducer::new(provider.clone());

        let errors = Rc::new(RefCell::new(Vec::new()));
        let errors_clone = errors.clone();
        let _token = producer.on_error(move |error| errors_clone.borrow_mut().push(error.to_string()));

        provider.fail("gps outage");
        assert_eq!(*errors.borrow(), vec!["location provider failure: gps outage"]);
    }
}
