//! Interface to the external style engine.
//!
//! The engine that parses styles and composites layers lives outside of this
//! crate. Everything the camera coordination core needs from it is expressed
//! by the [`StyleSurface`] trait: synchronous layer, source and image
//! mutations addressed by string ids, with properties passed as JSON maps in
//! the shape the style specification defines.

use std::rc::Rc;

use crate::error::VedutaError;

/// Property map for a layer or a source, keyed by style-spec property names.
pub type StyleProperties = serde_json::Map<String, serde_json::Value>;

/// An opaque bitmap handed to the style engine.
///
/// The engine decodes the bytes itself; this crate only moves them around
/// and compares them to detect configuration changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    data: Rc<[u8]>,
}

impl Image {
    /// Wraps encoded image bytes.
    pub fn new(data: impl Into<Rc<[u8]>>) -> Self {
        Self { data: data.into() }
    }

    /// The encoded bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Mutation surface of the external style engine.
///
/// All calls are synchronous; failures are reported through
/// [`VedutaError::StyleMutation`] and are never fatal to the caller.
pub trait StyleSurface {
    /// Adds a persistent layer described entirely by `properties`, including
    /// its `id` and `type` entries.
    fn add_persistent_layer(&self, properties: StyleProperties) -> Result<(), VedutaError>;
    /// Removes the layer with the given id.
    fn remove_layer(&self, id: &str) -> Result<(), VedutaError>;
    /// Updates the given properties of an existing layer, leaving the rest
    /// untouched.
    fn set_layer_properties(&self, id: &str, properties: StyleProperties)
        -> Result<(), VedutaError>;
    /// Returns `true` if a layer with the given id exists.
    fn layer_exists(&self, id: &str) -> bool;
    /// Default value of a layer property, used to reset properties that are
    /// no longer customized.
    fn layer_property_default(&self, layer_type: &str, property: &str) -> serde_json::Value;

    /// Adds a source described by `properties`.
    fn add_source(&self, id: &str, properties: StyleProperties) -> Result<(), VedutaError>;
    /// Removes the source with the given id.
    fn remove_source(&self, id: &str) -> Result<(), VedutaError>;
    /// Updates the given properties of an existing source.
    fn set_source_properties(
        &self,
        id: &str,
        properties: StyleProperties,
    ) -> Result<(), VedutaError>;

    /// Registers an image under the given id, replacing any previous one.
    fn add_image(&self, id: &str, image: &Image) -> Result<(), VedutaError>;
    /// Removes the image with the given id.
    fn remove_image(&self, id: &str) -> Result<(), VedutaError>;
    /// Returns `true` if an image with the given id exists.
    fn image_exists(&self, id: &str) -> bool;
}
