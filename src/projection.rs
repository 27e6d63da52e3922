//! Projection provider contract.
//!
//! The 2D image being annotated is produced elsewhere (from a 3D scan). The
//! engine only needs to know which image is active and, once decoded, its
//! pixel resolution.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::ImageSize;

/// Opaque handle identifying one projection image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageRef {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ImageRef {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Supplies the active image and its resolution.
pub trait ProjectionProvider {
    /// The image the operator is looking at, if any.
    fn active_image(&self) -> Option<ImageRef>;

    /// True pixel resolution, once known. `None` means the configured output
    /// resolution is used instead.
    fn resolution(&self, image: &ImageRef) -> Option<ImageSize>;
}

/// A fixed set of projections, for hosts that know everything up front.
#[derive(Debug, Clone, Default)]
pub struct StaticProjections {
    images: Vec<(ImageRef, Option<ImageSize>)>,
    active: Option<usize>,
}

impl StaticProjections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an image; the first one added becomes active.
    pub fn with_image(mut self, image: impl Into<ImageRef>, size: Option<ImageSize>) -> Self {
        self.images.push((image.into(), size));
        if self.active.is_none() {
            self.active = Some(0);
        }
        self
    }

    /// Make `image` active. Returns false if it is unknown.
    pub fn activate(&mut self, image: &ImageRef) -> bool {
        match self.images.iter().position(|(r, _)| r == image) {
            Some(index) => {
                self.active = Some(index);
                true
            }
            None => false,
        }
    }
}

impl ProjectionProvider for StaticProjections {
    fn active_image(&self) -> Option<ImageRef> {
        self.active
            .and_then(|i| self.images.get(i))
            .map(|(r, _)| r.clone())
    }

    fn resolution(&self, image: &ImageRef) -> Option<ImageSize> {
        self.images
            .iter()
            .find(|(r, _)| r == image)
            .and_then(|(_, size)| *size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_projections() {
        let mut provider = StaticProjections::new()
            .with_image("plan", Some(ImageSize::new(4000, 3000)))
            .with_image("section", None);
        assert_eq!(provider.active_image(), Some(ImageRef::from("plan")));
        assert_eq!(
            provider.resolution(&ImageRef::from("plan")),
            Some(ImageSize::new(4000, 3000))
        );

        assert!(provider.activate(&ImageRef::from("section")));
        assert_eq!(provider.active_image(), Some(ImageRef::from("section")));
        assert_eq!(provider.resolution(&ImageRef::from("section")), None);
        assert!(!provider.activate(&ImageRef::from("elevation")));
    }

    #[test]
    fn test_image_ref_serializes_as_string() {
        let json = serde_json::to_string(&ImageRef::from("plan")).unwrap();
        assert_eq!(json, "\"plan\"");
    }
}
