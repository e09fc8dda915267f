//! Visual anchor locator: finds reference images on the live screen.
//!
//! The driver only ever asks for a named [`Anchor`]; which image is used and
//! how confident a hit must be is configuration. Layout drift in the chat
//! client means new reference images, not new control flow.

use std::collections::HashMap;
use std::path::Path;

use image::GrayImage;

use crate::config::{AnchorConfig, AnchorsConfig};
use crate::errors::{RelayError, RelayResult};
use crate::perception::nms::non_max_suppression;
use crate::perception::screenshot::Screen;
use crate::perception::template::match_template;
use crate::perception::types::{Anchor, AnchorMatch};

pub const DEFAULT_CONFIDENCE: f32 = 0.8;
pub const DEFAULT_OVERLAP: f32 = 0.5;

/// Capability used by the automation driver.
pub trait AnchorLocate {
    /// `Ok(None)` means the anchor is not on screen with enough confidence.
    fn locate_anchor(&mut self, anchor: Anchor) -> RelayResult<Option<AnchorMatch>>;

    /// Pixels below the anchor where the driver should click.
    fn click_offset(&self, anchor: Anchor) -> i32;
}

/// Best hit of `template` in `image`, or `None` when it scores below `confidence`.
pub fn find_best(
    image: &GrayImage,
    template: &GrayImage,
    confidence: f32,
) -> RelayResult<Option<AnchorMatch>> {
    let best = match_template(image, template)?.best();
    match best {
        Some(hit) if hit.score >= confidence => Ok(Some(hit)),
        Some(hit) => {
            tracing::debug!(best = hit.score, threshold = confidence, "no match above threshold");
            Ok(None)
        }
        None => Ok(None),
    }
}

/// Every hit scoring at least `confidence`, deduplicated with greedy NMS.
pub fn find_all(
    image: &GrayImage,
    template: &GrayImage,
    confidence: f32,
    overlap: f32,
) -> RelayResult<Vec<AnchorMatch>> {
    let candidates = match_template(image, template)?.above(confidence);
    let raw = candidates.len();
    let kept = non_max_suppression(candidates, overlap);
    tracing::debug!(raw, kept = kept.len(), "template matches after NMS");
    Ok(kept)
}

pub struct VisualAnchorLocator {
    screen: Box<dyn Screen>,
    anchors: AnchorsConfig,
    references: HashMap<Anchor, GrayImage>,
}

impl VisualAnchorLocator {
    pub fn new(screen: Box<dyn Screen>, anchors: AnchorsConfig) -> Self {
        Self {
            screen,
            anchors,
            references: HashMap::new(),
        }
    }

    /// Capture the screen and look for `reference` once.
    pub fn locate(&self, reference: &GrayImage, confidence: f32) -> RelayResult<Option<AnchorMatch>> {
        let frame = self.capture_gray()?;
        find_best(&frame, reference, confidence)
    }

    /// Capture the screen and return every non-overlapping hit of `reference`.
    pub fn locate_all(
        &self,
        reference: &GrayImage,
        confidence: f32,
        overlap: f32,
    ) -> RelayResult<Vec<AnchorMatch>> {
        let frame = self.capture_gray()?;
        find_all(&frame, reference, confidence, overlap)
    }

    fn capture_gray(&self) -> RelayResult<GrayImage> {
        let frame = self.screen.capture()?;
        Ok(image::imageops::grayscale(&frame))
    }

    fn anchor_config(&self, anchor: Anchor) -> &AnchorConfig {
        match anchor {
            Anchor::SearchResult => &self.anchors.search_result,
            Anchor::ComposeToolbar => &self.anchors.compose_toolbar,
        }
    }

    fn reference(&mut self, anchor: Anchor) -> RelayResult<GrayImage> {
        if let Some(img) = self.references.get(&anchor) {
            return Ok(img.clone());
        }
        let img = load_reference(&self.anchor_config(anchor).image)?;
        tracing::debug!(
            anchor = anchor.name(),
            width = img.width(),
            height = img.height(),
            "reference image loaded"
        );
        self.references.insert(anchor, img.clone());
        Ok(img)
    }
}

impl AnchorLocate for VisualAnchorLocator {
    fn locate_anchor(&mut self, anchor: Anchor) -> RelayResult<Option<AnchorMatch>> {
        let reference = self.reference(anchor)?;
        let confidence = self.anchor_config(anchor).confidence;
        let hit = self.locate(&reference, confidence)?;
        match &hit {
            Some(m) => tracing::debug!(anchor = anchor.name(), x = m.x, y = m.y, score = m.score, "anchor found"),
            None => tracing::debug!(anchor = anchor.name(), "anchor not on screen"),
        }
        Ok(hit)
    }

    fn click_offset(&self, anchor: Anchor) -> i32 {
        self.anchor_config(anchor).click_offset_y
    }
}

fn load_reference(path: &Path) -> RelayResult<GrayImage> {
    let img = image::open(path).map_err(|e| {
        RelayError::Perception(format!("reference image {}: {e}", path.display()))
    })?;
    Ok(img.to_luma8())
}
