use serde::{Deserialize, Serialize};

/// Named UI anchors. Each maps to a reference image in `[anchors]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    /// Header of the search results list, shown once a name was pasted into global search.
    SearchResult,
    /// Toolbar icon above the compose box; only visible inside an open conversation.
    ComposeToolbar,
}

impl Anchor {
    pub fn name(&self) -> &'static str {
        match self {
            Anchor::SearchResult => "search_result",
            Anchor::ComposeToolbar => "compose_toolbar",
        }
    }
}

/// A template hit in screen pixel coordinates. `(x, y)` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnchorMatch {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub score: f32,
}

impl AnchorMatch {
    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn area(&self) -> f32 {
        self.width as f32 * self.height as f32
    }

    /// Intersection-over-union with another box.
    pub fn iou(&self, other: &AnchorMatch) -> f32 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = self.right().min(other.right());
        let iy2 = self.bottom().min(other.bottom());

        let inter = ((ix2 - ix1).max(0) as f32) * ((iy2 - iy1).max(0) as f32);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// Click target `offset_y` pixels below the anchor's bottom edge, horizontally
/// centred, clamped into a `screen` of `(width, height)` pixels.
pub fn click_target_below(anchor: &AnchorMatch, offset_y: i32, screen: (i32, i32)) -> (i32, i32) {
    let x = anchor.x + anchor.width as i32 / 2;
    let y = anchor.bottom() + offset_y;
    let max_x = (screen.0 - 1).max(0);
    let max_y = (screen.1 - 1).max(0);
    (x.clamp(0, max_x), y.clamp(0, max_y))
}
