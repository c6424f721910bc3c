// Match results and colour handling for template queries
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// Whether correlation runs on luminance or on all three colour channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Grayscale,
    Color,
}

/// Which point of the matched rectangle `x`/`y` refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Anchor {
    TopLeft,
    Center,
}

/// A single match result
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// X coordinate in full-frame space
    pub x: u32,
    /// Y coordinate in full-frame space
    pub y: u32,
    /// Correlation score (0.0-1.0)
    pub confidence: f32,
    /// Size of the template as it was matched (after scaling)
    pub width: u32,
    pub height: u32,
    pub anchor: Anchor,
}

impl MatchResult {
    pub fn top_left(x: u32, y: u32, confidence: f32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            confidence,
            width,
            height,
            anchor: Anchor::TopLeft,
        }
    }

    /// Centre of the matched rectangle regardless of anchor.
    pub fn center(&self) -> (u32, u32) {
        match self.anchor {
            Anchor::Center => (self.x, self.y),
            Anchor::TopLeft => (self.x + self.width / 2, self.y + self.height / 2),
        }
    }

    /// Same match re-expressed with a centre anchor.
    pub fn into_center(self) -> Self {
        let (x, y) = self.center();
        Self {
            x,
            y,
            anchor: Anchor::Center,
            ..self
        }
    }

    pub fn position(&self) -> (u32, u32) {
        (self.x, self.y)
    }
}

impl std::fmt::Display for MatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let anchor = match self.anchor {
            Anchor::TopLeft => "top-left",
            Anchor::Center => "center",
        };
        write!(
            f,
            "({},{}) {} - {:.1}%",
            self.x,
            self.y,
            anchor,
            self.confidence * 100.0
        )
    }
}

/// Deduplicated matches, highest confidence first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchSet(Vec<MatchResult>);

impl MatchSet {
    pub fn new(matches: Vec<MatchResult>) -> Self {
        Self(matches)
    }

    pub fn best(&self) -> Option<&MatchResult> {
        self.0.first()
    }

    pub fn into_vec(self) -> Vec<MatchResult> {
        self.0
    }
}

impl Deref for MatchSet {
    type Target = [MatchResult];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl IntoIterator for MatchSet {
    type Item = MatchResult;
    type IntoIter = std::vec::IntoIter<MatchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a MatchSet {
    type Item = &'a MatchResult;
    type IntoIter = std::slice::Iter<'a, MatchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
