//! Search region (ROI) handling for targeted template matching

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl SearchRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a full-screen region
    pub fn full_screen(screen_width: u32, screen_height: u32) -> Self {
        Self::new(0, 0, screen_width, screen_height)
    }

    /// Parse region from filename format: template-[x,y,width,height].png
    pub fn from_filename(filename: &str) -> Option<Self> {
        let start = filename.find('[')?;
        let end = filename.find(']')?;
        if end <= start {
            return None;
        }
        let parts: Vec<&str> = filename[start + 1..end].split(',').collect();
        if parts.len() == 4
            && let (Ok(x), Ok(y), Ok(width), Ok(height)) = (
                parts[0].trim().parse::<u32>(),
                parts[1].trim().parse::<u32>(),
                parts[2].trim().parse::<u32>(),
                parts[3].trim().parse::<u32>(),
            )
        {
            return Some(Self::new(x, y, width, height));
        }
        None
    }

    /// Clip region to screen boundaries. The result may be empty.
    pub fn clamp_to(&self, screen_width: u32, screen_height: u32) -> SearchRegion {
        let x = self.x.min(screen_width);
        let y = self.y.min(screen_height);
        SearchRegion {
            x,
            y,
            width: self.width.min(screen_width - x),
            height: self.height.min(screen_height - y),
        }
    }

    /// Check if this region contains a point
    pub fn contains_point(&self, x: u32, y: u32) -> bool {
        x >= self.x
            && y >= self.y
            && (x - self.x) < self.width
            && (y - self.y) < self.height
    }

    /// Get the center point of this region
    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Check if this region is valid (non-zero dimensions)
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}
