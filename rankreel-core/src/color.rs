use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Serialize, Serializer};
use std::{collections::HashMap, fmt};

/// A 24-bit RGB color, rendered as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(u32);

impl Color {
    pub fn from_rgb(rgb: u32) -> Self {
        Color(rgb & 0x00ff_ffff)
    }

    pub fn rgb(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Append-only mapping from key to color.
///
/// A key keeps the color it was first given for the lifetime of the table.
/// Colors are random and may collide.
#[derive(Debug, Clone)]
pub struct ColorTable<R = StdRng> {
    colors: HashMap<String, Color>,
    rng: R,
}

impl ColorTable<StdRng> {
    pub fn new() -> Self {
        ColorTable::with_rng(StdRng::from_entropy())
    }
}

impl Default for ColorTable<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> ColorTable<R> {
    pub fn with_rng(rng: R) -> Self {
        ColorTable {
            colors: HashMap::new(),
            rng,
        }
    }

    pub fn color_for(&mut self, key: &str) -> Color {
        if let Some(color) = self.colors.get(key) {
            return *color;
        }
        let color = Color::from_rgb(self.rng.gen_range(0..=0x00ff_ffff));
        self.colors.insert(key.to_string(), color);
        color
    }

    pub fn get(&self, key: &str) -> Option<Color> {
        self.colors.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}
