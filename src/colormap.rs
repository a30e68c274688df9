//! Named colormaps.
//!
//! Colormaps are piecewise-linear ramps through a fixed list of anchor colors.
//! Names follow the usual ColorBrewer/matplotlib conventions and are matched
//! case-insensitively; a `_r` suffix reverses any map.

use serde::{Deserialize, Serialize};

/// 8-bit RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba(pub u8, pub u8, pub u8, pub u8);

impl Rgba {
    pub const WHITE: Rgba = Rgba(255, 255, 255, 255);
    pub const BLACK: Rgba = Rgba(0, 0, 0, 255);
    /// matplotlib's "dimgray", used for coastlines
    pub const DIM_GRAY: Rgba = Rgba(105, 105, 105, 255);

    pub const fn hex(rgb: u32) -> Rgba {
        Rgba((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8, 255)
    }

    fn lerp(a: Rgba, b: Rgba, t: f64) -> Rgba {
        let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round() as u8;
        Rgba(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2), mix(a.3, b.3))
    }
}

impl From<Rgba> for image::Rgba<u8> {
    fn from(c: Rgba) -> Self {
        image::Rgba([c.0, c.1, c.2, c.3])
    }
}

impl From<image::Rgba<u8>> for Rgba {
    fn from(p: image::Rgba<u8>) -> Self {
        let [r, g, b, a] = p.0;
        Rgba(r, g, b, a)
    }
}

const GNBU: &[u32] = &[
    0xf7fcf0, 0xe0f3db, 0xccebc5, 0xa8ddb5, 0x7bccc4, 0x4eb3d3, 0x2b8cbe, 0x0868ac, 0x084081,
];
const BLUES: &[u32] = &[
    0xf7fbff, 0xdeebf7, 0xc6dbef, 0x9ecae1, 0x6baed6, 0x4292c6, 0x2171b5, 0x08519c, 0x08306b,
];
const GREENS: &[u32] = &[
    0xf7fcf5, 0xe5f5e0, 0xc7e9c0, 0xa1d99b, 0x74c476, 0x41ab5d, 0x238b45, 0x006d2c, 0x00441b,
];
const GREYS: &[u32] = &[
    0xffffff, 0xf0f0f0, 0xd9d9d9, 0xbdbdbd, 0x969696, 0x737373, 0x525252, 0x252525, 0x000000,
];
const YLORRD: &[u32] = &[
    0xffffcc, 0xffeda0, 0xfed976, 0xfeb24c, 0xfd8d3c, 0xfc4e2a, 0xe31a1c, 0xbd0026, 0x800026,
];
const YLGNBU: &[u32] = &[
    0xffffd9, 0xedf8b1, 0xc7e9b4, 0x7fcdbb, 0x41b6c4, 0x1d91c0, 0x225ea8, 0x253494, 0x081d58,
];
const RDBU: &[u32] = &[
    0x67001f, 0xb2182b, 0xd6604d, 0xf4a582, 0xfddbc7, 0xf7f7f7, 0xd1e5f0, 0x92c5de, 0x4393c3,
    0x2166ac, 0x053061,
];
const BRBG: &[u32] = &[
    0x543005, 0x8c510a, 0xbf812d, 0xdfc27d, 0xf6e8c3, 0xf5f5f5, 0xc7eae5, 0x80cdc1, 0x35978f,
    0x01665e, 0x003c30,
];
const VIRIDIS: &[u32] = &[
    0x440154, 0x482878, 0x3e4989, 0x31688e, 0x26828e, 0x1f9e89, 0x35b779, 0x6ece58, 0xb5de2b,
    0xfde725,
];

/// Canonical names of the built-in colormaps
pub const COLORMAP_NAMES: &[&str] = &[
    "GnBu", "Blues", "Greens", "Greys", "YlOrRd", "YlGnBu", "RdBu", "BrBG", "viridis",
];

fn anchors_for(name: &str) -> Option<&'static [u32]> {
    let table = match name.to_lowercase().as_str() {
        "gnbu" => GNBU,
        "blues" => BLUES,
        "greens" => GREENS,
        "greys" | "grays" => GREYS,
        "ylorrd" => YLORRD,
        "ylgnbu" => YLGNBU,
        "rdbu" => RDBU,
        "brbg" => BRBG,
        "viridis" => VIRIDIS,
        _ => return None,
    };
    Some(table)
}

/// A continuous colormap sampled on `[0, 1]`
#[derive(Debug, Clone, PartialEq)]
pub struct Colormap {
    name: String,
    anchors: Vec<Rgba>,
}

impl Colormap {
    /// Looks up a colormap by name; `None` for unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        let (base, reversed) = match name.strip_suffix("_r") {
            Some(base) => (base, true),
            None => (name, false),
        };
        let mut anchors: Vec<Rgba> = anchors_for(base)?.iter().map(|&c| Rgba::hex(c)).collect();
        if reversed {
            anchors.reverse();
        }
        Some(Colormap {
            name: name.to_string(),
            anchors,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Color at position `t`, clamped to `[0, 1]`
    pub fn sample(&self, t: f64) -> Rgba {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let segments = (self.anchors.len() - 1) as f64;
        let pos = t * segments;
        let i = (pos.floor() as usize).min(self.anchors.len() - 2);
        Rgba::lerp(self.anchors[i], self.anchors[i + 1], pos - i as f64)
    }
}
