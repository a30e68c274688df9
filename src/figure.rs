//! # Map Figure Rendering
//!
//! This module turns a two-dimensional latitude/longitude field into a map
//! figure: a georeferenced raster in the chosen projection, a vertical colorbar
//! extended at both ends, a right-aligned title and optional coastlines.
//!
//! ## Layout
//!
//! The figure follows the classic single-axes layout: the axes occupy the
//! central part of the figure, the map is fitted inside them with its
//! projected aspect ratio preserved, and the colorbar takes a thin strip
//! (`fraction` 0.02, `pad` 0.04 of the axes width) on the right. Sizes given
//! in points scale with the resolution, so a figure saved at 300 dpi is the
//! same drawing as one at 100 dpi with three times the pixels.
//!
//! ## Example
//!
//! ```rust,no_run
//! use nc2map::dataset::{Dataset, LoadOptions};
//! use nc2map::array::MissingPolicy;
//! use nc2map::figure::render;
//! use nc2map::input::PlotConfig;
//!
//! let ds = Dataset::open("control_merged.nc", &LoadOptions::default())?;
//! let da_mean = ds.variable("QRUNOFF")?.mean("time", MissingPolicy::Skip)?;
//!
//! let plot = PlotConfig { steps: Some(10), ..PlotConfig::default() };
//! let fig = render(&da_mean, &plot)?;
//! fig.save("yourfigure.png", 300)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use image::{RgbaImage, imageops};
use log::debug;
use ndarray::Ix2;
use rusttype::Font;
use std::path::Path;
use thiserror::Error;

use crate::array::{ArrayError, Coordinate, LabeledArray};
use crate::coastline::{self, Polyline};
use crate::draw::{self, Align};
use crate::colormap::{Colormap, Rgba};
use crate::input::PlotConfig;
use crate::levels::{Norm, format_tick, step_levels};
use crate::output::write_png;
use crate::projection::{MapProjection, projection_factory};

/// Colorbar width as a fraction of the axes width
pub const CBAR_FRACTION: f64 = 0.02;
/// Gap between map and colorbar as a fraction of the axes width
pub const CBAR_PAD: f64 = 0.04;
/// Length of each colorbar extension triangle relative to the bar
const CBAR_EXTEND_FRAC: f64 = 0.05;

const TITLE_FONT_PT: f64 = 20.0;
const LABEL_FONT_PT: f64 = 15.0;
const TICK_FONT_PT: f64 = 12.0;
const COASTLINE_WIDTH_PT: f64 = 0.5;
const OUTLINE_WIDTH_PT: f64 = 0.8;
const TICK_LENGTH_PT: f64 = 3.5;

/// Errors that can occur while building or saving a figure
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Unknown colormap '{0}'")]
    UnknownColormap(String),

    #[error("Unknown projection '{0}'")]
    UnknownProjection(String),

    #[error("Invalid value range: vmin ({vmin}) must be less than vmax ({vmax})")]
    InvalidRange { vmin: f64, vmax: f64 },

    #[error("Invalid levels: {0}")]
    InvalidLevels(String),

    #[error("Invalid extent {0:?}: expected [lon_min, lon_max, lat_min, lat_max] with min < max")]
    InvalidExtent([f64; 4]),

    #[error("Invalid figure size {0:?}: width and height must be positive")]
    InvalidFigureSize([f64; 2]),

    #[error("Nothing to plot: '{0}' has no finite values")]
    EmptyData(String),

    #[error("Expected a 2D latitude/longitude field, '{name}' has dimensions {dims:?}")]
    NotTwoDimensional { name: String, dims: Vec<String> },

    #[error("Coastline error: {0}")]
    Coastline(String),

    #[error("Bundled font could not be parsed")]
    Font,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PNG encoding error: {0}")]
    Png(#[from] png::EncodingError),

    #[error(transparent)]
    Array(#[from] ArrayError),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;

/// One sorted grid axis with cell edges at coordinate midpoints
#[derive(Debug, Clone)]
struct GridAxis {
    /// Original index of each sorted cell
    order: Vec<usize>,
    edges: Vec<f64>,
}

impl GridAxis {
    fn new(values: &[f64]) -> Self {
        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        let sorted: Vec<f64> = order.iter().map(|&i| values[i]).collect();

        let n = sorted.len();
        let mut edges = Vec::with_capacity(n + 1);
        if n == 1 {
            edges.push(sorted[0] - 0.5);
            edges.push(sorted[0] + 0.5);
        } else if n > 1 {
            edges.push(sorted[0] - (sorted[1] - sorted[0]) / 2.0);
            for w in sorted.windows(2) {
                edges.push((w[0] + w[1]) / 2.0);
            }
            edges.push(sorted[n - 1] + (sorted[n - 1] - sorted[n - 2]) / 2.0);
        }

        GridAxis { order, edges }
    }

    fn bounds(&self) -> (f64, f64) {
        (self.edges[0], self.edges[self.edges.len() - 1])
    }

    /// Original index of the cell containing `v`
    fn locate(&self, v: f64) -> Option<usize> {
        let (lo, hi) = self.bounds();
        if !(lo..=hi).contains(&v) {
            return None;
        }
        let k = self.edges.partition_point(|&e| e <= v);
        let cell = k.saturating_sub(1).min(self.order.len() - 1);
        Some(self.order[cell])
    }
}

/// Latitude/longitude grid of cell values, row-major (lat, lon)
#[derive(Debug, Clone)]
struct GeoGrid {
    values: Vec<f64>,
    nlon: usize,
    lat: GridAxis,
    lon: GridAxis,
}

impl GeoGrid {
    fn from_field(field: &LabeledArray) -> RenderResult<Self> {
        let dims: Vec<String> = field.dims().iter().map(|d| d.to_string()).collect();
        let not_2d = || RenderError::NotTwoDimensional {
            name: field.name.clone(),
            dims: dims.clone(),
        };
        if field.ndim() != 2 || field.shape().contains(&0) {
            return Err(not_2d());
        }

        let coords = field.coords();
        let (lat_axis, lon_axis) = if is_latitude(&coords[0]) || is_longitude(&coords[1]) {
            (0, 1)
        } else if is_latitude(&coords[1]) || is_longitude(&coords[0]) {
            (1, 0)
        } else {
            debug!(
                "No latitude/longitude dimension recognised in {:?}, assuming (y, x) order",
                dims
            );
            (0, 1)
        };

        let view = field
            .values()
            .into_dimensionality::<Ix2>()
            .map_err(|_| not_2d())?;
        let view = if lat_axis == 0 { view } else { view.reversed_axes() };
        let (nlat, nlon) = view.dim();

        let mut values = Vec::with_capacity(nlat * nlon);
        for i in 0..nlat {
            for j in 0..nlon {
                values.push(view[[i, j]]);
            }
        }

        Ok(GeoGrid {
            values,
            nlon,
            lat: GridAxis::new(&coords[lat_axis].values),
            lon: GridAxis::new(&coords[lon_axis].values),
        })
    }

    /// Value of the cell containing (lon, lat); longitudes match modulo 360
    fn value_at(&self, lon: f64, lat: f64) -> Option<f64> {
        let i = self.lat.locate(lat)?;
        let j = [lon, lon + 360.0, lon - 360.0]
            .into_iter()
            .find_map(|l| self.lon.locate(l))?;
        Some(self.values[i * self.nlon + j])
    }

    /// Data bounds as `[lon_min, lon_max, lat_min, lat_max]`
    fn extent(&self) -> [f64; 4] {
        let (lon_min, lon_max) = self.lon.bounds();
        let (lat_min, lat_max) = self.lat.bounds();
        [lon_min, lon_max, lat_min.max(-90.0), lat_max.min(90.0)]
    }
}

fn is_latitude(coord: &Coordinate) -> bool {
    let name = coord.name.to_lowercase();
    matches!(name.as_str(), "lat" | "latitude" | "y" | "nav_lat" | "lsmlat")
        || coord.units().is_some_and(|u| {
            let u = u.to_lowercase();
            u.starts_with("degree") && (u.ends_with("north") || u.ends_with("_n"))
        })
}

fn is_longitude(coord: &Coordinate) -> bool {
    let name = coord.name.to_lowercase();
    matches!(name.as_str(), "lon" | "longitude" | "x" | "nav_lon" | "lsmlon")
        || coord.units().is_some_and(|u| {
            let u = u.to_lowercase();
            u.starts_with("degree") && (u.ends_with("east") || u.ends_with("_e"))
        })
}

/// Axis-aligned rectangle in pixel units
#[derive(Debug, Clone, Copy, PartialEq)]
struct Rect {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

impl Rect {
    fn pixels(&self) -> (i64, i64, i64, i64) {
        let x = self.x.round() as i64;
        let y = self.y.round() as i64;
        (
            x,
            y,
            ((self.x + self.w).round() as i64 - x).max(1),
            ((self.y + self.h).round() as i64 - y).max(1),
        )
    }
}

/// Pixel layout of a figure at one resolution
#[derive(Debug, Clone, PartialEq)]
struct Layout {
    width: usize,
    height: usize,
    px_per_pt: f64,
    map: Rect,
    cbar: Rect,
}

impl Layout {
    fn new(figsize: [f64; 2], dpi: f64, aspect: f64) -> Self {
        let width = (figsize[0] * dpi).round().max(1.0) as usize;
        let height = (figsize[1] * dpi).round().max(1.0) as usize;
        let (w, h) = (width as f64, height as f64);

        // default subplot parameters: left 0.125, right 0.9, bottom 0.11, top 0.88
        let axes = Rect {
            x: 0.125 * w,
            y: 0.12 * h,
            w: 0.775 * w,
            h: 0.77 * h,
        };
        let cbar_w = CBAR_FRACTION * axes.w;
        let pad = CBAR_PAD * axes.w;
        let avail_w = axes.w - cbar_w - pad;

        let (map_w, map_h) = if avail_w / axes.h > aspect {
            (axes.h * aspect, axes.h)
        } else {
            (avail_w, avail_w / aspect)
        };
        let map = Rect {
            x: axes.x + (avail_w - map_w) / 2.0,
            y: axes.y + (axes.h - map_h) / 2.0,
            w: map_w,
            h: map_h,
        };
        let cbar = Rect {
            x: map.x + map.w + pad,
            y: axes.y,
            w: cbar_w,
            h: axes.h,
        };

        Layout {
            width,
            height,
            px_per_pt: dpi / 72.0,
            map,
            cbar,
        }
    }

    /// Font size in pixels for a size in points
    fn font_px(&self, pt: f64) -> f32 {
        (pt * self.px_per_pt) as f32
    }

    fn stroke(&self, pt: f64) -> u32 {
        (pt * self.px_per_pt).round().max(1.0) as u32
    }

    fn colorbar(&self) -> ColorbarGeometry {
        let (x, y, w, h) = self.cbar.pixels();
        let ext = ((h as f64) * CBAR_EXTEND_FRAC).round().max(1.0) as i64;
        let len = (h - 2 * ext).max(1);
        ColorbarGeometry {
            x,
            y,
            w,
            h,
            top: y + ext,
            len,
        }
    }
}

/// Colorbar in pixels: the extension triangles span `y..top` and
/// `top + len..y + h`, the bar itself `top..top + len`
#[derive(Debug, Clone, Copy, PartialEq)]
struct ColorbarGeometry {
    x: i64,
    y: i64,
    w: i64,
    h: i64,
    top: i64,
    len: i64,
}

impl ColorbarGeometry {
    fn bottom(&self) -> i64 {
        self.top + self.len
    }
}

/// A rendered map figure.
///
/// Holds everything needed to rasterize the figure at any resolution; see
/// [`Figure::to_image`] and [`Figure::save`].
pub struct Figure {
    name: String,
    grid: GeoGrid,
    norm: Norm,
    cmap: Colormap,
    projection: Box<dyn MapProjection>,
    extent: [f64; 4],
    coastlines: Vec<Polyline>,
    title: String,
    colorbar_label: String,
    figsize: [f64; 2],
}

/// Builds a figure from a 2D field and plot options.
///
/// Resolves the value range (observed min/max unless configured), the level
/// boundaries, colormap, projection, extent and coastlines.
///
/// # Errors
///
/// See [`RenderError`]: unknown colormap or projection, invalid range, levels
/// or extent, a field that is not 2D or has no finite values, unreadable
/// coastlines.
pub fn render(field: &LabeledArray, plot: &PlotConfig) -> RenderResult<Figure> {
    let grid = GeoGrid::from_field(field)?;
    let cmap = Colormap::from_name(&plot.cmap).ok_or_else(|| RenderError::UnknownColormap(plot.cmap.clone()))?;
    let projection =
        projection_factory(&plot.projection).ok_or_else(|| RenderError::UnknownProjection(plot.projection.clone()))?;

    let norm = resolve_norm(field, plot)?;
    debug!("Resolved norm for '{}': {:?}", field.name, norm);

    let extent = match plot.extent {
        Some(extent) => extent,
        None => grid.extent(),
    };
    let [lon_min, lon_max, lat_min, lat_max] = extent;
    if !(lon_min < lon_max && lat_min < lat_max) {
        return Err(RenderError::InvalidExtent(extent));
    }
    let (lat_min, lat_max) = (projection.clamp_lat(lat_min), projection.clamp_lat(lat_max));
    if lat_min >= lat_max {
        // the whole band lies beyond the latitudes the projection can show
        return Err(RenderError::InvalidExtent(extent));
    }
    let extent = [lon_min, lon_max, lat_min, lat_max];

    let coastlines = match &plot.coastlines {
        Some(path) => coastline::read_coastlines(path).map_err(RenderError::Coastline)?,
        None => Vec::new(),
    };

    if plot.figsize[0] <= 0.0 || plot.figsize[1] <= 0.0 {
        return Err(RenderError::InvalidFigureSize(plot.figsize));
    }

    Ok(Figure {
        name: field.name.clone(),
        grid,
        norm,
        cmap,
        projection,
        extent,
        coastlines,
        title: plot.title.clone(),
        colorbar_label: plot.colorbar_label.clone(),
        figsize: plot.figsize,
    })
}

/// Chooses the value range and level boundaries for a field.
pub fn resolve_norm(field: &LabeledArray, plot: &PlotConfig) -> RenderResult<Norm> {
    let (observed_min, observed_max) = match (field.min(), field.max()) {
        (Some(min), Some(max)) => (min, max),
        _ => return Err(RenderError::EmptyData(field.name.clone())),
    };

    let mut vmin = plot.vmin.unwrap_or(observed_min);
    let mut vmax = plot.vmax.unwrap_or(observed_max);
    if vmin == vmax && plot.vmin.is_none() && plot.vmax.is_none() {
        // constant field: widen so there is something to map
        vmin -= 0.5;
        vmax += 0.5;
    }
    if !(vmin < vmax) {
        return Err(RenderError::InvalidRange { vmin, vmax });
    }

    if let Some(levels) = &plot.levels {
        if levels.len() < 2 {
            return Err(RenderError::InvalidLevels(format!(
                "need at least two levels, got {}",
                levels.len()
            )));
        }
        if levels.windows(2).any(|w| !(w[0] < w[1])) {
            return Err(RenderError::InvalidLevels(format!(
                "levels must be strictly increasing: {:?}",
                levels
            )));
        }
        return Ok(Norm::Discrete {
            boundaries: levels.clone(),
        });
    }

    match plot.steps {
        Some(n) if n < 2 => Err(RenderError::InvalidLevels(format!(
            "steps must be at least 2, got {}",
            n
        ))),
        Some(n) => Ok(Norm::Discrete {
            boundaries: step_levels(vmin, vmax, n),
        }),
        None => Ok(Norm::Continuous { vmin, vmax }),
    }
}

impl Figure {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn norm(&self) -> &Norm {
        &self.norm
    }

    /// Level boundaries, when the colorbar is categorized
    pub fn boundaries(&self) -> Option<&[f64]> {
        match &self.norm {
            Norm::Discrete { boundaries } => Some(boundaries),
            Norm::Continuous { .. } => None,
        }
    }

    /// Plotted extent as `[lon_min, lon_max, lat_min, lat_max]`
    pub fn extent(&self) -> [f64; 4] {
        self.extent
    }

    pub fn projection_name(&self) -> &'static str {
        self.projection.name()
    }

    /// Pixel size of the figure at `dpi`
    pub fn pixel_size(&self, dpi: u32) -> (usize, usize) {
        let layout = Layout::new(self.figsize, dpi as f64, self.aspect());
        (layout.width, layout.height)
    }

    /// Rasterizes the figure at `dpi`.
    pub fn to_image(&self, dpi: u32) -> RenderResult<RgbaImage> {
        let font = draw::font().ok_or(RenderError::Font)?;
        let layout = Layout::new(self.figsize, dpi as f64, self.aspect());
        debug!(
            "Rasterizing '{}' at {} dpi: {}x{} px, map {:?}",
            self.name, dpi, layout.width, layout.height, layout.map
        );

        let mut img = RgbaImage::from_pixel(layout.width as u32, layout.height as u32, Rgba::WHITE.into());
        let mut map = self.draw_field(&layout);
        if !self.coastlines.is_empty() {
            self.draw_coastlines(&mut map, &layout);
        }
        let (mx, my, _, _) = layout.map.pixels();
        imageops::replace(&mut img, &map, mx, my);

        self.draw_colorbar(&mut img, &layout, font);
        self.draw_title(&mut img, &layout, font);
        Ok(img)
    }

    /// Renders at `dpi` and writes a PNG, replacing any existing file.
    pub fn save<P: AsRef<Path>>(&self, path: P, dpi: u32) -> RenderResult<()> {
        let img = self.to_image(dpi)?;
        write_png(&img, path, dpi)
    }

    /// Projected corners of the extent: (x0, y0, x1, y1)
    fn projected_bounds(&self) -> (f64, f64, f64, f64) {
        let [lon_min, lon_max, lat_min, lat_max] = self.extent;
        let (x0, y0) = self.projection.project(lon_min, lat_min);
        let (x1, y1) = self.projection.project(lon_max, lat_max);
        (x0, y0, x1, y1)
    }

    fn aspect(&self) -> f64 {
        let (x0, y0, x1, y1) = self.projected_bounds();
        (x1 - x0) / (y1 - y0)
    }

    /// Map axes as their own image; cells without a value stay white
    fn draw_field(&self, layout: &Layout) -> RgbaImage {
        let (x0, y0, x1, y1) = self.projected_bounds();
        let (_, _, mw, mh) = layout.map.pixels();

        RgbaImage::from_fn(mw as u32, mh as u32, |px, py| {
            let y = y1 - (py as f64 + 0.5) / mh as f64 * (y1 - y0);
            let x = x0 + (px as f64 + 0.5) / mw as f64 * (x1 - x0);
            let (lon, lat) = self.projection.unproject(x, y);
            self.grid
                .value_at(lon, lat)
                .and_then(|v| self.norm.color(&self.cmap, v))
                .unwrap_or(Rgba::WHITE)
                .into()
        })
    }

    /// Coastlines on the map image, which clips them to the axes
    fn draw_coastlines(&self, map_img: &mut RgbaImage, layout: &Layout) {
        let (x0, y0, x1, y1) = self.projected_bounds();
        let (w, h) = (map_img.width() as f64, map_img.height() as f64);
        let width = layout.stroke(COASTLINE_WIDTH_PT);
        let to_pixel = |lon: f64, lat: f64| {
            let (x, y) = self.projection.project(lon, lat);
            ((x - x0) / (x1 - x0) * w, (y1 - y) / (y1 - y0) * h)
        };

        for offset in [-360.0, 0.0, 360.0] {
            for line in &self.coastlines {
                for seg in line.windows(2) {
                    let (a, b) = (seg[0], seg[1]);
                    if (a.0 - b.0).abs() > 180.0 {
                        continue;
                    }
                    draw::stroke(
                        map_img,
                        to_pixel(a.0 + offset, a.1),
                        to_pixel(b.0 + offset, b.1),
                        width,
                        Rgba::DIM_GRAY.into(),
                    );
                }
            }
        }
    }

    /// Color of the bar at `frac` of its length from the low end
    fn colorbar_color(&self, frac: f64) -> Rgba {
        match &self.norm {
            Norm::Continuous { .. } => self.cmap.sample(frac),
            Norm::Discrete { boundaries } => {
                let n = boundaries.len();
                let bin = (1 + (frac * (n - 1) as f64).floor() as usize).min(n - 1);
                self.cmap.sample(bin as f64 / n as f64)
            }
        }
    }

    fn draw_colorbar(&self, img: &mut RgbaImage, layout: &Layout, font: &Font<'_>) {
        let bar = layout.colorbar();
        let (x, y, w, h, top, len) = (bar.x, bar.y, bar.w, bar.h, bar.top, bar.len);
        let bottom = bar.bottom();

        // top row is the high end
        for row in 0..len {
            let frac = 1.0 - (row as f64 + 0.5) / len as f64;
            draw::fill_rect(img, x, top + row, w, 1, self.colorbar_color(frac).into());
        }

        // extensions for out-of-range values
        let (xf, wf) = (x as f64, w as f64);
        let apex_top = (xf + wf / 2.0, y as f64);
        let apex_bottom = (xf + wf / 2.0, (y + h) as f64);
        let (tl, tr) = ((xf, top as f64), (xf + wf, top as f64));
        let (bl, br) = ((xf, bottom as f64), (xf + wf, bottom as f64));
        draw::fill_polygon(img, &[tl, tr, apex_top], self.cmap.sample(1.0).into());
        draw::fill_polygon(img, &[bl, br, apex_bottom], self.cmap.sample(0.0).into());

        let stroke = layout.stroke(OUTLINE_WIDTH_PT);
        for (a, b) in [(tl, apex_top), (apex_top, tr), (tr, br), (br, apex_bottom), (apex_bottom, bl), (bl, tl)] {
            draw::stroke(img, a, b, stroke, Rgba::BLACK.into());
        }

        // ticks and labels
        let tick_px = layout.font_px(TICK_FONT_PT);
        let (_, text_h) = draw::text_size(font, "0", tick_px);
        let tick_len = layout.stroke(TICK_LENGTH_PT) as f64;
        let ticks = self.norm.ticks();
        let (vmin, vmax) = self.norm.range();
        let every = if ticks.len() > 1 {
            let spacing = len as f64 / (ticks.len() - 1) as f64;
            ((text_h as f64 * 1.2) / spacing).ceil().max(1.0) as usize
        } else {
            1
        };

        let label_x = (xf + wf + tick_len * 1.5).round() as i32 + 1;
        let mut max_label_w = 0;
        for (i, &value) in ticks.iter().enumerate() {
            let frac = match &self.norm {
                Norm::Continuous { .. } => (value - vmin) / (vmax - vmin),
                Norm::Discrete { .. } if ticks.len() > 1 => i as f64 / (ticks.len() - 1) as f64,
                Norm::Discrete { .. } => 0.5,
            };
            let ty = (bottom as f64 - frac * len as f64).round();
            draw::stroke(img, (xf + wf, ty), (xf + wf + tick_len, ty), stroke, Rgba::BLACK.into());

            if i % every == 0 {
                let text = format_tick(value);
                max_label_w = max_label_w.max(draw::text_size(font, &text, tick_px).0);
                let text_y = ty as i32 - text_h as i32 / 2;
                draw::text(img, font, &text, label_x, text_y, tick_px, Align::Left, Rgba::BLACK.into());
            }
        }

        if !self.colorbar_label.is_empty() {
            let lx = label_x as i64 + max_label_w as i64 + (tick_px / 2.0).round() as i64;
            draw::text_vertical(
                img,
                font,
                &self.colorbar_label,
                lx,
                y + h / 2,
                layout.font_px(LABEL_FONT_PT),
                Rgba::BLACK.into(),
            );
        }
    }

    /// Title right-aligned with the map's right edge, just above the map
    fn draw_title(&self, img: &mut RgbaImage, layout: &Layout, font: &Font<'_>) {
        if self.title.is_empty() {
            return;
        }
        let size = layout.font_px(TITLE_FONT_PT);
        let (_, text_h) = draw::text_size(font, &self.title, size);
        let (mx, my, mw, _) = layout.map.pixels();
        let ty = (my - text_h as i64 - text_h as i64 / 4).max(0);
        draw::text(img, font, &self.title, (mx + mw) as i32, ty as i32, size, Align::Right, Rgba::BLACK.into());
    }
}
