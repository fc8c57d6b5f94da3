//! Box plots with a jittered strip overlay, rendered to PNG
//!
//! Each group gets one box (quartiles, median, 1.5 IQR whiskers) at its slot
//! on the x axis, coloured from a fixed palette, with the raw observations
//! scattered over it in translucent grey. Jitter comes from a seeded RNG so
//! re-runs place points identically.
//!
//! Captions and tick labels use a bundled DejaVu Sans registered as the
//! `sans-serif` family, so rendering never depends on system fonts.

use crate::stats::{BoxSummary, GroupValues};
use crate::{Error, Result};
use plotters::prelude::*;
use plotters::style::register_font;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

/// Box fill colours, assigned to groups in display order
pub const PALETTE: [RGBColor; 3] = [
    RGBColor(0x01, 0x73, 0xB2),
    RGBColor(0xDE, 0x8F, 0x05),
    RGBColor(0x02, 0x9E, 0x73),
];

const POINT_COLOR: RGBColor = RGBColor(0x80, 0x80, 0x80);
const BOX_HALF_WIDTH: f64 = 0.3;
const JITTER: f64 = 0.15;

static SANS_SERIF: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");
static FONT_REGISTERED: OnceLock<bool> = OnceLock::new();

/// Register the bundled font with plotters, once per process
fn ensure_font() -> Result<()> {
    let registered = *FONT_REGISTERED
        .get_or_init(|| register_font("sans-serif", FontStyle::Normal, SANS_SERIF).is_ok());
    if registered {
        Ok(())
    } else {
        Err(Error::Plot("bundled sans-serif font could not be loaded".to_string()))
    }
}

/// Image size and strip-plot jitter
#[derive(Debug, Clone, Copy)]
pub struct PlotOptions {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Seed for horizontal jitter of strip points (`None` draws no points)
    pub jitter_seed: Option<u64>,
    /// Fixed y range; derived from the data when `None`
    pub y_range: Option<(f64, f64)>,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            jitter_seed: Some(2019),
            y_range: None,
        }
    }
}

/// Box plot with strip overlay of `groups`, one slot per group
///
/// Empty groups keep their slot but draw nothing.
///
/// # Errors
/// Returns [`Error::Plot`] if rendering or encoding the image fails
#[allow(clippy::cast_precision_loss)]
pub fn box_strip_plot(
    path: &Path,
    title: &str,
    groups: &[GroupValues],
    options: &PlotOptions,
) -> Result<()> {
    ensure_font()?;
    let (y_low, y_high) = options.y_range.unwrap_or_else(|| data_range(groups));
    let slots = groups.len().max(1) as f64;

    let root = BitMapBackend::new(path, (options.width, options.height)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5..slots - 0.5, y_low..y_high)
        .map_err(plot_error)?;

    let label_of = |x: &f64| slot_label(groups, *x);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(groups.len().max(1))
        .x_label_formatter(&label_of)
        .y_desc(title)
        .draw()
        .map_err(plot_error)?;

    for (slot, group) in groups.iter().enumerate() {
        let Some(summary) = BoxSummary::from_values(&group.values) else {
            continue;
        };
        let x = slot as f64;
        let fill = PALETTE[slot % PALETTE.len()];
        let (left, right) = (x - BOX_HALF_WIDTH, x + BOX_HALF_WIDTH);

        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(left, summary.q1), (right, summary.q3)],
                fill.filled(),
            )))
            .map_err(plot_error)?;
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(left, summary.q1), (right, summary.q3)],
                BLACK.stroke_width(1),
            )))
            .map_err(plot_error)?;

        let cap = BOX_HALF_WIDTH / 2.0;
        let lines = vec![
            vec![(left, summary.median), (right, summary.median)],
            vec![(x, summary.q3), (x, summary.whisker_high)],
            vec![(x, summary.q1), (x, summary.whisker_low)],
            vec![(x - cap, summary.whisker_high), (x + cap, summary.whisker_high)],
            vec![(x - cap, summary.whisker_low), (x + cap, summary.whisker_low)],
        ];
        chart
            .draw_series(
                lines
                    .into_iter()
                    .map(|points| PathElement::new(points, BLACK.stroke_width(2))),
            )
            .map_err(plot_error)?;

        chart
            .draw_series(
                summary
                    .outliers
                    .iter()
                    .map(|v| Circle::new((x, *v), 4, BLACK.stroke_width(1))),
            )
            .map_err(plot_error)?;
    }

    if let Some(seed) = options.jitter_seed {
        let mut rng = StdRng::seed_from_u64(seed);
        for (slot, group) in groups.iter().enumerate() {
            let x = slot as f64;
            let points: Vec<(f64, f64)> = group
                .values
                .iter()
                .map(|v| (x + rng.gen_range(-JITTER..=JITTER), *v))
                .collect();
            chart
                .draw_series(
                    points
                        .into_iter()
                        .map(|p| Circle::new(p, 3, POINT_COLOR.mix(0.5).filled())),
                )
                .map_err(plot_error)?;
        }
    }

    root.present().map_err(plot_error)?;
    debug!(path = %path.display(), groups = groups.len(), "plot written");
    Ok(())
}

fn slot_label(groups: &[GroupValues], x: f64) -> String {
    let rounded = x.round();
    if (x - rounded).abs() > 1e-6 || rounded < 0.0 {
        return String::new();
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let slot = rounded as usize;
    groups.get(slot).map(|g| g.label.clone()).unwrap_or_default()
}

/// Value range of all groups with a 5% margin
fn data_range(groups: &[GroupValues]) -> (f64, f64) {
    let (low, high) = groups
        .iter()
        .flat_map(|g| g.values.iter().copied())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !low.is_finite() || !high.is_finite() {
        return (0.0, 1.0);
    }
    let pad = if high > low { (high - low) * 0.05 } else { 0.5 };
    (low - pad, high + pad)
}

fn plot_error<E: std::fmt::Display>(err: E) -> Error {
    Error::Plot(err.to_string())
}
