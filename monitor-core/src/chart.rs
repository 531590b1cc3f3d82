use anyhow::{Context, Result, anyhow};
use chrono::FixedOffset;
use plotters::prelude::*;
use std::{fmt::Display, fs, path::PathBuf};
use tracing::{debug, info};

use crate::{Reading, report::local_time_label};

/// Anything that can present the stored history. Kept out of the core loop
/// so the scheduler runs the same with or without a display.
pub trait ChartSink: Send + Sync {
    fn render(&self, readings: &[Reading]) -> Result<()>;
}

/// Per-city temperature scatter chart written as an SVG file.
#[derive(Debug, Clone)]
pub struct SvgTrendChart {
    path: PathBuf,
    offset: FixedOffset,
    size: (u32, u32),
}

impl SvgTrendChart {
    pub fn new(path: PathBuf, offset: FixedOffset) -> Self {
        Self { path, offset, size: (1000, 600) }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl ChartSink for SvgTrendChart {
    fn render(&self, readings: &[Reading]) -> Result<()> {
        if readings.is_empty() {
            info!("No data available for plotting");
            return Ok(());
        }

        let series = group_by_city(readings);
        let (x_range, y_range) = bounds(readings);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create chart directory {}", parent.display()))?;
        }

        let root = SVGBackend::new(&self.path, self.size).into_drawing_area();
        root.fill(&WHITE).map_err(plot_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Temperature Trend by City", ("sans-serif", 24))
            .margin(20)
            .x_label_area_size(60)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range, y_range)
            .map_err(plot_err)?;

        let offset = self.offset;
        chart
            .configure_mesh()
            .x_desc(format!("Time (UTC{offset})"))
            .y_desc("Temperature (°C)")
            .x_label_formatter(&|ts: &i64| local_time_label(*ts, offset))
            .draw()
            .map_err(plot_err)?;

        for (i, (city, points)) in series.iter().enumerate() {
            let color = Palette99::pick(i).to_rgba();
            chart
                .draw_series(
                    points.iter().map(|&(x, y)| Circle::new((x, y), 5, color.filled())),
                )
                .map_err(plot_err)?
                .label(*city)
                .legend(move |(x, y)| Circle::new((x, y), 5, color.filled()));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(plot_err)?;

        root.present().map_err(plot_err)?;

        debug!(cities = series.len(), points = readings.len(), "Chart written to {}", self.path.display());
        Ok(())
    }
}

/// (city, [(observed_at, temperature_c)]) in order of first appearance.
fn group_by_city(readings: &[Reading]) -> Vec<(&str, Vec<(i64, f64)>)> {
    let mut series: Vec<(&str, Vec<(i64, f64)>)> = Vec::new();
    for r in readings {
        let point = (r.observed_at(), r.temperature_c());
        match series.iter_mut().find(|(city, _)| *city == r.city()) {
            Some((_, points)) => points.push(point),
            None => series.push((r.city(), vec![point])),
        }
    }
    series
}

fn bounds(readings: &[Reading]) -> (std::ops::Range<i64>, std::ops::Range<f64>) {
    let (mut x_min, mut x_max) = (i64::MAX, i64::MIN);
    let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for r in readings {
        x_min = x_min.min(r.observed_at());
        x_max = x_max.max(r.observed_at());
        y_min = y_min.min(r.temperature_c());
        y_max = y_max.max(r.temperature_c());
    }

    // Half an hour of slack on each side keeps single-instant data plottable.
    (x_min - 1800..x_max + 1800, y_min - 2.0..y_max + 2.0)
}

fn plot_err<E: Display>(err: E) -> anyhow::Error {
    anyhow!("failed to draw chart: {err}")
}
