//! Chart rendering with Plotters (SVG output)

use std::path::Path;

use clap::ValueEnum;
use plotters::coord::Shift;
use plotters::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::error::DashboardError;
use crate::report::{DashboardView, StockBar};

/// Color palette for the three clusters
const CLUSTER_COLORS: [RGBColor; 3] = [RED, BLUE, GREEN];

const CHART_SIZE: (u32, u32) = (800, 600);
const MAX_LABEL_CHARS: usize = 24;

/// Mark used for the closing-stock ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    #[default]
    Bar,
    Line,
    Point,
}

/// Draw the closing-stock ranking to an SVG file
///
/// # Arguments
/// * `bars` - Ranked products, highest closing stock first
/// * `kind` - Bar, line or point marks
/// * `output_path` - Destination `.svg` path
pub fn render_stock_chart(bars: &[StockBar], kind: ChartKind, output_path: &Path) -> crate::Result<()> {
    let root = SVGBackend::new(output_path, CHART_SIZE).into_drawing_area();
    draw_stock_chart(&root, bars, kind)?;
    info!(path = %output_path.display(), ?kind, bars = bars.len(), "stock chart saved");
    Ok(())
}

/// Same chart as [`render_stock_chart`], returned as an SVG document
pub fn stock_chart_svg(bars: &[StockBar], kind: ChartKind) -> crate::Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, CHART_SIZE).into_drawing_area();
        draw_stock_chart(&root, bars, kind)?;
    }
    Ok(svg)
}

fn draw_stock_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    bars: &[StockBar],
    kind: ChartKind,
) -> crate::Result<()> {
    root.fill(&WHITE).map_err(DashboardError::chart)?;

    let n = bars.len();
    let max_stock = bars.iter().map(|b| b.closing_stock).fold(0.0, f64::max);
    let x_max = if max_stock > 0.0 { max_stock * 1.1 } else { 1.0 };

    // rank 0 is drawn at the top
    let y_of = |rank: usize| (n - 1 - rank) as f64;
    let label_of = |y: &f64| -> String {
        let slot = y.round();
        if (y - slot).abs() > 1e-6 || slot < 0.0 || slot as usize >= n {
            return String::new();
        }
        let name = &bars[n - 1 - slot as usize].product_name;
        name.chars().take(MAX_LABEL_CHARS).collect()
    };

    let mut chart = ChartBuilder::on(root)
        .caption("Closing Stock by Product", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(170)
        .build_cartesian_2d(0f64..x_max, -0.5f64..(n.max(1) as f64 - 0.5))
        .map_err(DashboardError::chart)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n.max(1))
        .y_label_formatter(&label_of)
        .x_desc("Closing stock")
        .axis_desc_style(("sans-serif", 15))
        .draw()
        .map_err(DashboardError::chart)?;

    let points: Vec<(f64, f64)> = bars
        .iter()
        .enumerate()
        .map(|(rank, bar)| (bar.closing_stock, y_of(rank)))
        .collect();

    match kind {
        ChartKind::Bar => chart.draw_series(
            points
                .iter()
                .map(|&(x, y)| Rectangle::new([(0.0, y - 0.35), (x, y + 0.35)], BLUE.filled())),
        ),
        ChartKind::Line => chart.draw_series(LineSeries::new(points.iter().copied(), &BLUE)),
        ChartKind::Point => chart.draw_series(
            points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 4, BLUE.filled())),
        ),
    }
    .map_err(DashboardError::chart)?;

    root.present().map_err(DashboardError::chart)?;
    Ok(())
}

/// Scatter plot of opening stock vs sell-through, colored by cluster
pub fn render_cluster_scatter(view: &DashboardView, output_path: &Path) -> crate::Result<()> {
    let root = SVGBackend::new(output_path, CHART_SIZE).into_drawing_area();
    draw_cluster_scatter(&root, view)?;
    info!(path = %output_path.display(), "cluster scatter saved");
    Ok(())
}

pub fn cluster_scatter_svg(view: &DashboardView) -> crate::Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, CHART_SIZE).into_drawing_area();
        draw_cluster_scatter(&root, view)?;
    }
    Ok(svg)
}

fn draw_cluster_scatter<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    view: &DashboardView,
) -> crate::Result<()> {
    root.fill(&WHITE).map_err(DashboardError::chart)?;

    let x_max = view.points.iter().fold(1.0, |a: f64, p| a.max(p.opening_stock)) * 1.05;
    let y_max = view.points.iter().fold(1.0, |a: f64, p| a.max(p.sell_through_pct)) * 1.05;

    let mut chart = ChartBuilder::on(root)
        .caption("Products by Cluster", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..x_max, 0f64..y_max)
        .map_err(DashboardError::chart)?;

    chart
        .configure_mesh()
        .x_desc("Opening stock")
        .y_desc("Sell-through (%)")
        .axis_desc_style(("sans-serif", 15))
        .draw()
        .map_err(DashboardError::chart)?;

    for point in &view.points {
        let color = cluster_color(point.cluster_id);
        chart
            .draw_series(std::iter::once(Circle::new(
                (point.opening_stock, point.sell_through_pct),
                4,
                color.filled(),
            )))
            .map_err(DashboardError::chart)?;
    }

    // centroids as squares, sized relative to the axes
    let (dx, dy) = (x_max * 0.01, y_max * 0.01);
    for centroid in &view.centroids {
        let (cx, cy) = (centroid.opening_stock, centroid.sell_through_pct);
        let color = cluster_color(centroid.cluster_id);

        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(cx - dx, cy - dy), (cx + dx, cy + dy)],
                color.filled(),
            )))
            .map_err(DashboardError::chart)?
            .label(format!("Cluster {}", centroid.cluster_id))
            .legend(move |(x, y)| Rectangle::new([(x, y), (x + 10, y + 10)], color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(DashboardError::chart)?;

    root.present().map_err(DashboardError::chart)?;
    Ok(())
}

fn cluster_color(cluster_id: usize) -> RGBColor {
    CLUSTER_COLORS[cluster_id.saturating_sub(1) % CLUSTER_COLORS.len()]
}
