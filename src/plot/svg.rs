//! Static SVG charts via Plotters.
//!
//! Only the SVG backend is enabled (no native font/system dependencies), so
//! charts are written straight to a file path and viewed in a browser.

use std::path::Path;

use plotters::prelude::*;

use crate::error::AppError;

/// Scatter `points` with an optional overlaid line, written as an SVG file.
///
/// # Errors
/// Exit code 2 when the file cannot be written, exit code 3 when there is
/// nothing to plot or the data has no span on either axis.
pub fn write_svg_chart(
    path: &Path,
    title: &str,
    points: &[(f64, f64)],
    line: Option<&[(f64, f64)]>,
    x_label: &str,
    y_label: &str,
) -> Result<(), AppError> {
    let all: Vec<(f64, f64)> = points
        .iter()
        .chain(line.into_iter().flatten())
        .copied()
        .collect();
    let (x0, x1) = axis_range(all.iter().map(|p| p.0))?;
    let (y0, y1) = axis_range(all.iter().map(|p| p.1))?;

    let path_str = path.display().to_string();
    let root = SVGBackend::new(&path_str, (900, 540)).into_drawing_area();
    let draw = |e: DrawingAreaErrorKind<std::io::Error>| {
        AppError::new(2, format!("Failed to write SVG '{path_str}': {e}"))
    };

    root.fill(&WHITE).map_err(draw)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 22))
        .margin(12)
        .set_label_area_size(LabelAreaPosition::Left, 56)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(x0..x1, y0..y1)
        .map_err(draw)?;

    chart
        .configure_mesh()
        .x_desc(x_label)
        .y_desc(y_label)
        .draw()
        .map_err(draw)?;

    if let Some(line) = line {
        chart
            .draw_series(LineSeries::new(line.iter().copied(), &RED))
            .map_err(draw)?;
    }
    if !points.is_empty() {
        chart
            .draw_series(
                points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 3, BLUE.filled())),
            )
            .map_err(draw)?;
    }

    root.present().map_err(draw)?;
    Ok(())
}

fn axis_range(values: impl Iterator<Item = f64>) -> Result<(f64, f64), AppError> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        min = min.min(v);
        max = max.max(v);
    }
    if !(min.is_finite() && max.is_finite() && max > min) {
        return Err(AppError::insufficient(
            "Chart data has no span; nothing to draw.",
        ));
    }
    let pad = (max - min) * 0.05;
    Ok((min - pad, max + pad))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_a_scatter_with_overlay() {
        let dir = std::env::temp_dir().join("polmeth-svg-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("chart.svg");

        let points = vec![(0.0, 1.0), (1.0, 2.1), (2.0, 2.9)];
        let line = vec![(0.0, 1.0), (2.0, 3.0)];
        write_svg_chart(&path, "test", &points, Some(&line), "x", "y").unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains("<svg"), "output is not an SVG document");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn empty_data_is_an_insufficient_data_error() {
        let path = std::env::temp_dir().join("polmeth-empty.svg");
        let err = write_svg_chart(&path, "t", &[], None, "x", "y").unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
