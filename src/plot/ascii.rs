//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - observed points: `o`
//! - fitted/forecast line: `-`
//! - stem charts (ACF/PACF): `#` bars around a zero axis

/// Scatter observed points with an optional overlaid line (e.g. a fitted
/// regression or a forecast path sampled on the same x scale).
pub fn render_scatter(
    points: &[(f64, f64)],
    line: Option<&[(f64, f64)]>,
    width: usize,
    height: usize,
    x_label: &str,
    y_label: &str,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let Some((x_min, x_max)) = x_range(points, line) else {
        return "(nothing to plot)\n".to_string();
    };
    let Some((y_min, y_max)) = y_range(points, line) else {
        return "(nothing to plot)\n".to_string();
    };
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Line first, so observation markers overlay it.
    if let Some(line) = line {
        for w in line.windows(2) {
            draw_segment(&mut grid, w[0], w[1], x_min, x_max, y_min, y_max);
        }
    }
    for &(x, y) in points {
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        grid[row][col] = 'o';
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: {x_label}=[{x_min:.3}, {x_max:.3}] | {y_label}=[{y_min:.3}, {y_max:.3}]\n"
    ));
    for row in grid {
        out.push_str(row.into_iter().collect::<String>().trim_end());
        out.push('\n');
    }
    out
}

/// Render an ordered series as a line over its index.
pub fn render_series(values: &[f64], width: usize, height: usize, label: &str) -> String {
    let line: Vec<(f64, f64)> = values
        .iter()
        .enumerate()
        .map(|(i, &v)| (i as f64, v))
        .collect();
    render_scatter(&[], Some(&line), width, height, "t", label)
}

/// Stem chart for autocorrelations: one column per lag, bars grow away from
/// a zero axis, and the approximate confidence band is marked with `.`.
pub fn render_stems(values: &[f64], ci: f64, height: usize, label: &str) -> String {
    if values.is_empty() {
        return "(nothing to plot)\n".to_string();
    }
    let height = height.max(7) | 1; // odd, so the zero axis is a real row
    let half = height / 2;
    let scale = values
        .iter()
        .map(|v| v.abs())
        .fold(ci.abs(), f64::max)
        .max(1e-12);

    let mut grid = vec![vec![' '; values.len() * 2]; height];

    let to_row = |v: f64| -> usize {
        let u = (v / scale).clamp(-1.0, 1.0);
        (half as f64 - u * half as f64).round() as usize
    };

    // Confidence band.
    let upper = to_row(ci);
    let lower = to_row(-ci);
    for col in 0..values.len() * 2 {
        grid[upper][col] = '.';
        grid[lower][col] = '.';
        grid[half][col] = '-';
    }

    for (i, &v) in values.iter().enumerate() {
        let col = i * 2;
        let end = to_row(v);
        let (lo, hi) = if end <= half { (end, half) } else { (half, end) };
        for row in lo..=hi {
            grid[row][col] = '#';
        }
    }

    let mut out = String::new();
    out.push_str(&format!("{label} (band +/-{ci:.3}, scale {scale:.3})\n"));
    for row in grid {
        out.push_str(row.into_iter().collect::<String>().trim_end());
        out.push('\n');
    }
    out
}

fn draw_segment(
    grid: &mut [Vec<char>],
    a: (f64, f64),
    b: (f64, f64),
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
) {
    let width = grid[0].len();
    let height = grid.len();
    let steps = width.max(2) * 2;
    for s in 0..=steps {
        let u = s as f64 / steps as f64;
        let x = a.0 + u * (b.0 - a.0);
        let y = a.1 + u * (b.1 - a.1);
        if !(x.is_finite() && y.is_finite()) {
            continue;
        }
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        if grid[row][col] == ' ' {
            grid[row][col] = '-';
        }
    }
}

fn x_range(points: &[(f64, f64)], line: Option<&[(f64, f64)]>) -> Option<(f64, f64)> {
    minmax(points.iter().map(|p| p.0).chain(
        line.into_iter().flatten().map(|p| p.0),
    ))
}

fn y_range(points: &[(f64, f64)], line: Option<&[(f64, f64)]>) -> Option<(f64, f64)> {
    minmax(points.iter().map(|p| p.1).chain(
        line.into_iter().flatten().map(|p| p.1),
    ))
}

fn minmax(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        min = min.min(v);
        max = max.max(v);
    }
    if min.is_finite() && max.is_finite() && max > min {
        Some((min, max))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    ((u * (width - 1) as f64).round() as usize).min(width - 1)
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    let row = ((1.0 - u) * (height - 1) as f64).round() as usize;
    row.min(height - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scatter_is_deterministic_and_sized() {
        let points = vec![(0.0, 1.0), (1.0, 2.0), (2.0, 4.0)];
        let a = render_scatter(&points, None, 40, 10, "x", "y");
        let b = render_scatter(&points, None, 40, 10, "x", "y");
        assert_eq!(a, b);
        // Header plus one line per grid row.
        assert_eq!(a.lines().count(), 11);
        assert!(a.contains('o'));
    }

    #[test]
    fn line_points_take_precedence_for_range() {
        let line = vec![(0.0, 0.0), (10.0, 10.0)];
        let plot = render_scatter(&[], Some(&line), 30, 8, "x", "y");
        assert!(plot.contains('-'));
        assert!(plot.contains("x=[0.000, 10.000]"));
    }

    #[test]
    fn degenerate_input_does_not_panic() {
        assert_eq!(render_scatter(&[], None, 40, 10, "x", "y"), "(nothing to plot)\n");
        // A single point has no span.
        let one = vec![(1.0, 1.0)];
        assert!(render_scatter(&one, None, 40, 10, "x", "y").contains("nothing"));
    }

    #[test]
    fn stems_mark_axis_band_and_bars() {
        let plot = render_stems(&[0.9, 0.4, 0.05, -0.3], 0.2, 9, "acf");
        assert!(plot.contains('#'));
        assert!(plot.contains('.'));
        assert!(plot.contains('-'));
        assert_eq!(plot, render_stems(&[0.9, 0.4, 0.05, -0.3], 0.2, 9, "acf"));
    }
}
