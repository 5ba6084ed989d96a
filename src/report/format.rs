//! Fixed-width formatting for regression tables and diagnostics.
//!
//! All output is plain `String` building so the report layer is trivially
//! testable without capturing stdout.

use crate::models::{CoefRow, HausmanTest, MoranTest, OrderSelection};

/// Conventional significance stars for a p-value.
pub fn stars(p_value: f64) -> &'static str {
    if p_value < 0.01 {
        "***"
    } else if p_value < 0.05 {
        "**"
    } else if p_value < 0.10 {
        "*"
    } else {
        ""
    }
}

/// Section header used between lesson stages.
pub fn section(title: &str) -> String {
    format!("\n=== {title} ===\n")
}

/// Format a coefficient table.
///
/// `stat_label` names the test-statistic column (`t` for least-squares fits,
/// `z` for maximum-likelihood fits).
pub fn format_coef_table(rows: &[CoefRow], stat_label: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<16} {:>12} {:>12} {:>8} {:>10}\n",
        "term", "estimate", "std.err", stat_label, "p-value"
    ));
    out.push_str(&format!(
        "{:-<16} {:-<12} {:-<12} {:-<8} {:-<10}\n",
        "", "", "", "", ""
    ));
    for row in rows {
        out.push_str(&format!(
            "{:<16} {:>12.4} {:>12.4} {:>8.3} {:>10} {}\n",
            truncate(&row.name, 16),
            row.estimate,
            row.std_err,
            row.stat,
            fmt_p(row.p_value),
            stars(row.p_value),
        ));
    }
    out.push_str("Signif.: *** p<0.01, ** p<0.05, * p<0.10\n");
    out
}

/// Format the ACF/PACF diagnostics side by side.
///
/// `ci` is the +/- band for an approximate 95% interval (`1.96 / sqrt(n)`);
/// lags outside it are flagged.
pub fn format_acf_pacf(acf: &[f64], pacf: &[f64], ci: f64) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:>4} {:>8} {:>8}   (95% band: +/-{ci:.3})\n",
        "lag", "acf", "pacf"
    ));
    // acf carries lag 0; pacf starts at lag 1.
    for (i, p) in pacf.iter().enumerate() {
        let lag = i + 1;
        let a = acf.get(lag).copied().unwrap_or(f64::NAN);
        let mark = if p.abs() > ci { " <" } else { "" };
        out.push_str(&format!("{lag:>4} {a:>8.3} {p:>8.3}{mark}\n"));
    }
    out
}

/// Format the BIC sweep, marking the chosen order.
pub fn format_order_selection(selection: &OrderSelection) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:>6} {:>12} {:>10}\n", "order", "BIC", "sigma2"));
    for c in &selection.candidates {
        let chosen = if c.order == selection.chosen { "*" } else { " " };
        out.push_str(&format!(
            "{chosen}{:>5} {:>12.3} {:>10.4}\n",
            c.order, c.bic, c.sigma2
        ));
    }
    out
}

/// One-line Moran's I summary.
pub fn format_moran(test: &MoranTest) -> String {
    format!(
        "Moran's I = {:.4} (E[I] = {:.4}, z = {:.3}, p = {}) on n = {}\n",
        test.i,
        test.expected,
        test.z,
        fmt_p(test.p_value),
        test.n
    )
}

/// One-line Hausman verdict.
pub fn format_hausman(test: &HausmanTest) -> String {
    let verdict = if test.p_value < 0.05 {
        "reject RE; read the fixed-effects column"
    } else {
        "RE not rejected"
    };
    format!(
        "Hausman chi2({}) = {:.3}, p = {} -> {verdict}\n",
        test.df,
        test.stat,
        fmt_p(test.p_value)
    )
}

fn fmt_p(p: f64) -> String {
    if p < 1e-4 {
        "<1e-4".to_string()
    } else {
        format!("{p:.4}")
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CoefRow;

    fn row(name: &str, p: f64) -> CoefRow {
        CoefRow {
            name: name.to_string(),
            estimate: 1.25,
            std_err: 0.5,
            stat: 2.5,
            p_value: p,
        }
    }

    #[test]
    fn stars_follow_thresholds() {
        assert_eq!(stars(0.001), "***");
        assert_eq!(stars(0.02), "**");
        assert_eq!(stars(0.07), "*");
        assert_eq!(stars(0.5), "");
    }

    #[test]
    fn coef_table_includes_terms_and_stars() {
        let table = format_coef_table(&[row("const", 0.002), row("income", 0.3)], "t");
        assert!(table.contains("const"));
        assert!(table.contains("income"));
        assert!(table.contains("***"));
        assert!(table.contains("1.2500"));
        assert!(table.contains(" t "), "stat column label:\n{table}");
    }

    #[test]
    fn tiny_p_values_print_as_a_floor() {
        let table = format_coef_table(&[row("x", 1e-9)], "z");
        assert!(table.contains("<1e-4"), "table:\n{table}");
    }

    #[test]
    fn acf_pacf_flags_lags_outside_the_band() {
        let table = format_acf_pacf(&[1.0, 0.6, 0.1], &[0.6, 0.02], 0.1);
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[1].ends_with('<'), "lag 1 flagged: {}", lines[1]);
        assert!(!lines[2].ends_with('<'), "lag 2 unflagged: {}", lines[2]);
    }

    #[test]
    fn long_term_names_are_truncated() {
        let table = format_coef_table(&[row("a_really_long_regressor_name", 0.5)], "t");
        assert!(table.contains("a_really_long_r."));
    }
}
