use std::collections::BTreeSet;
use serde_json::Value;
use crate::state::plot_data::{ColorScheme, PointColors, UNIFORM_COLOR};

/// Base categorical palette (matplotlib "tab10").
pub const BASE_PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd",
    "#8c564b", "#e377c2", "#7f7f7f", "#bcbd22", "#17becf",
];

/// Label shown for points whose colour field is unset.
pub const MISSING_LABEL: &str = "None";

/// `n` distinct hex colours: the base palette when it is large enough,
/// otherwise evenly spaced hues at fixed saturation/value.
pub fn generate_palette(n: usize) -> Vec<String> {
    if n <= BASE_PALETTE.len() {
        return BASE_PALETTE[..n].iter().map(|s| s.to_string()).collect();
    }
    (0..n)
        .map(|i| {
            let [r, g, b] = hsv_to_rgb(i as f64 / n as f64, 0.7, 0.9);
            format!("#{:02x}{:02x}{:02x}", (r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8)
        })
        .collect()
}

fn hsv_to_rgb(h: f64, s: f64, v: f64) -> [f64; 3] {
    if s == 0.0 {
        return [v, v, v];
    }
    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match (sector as i64).rem_euclid(6) {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

/// Labels, colours and scheme for a set of per-point field values.
///
/// All-numeric values (ignoring missing ones) produce a continuous plot with
/// missing values mapped to 0; anything else is categorical over the sorted
/// unique labels.
pub fn colorize(values: &[Option<&Value>]) -> (Vec<String>, PointColors, ColorScheme) {
    let labels: Vec<String> = values
        .iter()
        .map(|v| match v {
            Some(Value::String(s)) => s.clone(),
            Some(v) => v.to_string(),
            None => MISSING_LABEL.to_string(),
        })
        .collect();

    let is_numeric = values.iter().flatten().all(|v| v.is_number());
    if is_numeric {
        let numeric = values
            .iter()
            .map(|v| v.and_then(Value::as_f64).unwrap_or(0.0))
            .collect();
        return (labels, PointColors::Numeric(numeric), ColorScheme::Continuous);
    }

    let unique: Vec<&str> = labels
        .iter()
        .map(String::as_str)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let palette = generate_palette(unique.len());
    let colors = labels
        .iter()
        .map(|label| {
            unique
                .binary_search(&label.as_str())
                .map(|i| palette[i].clone())
                .unwrap_or_else(|_| UNIFORM_COLOR.to_string())
        })
        .collect();
    (labels, PointColors::Named(colors), ColorScheme::Categorical)
}

/// Labels and colours for an uncoloured plot: short id prefixes.
pub fn uniform(sample_ids: &[String]) -> (Vec<String>, PointColors, ColorScheme) {
    let labels = sample_ids.iter().map(|id| id.chars().take(8).collect()).collect();
    let colors = vec![UNIFORM_COLOR.to_string(); sample_ids.len()];
    (labels, PointColors::Named(colors), ColorScheme::Uniform)
}

/// Parse `#rrggbb` / `#rrggbbaa`.
pub fn parse_hex(hex: &str) -> Option<[u8; 4]> {
    let h = hex.strip_prefix('#')?;
    let byte = |i: usize| u8::from_str_radix(h.get(i..i + 2)?, 16).ok();
    match h.len() {
        6 => Some([byte(0)?, byte(2)?, byte(4)?, 255]),
        8 => Some([byte(0)?, byte(2)?, byte(4)?, byte(6)?]),
        _ => None,
    }
}

const VIRIDIS: [[u8; 3]; 9] = [
    [68, 1, 84],
    [71, 44, 122],
    [59, 81, 139],
    [44, 113, 142],
    [33, 144, 141],
    [39, 173, 129],
    [92, 200, 99],
    [170, 220, 50],
    [253, 231, 37],
];

/// Sample the Viridis ramp at `t` in [0, 1].
pub fn viridis(t: f64) -> [u8; 3] {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let scaled = t * (VIRIDIS.len() - 1) as f64;
    let i = (scaled.floor() as usize).min(VIRIDIS.len() - 2);
    let f = scaled - i as f64;
    let a = VIRIDIS[i];
    let b = VIRIDIS[i + 1];
    let lerp = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * f).round() as u8;
    [lerp(a[0], b[0]), lerp(a[1], b[1]), lerp(a[2], b[2])]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn small_palettes_use_base_colors() {
        assert_eq!(generate_palette(2), vec!["#1f77b4", "#ff7f0e"]);
    }

    #[test]
    fn large_palettes_are_generated_from_hues() {
        let p = generate_palette(12);
        assert_eq!(p.len(), 12);
        // hue 0 at s=0.7, v=0.9
        assert_eq!(p[0], "#e54444");
        assert!(p.iter().all(|c| parse_hex(c).is_some()));
    }

    #[test]
    fn categorical_colors_follow_sorted_labels() {
        let (cat, dog) = (json!("cat"), json!("dog"));
        let (labels, colors, scheme) = colorize(&[Some(&dog), Some(&cat), None]);
        assert_eq!(scheme, ColorScheme::Categorical);
        assert_eq!(labels, vec!["dog", "cat", "None"]);
        // sorted unique: None, cat, dog
        assert_eq!(
            colors,
            PointColors::Named(vec!["#2ca02c".into(), "#ff7f0e".into(), "#1f77b4".into()])
        );
    }

    #[test]
    fn numeric_values_are_continuous_with_missing_as_zero() {
        let (a, b) = (json!(0.5), json!(2));
        let (labels, colors, scheme) = colorize(&[Some(&a), None, Some(&b)]);
        assert_eq!(scheme, ColorScheme::Continuous);
        assert_eq!(labels, vec!["0.5", "None", "2"]);
        assert_eq!(colors, PointColors::Numeric(vec![0.5, 0.0, 2.0]));
    }

    #[test]
    fn uniform_labels_are_id_prefixes() {
        let (labels, _, scheme) = uniform(&["0123456789abc".to_string()]);
        assert_eq!(labels, vec!["01234567"]);
        assert_eq!(scheme, ColorScheme::Uniform);
    }

    #[test]
    fn hex_parsing() {
        assert_eq!(parse_hex("#ff9800"), Some([255, 152, 0, 255]));
        assert_eq!(parse_hex("ff9800"), None);
        assert_eq!(parse_hex("#zz0000"), None);
    }

    #[test]
    fn viridis_endpoints() {
        assert_eq!(viridis(0.0), [68, 1, 84]);
        assert_eq!(viridis(1.0), [253, 231, 37]);
        assert_eq!(viridis(f64::NAN), [68, 1, 84]);
    }
}
