//! Console output sink and line formatting

use crate::analytics::CustomProperties;

pub const METRIC_STYLE: &str = "color: #ff6d00;font-size:11px;";

/// Console-style output (`console.log` / `console.warn`)
pub trait Console {
    /// Styled line; `text` carries a `%c` directive consumed by `style`
    fn log(&self, text: &str, style: &str);

    fn warn(&self, prefix: &str, message: &str);

    fn debug(&self, label: &str, value: &str);
}

/// `%c <prefix> <name> <duration> ms`, with custom properties appended
pub fn format_metric_line(
    prefix: &str,
    metric_name: &str,
    duration: f64,
    custom_properties: Option<&CustomProperties>,
) -> String {
    let mut text = format!("%c {} {} {:.2} ms", prefix, metric_name, duration);
    if let Some(properties) = custom_properties.filter(|p| !p.is_empty()) {
        // Map<String, Value> always serializes
        if let Ok(json) = serde_json::to_string(properties) {
            text.push_str("\nCustom Properties: ");
            text.push_str(&json);
        }
    }
    text
}

/// Round to two decimals, the precision every duration is reported at
pub fn round_two_decimals(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_plain_line() {
        let line = format_metric_line("Perfume.js:", "fetch", 37.456, None);
        assert_eq!(line, "%c Perfume.js: fetch 37.46 ms");
    }

    #[test]
    fn test_format_pads_two_decimals() {
        let line = format_metric_line("Perfume.js:", "First Contentful Paint", 812.4, None);
        assert!(line.ends_with("812.40 ms"));
    }

    #[test]
    fn test_format_with_properties() {
        let mut props = CustomProperties::new();
        props.insert("route".to_string(), json!("/home"));
        let line = format_metric_line("p:", "fetch", 1.0, Some(&props));
        assert_eq!(line, "%c p: fetch 1.00 ms\nCustom Properties: {\"route\":\"/home\"}");
    }

    #[test]
    fn test_format_skips_empty_properties() {
        let props = CustomProperties::new();
        let line = format_metric_line("p:", "fetch", 1.0, Some(&props));
        assert!(!line.contains("Custom Properties"));
    }

    #[test]
    fn test_round_two_decimals() {
        assert_eq!(round_two_decimals(37.456), 37.46);
        assert_eq!(round_two_decimals(812.4), 812.4);
        assert_eq!(round_two_decimals(0.004), 0.0);
    }
}
