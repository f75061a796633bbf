//! Line-protocol point formatting.
//!
//! ```text
//! measurement,tag1=val1,tag2=val2 value=<f64> timestamp_ns
//! ```

/// Formats one sample as a line-protocol point. Tags are emitted sorted
/// by key for a canonical form; the timestamp is converted from
/// milliseconds to nanoseconds.
pub fn format_point(metric: &str, labels: &[(&str, &str)], value: f64, timestamp_ms: i64) -> String {
    let mut line = escape_measurement(metric);

    let mut sorted: Vec<&(&str, &str)> = labels.iter().collect();
    sorted.sort_by_key(|(key, _)| *key);

    for (key, tag_value) in sorted {
        line.push(',');
        line.push_str(&escape_tag(key));
        line.push('=');
        line.push_str(&escape_tag(tag_value));
    }

    line.push_str(" value=");
    line.push_str(&value.to_string());
    line.push(' ');
    line.push_str(&timestamp_ms.saturating_mul(1_000_000).to_string());

    line
}

/// Spaces and commas must be escaped in measurement names.
fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

/// Tag keys and values additionally escape equals signs.
fn escape_tag(s: &str) -> String {
    s.replace(',', "\\,").replace('=', "\\=").replace(' ', "\\ ")
}
