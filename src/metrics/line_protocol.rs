//! InfluxDB line protocol rendering for the shim's stdout output.

use std::fmt::Write as _;

use super::{FieldValue, Measurement};

/// Render one measurement as a line (without trailing newline).
///
/// Returns `None` for a measurement with no fields, which line protocol
/// cannot express. Tags with empty values are dropped for the same reason.
pub fn encode(m: &Measurement) -> Option<String> {
    if m.fields.is_empty() {
        return None;
    }

    let mut line = escape(&m.name, &[',', ' ']);

    for (key, value) in m.tags.iter().filter(|(_, v)| !v.is_empty()) {
        let _ = write!(
            line,
            ",{}={}",
            escape(key, &[',', '=', ' ']),
            escape(value, &[',', '=', ' '])
        );
    }

    let mut sep = ' ';
    for (key, value) in &m.fields {
        line.push(sep);
        sep = ',';
        line.push_str(&escape(key, &[',', '=', ' ']));
        line.push('=');
        match value {
            FieldValue::Int(v) => {
                let _ = write!(line, "{v}i");
            }
            FieldValue::Bool(v) => {
                let _ = write!(line, "{v}");
            }
            FieldValue::Str(v) => {
                let _ = write!(line, "\"{}\"", escape(v, &['"', '\\']));
            }
        }
    }

    if let Some(ns) = m.time.timestamp_nanos_opt() {
        let _ = write!(line, " {ns}");
    }

    Some(line)
}

fn escape(raw: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Tags;
    use chrono::{TimeZone, Utc};

    fn sample() -> Measurement {
        let mut tags = Tags::new();
        tags.insert("source".into(), "web 1".into());
        tags.insert("port".into(), "80".into());
        tags.insert("sid".into(), String::new());
        let mut m = Measurement::new("angie_api_http_upstream_peers", tags);
        m.time = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        m.set("backup", true)
            .set("weight", 5i64)
            .set("state", "up \"now\"");
        m
    }

    #[test]
    fn renders_tags_fields_and_timestamp() {
        let line = encode(&sample()).unwrap();
        assert_eq!(
            line,
            "angie_api_http_upstream_peers,port=80,source=web\\ 1 \
             backup=true,state=\"up \\\"now\\\"\",weight=5i 1700000000000000000"
        );
    }

    #[test]
    fn fieldless_measurement_is_skipped() {
        let m = Measurement::new("empty", Tags::new());
        assert!(encode(&m).is_none());
    }
}
