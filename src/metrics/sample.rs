use chrono::{DateTime, Utc};
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Integer(i64),
    String(String),
}

/// One measurement derived from a log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSample {
    pub series: String,
    pub fields: Vec<(String, FieldValue)>,
    pub timestamp: DateTime<Utc>,
}

impl MetricSample {
    pub fn new(series: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            series: series.into(),
            fields: Vec::new(),
            timestamp,
        }
    }

    pub fn with_int(mut self, name: impl Into<String>, value: i64) -> Self {
        self.fields.push((name.into(), FieldValue::Integer(value)));
        self
    }

    pub fn with_str(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields
            .push((name.into(), FieldValue::String(value.into())));
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Render as a single newline-terminated line protocol record:
    /// `series,host=<host> field=value[,field=value...] <unix_nanoseconds>`
    pub fn to_line_protocol(&self, host: &str) -> String {
        let mut line = String::with_capacity(64 + self.fields.len() * 16);
        line.push_str(&self.series);
        line.push_str(",host=");
        escape_tag_value(&mut line, host);
        line.push(' ');

        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            line.push_str(name);
            line.push('=');
            match value {
                FieldValue::Integer(n) => {
                    let _ = write!(line, "{}i", n);
                }
                FieldValue::String(s) => {
                    line.push('"');
                    escape_string_field(&mut line, s);
                    line.push('"');
                }
            }
        }

        // Microsecond precision padded out to nanoseconds
        let _ = writeln!(
            line,
            " {}{:06}000",
            self.timestamp.timestamp(),
            self.timestamp.timestamp_subsec_micros()
        );
        line
    }
}

fn escape_tag_value(out: &mut String, value: &str) {
    for c in value.chars() {
        if matches!(c, ',' | ' ' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
}

fn escape_string_field(out: &mut String, value: &str) {
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 6, 1, 10, 15, 2).unwrap() + chrono::Duration::milliseconds(42)
    }

    #[test]
    fn test_integer_fields() {
        let sample = MetricSample::new("vive_wireless_temperature", ts())
            .with_int("m", 5)
            .with_int("r", 7);

        assert_eq!(
            sample.to_line_protocol("desk"),
            "vive_wireless_temperature,host=desk m=5i,r=7i 1591006502042000000\n"
        );
    }

    #[test]
    fn test_negative_integer_field() {
        let sample = MetricSample::new("vive_wireless_signal", ts())
            .with_int("peerSignalQuality", -1)
            .with_int("performanceQuality", 10);

        assert_eq!(
            sample.to_line_protocol("desk"),
            "vive_wireless_signal,host=desk peerSignalQuality=-1i,performanceQuality=10i 1591006502042000000\n"
        );
    }

    #[test]
    fn test_string_field_is_quoted_and_escaped() {
        let sample =
            MetricSample::new("vive_wireless_connection", ts()).with_str("status", r#"A"B\C"#);

        assert_eq!(
            sample.to_line_protocol("desk"),
            "vive_wireless_connection,host=desk status=\"A\\\"B\\\\C\" 1591006502042000000\n"
        );
    }

    #[test]
    fn test_host_tag_escaping() {
        let sample = MetricSample::new("s", ts()).with_int("v", 1);

        assert!(sample
            .to_line_protocol("my host,a=b")
            .starts_with("s,host=my\\ host\\,a\\=b v=1i "));
    }

    #[test]
    fn test_timestamp_zero_padding() {
        let timestamp = Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap()
            + chrono::Duration::microseconds(7);
        let sample = MetricSample::new("s", timestamp).with_int("v", 1);

        assert_eq!(
            sample.to_line_protocol("h"),
            "s,host=h v=1i 1590969600000007000\n"
        );
    }

    #[test]
    fn test_field_lookup() {
        let sample = MetricSample::new("s", ts()).with_int("a", 1).with_str("b", "x");

        assert_eq!(sample.field("a"), Some(&FieldValue::Integer(1)));
        assert_eq!(sample.field("b"), Some(&FieldValue::String("x".to_string())));
        assert_eq!(sample.field("c"), None);
    }
}
