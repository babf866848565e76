//! Mapping from scan results to Prometheus metrics.

use std::io::Write;

use crate::scan::ScanResult;

/// Metric namespace.
pub const NAMESPACE: &str = "proktologe";

/// Build a fully-qualified metric name from its non-empty parts.
pub fn build_fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// Static description of an exposed metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDescriptor {
    /// Metric name without namespace.
    pub name: &'static str,
    /// HELP text.
    pub help: &'static str,
    /// Label names carried by every instance.
    pub labels: &'static [&'static str],
}

impl MetricDescriptor {
    /// Fully-qualified name.
    pub fn fq_name(&self) -> String {
        build_fq_name(NAMESPACE, "", self.name)
    }
}

/// `proktologe_up`: the exporter ran.
pub const UP: MetricDescriptor = MetricDescriptor {
    name: "up",
    help: "Could the proktologe server be reached",
    labels: &[],
};

/// `proktologe_open`: one instance per open port.
pub const OPEN: MetricDescriptor = MetricDescriptor {
    name: "open",
    help: "Open ports on external interface",
    labels: &["address", "port"],
};

/// All exposed families, in exposition order.
pub const DESCRIPTORS: [MetricDescriptor; 2] = [UP, OPEN];

/// One gauge value produced during a scrape.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Fully-qualified metric name.
    pub name: String,
    /// Label pairs, in descriptor order.
    pub labels: Vec<(String, String)>,
    /// Gauge value.
    pub value: f64,
}

impl Sample {
    /// Label value by name.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// The `up` sample. Always `1`.
pub fn up_sample() -> Sample {
    Sample {
        name: UP.fq_name(),
        labels: Vec::new(),
        value: 1.0,
    }
}

/// One `open` sample per port in the scan result.
pub fn open_samples(result: &ScanResult) -> Vec<Sample> {
    let name = OPEN.fq_name();
    result
        .open
        .iter()
        .map(|port| Sample {
            name: name.clone(),
            labels: vec![
                ("address".to_string(), result.address.clone()),
                ("port".to_string(), port.to_string()),
            ],
            value: 1.0,
        })
        .collect()
}

/// Render samples in Prometheus text exposition format.
///
/// Families with no samples are left out.
pub fn render(samples: &[Sample]) -> String {
    let mut output = Vec::with_capacity(samples.len() * 64);

    for descriptor in DESCRIPTORS {
        let name = descriptor.fq_name();
        let family: Vec<&Sample> = samples.iter().filter(|s| s.name == name).collect();
        if family.is_empty() {
            continue;
        }

        writeln!(output, "# HELP {} {}", name, escape_help(descriptor.help)).ok();
        writeln!(output, "# TYPE {} gauge", name).ok();

        for sample in family {
            writeln!(
                output,
                "{}{} {}",
                sample.name,
                format_labels(&sample.labels),
                format_value(sample.value)
            )
            .ok();
        }
    }

    String::from_utf8(output).unwrap_or_default()
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Escape HELP text (backslash and newline only).
fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Format a gauge value for Prometheus.
fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

/// Format labels for Prometheus exposition format.
fn format_labels(labels: &[(String, String)]) -> String {
    if labels.is_empty() {
        return String::new();
    }

    let parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect();

    format!("{{{}}}", parts.join(","))
}
