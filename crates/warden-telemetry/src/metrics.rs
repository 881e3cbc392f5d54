//! Metric names emitted by Warden.
//!
//! Warden records through the `metrics` facade and bundles no exporter;
//! install any recorder to collect them.

/// Counter of failed resolutions, labelled by `category`.
pub const RESOLUTION_FAILURES: &str = "warden_resolution_failures_total";

/// Counter of resource guards whose release failed.
pub const RELEASE_FAILURES: &str = "warden_resource_release_failures_total";

/// Registers descriptions for Warden's metrics with the installed recorder.
pub fn describe_metrics() {
    ::metrics::describe_counter!(
        RESOLUTION_FAILURES,
        ::metrics::Unit::Count,
        "Requests whose parameters failed to resolve, by error category"
    );
    ::metrics::describe_counter!(
        RELEASE_FAILURES,
        ::metrics::Unit::Count,
        "Resource guards whose release raised an error"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_prometheus_style() {
        for name in [RESOLUTION_FAILURES, RELEASE_FAILURES] {
            assert!(name.starts_with("warden_"));
            assert!(name.ends_with("_total"));
        }
    }

    #[test]
    fn test_describe_without_recorder() {
        describe_metrics();
    }
}
