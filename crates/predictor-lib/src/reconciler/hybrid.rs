//! Hybrid (performance + efficiency core) processor handling
//!
//! On hybrid parts the profiler splits each bottleneck breakdown into a
//! P-core and an E-core column. The model was trained on a single column per
//! metric, so the two halves are summed back into the plain metric name.

use super::normalization::coerce_numeric;
use super::table::RawMetricsTable;
use tracing::debug;

/// Brand-string fragments identifying hybrid processors (matched lowercase)
pub const HYBRID_SIGNATURES: &[&str] = &[
    "12th gen",
    "13th gen",
    "14th gen",
    "alder lake",
    "raptor lake",
    "meteor lake",
    "arrow lake",
    "lunar lake",
    "core ultra",
    "hybrid",
];

/// Column prefix of performance-core breakdowns
pub const P_CORE_PREFIX: &str = "Performance-core (P-core):";

/// Column prefix of efficiency-core breakdowns
pub const E_CORE_PREFIX: &str = "Efficient-core (E-core):";

/// Bottleneck breakdown metrics as (report name, canonical name)
pub const BREAKDOWN_METRICS: [(&str, &str); 4] = [
    ("Retiring(%)", "Retiring"),
    ("Front-End Bound(%)", "Front-End Bound"),
    ("Bad Speculation(%)", "Bad Speculation"),
    ("Back-End Bound(%)", "Back-End Bound"),
];

/// Best-effort check whether a CPU brand string names a hybrid processor
pub fn is_hybrid_cpu(brand: &str) -> bool {
    // "Intel(R) Core(TM) Ultra" must match "core ultra"
    let brand = brand.to_lowercase().replace("(tm)", "").replace("(r)", "");
    HYBRID_SIGNATURES.iter().any(|sig| brand.contains(sig))
}

/// Sum per-core-type breakdown columns into their plain metric columns
///
/// A missing half counts as zero. Metrics with no per-core column at all
/// are left untouched. Returns the metrics that were merged.
pub fn merge_core_types(table: &mut RawMetricsTable) -> Vec<&'static str> {
    let mut merged = Vec::new();

    for (report_name, canonical_name) in BREAKDOWN_METRICS {
        let p_core = find_core_column(table, P_CORE_PREFIX, report_name, canonical_name);
        let e_core = find_core_column(table, E_CORE_PREFIX, report_name, canonical_name);
        if p_core.is_none() && e_core.is_none() {
            continue;
        }

        let summed: Vec<String> = (0..table.row_count())
            .map(|row| {
                let p = p_core.as_ref().map_or(0.0, |v| coerce_numeric(&v[row]));
                let e = e_core.as_ref().map_or(0.0, |v| coerce_numeric(&v[row]));
                (p + e).to_string()
            })
            .collect();

        // Write under whichever naming the table already uses
        let target = if !table.has_column(report_name) && table.has_column(canonical_name) {
            canonical_name
        } else {
            report_name
        };
        table.set_column(target, summed);
        debug!(metric = target, "Merged P-core and E-core breakdown");
        merged.push(canonical_name);
    }

    merged
}

fn find_core_column(
    table: &RawMetricsTable,
    prefix: &str,
    report_name: &str,
    canonical_name: &str,
) -> Option<Vec<String>> {
    table
        .column(&format!("{prefix}{report_name}"))
        .or_else(|| table.column(&format!("{prefix}{canonical_name}")))
        .map(|values| values.to_vec())
}
