use std::collections::{BTreeSet, HashMap};

const SECONDS_PER_DAY: f64 = 24.0 * 60.0 * 60.0;

/// Read-only registry of the fields a search endpoint understands.
///
/// Aliases map user-facing names onto canonical backend names, multipliers
/// convert CLI-friendly units into backend units. Each endpoint gets its own
/// table, so several configurations can live side by side.
#[derive(Debug, Clone, Default)]
pub struct FieldTable {
    recognized: BTreeSet<String>,
    aliases: HashMap<String, String>,
    multipliers: HashMap<String, f64>,
}

impl FieldTable {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            recognized: fields.into_iter().map(Into::into).collect(),
            aliases: HashMap::new(),
            multipliers: HashMap::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), canonical.into());
        self
    }

    pub fn with_multiplier(mut self, field: impl Into<String>, factor: f64) -> Self {
        self.multipliers.insert(field.into(), factor);
        self
    }

    /// Canonical name for `name`. Aliases are resolved once, never chained.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn is_recognized(&self, name: &str) -> bool {
        self.recognized.contains(name)
    }

    pub fn multiplier(&self, name: &str) -> Option<f64> {
        self.multipliers.get(name).copied()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.recognized.iter().map(String::as_str)
    }

    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(a, c)| (a.as_str(), c.as_str()))
    }

    /// Field table for `search offers`.
    pub fn offers() -> Self {
        Self::new([
            "compute_cap",
            "cpu_cores",
            "cpu_cores_effective",
            "cpu_ram",
            "cuda_max_good",
            "direct_port_count",
            "disk_bw",
            "disk_space",
            "dlperf",
            "dlperf_per_dphtotal",
            "dph_total",
            "driver_version",
            "duration",
            "external",
            "flops_per_dphtotal",
            "gpu_display_active",
            "gpu_frac",
            "gpu_mem_bw",
            "gpu_name",
            "gpu_ram",
            "has_avx",
            "host_id",
            "id",
            "inet_down",
            "inet_down_cost",
            "inet_up",
            "inet_up_cost",
            "machine_id",
            "min_bid",
            "mobo_name",
            "num_gpus",
            "pci_gen",
            "pcie_bw",
            "reliability2",
            "rentable",
            "rented",
            "storage_cost",
            "total_flops",
            "verified",
        ])
        .with_alias("cuda_vers", "cuda_max_good")
        .with_alias("display_active", "gpu_display_active")
        .with_alias("reliability", "reliability2")
        .with_alias("dlperf_usd", "dlperf_per_dphtotal")
        .with_alias("dph", "dph_total")
        .with_alias("flops_usd", "flops_per_dphtotal")
        // GB -> MB
        .with_multiplier("cpu_ram", 1000.0)
        // days -> seconds
        .with_multiplier("duration", SECONDS_PER_DAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_resolution() {
        let table = FieldTable::offers();

        assert_eq!(table.resolve("dph"), "dph_total");
        assert_eq!(table.resolve("reliability"), "reliability2");
        assert_eq!(table.resolve("gpu_name"), "gpu_name");
        assert_eq!(table.resolve("not_a_field"), "not_a_field");
    }

    #[test]
    fn test_every_alias_targets_a_recognized_field() {
        let table = FieldTable::offers();
        for (alias, canonical) in table.aliases() {
            assert!(
                table.is_recognized(canonical),
                "alias {} points at unknown field {}",
                alias,
                canonical
            );
        }
    }

    #[test]
    fn test_multipliers() {
        let table = FieldTable::offers();

        assert_eq!(table.multiplier("cpu_ram"), Some(1000.0));
        assert_eq!(table.multiplier("duration"), Some(86400.0));
        assert_eq!(table.multiplier("num_gpus"), None);
    }

    #[test]
    fn test_independent_tables() {
        let benchmarks = FieldTable::new(["score", "gpu_name"]).with_alias("s", "score");
        let offers = FieldTable::offers();

        assert!(benchmarks.is_recognized("score"));
        assert!(!offers.is_recognized("score"));
        assert_eq!(benchmarks.resolve("dph"), "dph");
    }
}
