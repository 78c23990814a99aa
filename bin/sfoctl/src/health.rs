//! ---
//! sfo_section: "05-networking-external-interfaces"
//! sfo_subsection: "binary"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Control CLI for operators inspecting smart failover."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Args;
use sfo_common::{AppConfig, ResourceKind};
use sfo_core::{AggregateReport, FailoverRoutes, HealthAggregator, HealthRegistry};
use sfo_probes::{register_directory, ResourceDirectory};
use tokio::runtime::Runtime;

#[derive(Debug, Args)]
pub struct HealthArgs {
    /// Only check one resource kind (database, cache, queue, mail, storage).
    #[arg(long, value_name = "KIND")]
    service: Option<ResourceKind>,

    /// Show every resource with its response time and last error.
    #[arg(long)]
    detailed: bool,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

/// Probe and print; the exit code mirrors the overall status.
pub fn run(config_path: Option<&PathBuf>, args: HealthArgs) -> Result<ExitCode> {
    let config = crate::load_config(config_path)?;
    let aggregator = build_aggregator(&config)?;
    let kinds = match args.service {
        Some(kind) => {
            if !aggregator.has_probe(kind) {
                bail!("no resources configured for {}", kind);
            }
            vec![kind]
        }
        None => config.health_services(),
    };

    let runtime = Runtime::new()?;
    let report = runtime.block_on(aggregator.check_all(&kinds));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render(&report, args.detailed));
    }
    Ok(ExitCode::from(report.overall_status.exit_code() as u8))
}

fn build_aggregator(config: &AppConfig) -> Result<HealthAggregator> {
    let directory = Arc::new(ResourceDirectory::from_config(config));
    let routes = FailoverRoutes::from_config(config)?;
    let mut aggregator = HealthAggregator::new(
        Arc::new(HealthRegistry::new(config.health_check.cooldown)),
        config.health_check.timeout,
    );
    register_directory(&mut aggregator, &directory);
    for set in routes.sets() {
        aggregator.register_set(set);
    }
    Ok(aggregator)
}

fn render(report: &AggregateReport, detailed: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Smart failover health: {}",
        report.overall_status.as_str().to_uppercase()
    );
    let _ = writeln!(
        out,
        "Resources: {}/{} healthy",
        report.summary.healthy, report.summary.total
    );
    for (kind, results) in &report.per_resource {
        let healthy = results.iter().filter(|result| result.healthy).count();
        let _ = writeln!(out, "  {:<9} {}/{}", kind.as_str(), healthy, results.len());
        if !detailed {
            continue;
        }
        for result in results {
            let _ = write!(
                out,
                "    [{}] {:<20} {:>9.2}ms",
                if result.healthy { "ok" } else { "FAIL" },
                result.resource.name(),
                result.response_time_ms
            );
            if let Some(error) = &result.error {
                let _ = write!(out, "  {}", error);
            }
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use sfo_core::{ProbeResult, ResourceRef};
    use std::time::Duration;

    #[test]
    fn renders_summary_and_details() {
        let mysql = ResourceRef::new(ResourceKind::Database, "mysql").unwrap();
        let backup = ResourceRef::new(ResourceKind::Database, "backup").unwrap();
        let mut per_resource = IndexMap::new();
        per_resource.insert(
            ResourceKind::Database,
            vec![
                ProbeResult::healthy(mysql, Duration::from_millis(3)),
                ProbeResult::unhealthy(backup, Duration::from_millis(1), "connection refused"),
            ],
        );
        let report = AggregateReport::from_results(per_resource);

        let brief = render(&report, false);
        assert!(brief.starts_with("Smart failover health: DEGRADED\nResources: 1/2 healthy\n"));
        assert!(brief.contains("database  1/2"));
        assert!(!brief.contains("mysql"));

        let detailed = render(&report, true);
        assert!(detailed.contains("[ok] mysql"));
        assert!(detailed.contains("[FAIL] backup"));
        assert!(detailed.contains("connection refused"));
    }

    #[test]
    fn registers_probes_only_for_configured_kinds() {
        let config: AppConfig = "[resources.cache.redis]\nendpoint = \"127.0.0.1:1\"\n"
            .parse()
            .unwrap();
        let aggregator = build_aggregator(&config).unwrap();
        assert!(aggregator.has_probe(ResourceKind::Cache));
        assert!(!aggregator.has_probe(ResourceKind::Queue));
        assert_eq!(aggregator.registered(ResourceKind::Cache).len(), 1);
    }
}
