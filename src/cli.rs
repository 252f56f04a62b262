use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::config::DEFAULT_POOL_LABEL;

#[derive(Parser, Debug)]
#[command(name = "nodecycle")]
#[command(about = "Rolling replacement of managed Kubernetes node-pool members")]
#[command(version)]
pub struct Args {
    /// Kubelet version nodes are being rolled to (e.g. "v1.31.4")
    #[arg(long, env = "CYCLE_TARGET_VERSION", value_name = "VERSION")]
    pub target_version: String,

    /// Managed cluster identifier used by the node-pool API
    #[arg(long, env = "CYCLE_CLUSTER_ID", value_name = "ID")]
    pub cluster_id: Option<String>,

    /// Base URL of the managed node-pool API
    #[arg(long, env = "POOL_API_ENDPOINT", value_name = "URL")]
    pub pool_api_endpoint: Option<String>,

    /// Bearer token for the node-pool API
    #[arg(long, env = "POOL_API_TOKEN", hide_env_values = true, value_name = "TOKEN")]
    pub pool_api_token: Option<String>,

    /// Path to a kubeconfig file (default: standard discovery rules)
    #[arg(long, env = "KUBECONFIG", value_name = "FILE")]
    pub kubeconfig: Option<PathBuf>,

    /// Node label carrying the owning pool id
    #[arg(long, default_value = DEFAULT_POOL_LABEL, value_name = "KEY")]
    pub pool_label: String,

    /// Label selector for nodes to cycle even when already on the target
    /// version (comma-separated key=value pairs)
    #[arg(long, value_name = "SELECTOR")]
    pub cycle_selector: Option<String>,

    /// Label selector for pods that must be Running before the run moves to
    /// the next node (default: every pod cluster-wide)
    #[arg(long, value_name = "SELECTOR")]
    pub workload_selector: Option<String>,

    /// Seconds between node, pool-membership and drain-pass checks
    #[arg(long, default_value = "15", value_name = "SECS")]
    pub node_poll_seconds: u64,

    /// Seconds between pod readiness checks
    #[arg(long, default_value = "5", value_name = "SECS")]
    pub pod_poll_seconds: u64,

    /// Give up on any single wait after this many seconds (waits forever
    /// when unset)
    #[arg(long, value_name = "SECS")]
    pub max_wait_seconds: Option<u64>,

    /// Dry-run mode: print the cycling plan without touching anything
    #[arg(long)]
    pub dry_run: bool,

    /// Path to a .env file for loading API credentials
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

// ============================================================================
// Pure display logic (no I/O - returns formatted strings)
// ============================================================================

use crate::cluster::orchestrator::CycleReport;
use crate::cluster::types::NodeRecord;
use crate::config::{CycleConfig, Eligibility};

/// Format the dry-run plan for a node snapshot.
/// Pure function - returns a formatted string.
pub fn format_dry_run(nodes: &[NodeRecord], config: &CycleConfig) -> String {
    let mut output = String::new();

    output.push_str("nodecycle - Dry Run Mode\n\n");
    output.push_str(&format!("Target version: {}\n", config.target_version));
    if let Some(ref selector) = config.override_selector {
        output.push_str(&format!("Cycle selector: {}\n", selector));
    }
    output.push('\n');

    output.push_str(&format!("Nodes ({}):\n", nodes.len()));
    let mut to_cycle = 0;
    for node in nodes {
        let pool = node
            .labels
            .get(&config.pool_label)
            .map(String::as_str)
            .unwrap_or("-");
        let plan = match config.node_eligibility(node) {
            Eligibility::VersionBehind => {
                to_cycle += 1;
                "cycle (version behind)"
            }
            Eligibility::OverrideMatch => {
                to_cycle += 1;
                "cycle (matches cycle selector)"
            }
            Eligibility::AlreadyCurrent => "keep (already current)",
        };
        output.push_str(&format!(
            "  {:<24} {:<12} pool {:<12} -> {}",
            node.name, node.version, pool, plan
        ));
        if node.unschedulable {
            output.push_str(" [cordoned]");
        }
        if !node.taints.is_empty() {
            output.push_str(&format!(" [{} taint(s)]", node.taints.len()));
        }
        output.push('\n');
    }

    output.push_str(&format!(
        "\n{} of {} nodes would be cycled. Remove --dry-run to execute.\n",
        to_cycle,
        nodes.len()
    ));

    output
}

/// Format the end-of-run summary.
/// Pure function - returns a formatted string.
pub fn format_report(report: &CycleReport) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "Cycle complete: {} node(s) visited\n",
        report.visited
    ));
    output.push_str(&format!("  cycled:        {}\n", report.cycled));
    output.push_str(&format!(
        "  skipped:       {} (already current)\n",
        report.skipped
    ));
    output.push_str(&format!(
        "  left cordoned: {} (running jobs)\n",
        report.left_cordoned
    ));
    output.push_str(&format!("  failed:        {}\n", report.failed));
    output
}
