use std::process;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use nodecycle::cli::{format_dry_run, format_report, Args};
use nodecycle::client::{HttpNodepoolClient, KubeClusterApi};
use nodecycle::cluster::{ClusterApi, CycleOrchestrator};
use nodecycle::config::CycleConfig;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let filter = match args.verbose {
        0 => "warn,nodecycle=info",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    // Load .env file if specified
    if let Some(ref env_file) = args.env_file {
        if let Err(e) = dotenvy::from_path(env_file) {
            error!("Failed to load env file {}: {}", env_file.display(), e);
            process::exit(1);
        }
    }

    let config = match CycleConfig::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    let cluster = match KubeClusterApi::new(args.kubeconfig.as_deref()).await {
        Ok(cluster) => cluster,
        Err(e) => {
            error!("Failed to build the cluster client: {}", e);
            process::exit(1);
        }
    };

    // Dry-run mode: print the plan and exit
    if args.dry_run {
        let nodes = match cluster.list_nodes().await {
            Ok(nodes) => nodes,
            Err(e) => {
                error!("Failed to list nodes: {}", e);
                process::exit(1);
            }
        };
        println!("{}", format_dry_run(&nodes, &config));
        return;
    }

    // The pool API credentials may come from the .env file loaded above.
    let token = args
        .pool_api_token
        .clone()
        .or_else(|| std::env::var("POOL_API_TOKEN").ok());
    let (Some(cluster_id), Some(endpoint), Some(token)) =
        (args.cluster_id.clone(), args.pool_api_endpoint.clone(), token)
    else {
        error!("--cluster-id, --pool-api-endpoint and --pool-api-token are required to cycle nodes");
        process::exit(1);
    };

    let pool = HttpNodepoolClient::new(endpoint, token, cluster_id);

    info!(
        "Cycling nodes toward version {} (pool label {})",
        config.target_version, config.pool_label
    );

    let orchestrator = CycleOrchestrator::new(&cluster, &pool, &config);
    match orchestrator.run().await {
        Ok(report) => {
            print!("{}", format_report(&report));
            if report.failed > 0 {
                process::exit(1);
            }
        }
        Err(e) => {
            error!("Cycling run failed: {}", e);
            process::exit(1);
        }
    }
}
