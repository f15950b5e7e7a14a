use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use searchmesh::admin;
use searchmesh::cluster::ClusterContext;
use searchmesh::config::ClusterConfig;
use searchmesh::job::MasterCollectionAddIndexingJob;
use searchmesh::transport::LoopbackHub;

#[derive(Parser)]
#[command(
    name = "searchmesh",
    version,
    about = "Cluster coordination for a distributed search engine",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the configured cluster nodes
    Nodes {
        /// Cluster configuration file
        #[arg(short, long, default_value = "config/cluster.toml")]
        config: PathBuf,
    },

    /// Boot every configured node in this process and run an indexing job
    Simulate {
        /// Cluster configuration file
        #[arg(short, long, default_value = "config/cluster.toml")]
        config: PathBuf,

        /// Collection to index; the first configured collection by default
        #[arg(long)]
        collection: Option<String>,

        /// Node the job is submitted from; the first non-master node by default
        #[arg(long)]
        from: Option<String>,
    },

    /// Boot the configured node and serve the admin endpoints until Ctrl-C
    Serve {
        /// Cluster configuration file
        #[arg(short, long, default_value = "config/cluster.toml")]
        config: PathBuf,

        /// Admin bind address, overriding the configured one
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.command {
        Commands::Nodes { config }
        | Commands::Simulate { config, .. }
        | Commands::Serve { config, .. } => config.clone(),
    };
    let config = load_config(&config_path)?;

    let log_format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&log_format, &config.logging.level, cli.verbose)?;

    tracing::info!(config = %config_path.display(), "searchmesh starting");

    match cli.command {
        Commands::Nodes { .. } => nodes(&config),
        Commands::Simulate {
            collection, from, ..
        } => simulate(&config, collection, from).await?,
        Commands::Serve { bind, .. } => serve(&config, bind).await?,
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<ClusterConfig> {
    let mut config = ClusterConfig::from_file(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("searchmesh=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("searchmesh={level},warn")))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()?;
        }
    }

    Ok(())
}

fn nodes(config: &ClusterConfig) {
    println!("Configured nodes:");
    for node in &config.nodes {
        let mut roles = Vec::new();
        if node.id == config.node.my_node_id {
            roles.push("self");
        }
        if node.id == config.node.master_node_id {
            roles.push("master");
        }
        if !node.enabled {
            roles.push("disabled");
        }

        println!(
            "  {:<12} {:<16} {}:{} {}",
            node.id,
            node.name,
            node.address,
            node.port,
            roles.join(",")
        );
    }

    if !config.collections.is_empty() {
        println!("Collections:");
        for collection in &config.collections {
            let shards: Vec<_> = collection.shards.iter().map(|s| s.id.as_str()).collect();
            println!(
                "  {:<12} index={} shards=[{}]",
                collection.id,
                collection.index_node,
                shards.join(", ")
            );
        }
    }
}

async fn simulate(
    config: &ClusterConfig,
    collection: Option<String>,
    from: Option<String>,
) -> Result<()> {
    let collection_id = match collection.or_else(|| config.collections.first().map(|c| c.id.clone())) {
        Some(id) => id,
        None => bail!("no collection configured to index"),
    };

    let hub = Arc::new(LoopbackHub::new());
    let mut contexts: Vec<Arc<ClusterContext>> = Vec::new();

    // Earlier nodes see later peers as unreachable until they boot
    for node in config.nodes.iter().filter(|n| n.enabled) {
        let context = config
            .for_node(&node.id)
            .context_builder(Arc::clone(&hub))?
            .start()
            .await
            .with_context(|| format!("node [{}] failed to start", node.id))?;
        contexts.push(context);
    }

    let submitter = match &from {
        Some(id) => contexts.iter().find(|c| c.environment.my_node_id == *id),
        None => contexts
            .iter()
            .find(|c| c.environment.my_node_id != c.environment.master_node_id)
            .or_else(|| contexts.first()),
    };
    let Some(submitter) = submitter else {
        bail!("no running node to submit from");
    };

    println!(
        "Submitting add-indexing of [{collection_id}] from node [{}]",
        submitter.environment.my_node_id
    );

    let job = Arc::new(MasterCollectionAddIndexingJob::new(collection_id.clone()));
    match submitter.registry.submit(job).await {
        Some(result) => match result.take_timeout(submitter.request_timeout).await? {
            Ok(value) => println!("  result: {value:?}"),
            Err(failure) => println!("  failed: {failure}"),
        },
        None => println!("  dispatch failed"),
    }

    for context in &contexts {
        for entry in context.process_log.for_collection(&collection_id).await {
            println!("  [{}] {entry:?}", context.environment.my_node_id);
        }
    }

    for context in contexts.iter().rev() {
        context.shutdown().await?;
    }
    Ok(())
}

async fn serve(config: &ClusterConfig, bind: Option<SocketAddr>) -> Result<()> {
    let addr = match bind {
        Some(addr) => addr,
        None if !config.admin.enabled => {
            bail!("admin server is disabled; set admin.enabled or pass --bind")
        }
        None => config
            .admin
            .bind_address
            .parse()
            .with_context(|| format!("invalid admin bind address {}", config.admin.bind_address))?,
    };

    let context = config
        .context_builder(Arc::new(LoopbackHub::new()))?
        .start()
        .await?;

    admin::serve(addr, Arc::clone(&context), shutdown_signal()).await?;

    context.shutdown().await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
    }
    tracing::info!("Shutdown signal received");
}
