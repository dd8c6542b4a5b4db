use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use stepwise::{
    FederationGateway, GraphQLRequest, InMemorySchemaRegistry, SimpleQueryPlanner,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Plans a GraphQL operation against a federated supergraph and prints the
/// steps each backend service would receive.
#[derive(Debug, Parser)]
#[command(name = "stepwise", version, about)]
struct Args {
    /// Path to the supergraph config listing every subgraph.
    #[arg(short, long, default_value = "./schemas/supergraph.yaml")]
    config: PathBuf,

    /// Operation text to plan.
    #[arg(short, long, conflicts_with = "query_file", required_unless_present = "query_file")]
    query: Option<String>,

    /// File containing the operation text to plan.
    #[arg(long)]
    query_file: Option<PathBuf>,

    /// Name of the operation to plan when the document holds several.
    #[arg(long)]
    operation_name: Option<String>,

    /// Variable values as a JSON object.
    #[arg(long)]
    variables: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Log filter, e.g. `info` or `stepwise=debug`. Falls back to `RUST_LOG`.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let filter = match &args.log_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let query = match (&args.query, &args.query_file) {
        (Some(query), _) => query.clone(),
        (None, Some(path)) => fs::read_to_string(path)?,
        (None, None) => return Err("either --query or --query-file is required".into()),
    };

    let mut request = GraphQLRequest::new(query);
    request.operation_name = args.operation_name.clone();
    request.variables = args
        .variables
        .as_deref()
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()?;

    let gateway = FederationGateway::new(
        Box::new(InMemorySchemaRegistry::new()),
        Box::new(SimpleQueryPlanner::new()),
    );
    gateway.load_schemas(&args.config).await?;

    let plans = gateway.plan_request(&request).await?;
    info!(plans = plans.len(), "planned request");

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plans)?),
        OutputFormat::Text => {
            for plan in &plans {
                println!("{}", plan);
                for step in &plan.steps {
                    if let Some(document) = plan.step_document(step.id) {
                        println!("# step {} -> {}\n{}", step.id, step.url, document);
                    }
                }
            }
        }
    }

    Ok(())
}
