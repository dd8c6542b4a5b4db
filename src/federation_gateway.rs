use indexmap::IndexMap;
use serde::Deserialize;
use std::{fs, path::Path, sync::Arc};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{
    GraphQLRequest, Plan, ServiceConfig, error::GatewayError, query_planner::QueryPlanner,
    schema_registry::SchemaRegistry,
};

#[derive(Debug, Deserialize)]
struct SupergraphConfig {
    subgraphs: IndexMap<String, SubgraphConfig>,
}

#[derive(Debug, Deserialize)]
struct SubgraphConfig {
    routing_url: String,
    schema: SchemaConfig,
}

#[derive(Debug, Deserialize)]
struct SchemaConfig {
    file: String,
}

pub struct FederationGateway {
    schema_registry: Arc<RwLock<Box<dyn SchemaRegistry + Send + Sync>>>,
    query_planner: Arc<Box<dyn QueryPlanner + Send + Sync>>,
}

impl FederationGateway {
    pub fn new(
        schema_registry: Box<dyn SchemaRegistry + Send + Sync>,
        query_planner: Box<dyn QueryPlanner + Send + Sync>,
    ) -> Self {
        FederationGateway {
            schema_registry: Arc::new(RwLock::new(schema_registry)),
            query_planner: Arc::new(query_planner),
        }
    }

    /// Plans a request against the schema snapshot current at call time.
    pub async fn plan_request(&self, request: &GraphQLRequest) -> Result<Vec<Plan>, GatewayError> {
        let schema_registry = self.schema_registry.read().await;
        let schema = schema_registry.get_schema().await?;
        drop(schema_registry);

        self.query_planner
            .plan_query(request, &schema)
            .inspect_err(|e| warn!(error = %e, "failed to plan request"))
            .map_err(GatewayError::from)
    }

    pub async fn register_service(&self, service: ServiceConfig) -> Result<(), GatewayError> {
        let mut schema_registry = self.schema_registry.write().await;
        schema_registry.register_service(service).await
    }

    /// Registers every subgraph listed in a `supergraph.yaml`, in file order.
    /// Schema files are resolved relative to the config file.
    pub async fn load_schemas(&self, config_path: &Path) -> Result<(), GatewayError> {
        let config_dir = config_path.parent().unwrap_or_else(|| Path::new(""));
        info!(config = %config_path.display(), "loading supergraph config");

        let config_contents = read_file(config_path)?;
        let config: SupergraphConfig = serde_yaml::from_str(&config_contents)?;

        for (name, subgraph_config) in config.subgraphs {
            let schema_content = read_file(&config_dir.join(&subgraph_config.schema.file))?;

            let service_config = ServiceConfig {
                name,
                url: subgraph_config.routing_url,
                schema: schema_content,
            };

            self.register_service(service_config).await?;
        }
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<String, GatewayError> {
    fs::read_to_string(path).map_err(|source| GatewayError::Io {
        path: path.to_path_buf(),
        source,
    })
}
