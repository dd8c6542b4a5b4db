pub mod error;
pub mod federation_gateway;
pub mod field_locations;
pub mod operation;
pub mod plan;
pub mod query_planner;
pub mod schema_registry;
pub mod selection;
pub mod type_system;

pub use error::{GatewayError, PlanningError, PlanningResult};
pub use federation_gateway::FederationGateway;
pub use field_locations::FieldLocationRegistry;
pub use plan::{Field, OperationKind, Plan, Step, StepId};
pub use query_planner::{QueryPlanner, SimpleQueryPlanner};
pub use schema_registry::{InMemorySchemaRegistry, SchemaRegistry};
pub use type_system::TypeSystem;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Registered services by name, in registration order.
pub type ServiceMap = IndexMap<String, ServiceConfig>;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub url: String,
    pub schema: String,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLRequest {
    pub query: String,
    #[serde(default)]
    pub variables: Option<Value>,
    #[serde(default)]
    pub operation_name: Option<String>,
}

impl GraphQLRequest {
    pub fn new(query: impl Into<String>) -> Self {
        GraphQLRequest {
            query: query.into(),
            variables: None,
            operation_name: None,
        }
    }
}

/// The composition of every registered service: the merged type system and
/// the location of each field.
#[derive(Clone, Debug)]
pub struct FederatedSchema {
    pub services: ServiceMap,
    pub types: TypeSystem,
    pub locations: FieldLocationRegistry,
}
