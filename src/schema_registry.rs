use async_trait::async_trait;
use graphql_parser::parse_schema;
use graphql_parser::schema::{Definition, TypeDefinition, TypeExtension};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::GatewayError;
use crate::{FederatedSchema, FieldLocationRegistry, ServiceConfig, ServiceMap, TypeSystem};

#[async_trait]
pub trait SchemaRegistry {
    async fn register_service(&mut self, service: ServiceConfig) -> Result<(), GatewayError>;
    async fn get_schema(&self) -> Result<Arc<FederatedSchema>, GatewayError>;
}

/// Keeps service configs in memory and composes them on demand.
///
/// The composed schema is cached as a shared, immutable snapshot. Registering a
/// service drops the cache; the next `get_schema` installs a new snapshot while
/// callers holding the old one keep planning against it.
pub struct InMemorySchemaRegistry {
    services: Arc<RwLock<ServiceMap>>,
    federated_schema: Arc<RwLock<Option<Arc<FederatedSchema>>>>,
}

impl Default for InMemorySchemaRegistry {
    fn default() -> Self {
        InMemorySchemaRegistry::new()
    }
}

impl InMemorySchemaRegistry {
    pub fn new() -> Self {
        InMemorySchemaRegistry {
            services: Arc::new(RwLock::new(ServiceMap::new())),
            federated_schema: Arc::new(RwLock::new(None)),
        }
    }

    fn build_federated_schema(services: &ServiceMap) -> Result<FederatedSchema, GatewayError> {
        if services.is_empty() {
            return Err(GatewayError::NoServices);
        }

        let mut types = TypeSystem::default();
        let mut locations = FieldLocationRegistry::new();

        for (service_name, service_config) in services {
            let schema_document = parse_schema::<String>(&service_config.schema).map_err(|e| {
                GatewayError::ServiceSchema {
                    service: service_name.clone(),
                    message: e.to_string(),
                }
            })?;

            for definition in &schema_document.definitions {
                let (type_name, fields) = match definition {
                    Definition::TypeDefinition(TypeDefinition::Object(obj)) => {
                        (&obj.name, &obj.fields)
                    }
                    Definition::TypeDefinition(TypeDefinition::Interface(iface)) => {
                        (&iface.name, &iface.fields)
                    }
                    Definition::TypeExtension(TypeExtension::Object(obj)) => {
                        (&obj.name, &obj.fields)
                    }
                    Definition::TypeExtension(TypeExtension::Interface(iface)) => {
                        (&iface.name, &iface.fields)
                    }
                    _ => continue,
                };
                for field in fields {
                    locations.register_url(
                        type_name.as_str(),
                        field.name.as_str(),
                        service_config.url.as_str(),
                    );
                }
            }

            types.merge_document(&schema_document);
            debug!(service = %service_name, "composed service schema");
        }

        info!(services = services.len(), "built federated schema");
        Ok(FederatedSchema {
            services: services.clone(),
            types,
            locations,
        })
    }
}

#[async_trait]
impl SchemaRegistry for InMemorySchemaRegistry {
    async fn register_service(&mut self, service: ServiceConfig) -> Result<(), GatewayError> {
        let mut services = self.services.write().await;
        info!(service = %service.name, "registering service");
        services.insert(service.name.clone(), service);

        let mut federated_schema = self.federated_schema.write().await;
        *federated_schema = None;

        Ok(())
    }

    async fn get_schema(&self) -> Result<Arc<FederatedSchema>, GatewayError> {
        let cached_schema = self.federated_schema.read().await;
        if let Some(schema) = &*cached_schema {
            return Ok(Arc::clone(schema));
        }
        drop(cached_schema);

        let services = self.services.read().await;
        let schema = Arc::new(Self::build_federated_schema(&services)?);

        let mut federated_schema = self.federated_schema.write().await;
        *federated_schema = Some(Arc::clone(&schema));

        Ok(schema)
    }
}
