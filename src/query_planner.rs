use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{PlanningError, PlanningResult};
use crate::field_locations::FieldLocationRegistry;
use crate::operation::{ExecutableDocument, Operation};
use crate::plan::{Field, OperationKind, Plan, Step, StepId};
use crate::selection::{NormalizedField, Normalizer, VariableValues};
use crate::type_system::{FieldDefinition, TYPENAME_FIELD, TypeSystem};
use crate::{FederatedSchema, GraphQLRequest};

pub trait QueryPlanner {
    fn plan_query(
        &self,
        request: &GraphQLRequest,
        schema: &FederatedSchema,
    ) -> PlanningResult<Vec<Plan>>;
}

/// Splits an operation into steps by walking its selection tree and routing
/// every field to the service that owns it.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimpleQueryPlanner;

impl SimpleQueryPlanner {
    pub fn new() -> Self {
        SimpleQueryPlanner
    }

    pub fn plan(
        &self,
        query: &str,
        types: &TypeSystem,
        locations: &FieldLocationRegistry,
    ) -> PlanningResult<Vec<Plan>> {
        self.plan_operation(query, None, &Map::new(), types, locations)
    }

    pub fn plan_operation(
        &self,
        query: &str,
        operation_name: Option<&str>,
        variables: &Map<String, Value>,
        types: &TypeSystem,
        locations: &FieldLocationRegistry,
    ) -> PlanningResult<Vec<Plan>> {
        let document = ExecutableDocument::parse(query)?;
        document.check_fragment_cycles()?;
        let operation = document.operation(operation_name)?;

        if operation.kind == OperationKind::Subscription {
            return Err(PlanningError::operation("Subscriptions are not supported."));
        }
        let root_type = types.root_type(operation.kind).ok_or_else(|| {
            PlanningError::operation(format!(
                "Schema is not configured to execute {} operations.",
                operation.kind
            ))
        })?;

        let variables = VariableValues::new(variables, &operation.variable_definitions);
        let normalizer = Normalizer::new(types, &document.fragments, &variables);
        let root_fields = normalizer.normalize(&operation.selection_set, root_type, &[])?;

        // Each mutation field must finish before the next one starts, so each
        // one gets a plan of its own.
        let units: Vec<Vec<NormalizedField>> = match operation.kind {
            OperationKind::Mutation => root_fields.into_iter().map(|field| vec![field]).collect(),
            _ => vec![root_fields],
        };

        let mut plans = Vec::new();
        for fields in units {
            let mut builder = PlanBuilder::new(types, locations, &normalizer);
            builder.plan_fields(None, &[], fields)?;
            plans.push(builder.finish(operation));
        }

        debug!(
            kind = %operation.kind,
            plans = plans.len(),
            steps = plans.iter().map(|plan| plan.steps.len()).sum::<usize>(),
            "planned operation"
        );
        Ok(plans)
    }
}

impl QueryPlanner for SimpleQueryPlanner {
    fn plan_query(
        &self,
        request: &GraphQLRequest,
        schema: &FederatedSchema,
    ) -> PlanningResult<Vec<Plan>> {
        let empty = Map::new();
        let variables = match &request.variables {
            Some(Value::Object(variables)) => variables,
            Some(Value::Null) | None => &empty,
            Some(_) => {
                return Err(PlanningError::operation("Variables must be a JSON object."));
            }
        };

        self.plan_operation(
            &request.query,
            request.operation_name.as_deref(),
            variables,
            &schema.types,
            &schema.locations,
        )
    }
}

/// Steps are grouped per parent step, insertion point, parent type and URL.
type StepKey = (Option<StepId>, Vec<String>, String, String);

/// State of one planning descent. Discarded once the plan is built.
struct PlanBuilder<'a> {
    types: &'a TypeSystem,
    locations: &'a FieldLocationRegistry,
    normalizer: &'a Normalizer<'a>,
    steps: Vec<Step>,
    step_index: HashMap<StepKey, StepId>,
}

impl<'a> PlanBuilder<'a> {
    fn new(
        types: &'a TypeSystem,
        locations: &'a FieldLocationRegistry,
        normalizer: &'a Normalizer<'a>,
    ) -> Self {
        PlanBuilder {
            types,
            locations,
            normalizer,
            steps: Vec::new(),
            step_index: HashMap::new(),
        }
    }

    /// Routes the fields selected at `path`. Fields that stay in `step` are
    /// returned; the rest are appended to child steps.
    fn plan_fields(
        &mut self,
        step: Option<StepId>,
        path: &[String],
        fields: Vec<NormalizedField<'a>>,
    ) -> PlanningResult<Vec<Field>> {
        let active_url = step
            .map(|id| self.steps[id.0].url.clone())
            .unwrap_or_default();
        let typename_url = match step {
            Some(_) => Some(active_url.clone()),
            None => self.root_typename_url(&fields),
        };

        let mut local = Vec::new();
        for field in fields {
            let url = self.route(&active_url, typename_url.as_deref(), &field)?;
            match step {
                Some(current) if url == active_url => {
                    local.push(self.plan_field(current, field, path)?);
                }
                _ => {
                    let child = self.find_or_create_step(step, path, field.parent_type, &url);
                    let mut planned = self.plan_field(child, field, path)?;
                    // The child step is already rooted at the narrowed type.
                    planned.type_condition = None;
                    self.steps[child.0].selection_set.push(planned);
                }
            }
        }
        Ok(local)
    }

    fn route(
        &self,
        active_url: &str,
        typename_url: Option<&str>,
        field: &NormalizedField<'a>,
    ) -> PlanningResult<String> {
        let name = field.selection.name.as_str();
        let url = if name == TYPENAME_FIELD {
            typename_url
        } else {
            self.locations.preferred_url(field.parent_type, name, active_url)
        };
        url.map(str::to_string)
            .ok_or_else(|| PlanningError::unresolved(field.parent_type, name))
    }

    /// A root `__typename` rides along with the first other root field, or
    /// goes to the first service resolving the root type when it stands alone.
    fn root_typename_url(&self, fields: &[NormalizedField<'a>]) -> Option<String> {
        fields
            .iter()
            .find(|field| field.selection.name != TYPENAME_FIELD)
            .and_then(|field| {
                self.locations.preferred_url(field.parent_type, &field.selection.name, "")
            })
            .or_else(|| {
                fields
                    .first()
                    .and_then(|field| self.locations.first_url_for_type(field.parent_type))
            })
            .map(str::to_string)
    }

    /// Builds the field sent by `step`, routing its subselection from there.
    fn plan_field(
        &mut self,
        step: StepId,
        field: NormalizedField<'a>,
        path: &[String],
    ) -> PlanningResult<Field> {
        let selection = field.selection;
        let output_type = field.definition.field_type.named_type();
        let composite = self
            .types
            .get(output_type)
            .is_some_and(|t| t.kind.is_composite());

        let selection_set = if composite {
            if selection.selection_set.is_empty() {
                return Err(PlanningError::operation(format!(
                    "Field \"{}\" of type \"{}\" must have a selection of subfields.",
                    selection.name, field.definition.field_type
                )));
            }
            let mut field_path = path.to_vec();
            field_path.push(selection.response_key().to_string());

            let nested = self.normalizer.normalize(
                &selection.selection_set,
                output_type,
                &field.fragment_path,
            )?;
            let mut local = self.plan_fields(Some(step), &field_path, nested)?;
            // Children narrowed to a possible type need the parent to say
            // which objects they apply to.
            let narrowed_children = self.steps.iter().any(|child| {
                child.parent == Some(step)
                    && child.insertion_point == field_path
                    && child.parent_type != output_type
            });
            let key = self.entity_key(step, output_type, &local, narrowed_children);
            local.extend(key);
            local
        } else {
            if !selection.selection_set.is_empty() {
                return Err(PlanningError::operation(format!(
                    "Field \"{}\" must not have a selection since type \"{}\" has no subfields.",
                    selection.name, field.definition.field_type
                )));
            }
            Vec::new()
        };

        Ok(Field {
            name: selection.name.clone(),
            alias: selection.alias.clone(),
            arguments: selection.arguments.clone(),
            definition: field.definition.clone(),
            type_condition: field.type_condition.map(str::to_string),
            selection_set,
        })
    }

    /// Fields a step adds so its children can be merged back: `id` (when the
    /// step's service resolves it) or `__typename` for an object whose
    /// requested fields all live elsewhere, and `__typename` whenever a child
    /// is narrowed to one of the object's possible types.
    fn entity_key(
        &self,
        step: StepId,
        type_name: &str,
        local: &[Field],
        narrowed_children: bool,
    ) -> Vec<Field> {
        let url = self.steps[step.0].url.as_str();
        let mut key = Vec::new();

        if local.is_empty() {
            let id = self
                .types
                .field(type_name, "id")
                .filter(|_| self.locations.urls_for(type_name, "id").contains(&url));
            key.extend(id.map(key_field));
        }

        let has_typename = local.iter().any(|field| {
            field.name == TYPENAME_FIELD && field.alias.is_none() && field.type_condition.is_none()
        });
        if !has_typename && (narrowed_children || (local.is_empty() && key.is_empty())) {
            key.extend(self.types.field(type_name, TYPENAME_FIELD).map(key_field));
        }
        key
    }

    fn find_or_create_step(
        &mut self,
        parent: Option<StepId>,
        path: &[String],
        parent_type: &str,
        url: &str,
    ) -> StepId {
        let key = (
            parent,
            path.to_vec(),
            parent_type.to_string(),
            url.to_string(),
        );
        if let Some(id) = self.step_index.get(&key) {
            return *id;
        }

        let id = StepId(self.steps.len());
        debug!(
            step = id.0,
            parent = ?parent.map(|p| p.0),
            parent_type,
            insertion_point = ?path,
            "creating step"
        );
        self.steps
            .push(Step::new(id, url, parent_type, path, parent));
        self.step_index.insert(key, id);
        id
    }

    fn finish(mut self, operation: &Operation) -> Plan {
        for step in &mut self.steps {
            step.collect_variable_usages();
        }
        Plan {
            kind: operation.kind,
            operation_name: operation.name.clone(),
            variable_definitions: operation.variable_definitions.clone(),
            steps: self.steps,
        }
    }
}

fn key_field(definition: &FieldDefinition) -> Field {
    Field {
        name: definition.name.clone(),
        alias: None,
        arguments: Vec::new(),
        definition: definition.clone(),
        type_condition: None,
        selection_set: Vec::new(),
    }
}
