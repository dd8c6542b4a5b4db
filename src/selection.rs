use graphql_parser::query;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::debug;

use crate::error::{PlanningError, PlanningResult};
use crate::operation::{Directive, FieldSelection, FragmentDefinition, Selection};
use crate::plan::VariableDefinition;
use crate::type_system::{FieldDefinition, TypeSystem};

/// An argument or directive value as written in the operation text.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum InputValue {
    Variable(String),
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
    Enum(String),
    List(Vec<InputValue>),
    Object(BTreeMap<String, InputValue>),
}

impl InputValue {
    pub(crate) fn from_parsed<'a>(value: &query::Value<'a, String>) -> Self {
        match value {
            query::Value::Variable(name) => InputValue::Variable(name.clone()),
            query::Value::Int(number) => number
                .as_i64()
                .map(InputValue::Int)
                .unwrap_or(InputValue::Null),
            query::Value::Float(float) => InputValue::Float(*float),
            query::Value::String(string) => InputValue::String(string.clone()),
            query::Value::Boolean(boolean) => InputValue::Boolean(*boolean),
            query::Value::Null => InputValue::Null,
            query::Value::Enum(name) => InputValue::Enum(name.clone()),
            query::Value::List(items) => {
                InputValue::List(items.iter().map(InputValue::from_parsed).collect())
            }
            query::Value::Object(fields) => InputValue::Object(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), InputValue::from_parsed(value)))
                    .collect(),
            ),
        }
    }

    pub(crate) fn collect_variables(&self, into: &mut Vec<String>) {
        match self {
            InputValue::Variable(name) => {
                if !into.contains(name) {
                    into.push(name.clone());
                }
            }
            InputValue::List(items) => items.iter().for_each(|item| item.collect_variables(into)),
            InputValue::Object(fields) => {
                fields.values().for_each(|value| value.collect_variables(into))
            }
            _ => {}
        }
    }
}

impl fmt::Display for InputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputValue::Variable(name) => write!(f, "${}", name),
            InputValue::Int(int) => write!(f, "{}", int),
            InputValue::Float(float) => write!(f, "{:?}", float),
            // JSON string escaping is valid GraphQL string syntax.
            InputValue::String(string) => {
                write!(f, "{}", Value::String(string.clone()))
            }
            InputValue::Boolean(boolean) => write!(f, "{}", boolean),
            InputValue::Null => write!(f, "null"),
            InputValue::Enum(name) => write!(f, "{}", name),
            InputValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            InputValue::Object(fields) => {
                write!(f, "{{")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Variable values supplied with the request, backed by the operation's
/// declared defaults.
pub struct VariableValues<'a> {
    provided: &'a Map<String, Value>,
    definitions: &'a [VariableDefinition],
}

impl<'a> VariableValues<'a> {
    pub fn new(provided: &'a Map<String, Value>, definitions: &'a [VariableDefinition]) -> Self {
        VariableValues {
            provided,
            definitions,
        }
    }

    fn boolean(&self, name: &str) -> PlanningResult<bool> {
        let definition = self
            .definitions
            .iter()
            .find(|var| var.name == name)
            .ok_or_else(|| {
                PlanningError::operation(format!("Variable \"${}\" is not defined.", name))
            })?;

        match self.provided.get(name) {
            Some(Value::Bool(value)) => Ok(*value),
            Some(Value::Null) | None => match &definition.default_value {
                Some(InputValue::Boolean(value)) => Ok(*value),
                _ => Err(PlanningError::operation(format!(
                    "Variable \"${}\" of type \"{}\" was not provided.",
                    name, definition.var_type
                ))),
            },
            Some(other) => Err(PlanningError::operation(format!(
                "Variable \"${}\" got invalid value {}; Boolean cannot represent a non boolean value.",
                name, other
            ))),
        }
    }
}

/// A concrete field selection, with fragments already inlined and skip/include
/// already applied.
#[derive(Clone, Debug)]
pub struct NormalizedField<'a> {
    pub selection: &'a FieldSelection,
    pub definition: &'a FieldDefinition,
    /// The type the field is resolved against.
    pub parent_type: &'a str,
    /// Set when a fragment narrowed the enclosing type to `parent_type`.
    pub type_condition: Option<&'a str>,
    /// Fragments this field was reached through, outermost first.
    pub fragment_path: Vec<&'a str>,
}

pub struct Normalizer<'a> {
    types: &'a TypeSystem,
    fragments: &'a HashMap<String, FragmentDefinition>,
    variables: &'a VariableValues<'a>,
}

impl<'a> Normalizer<'a> {
    pub fn new(
        types: &'a TypeSystem,
        fragments: &'a HashMap<String, FragmentDefinition>,
        variables: &'a VariableValues<'a>,
    ) -> Self {
        Normalizer {
            types,
            fragments,
            variables,
        }
    }

    /// Flattens `selection_set` into the fields it selects on `parent_type`, in
    /// first-seen order. Fields sharing a response key are all kept.
    pub fn normalize(
        &self,
        selection_set: &'a [Selection],
        parent_type: &'a str,
        fragment_path: &[&'a str],
    ) -> PlanningResult<Vec<NormalizedField<'a>>> {
        let mut fields = Vec::new();
        let mut path = fragment_path.to_vec();
        self.collect(selection_set, parent_type, parent_type, &mut path, &mut fields)?;
        Ok(fields)
    }

    fn collect(
        &self,
        selection_set: &'a [Selection],
        parent_type: &'a str,
        scope: &'a str,
        path: &mut Vec<&'a str>,
        fields: &mut Vec<NormalizedField<'a>>,
    ) -> PlanningResult<()> {
        for selection in selection_set {
            match selection {
                Selection::Field(field) => {
                    if !self.is_included(&field.directives)? {
                        continue;
                    }
                    let definition = self.types.field(scope, &field.name).ok_or_else(|| {
                        PlanningError::operation(format!(
                            "Cannot query field \"{}\" on type \"{}\".",
                            field.name, scope
                        ))
                    })?;
                    fields.push(NormalizedField {
                        selection: field,
                        definition,
                        parent_type: scope,
                        type_condition: (scope != parent_type).then_some(scope),
                        fragment_path: path.clone(),
                    });
                }
                Selection::FragmentSpread(spread) => {
                    if !self.is_included(&spread.directives)? {
                        continue;
                    }
                    let name = spread.fragment_name.as_str();
                    if path.contains(&name) {
                        return Err(PlanningError::FragmentCycle(name.to_string()));
                    }
                    let fragment = self.fragments.get(name).ok_or_else(|| {
                        PlanningError::operation(format!("Unknown fragment \"{}\".", name))
                    })?;
                    let Some(narrowed) = self.narrow(scope, &fragment.type_condition)? else {
                        debug!(fragment = name, scope, "dropping fragment that can never match");
                        continue;
                    };
                    path.push(name);
                    self.collect(&fragment.selection_set, parent_type, narrowed, path, fields)?;
                    path.pop();
                }
                Selection::InlineFragment(inline) => {
                    if !self.is_included(&inline.directives)? {
                        continue;
                    }
                    let narrowed = match &inline.type_condition {
                        Some(condition) => self.narrow(scope, condition)?,
                        None => Some(scope),
                    };
                    let Some(narrowed) = narrowed else {
                        debug!(scope, "dropping inline fragment that can never match");
                        continue;
                    };
                    self.collect(&inline.selection_set, parent_type, narrowed, path, fields)?;
                }
            }
        }
        Ok(())
    }

    /// The type a fragment's fields are resolved against inside `scope`, or
    /// `None` when no value of `scope` can satisfy the condition.
    fn narrow(&self, scope: &'a str, condition: &'a str) -> PlanningResult<Option<&'a str>> {
        if self.types.get(condition).is_none() {
            return Err(PlanningError::operation(format!(
                "Unknown type \"{}\".",
                condition
            )));
        }
        if self.types.condition_covers(condition, scope) {
            Ok(Some(scope))
        } else if self.types.conditions_overlap(condition, scope) {
            Ok(Some(condition))
        } else {
            Ok(None)
        }
    }

    /// `@skip` is checked before `@include`; both must let the selection through.
    fn is_included(&self, directives: &[Directive]) -> PlanningResult<bool> {
        for directive in directives.iter().filter(|d| d.name == "skip") {
            if self.condition(directive)? {
                return Ok(false);
            }
        }
        for directive in directives.iter().filter(|d| d.name == "include") {
            if !self.condition(directive)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn condition(&self, directive: &Directive) -> PlanningResult<bool> {
        match directive.argument("if") {
            Some(InputValue::Boolean(value)) => Ok(*value),
            Some(InputValue::Variable(name)) => self.variables.boolean(name),
            Some(other) => Err(PlanningError::operation(format!(
                "Argument \"if\" of directive \"@{}\" has invalid value {}.",
                directive.name, other
            ))),
            None => Err(PlanningError::operation(format!(
                "Directive \"@{}\" argument \"if\" of type \"Boolean!\" is required.",
                directive.name
            ))),
        }
    }
}
