use graphql_parser::query::{self, Definition, OperationDefinition, TypeCondition};
use std::collections::{HashMap, HashSet};

use crate::error::{PlanningError, PlanningResult};
use crate::plan::{OperationKind, VariableDefinition};
use crate::selection::InputValue;
use crate::type_system::TypeRef;

/// One node of a raw selection set, before fragments are inlined.
#[derive(Clone, Debug, PartialEq)]
pub enum Selection {
    Field(FieldSelection),
    FragmentSpread(FragmentSpread),
    InlineFragment(InlineFragment),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldSelection {
    pub name: String,
    pub alias: Option<String>,
    pub arguments: Vec<(String, InputValue)>,
    pub directives: Vec<Directive>,
    pub selection_set: Vec<Selection>,
}

impl FieldSelection {
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FragmentSpread {
    pub fragment_name: String,
    pub directives: Vec<Directive>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InlineFragment {
    pub type_condition: Option<String>,
    pub directives: Vec<Directive>,
    pub selection_set: Vec<Selection>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Directive {
    pub name: String,
    pub arguments: Vec<(String, InputValue)>,
}

impl Directive {
    pub fn argument(&self, name: &str) -> Option<&InputValue> {
        self.arguments
            .iter()
            .find(|(arg, _)| arg == name)
            .map(|(_, value)| value)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FragmentDefinition {
    pub name: String,
    pub type_condition: String,
    pub selection_set: Vec<Selection>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Operation {
    pub kind: OperationKind,
    pub name: Option<String>,
    pub variable_definitions: Vec<VariableDefinition>,
    pub selection_set: Vec<Selection>,
}

/// A parsed operation document: its operations and named fragments.
#[derive(Clone, Debug, Default)]
pub struct ExecutableDocument {
    pub operations: Vec<Operation>,
    pub fragments: HashMap<String, FragmentDefinition>,
}

impl ExecutableDocument {
    pub fn parse(text: &str) -> PlanningResult<Self> {
        let document = query::parse_query::<String>(text)
            .map_err(|e| PlanningError::operation(e.to_string()))?;

        let mut parsed = ExecutableDocument::default();
        for definition in &document.definitions {
            match definition {
                Definition::Operation(operation) => {
                    parsed.operations.push(convert_operation(operation));
                }
                Definition::Fragment(fragment) => {
                    let TypeCondition::On(type_condition) = &fragment.type_condition;
                    let converted = FragmentDefinition {
                        name: fragment.name.clone(),
                        type_condition: type_condition.clone(),
                        selection_set: convert_selection_set(&fragment.selection_set),
                    };
                    if parsed
                        .fragments
                        .insert(fragment.name.clone(), converted)
                        .is_some()
                    {
                        return Err(PlanningError::operation(format!(
                            "There can be only one fragment named \"{}\".",
                            fragment.name
                        )));
                    }
                }
            }
        }

        Ok(parsed)
    }

    /// Selects the operation to plan. Without a name the document must hold
    /// exactly one operation.
    pub fn operation(&self, name: Option<&str>) -> PlanningResult<&Operation> {
        match name {
            Some(name) => self
                .operations
                .iter()
                .find(|op| op.name.as_deref() == Some(name))
                .ok_or_else(|| PlanningError::operation(format!("Unknown operation named \"{}\".", name))),
            None => match self.operations.as_slice() {
                [operation] => Ok(operation),
                [] => Err(PlanningError::operation("Document does not contain any operation.")),
                _ => Err(PlanningError::operation(
                    "Must provide operation name if query contains multiple operations.",
                )),
            },
        }
    }

    /// Fails when any fragment spreads itself, directly or through other
    /// fragments, whether or not an operation reaches it.
    pub fn check_fragment_cycles(&self) -> PlanningResult<()> {
        let mut names: Vec<&str> = self.fragments.keys().map(String::as_str).collect();
        names.sort_unstable();

        let mut visited = HashSet::new();
        let mut stack = Vec::new();
        for name in names {
            self.visit_fragment(name, &mut visited, &mut stack)?;
        }
        Ok(())
    }

    fn visit_fragment<'a>(
        &'a self,
        name: &'a str,
        visited: &mut HashSet<&'a str>,
        stack: &mut Vec<&'a str>,
    ) -> PlanningResult<()> {
        if stack.contains(&name) {
            return Err(PlanningError::FragmentCycle(name.to_string()));
        }
        if visited.contains(name) {
            return Ok(());
        }
        // Unknown spreads are reported by the normalizer if they are reached.
        let Some(fragment) = self.fragments.get(name) else {
            return Ok(());
        };

        let mut spreads = Vec::new();
        collect_spreads(&fragment.selection_set, &mut spreads);

        stack.push(name);
        for spread in spreads {
            self.visit_fragment(spread, visited, stack)?;
        }
        stack.pop();
        visited.insert(name);
        Ok(())
    }
}

fn collect_spreads<'a>(selection_set: &'a [Selection], into: &mut Vec<&'a str>) {
    for selection in selection_set {
        match selection {
            Selection::Field(field) => collect_spreads(&field.selection_set, into),
            Selection::FragmentSpread(spread) => into.push(&spread.fragment_name),
            Selection::InlineFragment(inline) => collect_spreads(&inline.selection_set, into),
        }
    }
}

fn convert_operation<'a>(operation: &OperationDefinition<'a, String>) -> Operation {
    let (kind, name, variables, selection_set) = match operation {
        OperationDefinition::SelectionSet(selection_set) => {
            (OperationKind::Query, None, &[][..], selection_set)
        }
        OperationDefinition::Query(q) => (
            OperationKind::Query,
            q.name.clone(),
            q.variable_definitions.as_slice(),
            &q.selection_set,
        ),
        OperationDefinition::Mutation(m) => (
            OperationKind::Mutation,
            m.name.clone(),
            m.variable_definitions.as_slice(),
            &m.selection_set,
        ),
        OperationDefinition::Subscription(s) => (
            OperationKind::Subscription,
            s.name.clone(),
            s.variable_definitions.as_slice(),
            &s.selection_set,
        ),
    };

    Operation {
        kind,
        name,
        variable_definitions: variables
            .iter()
            .map(|var| VariableDefinition {
                name: var.name.clone(),
                var_type: TypeRef::from_parsed(&var.var_type),
                default_value: var.default_value.as_ref().map(InputValue::from_parsed),
            })
            .collect(),
        selection_set: convert_selection_set(selection_set),
    }
}

fn convert_selection_set<'a>(selection_set: &query::SelectionSet<'a, String>) -> Vec<Selection> {
    selection_set
        .items
        .iter()
        .map(|selection| match selection {
            query::Selection::Field(field) => Selection::Field(FieldSelection {
                name: field.name.clone(),
                alias: field.alias.clone(),
                arguments: convert_arguments(&field.arguments),
                directives: convert_directives(&field.directives),
                selection_set: convert_selection_set(&field.selection_set),
            }),
            query::Selection::FragmentSpread(spread) => {
                Selection::FragmentSpread(FragmentSpread {
                    fragment_name: spread.fragment_name.clone(),
                    directives: convert_directives(&spread.directives),
                })
            }
            query::Selection::InlineFragment(inline) => {
                Selection::InlineFragment(InlineFragment {
                    type_condition: inline
                        .type_condition
                        .as_ref()
                        .map(|TypeCondition::On(name)| name.clone()),
                    directives: convert_directives(&inline.directives),
                    selection_set: convert_selection_set(&inline.selection_set),
                })
            }
        })
        .collect()
}

fn convert_arguments<'a>(
    arguments: &[(String, query::Value<'a, String>)],
) -> Vec<(String, InputValue)> {
    arguments
        .iter()
        .map(|(name, value)| (name.clone(), InputValue::from_parsed(value)))
        .collect()
}

fn convert_directives<'a>(directives: &[query::Directive<'a, String>]) -> Vec<Directive> {
    directives
        .iter()
        .map(|directive| Directive {
            name: directive.name.clone(),
            arguments: convert_arguments(&directive.arguments),
        })
        .collect()
}
