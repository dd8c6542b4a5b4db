use serde::Serialize;
use std::fmt::{self, Write as _};

use crate::selection::InputValue;
use crate::type_system::{FieldDefinition, TypeRef};

static INDENT: &str = "  ";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    pub fn keyword(self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
            OperationKind::Subscription => "subscription",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Index of a step inside its plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StepId(pub usize);

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VariableDefinition {
    pub name: String,
    pub var_type: TypeRef,
    pub default_value: Option<InputValue>,
}

impl fmt::Display for VariableDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}: {}", self.name, self.var_type)?;
        if let Some(default) = &self.default_value {
            write!(f, " = {}", default)?;
        }
        Ok(())
    }
}

/// A field as it is sent to a service.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    pub alias: Option<String>,
    pub arguments: Vec<(String, InputValue)>,
    pub definition: FieldDefinition,
    /// Set when the field must be wrapped in `... on <type>` at its position.
    pub type_condition: Option<String>,
    pub selection_set: Vec<Field>,
}

impl Field {
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    fn collect_variables(&self, into: &mut Vec<String>) {
        for (_, value) in &self.arguments {
            value.collect_variables(into);
        }
        for field in &self.selection_set {
            field.collect_variables(into);
        }
    }

    fn write_plain(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(alias) = &self.alias {
            write!(f, "{}: ", alias)?;
        }
        f.write_str(&self.name)?;
        if !self.arguments.is_empty() {
            f.write_str("(")?;
            for (i, (name, value)) in self.arguments.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}: {}", name, value)?;
            }
            f.write_str(")")?;
        }
        if !self.selection_set.is_empty() {
            write!(f, " {}", SelectionSetDisplay(&self.selection_set))?;
        }
        Ok(())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.type_condition {
            Some(condition) => {
                write!(f, "... on {} {{ ", condition)?;
                self.write_plain(f)?;
                f.write_str(" }")
            }
            None => self.write_plain(f),
        }
    }
}

struct SelectionSetDisplay<'a>(&'a [Field]);

impl fmt::Display for SelectionSetDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for field in self.0 {
            write!(f, " {}", field)?;
        }
        f.write_str(" }")
    }
}

/// One request to one service.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Step {
    pub id: StepId,
    pub url: String,
    /// The type `selection_set` is evaluated against at `url`.
    pub parent_type: String,
    pub selection_set: Vec<Field>,
    /// Response keys from the plan root to the objects this step's result is
    /// merged into. Empty for root steps.
    pub insertion_point: Vec<String>,
    /// The step whose response must be available before this one runs.
    pub parent: Option<StepId>,
    pub variable_usages: Vec<String>,
}

impl Step {
    pub(crate) fn new(
        id: StepId,
        url: &str,
        parent_type: &str,
        insertion_point: &[String],
        parent: Option<StepId>,
    ) -> Self {
        Step {
            id,
            url: url.to_string(),
            parent_type: parent_type.to_string(),
            selection_set: Vec::new(),
            insertion_point: insertion_point.to_vec(),
            parent,
            variable_usages: Vec::new(),
        }
    }

    pub(crate) fn collect_variable_usages(&mut self) {
        let mut usages = Vec::new();
        for field in &self.selection_set {
            field.collect_variables(&mut usages);
        }
        self.variable_usages = usages;
    }

    /// The selection set as GraphQL text, e.g. `{ allUsers { firstName } }`.
    pub fn selection_text(&self) -> String {
        SelectionSetDisplay(&self.selection_set).to_string()
    }
}

/// The steps realizing one operation, or one serially executed part of it.
///
/// Steps are stored in creation order, so a parent always precedes its
/// children. Steps without a parent may run concurrently; every other step
/// waits for its parent's response.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Plan {
    pub kind: OperationKind,
    pub operation_name: Option<String>,
    pub variable_definitions: Vec<VariableDefinition>,
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.steps.get(id.0)
    }

    pub fn roots(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|step| step.parent.is_none())
    }

    pub fn children(&self, id: StepId) -> impl Iterator<Item = &Step> {
        self.steps
            .iter()
            .filter(move |step| step.parent == Some(id))
    }

    /// Request text for a step. Root steps become a complete operation
    /// declaring the variables they use; dependent steps render their selection
    /// set on `parent_type`, which the execution layer wraps in its own
    /// entity fetch.
    pub fn step_document(&self, id: StepId) -> Option<String> {
        let step = self.step(id)?;
        if step.parent.is_some() {
            return Some(format!("... on {} {}", step.parent_type, step.selection_text()));
        }

        let mut document = String::from(self.kind.keyword());
        if let Some(name) = &self.operation_name {
            let _ = write!(document, " {}", name);
        }
        let used: Vec<&VariableDefinition> = self
            .variable_definitions
            .iter()
            .filter(|var| step.variable_usages.contains(&var.name))
            .collect();
        if !used.is_empty() {
            document.push('(');
            for (i, var) in used.iter().enumerate() {
                if i > 0 {
                    document.push_str(", ");
                }
                let _ = write!(document, "{}", var);
            }
            document.push(')');
        }
        document.push(' ');
        document.push_str(&step.selection_text());
        Some(document)
    }

    fn write_step(&self, f: &mut fmt::Formatter<'_>, step: &Step, indentation: &str) -> fmt::Result {
        write!(
            f,
            "{}Fetch(step: {}, service: \"{}\", type: \"{}\"",
            indentation, step.id, step.url, step.parent_type
        )?;
        if !step.insertion_point.is_empty() {
            write!(f, ", path: \"{}\"", step.insertion_point.join("."))?;
        }
        writeln!(f, ") {{")?;
        writeln!(f, "{}{}{}", indentation, INDENT, step.selection_text())?;

        let next = format!("{}{}", indentation, INDENT);
        for child in self.children(step.id) {
            self.write_step(f, child, &next)?;
        }
        writeln!(f, "{}}}", indentation)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Plan({}", self.kind)?;
        if let Some(name) = &self.operation_name {
            write!(f, " {}", name)?;
        }
        writeln!(f, ") {{")?;
        for root in self.roots() {
            self.write_step(f, root, INDENT)?;
        }
        write!(f, "}}")
    }
}
