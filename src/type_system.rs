use graphql_parser::schema::{self, Definition, TypeDefinition as ParsedType, TypeExtension};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::fmt;

use crate::error::{PlanningError, PlanningResult};
use crate::plan::OperationKind;

pub const TYPENAME_FIELD: &str = "__typename";

/// A GraphQL type reference such as `[User!]!`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub(crate) fn from_parsed<'a>(parsed: &schema::Type<'a, String>) -> Self {
        match parsed {
            schema::Type::NamedType(name) => TypeRef::Named(name.clone()),
            schema::Type::ListType(inner) => TypeRef::List(Box::new(TypeRef::from_parsed(inner))),
            schema::Type::NonNullType(inner) => {
                TypeRef::NonNull(Box::new(TypeRef::from_parsed(inner)))
            }
        }
    }

    /// The innermost named type, with list and non-null wrappers stripped.
    pub fn named_type(&self) -> &str {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::List(inner) | TypeRef::NonNull(inner) => inner.named_type(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => write!(f, "{}", name),
            TypeRef::List(inner) => write!(f, "[{}]", inner),
            TypeRef::NonNull(inner) => write!(f, "{}!", inner),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
}

impl TypeKind {
    pub fn is_composite(self) -> bool {
        matches!(self, TypeKind::Object | TypeKind::Interface | TypeKind::Union)
    }

    pub fn is_abstract(self) -> bool {
        matches!(self, TypeKind::Interface | TypeKind::Union)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ArgumentDefinition {
    pub name: String,
    pub value_type: TypeRef,
}

/// The schema signature of a field, resolved before planning touches it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: TypeRef,
    pub arguments: Vec<ArgumentDefinition>,
}

impl FieldDefinition {
    fn from_parsed<'a>(field: &schema::Field<'a, String>) -> Self {
        FieldDefinition {
            name: field.name.clone(),
            field_type: TypeRef::from_parsed(&field.field_type),
            arguments: field
                .arguments
                .iter()
                .map(|arg| ArgumentDefinition {
                    name: arg.name.clone(),
                    value_type: TypeRef::from_parsed(&arg.value_type),
                })
                .collect(),
        }
    }

    fn typename() -> Self {
        FieldDefinition {
            name: TYPENAME_FIELD.to_string(),
            field_type: TypeRef::NonNull(Box::new(TypeRef::Named("String".to_string()))),
            arguments: Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TypeDefinition {
    pub name: String,
    pub kind: TypeKind,
    pub fields: IndexMap<String, FieldDefinition>,
    pub interfaces: IndexSet<String>,
    /// Members of a union, or objects implementing an interface.
    pub possible_types: IndexSet<String>,
}

impl TypeDefinition {
    fn new(name: &str, kind: TypeKind) -> Self {
        TypeDefinition {
            name: name.to_string(),
            kind,
            fields: IndexMap::new(),
            interfaces: IndexSet::new(),
            possible_types: IndexSet::new(),
        }
    }
}

/// Read-only view of a (possibly composed) schema: every type with its fields
/// and the root operation types.
#[derive(Clone, Debug)]
pub struct TypeSystem {
    types: IndexMap<String, TypeDefinition>,
    query_type: Option<String>,
    mutation_type: Option<String>,
    subscription_type: Option<String>,
    typename: FieldDefinition,
}

impl Default for TypeSystem {
    fn default() -> Self {
        TypeSystem {
            types: IndexMap::new(),
            query_type: None,
            mutation_type: None,
            subscription_type: None,
            typename: FieldDefinition::typename(),
        }
    }
}

impl TypeSystem {
    pub fn parse(sdl: &str) -> PlanningResult<Self> {
        let mut types = TypeSystem::default();
        types.merge_sdl(sdl)?;
        Ok(types)
    }

    /// Merges another SDL document into this type system. Types already known
    /// gain the new fields; fields that already exist keep their first signature.
    pub fn merge_sdl(&mut self, sdl: &str) -> PlanningResult<()> {
        let document = schema::parse_schema::<String>(sdl)
            .map_err(|e| PlanningError::Schema(e.to_string()))?;
        self.merge_document(&document);
        Ok(())
    }

    pub(crate) fn merge_document<'a>(&mut self, document: &schema::Document<'a, String>) {
        for definition in &document.definitions {
            match definition {
                Definition::SchemaDefinition(schema_def) => {
                    if schema_def.query.is_some() {
                        self.query_type = schema_def.query.clone();
                    }
                    if schema_def.mutation.is_some() {
                        self.mutation_type = schema_def.mutation.clone();
                    }
                    if schema_def.subscription.is_some() {
                        self.subscription_type = schema_def.subscription.clone();
                    }
                }
                Definition::TypeDefinition(typedef) => self.add_type_definition(typedef),
                Definition::TypeExtension(extension) => self.add_type_extension(extension),
                Definition::DirectiveDefinition(_) => {}
            }
        }

        self.link_possible_types();
    }

    fn entry(&mut self, name: &str, kind: TypeKind) -> &mut TypeDefinition {
        self.types
            .entry(name.to_string())
            .or_insert_with(|| TypeDefinition::new(name, kind))
    }

    fn add_fields<'a>(
        target: &mut TypeDefinition,
        fields: &[schema::Field<'a, String>],
    ) {
        for field in fields {
            target
                .fields
                .entry(field.name.clone())
                .or_insert_with(|| FieldDefinition::from_parsed(field));
        }
    }

    fn add_type_definition<'a>(&mut self, typedef: &ParsedType<'a, String>) {
        match typedef {
            ParsedType::Object(obj) => {
                let target = self.entry(&obj.name, TypeKind::Object);
                target.interfaces.extend(obj.implements_interfaces.iter().cloned());
                Self::add_fields(target, &obj.fields);
            }
            ParsedType::Interface(iface) => {
                let target = self.entry(&iface.name, TypeKind::Interface);
                Self::add_fields(target, &iface.fields);
            }
            ParsedType::Union(union_type) => {
                let target = self.entry(&union_type.name, TypeKind::Union);
                target.possible_types.extend(union_type.types.iter().cloned());
            }
            ParsedType::Scalar(scalar) => {
                self.entry(&scalar.name, TypeKind::Scalar);
            }
            ParsedType::Enum(enum_type) => {
                self.entry(&enum_type.name, TypeKind::Enum);
            }
            ParsedType::InputObject(input) => {
                self.entry(&input.name, TypeKind::InputObject);
            }
        }
    }

    fn add_type_extension<'a>(&mut self, extension: &TypeExtension<'a, String>) {
        match extension {
            TypeExtension::Object(obj) => {
                let target = self.entry(&obj.name, TypeKind::Object);
                target.interfaces.extend(obj.implements_interfaces.iter().cloned());
                Self::add_fields(target, &obj.fields);
            }
            TypeExtension::Interface(iface) => {
                let target = self.entry(&iface.name, TypeKind::Interface);
                Self::add_fields(target, &iface.fields);
            }
            TypeExtension::Union(union_type) => {
                let target = self.entry(&union_type.name, TypeKind::Union);
                target.possible_types.extend(union_type.types.iter().cloned());
            }
            TypeExtension::Scalar(_) | TypeExtension::Enum(_) | TypeExtension::InputObject(_) => {}
        }
    }

    fn link_possible_types(&mut self) {
        let implementations: Vec<(String, String)> = self
            .types
            .values()
            .filter(|t| t.kind == TypeKind::Object)
            .flat_map(|t| {
                t.interfaces
                    .iter()
                    .map(move |iface| (iface.clone(), t.name.clone()))
            })
            .collect();

        for (iface, object) in implementations {
            if let Some(target) = self.types.get_mut(&iface) {
                target.possible_types.insert(object);
            }
        }
    }

    pub fn get(&self, type_name: &str) -> Option<&TypeDefinition> {
        self.types.get(type_name)
    }

    /// Looks up a field on a composite type. `__typename` resolves on every
    /// composite type.
    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&FieldDefinition> {
        let typedef = self.types.get(type_name)?;
        if field_name == TYPENAME_FIELD && typedef.kind.is_composite() {
            return Some(&self.typename);
        }
        typedef.fields.get(field_name)
    }

    pub fn root_type(&self, kind: OperationKind) -> Option<&str> {
        let (declared, default) = match kind {
            OperationKind::Query => (&self.query_type, "Query"),
            OperationKind::Mutation => (&self.mutation_type, "Mutation"),
            OperationKind::Subscription => (&self.subscription_type, "Subscription"),
        };
        match declared {
            Some(name) => Some(name.as_str()),
            None => self.types.get_key_value(default).map(|(name, _)| name.as_str()),
        }
    }

    /// Whether a fragment with `condition` applies to every value of `parent`.
    pub fn condition_covers(&self, condition: &str, parent: &str) -> bool {
        condition == parent
            || self
                .types
                .get(condition)
                .is_some_and(|c| c.kind.is_abstract() && c.possible_types.contains(parent))
    }

    /// Whether some concrete object type satisfies both `condition` and `parent`.
    pub fn conditions_overlap(&self, condition: &str, parent: &str) -> bool {
        let concrete = |name: &str| -> IndexSet<String> {
            match self.types.get(name) {
                Some(t) if t.kind.is_abstract() => t.possible_types.clone(),
                Some(t) => IndexSet::from([t.name.clone()]),
                None => IndexSet::new(),
            }
        };
        let parent_types = concrete(parent);
        concrete(condition).iter().any(|t| parent_types.contains(t))
    }
}
