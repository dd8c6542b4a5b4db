use pretty_assertions::assert_eq;
use serde_json::{Map, json};
use stepwise::{
    Field, FieldLocationRegistry, OperationKind, Plan, PlanningError, SimpleQueryPlanner, StepId,
    TypeSystem,
};

const SCHEMA: &str = r#"
    type User {
        id: ID!
        firstName: String!
        lastName: String
        friends: [User!]!
        catPhotos(first: Int): [CatPhoto!]!
        favoriteCat: CatPhoto
    }

    type CatPhoto {
        URL: String!
        caption: String
        owner: User!
    }

    type Query {
        allUsers: [User!]!
        allCatPhotos: [CatPhoto!]!
        me: User
        user(id: ID!): User
    }

    type Mutation {
        createUser(firstName: String!): User!
        uploadCatPhoto(url: String!): CatPhoto!
    }

    type Subscription {
        userCreated: User!
    }
"#;

const USERS: &str = "user-location";
const CATS: &str = "cat-location";

fn plan(
    schema: &str,
    locations: &FieldLocationRegistry,
    query: &str,
) -> Result<Vec<Plan>, PlanningError> {
    let types = TypeSystem::parse(schema).unwrap();
    SimpleQueryPlanner::new().plan(query, &types, locations)
}

/// Users own the user fields, cats own the photo fields.
fn split_locations() -> FieldLocationRegistry {
    let mut locations = FieldLocationRegistry::new();
    for field in ["allUsers", "me", "user"] {
        locations.register_url("Query", field, USERS);
    }
    locations.register_url("Query", "allCatPhotos", CATS);
    for field in ["id", "firstName", "lastName", "friends"] {
        locations.register_url("User", field, USERS);
    }
    locations.register_url("User", "id", CATS);
    locations.register_url("User", "catPhotos", CATS);
    locations.register_url("User", "favoriteCat", CATS);
    for field in ["URL", "caption", "owner"] {
        locations.register_url("CatPhoto", field, CATS);
    }
    locations.register_url("Mutation", "createUser", USERS);
    locations.register_url("Mutation", "uploadCatPhoto", CATS);
    locations.register_url("Subscription", "userCreated", USERS);
    locations
}

fn names(fields: &[Field]) -> Vec<&str> {
    fields.iter().map(|field| field.name.as_str()).collect()
}

#[test]
fn single_root_field() {
    let mut locations = FieldLocationRegistry::new();
    locations.register_url("Query", "foo", "url1");

    let plans = plan("type Query { foo: Boolean }", &locations, "{ foo }").unwrap();

    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].steps.len(), 1);
    let root = &plans[0].steps[0];
    assert_eq!(root.url, "url1");
    assert_eq!(root.parent_type, "Query");
    assert_eq!(names(&root.selection_set), vec!["foo"]);
    assert!(root.selection_set[0].selection_set.is_empty());
    assert!(root.insertion_point.is_empty());
    assert_eq!(root.parent, None);
}

#[test]
fn single_root_object() {
    let mut locations = FieldLocationRegistry::new();
    locations.register_url("Query", "allUsers", "url1");
    locations.register_url("User", "firstName", "url1");
    locations.register_url("User", "friends", "url1");

    let plans = plan(
        r#"
            type User {
                firstName: String!
                friends: [User!]!
            }

            type Query {
                allUsers: [User!]!
            }
        "#,
        &locations,
        r#"
            {
                allUsers {
                    firstName
                    friends {
                        firstName
                        friends {
                            firstName
                        }
                    }
                }
            }
        "#,
    )
    .unwrap();

    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].steps.len(), 1);
    let root = &plans[0].steps[0];
    assert_eq!(root.url, "url1");

    let all_users = &root.selection_set[0];
    assert_eq!(all_users.name, "allUsers");
    assert_eq!(names(&all_users.selection_set), vec!["firstName", "friends"]);
    assert_eq!(all_users.selection_set[0].definition.field_type.to_string(), "String!");

    let friends = &all_users.selection_set[1];
    assert_eq!(friends.definition.field_type.to_string(), "[User!]!");
    assert_eq!(names(&friends.selection_set), vec!["firstName", "friends"]);
    assert_eq!(names(&friends.selection_set[1].selection_set), vec!["firstName"]);

    assert_eq!(
        root.selection_text(),
        "{ allUsers { firstName friends { firstName friends { firstName } } } }"
    );
}

#[test]
fn sub_graphs() {
    let mut locations = FieldLocationRegistry::new();
    locations.register_url("Query", "allUsers", USERS);
    locations.register_url("User", "firstName", USERS);
    locations.register_url("User", "catPhotos", CATS);
    locations.register_url("CatPhoto", "URL", CATS);

    let plans = plan(
        r#"
            type User {
                firstName: String!
                catPhotos: [CatPhoto!]!
            }

            type CatPhoto {
                URL: String!
            }

            type Query {
                allUsers: [User!]!
            }
        "#,
        &locations,
        "{ allUsers { firstName catPhotos { URL } } }",
    )
    .unwrap();

    assert_eq!(plans.len(), 1);
    let steps = &plans[0].steps;
    assert_eq!(steps.len(), 2);

    assert_eq!(steps[0].parent_type, "Query");
    assert_eq!(steps[0].url, USERS);
    assert_eq!(steps[0].selection_text(), "{ allUsers { firstName } }");
    assert_eq!(
        steps[0].selection_set[0].selection_set[0].definition.field_type.to_string(),
        "String!"
    );

    assert_eq!(steps[1].parent_type, "User");
    assert_eq!(steps[1].url, CATS);
    assert_eq!(steps[1].selection_text(), "{ catPhotos { URL } }");
    assert_eq!(steps[1].parent, Some(StepId(0)));
    assert_eq!(steps[1].insertion_point, vec!["allUsers"]);
    assert_eq!(
        plans[0].children(StepId(0)).map(|step| step.id).collect::<Vec<_>>(),
        vec![StepId(1)]
    );
}

#[test]
fn unregistered_field_fails_the_whole_operation() {
    let mut locations = FieldLocationRegistry::new();
    locations.register_url("Query", "allUsers", USERS);
    locations.register_url("User", "firstName", USERS);

    let result = plan(SCHEMA, &locations, "{ allUsers { firstName lastName } }");

    assert_eq!(
        result,
        Err(PlanningError::UnresolvedFieldLocation {
            type_name: "User".to_string(),
            field_name: "lastName".to_string(),
        })
    );
    let message = result.unwrap_err().to_string();
    assert!(message.contains("lastName") && message.contains("User"));
    assert!(!message.contains(USERS));
}

#[test]
fn fragment_cycles_are_errors() {
    let locations = split_locations();

    let direct = plan(
        SCHEMA,
        &locations,
        "{ allUsers { ...Loop } } fragment Loop on User { firstName ...Loop }",
    );
    assert_eq!(direct, Err(PlanningError::FragmentCycle("Loop".to_string())));

    let through_field = plan(
        SCHEMA,
        &locations,
        "{ allUsers { ...Friends } } fragment Friends on User { friends { ...Friends } }",
    );
    assert_eq!(
        through_field,
        Err(PlanningError::FragmentCycle("Friends".to_string()))
    );
}

#[test]
fn unused_fragment_cycles_are_errors() {
    let result = plan(
        SCHEMA,
        &split_locations(),
        "{ me { ...Name } } fragment Name on User { firstName } fragment Loop on User { ...Loop }",
    );

    assert_eq!(result, Err(PlanningError::FragmentCycle("Loop".to_string())));
}

#[test]
fn sibling_fields_for_the_same_service_share_a_step() {
    let plans = plan(
        SCHEMA,
        &split_locations(),
        "{ allUsers { catPhotos { URL } firstName favoriteCat { caption } } }",
    )
    .unwrap();

    let steps = &plans[0].steps;
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].selection_text(), "{ allUsers { firstName } }");
    assert_eq!(steps[1].url, CATS);
    assert_eq!(
        steps[1].selection_text(),
        "{ catPhotos { URL } favoriteCat { caption } }"
    );
}

#[test]
fn root_fields_are_grouped_by_service() {
    let plans = plan(
        SCHEMA,
        &split_locations(),
        "{ allUsers { firstName } allCatPhotos { URL } me { lastName } }",
    )
    .unwrap();

    assert_eq!(plans.len(), 1);
    let plan = &plans[0];
    assert_eq!(plan.kind, OperationKind::Query);
    assert_eq!(plan.steps.len(), 2);
    assert_eq!(plan.roots().count(), 2);
    assert_eq!(plan.steps[0].url, USERS);
    assert_eq!(
        plan.steps[0].selection_text(),
        "{ allUsers { firstName } me { lastName } }"
    );
    assert_eq!(plan.steps[1].url, CATS);
    assert_eq!(plan.steps[1].selection_text(), "{ allCatPhotos { URL } }");
}

#[test]
fn crossing_back_keeps_an_entity_key() {
    let plans = plan(
        SCHEMA,
        &split_locations(),
        "{ allCatPhotos { URL owner { firstName } } }",
    )
    .unwrap();

    let steps = &plans[0].steps;
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].url, CATS);
    assert_eq!(steps[0].selection_text(), "{ allCatPhotos { URL owner { id } } }");
    assert_eq!(steps[1].url, USERS);
    assert_eq!(steps[1].parent_type, "User");
    assert_eq!(steps[1].insertion_point, vec!["allCatPhotos", "owner"]);
    assert_eq!(steps[1].selection_text(), "{ firstName }");
}

#[test]
fn first_registered_url_breaks_ties() {
    let mut locations = FieldLocationRegistry::new();
    locations.register_url("Query", "me", USERS);
    locations.register_url("User", "favoriteCat", "cat-a");
    locations.register_url("User", "favoriteCat", "cat-b");
    locations.register_url("CatPhoto", "caption", "cat-b");
    locations.register_url("CatPhoto", "caption", "cat-a");

    let plans = plan(SCHEMA, &locations, "{ me { favoriteCat { caption } } }").unwrap();

    let steps = &plans[0].steps;
    assert_eq!(steps.len(), 2);
    // User.id is not resolvable by the users service here.
    assert_eq!(steps[0].selection_text(), "{ me { __typename } }");
    assert_eq!(steps[1].url, "cat-a");
    assert_eq!(steps[1].selection_text(), "{ favoriteCat { caption } }");
}

#[test]
fn fields_stay_in_the_active_step_when_possible() {
    let mut locations = FieldLocationRegistry::new();
    locations.register_url("Query", "allCatPhotos", CATS);
    locations.register_url("CatPhoto", "owner", CATS);
    locations.register_url("User", "id", USERS);
    locations.register_url("User", "id", CATS);
    for service in ["s1", "s2", "s3", CATS] {
        locations.register_url("CatPhoto", "caption", service);
    }
    locations.register_url("User", "firstName", "profiles");
    locations.register_url("User", "firstName", USERS);
    locations.register_url("Query", "allUsers", USERS);

    let plans = plan(
        SCHEMA,
        &locations,
        "{ allCatPhotos { caption owner { id } } }",
    )
    .unwrap();
    assert_eq!(plans[0].steps.len(), 1);
    assert_eq!(
        plans[0].steps[0].selection_text(),
        "{ allCatPhotos { caption owner { id } } }"
    );

    let plans = plan(SCHEMA, &locations, "{ allUsers { firstName } }").unwrap();
    assert_eq!(plans[0].steps.len(), 1);
    assert_eq!(plans[0].steps[0].url, USERS);
}

#[test]
fn mutations_run_in_series() {
    let plans = plan(
        SCHEMA,
        &split_locations(),
        r#"
            mutation {
                createUser(firstName: "Ada") { firstName catPhotos { URL } }
                uploadCatPhoto(url: "http://cats/1.png") { URL }
            }
        "#,
    )
    .unwrap();

    assert_eq!(plans.len(), 2);
    assert!(plans.iter().all(|plan| plan.kind == OperationKind::Mutation));

    assert_eq!(plans[0].steps.len(), 2);
    assert_eq!(plans[0].steps[0].url, USERS);
    assert_eq!(plans[0].steps[0].parent_type, "Mutation");
    assert_eq!(
        plans[0].steps[0].selection_text(),
        r#"{ createUser(firstName: "Ada") { firstName } }"#
    );
    assert_eq!(plans[0].steps[1].insertion_point, vec!["createUser"]);
    assert_eq!(plans[0].steps[1].selection_text(), "{ catPhotos { URL } }");

    assert_eq!(plans[1].steps.len(), 1);
    assert_eq!(plans[1].steps[0].url, CATS);
    assert_eq!(
        plans[1].steps[0].selection_text(),
        r#"{ uploadCatPhoto(url: "http://cats/1.png") { URL } }"#
    );
}

#[test]
fn fragments_from_different_services_are_combined() {
    let plans = plan(
        SCHEMA,
        &split_locations(),
        r#"
            { allUsers { ...Names ... on User { catPhotos { URL } } ...Photos } }
            fragment Names on User { firstName lastName }
            fragment Photos on User { favoriteCat { caption } }
        "#,
    )
    .unwrap();

    let steps = &plans[0].steps;
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].selection_text(), "{ allUsers { firstName lastName } }");
    assert_eq!(
        steps[1].selection_text(),
        "{ catPhotos { URL } favoriteCat { caption } }"
    );
}

#[test]
fn aliases_shape_the_insertion_point() {
    let plans = plan(
        SCHEMA,
        &split_locations(),
        "{ people: allUsers { name: firstName photos: catPhotos(first: 3) { URL } } }",
    )
    .unwrap();

    let steps = &plans[0].steps;
    assert_eq!(steps[0].selection_text(), "{ people: allUsers { name: firstName } }");
    assert_eq!(steps[1].insertion_point, vec!["people"]);
    assert_eq!(
        steps[1].selection_text(),
        "{ photos: catPhotos(first: 3) { URL } }"
    );
}

#[test]
fn variables_are_threaded_into_steps() {
    let types = TypeSystem::parse(SCHEMA).unwrap();
    let variables: Map<String, serde_json::Value> = json!({ "withCaption": false })
        .as_object()
        .cloned()
        .unwrap();

    let plans = SimpleQueryPlanner::new()
        .plan_operation(
            r#"
                query Photos($id: ID!, $first: Int = 10, $withCaption: Boolean!) {
                    user(id: $id) {
                        firstName
                        catPhotos(first: $first) {
                            URL
                            caption @include(if: $withCaption)
                        }
                    }
                }
            "#,
            Some("Photos"),
            &variables,
            &types,
            &split_locations(),
        )
        .unwrap();

    let plan = &plans[0];
    assert_eq!(plan.operation_name.as_deref(), Some("Photos"));
    assert_eq!(plan.steps[0].variable_usages, vec!["id"]);
    assert_eq!(plan.steps[1].variable_usages, vec!["first"]);
    assert_eq!(
        plan.step_document(StepId(0)).unwrap(),
        "query Photos($id: ID!) { user(id: $id) { firstName } }"
    );
    assert_eq!(
        plan.step_document(StepId(1)).unwrap(),
        "... on User { catPhotos(first: $first) { URL } }"
    );
}

#[test]
fn skipped_selections_never_reach_a_service() {
    let plans = plan(
        SCHEMA,
        &split_locations(),
        "{ allUsers { firstName catPhotos @skip(if: true) { URL } } }",
    )
    .unwrap();

    assert_eq!(plans[0].steps.len(), 1);
    assert_eq!(plans[0].steps[0].selection_text(), "{ allUsers { firstName } }");
}

#[test]
fn typename_is_fetched_from_the_active_service() {
    let plans = plan(
        SCHEMA,
        &split_locations(),
        "{ __typename allUsers { __typename catPhotos { __typename URL } } }",
    )
    .unwrap();

    let steps = &plans[0].steps;
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].url, USERS);
    assert_eq!(
        steps[0].selection_text(),
        "{ __typename allUsers { __typename } }"
    );
    assert_eq!(steps[1].selection_text(), "{ catPhotos { __typename URL } }");
}

#[test]
fn root_typename_joins_the_first_root_step() {
    let plans = plan(
        SCHEMA,
        &split_locations(),
        "{ __typename allCatPhotos { URL } }",
    )
    .unwrap();

    let steps = &plans[0].steps;
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].url, CATS);
    assert_eq!(steps[0].selection_text(), "{ __typename allCatPhotos { URL } }");

    let alone = plan(SCHEMA, &split_locations(), "{ __typename }").unwrap();
    assert_eq!(alone[0].steps.len(), 1);
    assert_eq!(alone[0].steps[0].url, USERS);
}

#[test]
fn union_members_on_other_services_get_a_discriminator() {
    let schema = r#"
        type User { id: ID! firstName: String! }
        type CatPhoto { URL: String! }
        union Thing = User | CatPhoto
        type Query { things: [Thing!]! }
    "#;
    let mut locations = FieldLocationRegistry::new();
    locations.register_url("Query", "things", CATS);
    locations.register_url("User", "firstName", USERS);
    locations.register_url("CatPhoto", "URL", CATS);

    let plans = plan(
        schema,
        &locations,
        "{ things { ... on User { firstName } ... on CatPhoto { URL } } }",
    )
    .unwrap();

    let steps = &plans[0].steps;
    assert_eq!(steps.len(), 2);
    assert_eq!(
        steps[0].selection_text(),
        "{ things { ... on CatPhoto { URL } __typename } }"
    );
    assert_eq!(steps[1].url, USERS);
    assert_eq!(steps[1].parent_type, "User");
    assert_eq!(steps[1].insertion_point, vec!["things"]);
    assert_eq!(steps[1].selection_text(), "{ firstName }");

    let only_remote = plan(schema, &locations, "{ things { ... on User { firstName } } }").unwrap();
    assert_eq!(
        only_remote[0].steps[0].selection_text(),
        "{ things { __typename } }"
    );
}

#[test]
fn narrowed_fields_are_routed_by_their_concrete_type() {
    let schema = r#"
        interface Node { id: ID! }
        type User implements Node { id: ID! firstName: String! }
        type CatPhoto implements Node { id: ID! URL: String! }
        type Query { node(id: ID!): Node }
    "#;
    let mut locations = FieldLocationRegistry::new();
    locations.register_url("Query", "node", USERS);
    locations.register_url("Node", "id", USERS);
    locations.register_url("User", "firstName", USERS);
    locations.register_url("CatPhoto", "URL", CATS);

    let plans = plan(
        schema,
        &locations,
        r#"{ node(id: "1") { id ... on User { firstName } ... on CatPhoto { URL } } }"#,
    )
    .unwrap();

    let steps = &plans[0].steps;
    assert_eq!(steps.len(), 2);
    assert_eq!(
        steps[0].selection_text(),
        r#"{ node(id: "1") { id ... on User { firstName } __typename } }"#
    );
    assert_eq!(steps[1].url, CATS);
    assert_eq!(steps[1].parent_type, "CatPhoto");
    assert_eq!(steps[1].insertion_point, vec!["node"]);
    assert_eq!(steps[1].selection_text(), "{ URL }");
}

#[test]
fn invalid_operations_are_rejected() {
    let locations = split_locations();
    let cases = [
        "{ allUsers { nickname } }",
        "{ allUsers }",
        "{ allUsers { firstName { length } } }",
        "{ allUsers { ...Missing } }",
        "subscription { userCreated { firstName } }",
        "query A { me { id } } query B { me { id } }",
        "{ allUsers {",
    ];

    for query in cases {
        match plan(SCHEMA, &locations, query) {
            Err(PlanningError::Operation(_)) => {}
            other => panic!("expected an operation error for {}, got {:?}", query, other),
        }
    }
}

#[test]
fn plans_render_as_a_step_tree() {
    let plans = plan(
        SCHEMA,
        &split_locations(),
        "{ allUsers { firstName catPhotos { URL } } }",
    )
    .unwrap();

    assert_eq!(
        plans[0].to_string(),
        [
            "Plan(query) {",
            "  Fetch(step: 0, service: \"user-location\", type: \"Query\") {",
            "    { allUsers { firstName } }",
            "    Fetch(step: 1, service: \"cat-location\", type: \"User\", path: \"allUsers\") {",
            "      { catPhotos { URL } }",
            "    }",
            "  }",
            "}",
        ]
        .join("\n")
    );
}
