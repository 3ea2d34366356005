//! GraphQL schema and operation documents (`.graphql`, `.gql`).

use crate::extract::graphql::{operation_fields, schema_fields, RootField};
use crate::extract::registry::Language;
use crate::extract::{ExtractionRule, ScanContext};
use crate::facts::{Fact, FactKind};

pub const LANGUAGE: Language = Language {
    tag: "graphql",
    extensions: &["graphql", "graphqls", "gql"],
    rules: RULES,
};

static RULES: &[ExtractionRule] = &[
    ExtractionRule { name: "gql-schema", kinds: &[FactKind::GraphqlOperation], run: schema },
    ExtractionRule { name: "gql-operations", kinds: &[FactKind::GraphqlOperation], run: operations },
];

fn push_fields(ctx: &ScanContext<'_>, out: &mut Vec<Fact>, fields: Vec<RootField>) {
    for field in fields {
        if ctx.expired() {
            break;
        }
        out.push(ctx.fact(FactKind::GraphqlOperation, field.name(), None, field.offset));
    }
}

fn schema(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    push_fields(ctx, out, schema_fields(ctx.text));
}

fn operations(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    push_fields(ctx, out, operation_fields(ctx.text));
}

#[cfg(test)]
mod tests {
    use crate::extract::extract_facts;
    use crate::facts::{FactKind, KindSet};

    fn names(src: &str, path: &str) -> Vec<String> {
        let kinds: KindSet = [FactKind::GraphqlOperation].into_iter().collect();
        let mut names: Vec<String> = extract_facts(src, path, kinds).into_iter().map(|f| f.name).collect();
        names.sort();
        names
    }

    #[test]
    fn test_schema_root_fields() {
        let src = r#"
type Query {
  user(id: ID!): User
  users: [User!]!
}

type User {
  id: ID!
  name: String
}

extend type Mutation {
  createUser(input: NewUser!): User
}
"#;
        assert_eq!(
            names(src, "schema.graphql"),
            vec!["Mutation.createUser", "Query.user", "Query.users"]
        );
    }

    #[test]
    fn test_operation_documents() {
        let src = "query GetUser($id: ID!) {\n  profile: user(id: $id) { name }\n}\n";
        assert_eq!(names(src, "ops/get_user.gql"), vec!["Query.user"]);
    }

    #[test]
    fn test_fact_line_points_at_field() {
        let kinds: KindSet = [FactKind::GraphqlOperation].into_iter().collect();
        let facts = extract_facts("type Query {\n  a: Int\n  b: Int\n}\n", "s.graphql", kinds);
        let b = facts.iter().find(|f| f.name == "Query.b").map(|f| f.line);
        assert_eq!(b, Some(3));
    }
}
