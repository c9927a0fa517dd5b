use crate::error::MutationError;
use crate::sql::{FieldMap, MutationClause, TranslationTable};

/// Row returned by storage after a mutation, keyed by the `returning` aliases.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// JSON shape a mutable column accepts. Every mutable column is `NOT NULL`,
/// so null never fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Boolean,
    Integer { min: i64, max: i64 },
}

impl FieldType {
    pub fn accepts(self, value: &serde_json::Value) -> bool {
        match self {
            FieldType::Text => value.is_string(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Integer { min, max } => value
                .as_i64()
                .is_some_and(|n| (min..=max).contains(&n)),
        }
    }
}

#[derive(Debug)]
pub struct EntitySpec {
    pub name: &'static str,
    pub table: &'static str,
    pub key_column: &'static str,
    /// Logical field that renames the key when present in an update.
    pub unique_field: Option<&'static str>,
    pub fields: &'static TranslationTable,
    /// Accepted value shape per logical field in `fields`.
    pub field_types: &'static [(&'static str, FieldType)],
    pub sensitive_fields: &'static [&'static str],
    pub returning: &'static str,
}

impl EntitySpec {
    pub fn field_type(&self, field: &str) -> Option<FieldType> {
        self.field_types
            .iter()
            .find(|(logical, _)| *logical == field)
            .map(|(_, ty)| *ty)
    }

    /// Rejects the first supplied value its column cannot hold. Unknown
    /// fields are left for the clause builder to ignore.
    pub fn validate(&self, fields: &FieldMap) -> Result<(), MutationError> {
        for (field, ty) in self.field_types {
            if let Some(value) = fields.get(*field)
                && !ty.accepts(value)
            {
                return Err(MutationError::InvalidField((*field).to_string()));
            }
        }
        Ok(())
    }
}

pub static USERS: EntitySpec = EntitySpec {
    name: "user",
    table: "users",
    key_column: "username",
    unique_field: Some("username"),
    fields: &[
        ("username", "username"),
        ("firstName", "first_name"),
        ("lastName", "last_name"),
        ("email", "email"),
        ("password", "password"),
        ("isAdmin", "is_admin"),
    ],
    field_types: &[
        ("username", FieldType::Text),
        ("firstName", FieldType::Text),
        ("lastName", FieldType::Text),
        ("email", FieldType::Text),
        ("password", FieldType::Text),
        ("isAdmin", FieldType::Boolean),
    ],
    sensitive_fields: &["password"],
    returning: r#"username, first_name AS "firstName", last_name AS "lastName", email, is_admin AS "isAdmin""#,
};

pub static REVIEWS: EntitySpec = EntitySpec {
    name: "review",
    table: "reviewed_parks",
    key_column: "id",
    unique_field: None,
    fields: &[
        ("reviewTitle", "review_title"),
        ("reviewData", "review_data"),
        ("rating", "rating"),
    ],
    field_types: &[
        ("reviewTitle", FieldType::Text),
        ("reviewData", FieldType::Text),
        ("rating", FieldType::Integer { min: 1, max: 5 }),
    ],
    sensitive_fields: &[],
    returning: r#"id, username, park_code AS "parkCode", review_title AS "reviewTitle", review_data AS "reviewData", rating"#,
};

#[derive(Debug, Clone)]
pub struct UpdateStatement<'a> {
    pub entity: &'a EntitySpec,
    pub clause: MutationClause,
    pub key: serde_json::Value,
}

impl UpdateStatement<'_> {
    /// The update runs inside a CTE so the returned row comes back as a single
    /// JSON object regardless of the entity's column types.
    pub fn sql(&self) -> String {
        format!(
            "WITH updated AS (UPDATE {} SET {} WHERE {} = ${} RETURNING {}) SELECT row_to_json(updated) AS record FROM updated",
            self.entity.table,
            self.clause.set_expression,
            self.entity.key_column,
            self.clause.next_placeholder(),
            self.entity.returning,
        )
    }

    pub fn bind_values(&self) -> Vec<&serde_json::Value> {
        self.clause
            .values
            .iter()
            .chain(std::iter::once(&self.key))
            .collect()
    }
}
