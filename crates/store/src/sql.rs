use crate::error::MutationError;

/// Sparse update payload. A missing key leaves the column untouched.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

/// Logical field name to storage column, in declaration order.
pub type TranslationTable = [(&'static str, &'static str)];

#[derive(Debug, Clone, PartialEq)]
pub struct MutationClause {
    pub set_expression: String,
    pub values: Vec<serde_json::Value>,
    pub columns: Vec<&'static str>,
}

impl MutationClause {
    /// Index of the first placeholder free for use after the set clause.
    pub fn next_placeholder(&self) -> usize {
        self.values.len() + 1
    }
}

/// Builds a `col = $n` assignment list from the entries of `fields` that the
/// translation table knows about. Assignments follow the table's declaration
/// order, so the output does not depend on how `fields` was populated.
pub fn build_set_clause(
    fields: &FieldMap,
    table: &TranslationTable,
) -> Result<MutationClause, MutationError> {
    let mut fragments = Vec::new();
    let mut values = Vec::new();
    let mut columns = Vec::new();

    for (field, column) in table {
        let Some(value) = fields.get(*field) else {
            continue;
        };
        values.push(value.clone());
        columns.push(*column);
        fragments.push(format!("{} = ${}", column, values.len()));
    }

    if values.is_empty() {
        return Err(MutationError::EmptyMutation);
    }

    Ok(MutationClause {
        set_expression: fragments.join(", "),
        values,
        columns,
    })
}

pub fn column_for(table: &TranslationTable, field: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(logical, _)| *logical == field)
        .map(|(_, column)| *column)
}

#[cfg(test)]
mod tests {
    use super::*;

    const AB: &TranslationTable = &[("a", "col_a"), ("b", "col_b")];

    fn fields(value: serde_json::Value) -> FieldMap {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("fields must be an object"),
        }
    }

    #[test]
    fn empty_field_map_is_rejected() {
        let err = build_set_clause(&FieldMap::new(), AB).unwrap_err();
        assert!(matches!(err, MutationError::EmptyMutation));
    }

    #[test]
    fn fields_outside_the_table_do_not_count() {
        let err = build_set_clause(&fields(serde_json::json!({"c": 1, "id": 9})), AB).unwrap_err();
        assert!(matches!(err, MutationError::EmptyMutation));
    }

    #[test]
    fn assignments_use_sequential_placeholders() {
        let clause =
            build_set_clause(&fields(serde_json::json!({"a": "x", "b": "y"})), AB).unwrap();

        assert_eq!(clause.set_expression, "col_a = $1, col_b = $2");
        assert_eq!(clause.values, vec![serde_json::json!("x"), serde_json::json!("y")]);
        assert_eq!(clause.columns, vec!["col_a", "col_b"]);
        assert_eq!(clause.next_placeholder(), 3);
    }

    #[test]
    fn order_follows_the_translation_table() {
        let mut map = FieldMap::new();
        map.insert("b".to_string(), serde_json::json!(2));
        map.insert("zzz".to_string(), serde_json::json!("ignored"));
        map.insert("a".to_string(), serde_json::json!(1));

        let clause = build_set_clause(&map, AB).unwrap();
        assert_eq!(clause.set_expression, "col_a = $1, col_b = $2");
        assert_eq!(clause.values, vec![serde_json::json!(1), serde_json::json!(2)]);
    }

    #[test]
    fn sparse_map_skips_absent_fields() {
        let table: &TranslationTable = &[
            ("firstName", "first_name"),
            ("lastName", "last_name"),
            ("isAdmin", "is_admin"),
        ];
        let clause = build_set_clause(
            &fields(serde_json::json!({"isAdmin": true, "firstName": "Ada"})),
            table,
        )
        .unwrap();

        assert_eq!(clause.set_expression, "first_name = $1, is_admin = $2");
        assert_eq!(
            clause.values,
            vec![serde_json::json!("Ada"), serde_json::json!(true)]
        );
    }

    #[test]
    fn explicit_null_is_an_assignment() {
        let clause = build_set_clause(&fields(serde_json::json!({"b": null})), AB).unwrap();
        assert_eq!(clause.set_expression, "col_b = $1");
        assert_eq!(clause.values, vec![serde_json::Value::Null]);
    }

    #[test]
    fn values_are_never_interpolated() {
        let clause = build_set_clause(
            &fields(serde_json::json!({"a": "x'; DROP TABLE users; --"})),
            AB,
        )
        .unwrap();
        assert_eq!(clause.set_expression, "col_a = $1");
        assert!(!clause.set_expression.contains("DROP"));
    }

    #[test]
    fn column_lookup() {
        assert_eq!(column_for(AB, "b"), Some("col_b"));
        assert_eq!(column_for(AB, "c"), None);
    }
}
