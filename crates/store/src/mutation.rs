use std::future::Future;

use tracing::Instrument;

use crate::entity::{EntitySpec, REVIEWS, Record, USERS, UpdateStatement};
use crate::error::{MutationError, StoreError};
use crate::secret::SecretHasher;
use crate::sql::{FieldMap, build_set_clause, column_for};

/// Storage collaborator for entity mutations.
pub trait EntityStore {
    fn exists(
        &self,
        table: &'static str,
        column: &'static str,
        value: &serde_json::Value,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Executes the statement and returns the updated row, or `None` when no
    /// row matched the key.
    fn update_returning(
        &self,
        statement: &UpdateStatement<'_>,
    ) -> impl Future<Output = Result<Option<Record>, StoreError>> + Send;
}

#[derive(Clone)]
pub struct EntityMutationService<S, H> {
    store: S,
    hasher: H,
}

impl<S, H> EntityMutationService<S, H>
where
    S: EntityStore + Sync,
    H: SecretHasher + Sync,
{
    pub fn new(store: S, hasher: H) -> Self {
        Self { store, hasher }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn update_user(
        &self,
        username: &str,
        fields: FieldMap,
    ) -> Result<Record, MutationError> {
        self.update_identified_entity(&USERS, serde_json::json!(username), fields)
            .await
    }

    pub async fn update_review(
        &self,
        review_id: i64,
        fields: FieldMap,
    ) -> Result<Record, MutationError> {
        self.update_identified_entity(&REVIEWS, serde_json::json!(review_id), fields)
            .await
    }

    /// Applies a sparse update to the entity identified by `current_id`.
    ///
    /// A rename of the unique field is checked against existing rows first;
    /// the storage uniqueness constraint still backs the check, so a rename
    /// racing another writer surfaces as `DuplicateIdentifier` as well.
    /// Values are checked against their column type before anything else, so a
    /// malformed update never reaches storage. Sensitive fields are hashed
    /// before they are bound and stripped from the returned record.
    pub async fn update_identified_entity(
        &self,
        entity: &EntitySpec,
        current_id: serde_json::Value,
        mut fields: FieldMap,
    ) -> Result<Record, MutationError> {
        let span = tracing::info_span!(
            "entity.update",
            entity = entity.name,
            fields = fields.len(),
            outcome = tracing::field::Empty,
        );

        async {
            let result = self.apply(entity, current_id, &mut fields).await;
            match &result {
                Ok(_) => {
                    tracing::Span::current().record("outcome", "ok");
                }
                Err(err) => {
                    tracing::Span::current().record("outcome", err.kind());
                    tracing::info!(error = %err, "entity update rejected");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn apply(
        &self,
        entity: &EntitySpec,
        current_id: serde_json::Value,
        fields: &mut FieldMap,
    ) -> Result<Record, MutationError> {
        entity.validate(fields)?;
        let renamed_to = self.check_rename(entity, &current_id, fields).await?;

        for field in entity.sensitive_fields {
            if let Some(value) = fields.get_mut(*field) {
                let serde_json::Value::String(secret) = &*value else {
                    return Err(MutationError::InvalidField((*field).to_string()));
                };
                let hashed = self.hasher.hash(secret);
                *value = serde_json::Value::String(hashed);
            }
        }

        let statement = UpdateStatement {
            entity,
            clause: build_set_clause(fields, entity.fields)?,
            key: current_id,
        };

        let updated = match self.store.update_returning(&statement).await {
            Ok(updated) => updated,
            Err(StoreError::UniqueViolation(_)) => {
                let conflicting = renamed_to.unwrap_or_else(|| statement.key.clone());
                return Err(MutationError::DuplicateIdentifier(display_id(&conflicting)));
            }
            Err(StoreError::InvalidValue(subject)) => {
                return Err(MutationError::InvalidField(subject));
            }
            Err(err) => return Err(err.into()),
        };

        let Some(mut record) = updated else {
            return Err(MutationError::NotFound(display_id(&statement.key)));
        };

        for field in entity.sensitive_fields {
            record.remove(*field);
            if let Some(column) = column_for(entity.fields, field) {
                record.remove(column);
            }
        }

        Ok(record)
    }

    async fn check_rename(
        &self,
        entity: &EntitySpec,
        current_id: &serde_json::Value,
        fields: &FieldMap,
    ) -> Result<Option<serde_json::Value>, MutationError> {
        let Some(unique_field) = entity.unique_field else {
            return Ok(None);
        };
        let Some(new_id) = fields.get(unique_field) else {
            return Ok(None);
        };
        if new_id == current_id {
            return Ok(None);
        }

        let column = column_for(entity.fields, unique_field).unwrap_or(entity.key_column);
        if self.store.exists(entity.table, column, new_id).await? {
            return Err(MutationError::DuplicateIdentifier(display_id(new_id)));
        }

        Ok(Some(new_id.clone()))
    }
}

fn display_id(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
