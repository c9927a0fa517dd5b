pub mod entity;
pub mod error;
pub mod mutation;
pub mod pg;
pub mod secret;
pub mod sql;

pub use entity::{EntitySpec, REVIEWS, Record, USERS, UpdateStatement};
pub use error::{MutationError, StoreError};
pub use mutation::{EntityMutationService, EntityStore};
pub use pg::{PgEntityStore, migrate};
pub use secret::{SecretHasher, Sha256SecretHasher};
pub use sql::{FieldMap, MutationClause, TranslationTable, build_set_clause};
