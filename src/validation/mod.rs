pub mod policy;
pub mod schema;

pub use schema::{CustomFieldsSchema, FieldViolation};
