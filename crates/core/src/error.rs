#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Schema not found: {0}")]
    SchemaNotFound(String),

    #[error("Schema {0} is not a user schema")]
    NotUserSchema(String),

    #[error("Invalid schema definition: {0}")]
    InvalidSchema(String),
}
