use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    /// Nothing in the default chain could supply credentials.
    #[error("No AWS credentials provider is configured")]
    NoProvider,

    #[error("Unable to resolve AWS credentials: {0}")]
    Resolve(String),
}
