use thiserror::Error;

// ---------------------------------------------------------------------------
// ApiError
// ---------------------------------------------------------------------------

/// A failed call against the cloud provider, carrying the provider's error code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed ({code}): {message}")]
pub struct ApiError {
    pub operation: String,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub const DUPLICATE_POLICY_ATTACHMENT: &'static str = "DuplicatePolicyAttachmentException";
    pub const ALREADY_IN_ORGANIZATION: &'static str = "AlreadyInOrganizationException";

    pub fn new(
        operation: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation: operation.into(),
            code: code.into(),
            message: message.into(),
        }
    }

    /// The only provider error the pipeline treats as an expected outcome.
    pub fn is_duplicate_policy_attachment(&self) -> bool {
        self.code == Self::DUPLICATE_POLICY_ATTACHMENT
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

// ---------------------------------------------------------------------------
// PreconditionError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("AWS API connection could not be established: {0}")]
    Connection(#[source] ApiError),

    #[error("could not simulate the IAM policy of {arn}: {source}")]
    PolicySimulation {
        arn: String,
        #[source]
        source: ApiError,
    },

    #[error("AWS API actions denied for {arn}: {}", .denied.join(", "))]
    ActionsDenied { arn: String, denied: Vec<String> },

    #[error("no AWS organization found for the caller: {0}")]
    OrganizationMissing(#[source] ApiError),

    #[error("caller account {caller} is not the management account {management} of the organization")]
    NotManagementAccount { caller: String, management: String },

    #[error("the service control policy type is not enabled for organization {0}")]
    ScpDisabled(String),
}

// ---------------------------------------------------------------------------
// ExtractionError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to extract the organization tree under {parent_id}: {source}")]
pub struct ExtractionError {
    pub parent_id: String,
    #[source]
    pub source: ApiError,
}

// ---------------------------------------------------------------------------
// ConsistencyViolation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsistencyViolation {
    #[error("multiple course iteration OUs share a name: {}", .0.join(", "))]
    DuplicateIterationNames(Vec<String>),

    #[error("members of a course iteration OU carry a different semester tag: {}", .0.join(", "))]
    MismatchedSemesterTags(Vec<String>),
}

// ---------------------------------------------------------------------------
// OrgSyncError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum OrgSyncError {
    #[error("config not found at {0}: run 'orgsync config init'")]
    ConfigNotFound(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("roster not found at {0}")]
    RosterNotFound(String),

    #[error("invalid semester '{0}': expected '<Spring|Fall> <year>'")]
    InvalidSemester(String),

    #[error("invalid slug '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidSlug(String),

    #[error("organization has no root")]
    NoRoot,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Consistency(#[from] ConsistencyViolation),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OrgSyncError>;
