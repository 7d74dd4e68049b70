use serde::Serialize;
use thiserror::Error;

/// Everything that can end an invocation attempt.
///
/// Every variant is terminal for the current attempt only; the controller
/// records it as the attempt's result and stays usable.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "message")]
pub enum InvocationError {
    #[error("Malformed ABI: {0}")]
    MalformedAbi(String),

    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    #[error("No function selected")]
    NothingSelected,

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Fee estimate unavailable: {0}")]
    FeeUnavailable(String),

    #[error("Signer unavailable: {0}")]
    SignerUnavailable(String),

    #[error("Submission failed: {0}")]
    SubmissionFailure(String),

    #[error("Contract call failed: {0}")]
    CallFailure(String),
}

impl InvocationError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedAbi(_) => "MalformedAbi",
            Self::UnknownFunction(_) => "UnknownFunction",
            Self::NothingSelected => "NothingSelected",
            Self::EncodingError(_) => "EncodingError",
            Self::FeeUnavailable(_) => "FeeUnavailable",
            Self::SignerUnavailable(_) => "SignerUnavailable",
            Self::SubmissionFailure(_) => "SubmissionFailure",
            Self::CallFailure(_) => "CallFailure",
        }
    }
}
