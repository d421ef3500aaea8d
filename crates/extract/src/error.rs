use thiserror::Error;

/// Why a model call produced nothing usable.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("request to model failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model returned an empty reply")]
    EmptyReply,

    #[error("model reply is not valid JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("model reply is not a JSON object")]
    NotAnObject,

    #[error("model reply is missing {0:?}")]
    MissingField(&'static str),
}
