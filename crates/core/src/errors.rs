use thiserror::Error;

/// Apology posted in the thread when a link could not be summarized.
pub const SUMMARY_APOLOGY: &str = "😕 I couldn’t access that link. It might be behind a login, or the site’s down. Want to try a different one?";

/// Apology posted in the thread when the canvas entry could not be added.
pub const CANVAS_APOLOGY: &str =
    "Sorry, I couldn't add the summary to the Canvas due to an error.";

/// Apology posted in the thread when a retraction could not remove the entry.
pub const CANVAS_REMOVE_APOLOGY: &str =
    "Sorry, I couldn't remove the entry from the Canvas due to an error.";

/// Confirmation posted in the thread after a canvas entry is recorded.
pub const SAVED_CONFIRMATION: &str = "📌 Saved to the Links canvas!";

/// Stage of the canvas annotation protocol that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnnotationStage {
    Render,
    Append,
    Lookup,
    Delete,
}

impl AnnotationStage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Render => "render",
            Self::Append => "append",
            Self::Lookup => "lookup",
            Self::Delete => "delete",
        }
    }
}

/// Failure taxonomy for one link's flow through the pipeline.
///
/// Summarization and annotation failures carry distinct user-facing
/// apologies: by the time annotation is attempted the summary reply has
/// already been posted, and partial success is accepted rather than
/// compensated.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("summarization failed for `{url}`: {detail}")]
    Summarization { url: String, detail: String },
    #[error("canvas annotation failed at {} for `{url}`: {detail}", .stage.label())]
    Annotation { url: String, stage: AnnotationStage, detail: String },
}

impl FlowError {
    pub fn url(&self) -> &str {
        match self {
            Self::Summarization { url, .. } | Self::Annotation { url, .. } => url,
        }
    }

    /// Text posted into the thread when this failure is reported.
    pub fn user_apology(&self) -> &'static str {
        match self {
            Self::Summarization { .. } => SUMMARY_APOLOGY,
            Self::Annotation { stage: AnnotationStage::Delete, .. } => CANVAS_REMOVE_APOLOGY,
            Self::Annotation { .. } => CANVAS_APOLOGY,
        }
    }
}
