use std::path::PathBuf;

use serde::Serialize;

/// A decoded unit of work: one media file to convert and thumbnail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    pub id: Option<i64>,
    pub source: JobSource,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobSource {
    /// Full paths and a caller-supplied transcoder argument string.
    Explicit {
        input_path: PathBuf,
        arguments: Option<String>,
        output_path: PathBuf,
    },
    /// A file name under the input folder; the output name and arguments are chosen by the worker.
    Derived {
        input_file_name: String,
        /// Always starts with a dot.
        desired_extension: String,
    },
}

impl Job {
    /// Id rendered for log lines.
    pub fn label(&self) -> String {
        match self.id {
            Some(id) => id.to_string(),
            None => "-".to_string(),
        }
    }
}

/// Result of a single transcoder invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscodeOutcome {
    pub succeeded: bool,
    pub output_path: Option<PathBuf>,
    pub diagnostic_text: Option<String>,
}

impl TranscodeOutcome {
    pub fn success(output_path: PathBuf) -> Self {
        Self {
            succeeded: true,
            output_path: Some(output_path),
            diagnostic_text: None,
        }
    }

    pub fn failure(diagnostic_text: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            output_path: None,
            diagnostic_text: Some(diagnostic_text.into()),
        }
    }
}

/// Outcome record published for downstream consumers.
///
/// No `output_path` means the job failed; an `output_path` without a
/// `thumbnail_path` means only the thumbnail step failed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct JobResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "outputFilePath", skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(rename = "thumbnailFilePath", skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<String>,
}

impl JobResult {
    pub fn failed(id: Option<i64>) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn is_failure(&self) -> bool {
        self.output_path.is_none()
    }
}
