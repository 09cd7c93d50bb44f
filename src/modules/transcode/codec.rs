use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::command::{split_arguments, ArgumentError};
use super::job::{Job, JobResult, JobSource};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed job body: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{0}' must not be empty")]
    EmptyField(&'static str),

    #[error("both 'inputFilePath' and 'inputFileName' are set")]
    AmbiguousInput,

    #[error("invalid 'arguments': {0}")]
    InvalidArguments(#[from] ArgumentError),
}

/// Inbound wire shape. Both deployment variants share one message type.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct JobMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input_file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input_file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    arguments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    desired_extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_file_path: Option<String>,
}

fn non_empty(value: Option<String>, field: &'static str) -> Result<Option<String>, DecodeError> {
    match value {
        Some(v) if v.trim().is_empty() => Err(DecodeError::EmptyField(field)),
        other => Ok(other),
    }
}

pub fn decode(body: &[u8]) -> Result<Job, DecodeError> {
    let message: JobMessage = serde_json::from_slice(body)?;

    let input_file_path = non_empty(message.input_file_path, "inputFilePath")?;
    let input_file_name = non_empty(message.input_file_name, "inputFileName")?;
    let arguments = non_empty(message.arguments, "arguments")?;
    let desired_extension = non_empty(message.desired_extension, "desiredExtension")?;
    let output_file_path = non_empty(message.output_file_path, "outputFilePath")?;

    let source = match (input_file_path, input_file_name) {
        (Some(_), Some(_)) => return Err(DecodeError::AmbiguousInput),
        (None, None) => return Err(DecodeError::MissingField("inputFilePath")),
        (Some(input_path), None) => {
            if let Some(arguments) = &arguments {
                split_arguments(arguments)?;
            }
            JobSource::Explicit {
                input_path: PathBuf::from(input_path),
                arguments,
                output_path: PathBuf::from(
                    output_file_path.ok_or(DecodeError::MissingField("outputFilePath"))?,
                ),
            }
        }
        (None, Some(input_file_name)) => {
            let extension = desired_extension.ok_or(DecodeError::MissingField("desiredExtension"))?;
            let extension = extension.trim();
            JobSource::Derived {
                input_file_name,
                desired_extension: if extension.starts_with('.') {
                    extension.to_string()
                } else {
                    format!(".{}", extension)
                },
            }
        }
    };

    Ok(Job {
        id: message.id,
        source,
    })
}

/// Renders a job back into its wire body.
pub fn encode_job(job: &Job) -> Vec<u8> {
    let mut message = JobMessage {
        id: job.id,
        ..JobMessage::default()
    };

    match &job.source {
        JobSource::Explicit {
            input_path,
            arguments,
            output_path,
        } => {
            message.input_file_path = Some(input_path.to_string_lossy().into_owned());
            message.arguments = arguments.clone();
            message.output_file_path = Some(output_path.to_string_lossy().into_owned());
        }
        JobSource::Derived {
            input_file_name,
            desired_extension,
        } => {
            message.input_file_name = Some(input_file_name.clone());
            message.desired_extension = Some(desired_extension.clone());
        }
    }

    serde_json::to_vec(&message).unwrap_or_default()
}

pub fn encode_result(result: &JobResult) -> Vec<u8> {
    // A struct of integers and strings always serializes.
    serde_json::to_vec(result).unwrap_or_default()
}
