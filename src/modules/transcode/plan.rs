use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::command::{split_arguments, ArgumentError, DEFAULT_CONVERT_ARGUMENTS};
use super::job::{Job, JobSource};
use crate::config::settings::FoldersSettings;

/// Concrete paths and argv for one job, resolved against the folder roots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobPlan {
    pub input_path: PathBuf,
    pub arguments: Vec<String>,
    pub output_path: PathBuf,
    pub thumbnail_path: PathBuf,
}

fn parent_or_current(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

impl JobPlan {
    pub fn resolve(job: &Job, folders: &FoldersSettings) -> Result<Self, ArgumentError> {
        let (input_path, arguments, output_path) = match &job.source {
            JobSource::Explicit {
                input_path,
                arguments,
                output_path,
            } => (
                input_path.clone(),
                match arguments {
                    Some(raw) => split_arguments(raw)?,
                    None => Vec::new(),
                },
                output_path.clone(),
            ),
            JobSource::Derived {
                input_file_name,
                desired_extension,
            } => {
                let input_path = match &folders.input {
                    Some(root) => root.join(input_file_name),
                    None => PathBuf::from(input_file_name),
                };
                let output_dir = folders
                    .output
                    .clone()
                    .unwrap_or_else(|| parent_or_current(&input_path));
                let output_path = output_dir.join(format!("{}{}", Uuid::new_v4(), desired_extension));
                let arguments = DEFAULT_CONVERT_ARGUMENTS.iter().map(|a| a.to_string()).collect();
                (input_path, arguments, output_path)
            }
        };

        let thumbnail_dir = folders
            .thumbnails
            .clone()
            .unwrap_or_else(|| parent_or_current(&output_path));
        let thumbnail_path = thumbnail_dir.join(format!("{}.jpg", Uuid::new_v4()));

        Ok(Self {
            input_path,
            arguments,
            output_path,
            thumbnail_path,
        })
    }
}
