use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::config::env::{self, EnvKey};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value '{value}' for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Whether the idle delay also applies after an envelope has been processed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdleDelayPolicy {
    Always,
    EmptyPollOnly,
}

impl FromStr for IdleDelayPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "empty-poll" | "empty_poll" | "empty-poll-only" => Ok(Self::EmptyPollOnly),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SqsSettings {
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// Custom endpoint (ElasticMQ, LocalStack). `None` uses the regional AWS endpoint.
    pub endpoint: Option<String>,
}

#[derive(Clone, Debug)]
pub enum QueueBackend {
    Sqs(SqsSettings),
    RabbitMq { amqp_url: String },
}

#[derive(Clone, Debug)]
pub struct QueueConfig {
    pub backend: QueueBackend,
    /// SQS queue URL, or the queue name for RabbitMQ.
    pub input_queue_url: String,
    pub output_queue_url: String,
}

/// Folder roots used when a job names files instead of full paths.
#[derive(Clone, Debug, Default)]
pub struct FoldersSettings {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub thumbnails: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct WorkerSettings {
    pub ffmpeg_path: PathBuf,
    pub idle_delay: Duration,
    pub receive_wait: Duration,
    pub folders: FoldersSettings,
    pub delete_on_transcode_failure: bool,
    pub delete_undecodable: bool,
    pub idle_delay_policy: IdleDelayPolicy,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            idle_delay: Duration::from_secs(5),
            receive_wait: Duration::from_secs(20),
            folders: FoldersSettings::default(),
            delete_on_transcode_failure: true,
            delete_undecodable: true,
            idle_delay_policy: IdleDelayPolicy::Always,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
        }
    }
}

/// Process-wide configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub queue: QueueConfig,
    pub worker: WorkerSettings,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self {
            queue: QueueConfig::from_env()?,
            worker: WorkerSettings::from_env()?,
        })
    }
}

fn required(key: EnvKey) -> Result<String, ConfigError> {
    let name = key.as_str();
    env::get_opt(key).ok_or(ConfigError::Missing(name))
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Reads a policy switch. Unset means `default`; anything unrecognised is rejected.
fn flag(key: EnvKey, default: bool) -> Result<bool, ConfigError> {
    let name = key.as_str();
    flag_value(name, env::get_opt(key), default)
}

fn flag_value(name: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match raw {
        Some(raw) => parse_flag(&raw).ok_or(ConfigError::Invalid { key: name, value: raw }),
        None => Ok(default),
    }
}

impl QueueConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let backend = match env::get_or(EnvKey::QueueBackend, "sqs")
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "sqs" => QueueBackend::Sqs(SqsSettings {
                region: env::get_or(EnvKey::AwsRegion, "eu-central-1"),
                access_key: required(EnvKey::AwsAccessKey)?,
                secret_key: required(EnvKey::AwsSecretKey)?,
                endpoint: env::get_opt(EnvKey::SqsEndpoint),
            }),
            "rabbitmq" | "amqp" => QueueBackend::RabbitMq {
                amqp_url: required(EnvKey::AmqpUrl)?,
            },
            other => {
                return Err(ConfigError::Invalid {
                    key: EnvKey::QueueBackend.as_str(),
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            backend,
            input_queue_url: required(EnvKey::InputQueueUrl)?,
            output_queue_url: required(EnvKey::OutputQueueUrl)?,
        })
    }
}

impl WorkerSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let idle_delay_policy = match env::get_opt(EnvKey::IdleDelayPolicy) {
            Some(raw) => raw.parse::<IdleDelayPolicy>().map_err(|value| ConfigError::Invalid {
                key: EnvKey::IdleDelayPolicy.as_str(),
                value,
            })?,
            None => defaults.idle_delay_policy,
        };

        Ok(Self {
            ffmpeg_path: PathBuf::from(env::get_or(EnvKey::FfmpegPath, "ffmpeg")),
            idle_delay: Duration::from_secs(env::get_parsed(EnvKey::WorkerDelaySeconds, 5)),
            // SQS caps long polling at 20 seconds.
            receive_wait: Duration::from_secs(env::get_parsed(EnvKey::ReceiveWaitSeconds, 20u64).min(20)),
            folders: FoldersSettings {
                input: env::get_opt(EnvKey::InputFolder).map(PathBuf::from),
                output: env::get_opt(EnvKey::OutputFolder).map(PathBuf::from),
                thumbnails: env::get_opt(EnvKey::ThumbnailsFolder).map(PathBuf::from),
            },
            delete_on_transcode_failure: flag(
                EnvKey::DeleteOnTranscodeFailure,
                defaults.delete_on_transcode_failure,
            )?,
            delete_undecodable: flag(EnvKey::DeleteUndecodable, defaults.delete_undecodable)?,
            idle_delay_policy,
            backoff_base: Duration::from_millis(env::get_parsed(EnvKey::BackoffBaseMs, 1000)),
            backoff_max: Duration::from_secs(env::get_parsed(EnvKey::BackoffMaxSeconds, 60)),
        })
    }
}
