use std::env;
use std::str::FromStr;

pub enum EnvKey {
    QueueBackend,
    InputQueueUrl,
    OutputQueueUrl,
    AwsRegion,
    AwsAccessKey,
    AwsSecretKey,
    SqsEndpoint,
    AmqpUrl,
    FfmpegPath,
    WorkerDelaySeconds,
    ReceiveWaitSeconds,
    InputFolder,
    OutputFolder,
    ThumbnailsFolder,
    DeleteOnTranscodeFailure,
    DeleteUndecodable,
    IdleDelayPolicy,
    BackoffBaseMs,
    BackoffMaxSeconds,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::QueueBackend => "QUEUE_BACKEND",
            EnvKey::InputQueueUrl => "INPUT_QUEUE_URL",
            EnvKey::OutputQueueUrl => "OUTPUT_QUEUE_URL",
            EnvKey::AwsRegion => "AWS_REGION",
            EnvKey::AwsAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::AwsSecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::SqsEndpoint => "SQS_ENDPOINT",
            EnvKey::AmqpUrl => "AMQP_URL",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::WorkerDelaySeconds => "WORKER_DELAY_SECONDS",
            EnvKey::ReceiveWaitSeconds => "RECEIVE_WAIT_SECONDS",
            EnvKey::InputFolder => "INPUT_FOLDER",
            EnvKey::OutputFolder => "OUTPUT_FOLDER",
            EnvKey::ThumbnailsFolder => "THUMBNAILS_FOLDER",
            EnvKey::DeleteOnTranscodeFailure => "DELETE_ON_TRANSCODE_FAILURE",
            EnvKey::DeleteUndecodable => "DELETE_UNDECODABLE",
            EnvKey::IdleDelayPolicy => "IDLE_DELAY_POLICY",
            EnvKey::BackoffBaseMs => "BACKOFF_BASE_MS",
            EnvKey::BackoffMaxSeconds => "BACKOFF_MAX_SECONDS",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

/// Like [`get`], but treats an unset or blank variable as absent.
pub fn get_opt(key: EnvKey) -> Option<String> {
    env::var(key.as_str()).ok().filter(|v| !v.trim().is_empty())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
