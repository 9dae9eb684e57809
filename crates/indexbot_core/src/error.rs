use thiserror::Error;

/// Problems with a talk page's opt-in configuration. These are reported per
/// page and never abort a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unable to find the {0} template, maybe it is wrapped in another template?")]
    MissingOptIn(String),
    #[error("missing |target=")]
    MissingTarget,
    #[error("missing |mask=")]
    MissingMask,
    #[error("mask {0} needs |first_archive=")]
    MissingFirstArchive(String),
    #[error("first_archive {first_archive} does not match mask {mask}")]
    FirstArchiveMismatch { mask: String, first_archive: String },
    #[error("target [[{0}]] does not exist")]
    TargetMissing(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Wiki(#[from] anyhow::Error),
}
