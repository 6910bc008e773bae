#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("run time cache is no longer running")]
    ChannelClosed,
    #[error("run time cache thread failed: {0}")]
    ActorFailure(String),
    #[error("failure writing run times: {0}")]
    Write(String),
}
