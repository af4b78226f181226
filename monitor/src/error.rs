use floorwatch_directory::DirectoryError;
use floorwatch_identity::IdentityError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("monitor: no location assigned to source {0:?}")]
    UnknownSource(String),

    #[error("monitor: refresher is not running")]
    RefresherStopped,
}
