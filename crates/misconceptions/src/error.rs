use motd_common::images::ImageError;
use motd_common::wiki::WikiError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Wiki(#[from] WikiError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("config error: {0}")]
    Config(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("the collection is empty; run `misconceptions scrape` first")]
    EmptyCollection,
}
