use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("channel {channel} rejected the message: {reason}")]
    Delivery { channel: String, reason: String },

    #[error("no channel registered for {0}")]
    UnknownChannel(String),

    #[error("smtp transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("email build error: {0}")]
    Email(#[from] lettre::error::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
