use crate::types::FailureReason;
use std::net::Ipv6Addr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed address: {0}")]
    MalformedAddress(String),
    #[error("address already assigned: {0}")]
    DuplicateAddress(String),
    #[error("{0} is not a global unicast address (2000::/3)")]
    InvalidAddressClass(Ipv6Addr),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("address resolution failed: {0}")]
    ResolutionFailed(FailureReason),
    #[error("config error")]
    Config(#[from] config::ConfigError),
    #[error("std io errors")]
    Io(#[from] std::io::Error),
}
