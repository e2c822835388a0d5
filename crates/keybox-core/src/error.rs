use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Domain value errors
    #[error("Invalid compartment id: {0}")]
    InvalidCompartment(String),

    #[error("Invalid access code: {0}")]
    InvalidCode(String),

    #[error("Invalid remote command: {0}")]
    InvalidCommand(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // Hardware topology errors
    #[error("Hardware topology error: {0}")]
    Topology(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing configuration key: {0}")]
    MissingConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
