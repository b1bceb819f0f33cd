use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ms_core::CoreError),

    #[error("demand input error: {0}")]
    Demand(String),

    #[error(transparent)]
    Network(#[from] ms_network::NetworkError),

    #[error(transparent)]
    Driver(#[from] ms_driver::DriverError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SimResult<T> = Result<T, SimError>;
