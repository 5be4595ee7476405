use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("trace-recorder stream error: {0}")]
    TraceRecorder(String),

    #[error(transparent)]
    Ir(#[from] ctf_ir::Error),

    #[error(transparent)]
    Graph(#[from] ctf_graph::Error),

    #[error("failed to install the Ctrl-C signal handler")]
    CtrlC(#[from] ctrlc::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
