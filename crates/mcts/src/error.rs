use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("board error: {0}")]
    Board(#[from] goban_core::BoardError),

    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

pub type Result<T> = std::result::Result<T, SearchError>;
