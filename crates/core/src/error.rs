use thiserror::Error;

use crate::moves::Move;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardError {
    #[error("move {0:?} is outside the board")]
    OutOfBounds(Move),

    #[error("vertex for {0:?} is already occupied")]
    Occupied(Move),

    #[error("move {0:?} would be suicide")]
    Suicide(Move),

    #[error("move {0:?} retakes the ko")]
    Ko(Move),

    #[error("move {0:?} is not a board vertex")]
    NotAVertex(Move),
}
