/// Alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur when building or validating core data.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The world grid violates a structural invariant.
    #[error("malformed world grid: {0}")]
    MalformedGrid(String),

    /// A cell coordinate lies outside the grid.
    #[error("cell ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        /// Requested column.
        x: u32,
        /// Requested row.
        y: u32,
        /// Grid width in cells.
        width: u32,
        /// Grid height in cells.
        height: u32,
    },

    /// A genome could not be built from the given values.
    #[error("invalid genome: {0}")]
    InvalidGenome(String),
}
