use polars::prelude::PolarsError;
use std::{io, path::PathBuf};
use thiserror::Error;
use tokio::task::JoinError;

/**
Result type to simplify function signatures.

This is a custom result type that uses our custom `BacklogViewError` for the error type.

Functions can return `BacklogViewResult<T>` and then use `?` to automatically propagate errors.
*/
pub type BacklogViewResult<T> = Result<T, BacklogViewError>;

/**
Custom error type for Backlog View.

This enum defines all the possible errors that can occur in the application.

We use the `thiserror` crate to derive the `Error` trait and automatically
implement `Display` using the `#[error(...)]` attribute.

Note that workbook *load* failures are deliberately not represented here:
the loader recovers from them locally and surfaces a message instead, so the
dashboard always renders (see `loader.rs`).
*/
#[derive(Error, Debug)]
pub enum BacklogViewError {
    // Wrapper for standard IO errors.
    // The #[from] attribute automatically converts io::Error to BacklogViewError::Io.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // Wrapper for Polars errors (from the Polars library).
    // #[from] handles conversion. Handles errors from Polars operations,
    // including failed filters, joins or sorts on the loaded frames.
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    // Errors encountered while reading an Excel workbook (corrupt archive, bad sheet data).
    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    // Indicates that a specified workbook could not be found, storing the attempted path.
    #[error("File not found: {0:#?}")]
    FileNotFound(PathBuf),

    // Indicates that a workbook does not contain the requested sheet index.
    #[error("Sheet {sheet} not found in {path:#?}")]
    SheetNotFound { path: PathBuf, sheet: usize },

    // Indicates that a provided file extension or file type are not supported.
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    // Wrapper for Tokio JoinErrors, occurring when asynchronous tasks fail.
    #[error("Tokio JoinError: {0}")]
    TokioJoin(#[from] JoinError),

    // Errors occurring when receiving data from asynchronous channels,
    // such as the load pipe closing before a result arrived.
    #[error("Channel receive error: {0}")]
    ChannelReceive(String),
}

//----------------------------------------------------------------------------//
//                                    Tests                                   //
//----------------------------------------------------------------------------//

/// Run tests with:
/// cargo test -- --show-output tests_error`
#[cfg(test)]
mod tests_error {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = BacklogViewError::ChannelReceive(
            "Data operation terminated without response.".to_string(),
        );
        assert_eq!(
            err.to_string(),
            "Channel receive error: Data operation terminated without response."
        );

        let err = BacklogViewError::SheetNotFound {
            path: PathBuf::from("backlog.xlsx"),
            sheet: 7,
        };
        assert!(err.to_string().contains("Sheet 7"));
        assert!(err.to_string().contains("backlog.xlsx"));
    }
}
