// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.

//! # Unix Exit Codes
//!
//! Maps application results onto the conventional Unix `sysexits.h` exit
//! code space, so shell scripts driving the CLI can distinguish failure
//! kinds without parsing stderr.

use std::process::ExitCode as StdExitCode;
use upload_engine_domain::UploadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Ok = 0,
    GeneralError = 1,
    /// EX_USAGE: command line usage error.
    Usage = 64,
    /// EX_DATAERR: input data was incorrect.
    DataErr = 65,
    /// EX_UNAVAILABLE: a service is unavailable (network, KV store).
    Unavailable = 69,
    /// EX_SOFTWARE: internal software error.
    Software = 70,
    /// EX_IOERR: an I/O error occurred.
    IoErr = 74,
    /// EX_TEMPFAIL: temporary failure, the caller is invited to retry.
    TempFail = 75,
    /// EX_NOPERM: permission denied (authentication failure).
    NoPerm = 77,
}

impl From<ExitCode> for StdExitCode {
    fn from(code: ExitCode) -> Self {
        StdExitCode::from(code as u8)
    }
}

/// Maps an [`UploadError`] onto the closest matching exit code.
pub fn map_error_to_exit_code(error: &UploadError) -> ExitCode {
    match error {
        UploadError::Network(_) | UploadError::Timeout(_) | UploadError::HttpTransient { .. } => ExitCode::Unavailable,
        UploadError::HttpClient { .. } | UploadError::Validation(_) | UploadError::InvalidConfiguration(_) => {
            ExitCode::DataErr
        }
        UploadError::Authentication(_) => ExitCode::NoPerm,
        UploadError::QuotaExceeded(_) | UploadError::Persistence(_) | UploadError::ReadError(_) => ExitCode::IoErr,
        UploadError::Merge(_) | UploadError::DataCorruption(_) | UploadError::Worker(_) => ExitCode::TempFail,
        UploadError::InvalidChunk(_) | UploadError::Internal(_) => ExitCode::Software,
        UploadError::Cancelled => ExitCode::Ok,
    }
}

/// Converts a top-level application result into a process exit code.
pub fn result_to_exit_code<T>(result: Result<T, UploadError>) -> StdExitCode {
    match result {
        Ok(_) => StdExitCode::from(ExitCode::Ok),
        Err(err) => StdExitCode::from(map_error_to_exit_code(&err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_failure_maps_to_no_perm() {
        assert_eq!(map_error_to_exit_code(&UploadError::Authentication("x".into())), ExitCode::NoPerm);
    }

    #[test]
    fn cancelled_is_a_clean_exit() {
        assert_eq!(map_error_to_exit_code(&UploadError::Cancelled), ExitCode::Ok);
    }

    #[test]
    fn network_failure_maps_to_unavailable() {
        assert_eq!(map_error_to_exit_code(&UploadError::Network("x".into())), ExitCode::Unavailable);
    }

    #[test]
    fn local_read_failure_maps_to_io_err_not_unavailable() {
        assert_eq!(map_error_to_exit_code(&UploadError::ReadError("x".into())), ExitCode::IoErr);
    }
}
