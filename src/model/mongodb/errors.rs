//! The mongodb crate doesn't provide error code constants; this module fills
//! in the ones we need.

use mongodb::error::{Error as DbError, ErrorKind, WriteFailure};

pub const DUPLICATE_KEY: i32 = 11000;

/// Return true if the given error is a duplicate key write error, whether from
/// a single insert or from any entry of a bulk insert.
pub fn is_duplicate_key_error(err: &DbError) -> bool {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref e)) => e.code == DUPLICATE_KEY,
        ErrorKind::BulkWrite(ref failure) => failure
            .write_errors
            .as_ref()
            .map_or(false, |errors| errors.iter().any(|e| e.code == DUPLICATE_KEY)),
        _ => false,
    }
}
