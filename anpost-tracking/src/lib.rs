mod catalog;
mod cursor;
mod error;
pub mod parser;
mod session;
mod tracker;

pub use catalog::*;
pub use cursor::{
    is_account_file, pad_account_number, FileCursor, ACCOUNT_NUMBER_WIDTH, FILE_EXTENSION,
    FILE_PREFIX, MAX_SEQUENCE_NUMBER, SEQUENCE_WIDTH,
};
pub use error::*;
pub use parser::{
    DataRecord, FooterRecord, HeaderRecord, TrackingBatch, TrackingParser, ValidationMode,
};
pub use session::*;
pub use tracker::{TrackedFile, Tracker, TrackingStream};
