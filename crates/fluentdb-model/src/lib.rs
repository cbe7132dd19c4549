//! DynamoDB wire model types for fluentdb.
//!
//! These are the request and response shapes the expression compiler and the
//! execution engine in `fluentdb-core` produce and consume. They are
//! hand-written serde types matching the DynamoDB JSON protocol
//! (`awsJson1_0`), covering the item-level operations only.
// "DynamoDB" appears in virtually every doc comment in this crate.
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]
#![allow(missing_docs)]

pub mod attribute_value;
pub mod error;
pub mod input;
pub mod operations;
pub mod output;
pub mod types;

pub use attribute_value::AttributeValue;
pub use error::{DynamoDBError, DynamoDBErrorCode};
pub use operations::DynamoDBOperation;
pub use types::{Item, Key};
