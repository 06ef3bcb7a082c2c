//! In-memory tabular data shapes passed between pipeline stages.
//!
//! A file moves through three shapes: [`RawRecordSet`] straight out of the
//! reader, [`TypedRecordSet`] once every column has a semantic type, and
//! [`CleanedRecordSet`] once no nulls remain. Each stage owns the set it is
//! transforming and hands it on by value.

mod record_set;
mod schema;
mod value;

pub use record_set::{CleanedRecordSet, Column, ColumnData, SemanticType, TypedRecordSet};
pub use schema::Schema;
pub use value::{RawRecordSet, RawValue};
