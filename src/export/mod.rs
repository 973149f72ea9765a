//! Result-set export: hyperlink builders and the `.xlsx` report writer.
//!
//! A straightforward formatting concern layered over the core's flat result
//! tables; nothing here feeds back into comparison.

pub mod links;
pub mod xlsx;

pub use links::{CountyLinks, DEFAULT_WINDOW_ID};
pub use xlsx::{write_table_bytes, write_table_file, ExportError};
