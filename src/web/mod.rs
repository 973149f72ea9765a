//! Browser-based interface: upload two exports, tune the comparison, and
//! download the hyperlinked reports.

pub mod server;
