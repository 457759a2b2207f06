//! Hash-chained receipts for gate decisions and bus commits.

pub mod log;
pub mod receipt;

pub use log::AuditLog;
pub use receipt::{verify_chain, verify_signature, Receipt, ReceiptChain, ReceiptSubject};
