pub mod baseline;
pub mod change;
pub mod compare;
pub mod error;
pub mod key;
pub mod ports;
pub mod programmable_object;
pub mod scan_log;
pub mod snapshot;
pub mod target;
