pub mod connector;
pub mod imap;
pub mod logging;
pub mod memory;
pub mod pop;
