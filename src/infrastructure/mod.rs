pub mod bluetooth;
pub mod logging;
pub mod serial;
pub mod worker;
