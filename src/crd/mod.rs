pub mod data_volume;
pub mod virtual_machine;

pub use data_volume::*;
pub use virtual_machine::*;
