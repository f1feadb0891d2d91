//! Host information

pub mod device_info;

pub use device_info::system_id;
