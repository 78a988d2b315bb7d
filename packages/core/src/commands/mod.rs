//! Individual tag commands built on top of the [`crate::wrapper`] framing
//! layer. Each submodule owns one command's header/body layout and response
//! parsing; none of them touch the transport or the session's internals
//! directly beyond what [`crate::wrapper::exec_wrapped`] exposes.

pub mod change_file_settings;
pub mod change_key;
pub mod get_file_counters;
pub mod get_file_settings;
pub mod get_key_version;
pub mod get_version;
pub mod read_data;
pub mod select_application;
pub mod write_data;

pub use change_file_settings::change_file_settings;
pub use change_key::change_key;
pub use get_file_counters::{get_file_counters, FileCounters};
pub use get_file_settings::get_file_settings;
pub use get_key_version::get_key_version;
pub use get_version::{get_version, VersionInfo};
pub use read_data::read_data;
pub use select_application::select_application;
pub use write_data::write_data;
