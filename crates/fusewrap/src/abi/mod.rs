//! ABI mirrors of the structs exchanged with libfuse.
//!
//! Every struct here is `#[repr(C)]`, declares its members in native order,
//! and implements [`Layout`] so the order can be checked at startup with
//! [`verify_all`]. Reserved and padding members are declared explicitly;
//! nothing relies on the compiler inserting them.

mod conn;
mod file_info;
pub mod layout;
#[cfg(feature = "native-layout")]
mod native;
mod probe;
pub(crate) mod reference;
mod stat;

pub use conn::{Capabilities, ConnectionInfo};
pub use file_info::{FileInfo, FileInfoFlags};
pub use layout::{Field, HeaderLayout, Layout, NativeLayout, ReportedLayout, verify, verify_all};
pub use probe::CTypesProbe;
pub use stat::Stat;
