//! Page-cached image and manga viewer.
//!
//! Pages come from image files, directories and archives (`collect`,
//! `archive`, `source`), are ordered (`sort`), cached (`cache`) and warmed in
//! the background (`preload`) around the position tracked by `nav`.
//! `session::Session` ties these together for the front end in `viewer`.

pub mod archive;
pub mod cache;
pub mod collect;
pub mod config;
pub mod input;
pub mod locator;
pub mod nav;
pub mod page;
pub mod preload;
pub mod session;
pub mod sort;
pub mod source;
pub mod viewer;
pub mod watch;

/// Version string with build metadata, e.g. `0.4.0 (1a2b3c4d5e, release)`.
pub const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("KOMA_BUILD_GIT_HASH"),
    ", ",
    env!("KOMA_BUILD_PROFILE"),
    ")"
);
