//! reelkit-common: shared path conventions.
//!
//! Every component that touches the filesystem agrees on a few naming rules:
//!
//! - **Candidates** are matched by extension, case-insensitively
//! - **Repack output** keeps the base name and swaps the extension
//! - **Backups** append `.bak` to the full file name
//! - **Sidecar thumbnails** live in a per-directory folder, keyed by the
//!   lowercased base name
//!
//! # Examples
//!
//! ```
//! use reelkit_common::paths::{backup_path, has_extension, with_replaced_extension};
//! use std::path::Path;
//!
//! let input = Path::new("/media/Movie.MKV");
//! assert!(has_extension(input, "mkv"));
//! assert_eq!(with_replaced_extension(input, "mp4"), Path::new("/media/Movie.mp4"));
//! assert_eq!(backup_path(input), Path::new("/media/Movie.MKV.bak"));
//! ```

pub mod paths;

pub use paths::{
    backup_path, has_extension, is_video_file, sidecar_thumbnail_path, with_replaced_extension,
};
