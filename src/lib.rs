//! # pixbatch
//!
//! Clipboard image saving and batch image resizing/conversion.
//!
//! Two tools share one pipeline:
//!
//! - **paste** takes the image on the system clipboard (or one file) and saves
//!   it as `pasted-image.<ext>` in PNG, JPEG or WebP.
//! - **convert** collects images into a queue, works out each one's output
//!   size from the width/height inputs and the lock toggles, re-encodes them
//!   in parallel, and delivers one file per image or a single zip.
//!
//! # Pipeline
//!
//! ```text
//! paths / clipboard ─▶ acquire ─▶ ImageQueue ─▶ resolve size ─▶ encode ─▶ package ─▶ sink
//!                        │                                        │          │
//!                        └ skipped / failed                       └ failed   └ zip or files
//! ```
//!
//! Failures are per item. An unsupported file, a corrupt image or an encoder
//! error drops that one image and is reported; everything else carries on.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`acquire`] | Paths and clipboard bytes → decoded [`acquire::QueuedImage`]s; the [`acquire::ImageQueue`] |
//! | [`imaging`] | Dimension resolver, `ImageBackend` trait, pure-Rust codecs, legacy-format transcoders |
//! | [`package`] | Zip building and delivery through a [`package::DownloadSink`] |
//! | [`clipboard`] | [`clipboard::ClipboardSource`] over `arboard`, and the paste tool |
//! | [`session`] | The batch converter's state: queue, locks, inputs, busy flag |
//! | [`config`] | `pixbatch.toml` loading, validation and merging |
//! | [`naming`] | Display names and output filenames |
//! | [`output`] | CLI message formatting |
//!
//! # Design Decisions
//!
//! ## Pure-Rust Imaging
//!
//! Decoding and encoding use the `image` crate; AVIF input goes through
//! `avif-parse` and `rav1d`. No system libraries are needed, so the binary is
//! self-contained. HEIC/HEIF has no pure-Rust decoder and is reported as a
//! per-item failure.
//!
//! ## Stretch, Don't Crop
//!
//! The resolved size is applied exactly. When both axes are set independently
//! the image is stretched; keeping the aspect ratio is the job of the ratio
//! lock, not of the encoder.
//!
//! ## Nothing Partial
//!
//! A conversion waits for every image before packaging. An archive is built
//! completely in memory before it reaches the sink, and files are written via
//! a temporary file and rename.

pub mod acquire;
pub mod clipboard;
pub mod config;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod package;
pub mod session;
