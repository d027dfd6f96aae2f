//! Compile-time constant tables, indexed by `(fs_idx, frame_dms)` where
//! applicable, per § 9's "Global-looking state" guidance: no process-wide
//! mutable data, only read-only tables the pipeline consults by index.

pub mod mdct_tables;
pub mod pvq_tables;
pub mod quant_tables;
pub mod windows;

pub use mdct_tables::*;
pub use pvq_tables::*;
pub use quant_tables::*;
pub use windows::*;
