// src/ui/widgets/mod.rs

// Declare all of our widget modules here.

pub mod footer; // The dynamic footer bar.
pub mod input; // The URL input field.
pub mod report_view; // The per-module trust report.
pub mod summary; // The high-level scan summary.
