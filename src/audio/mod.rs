pub mod output;

pub use output::{AudioBackend, CpalOutput, OutputSettings};
