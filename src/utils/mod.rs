pub mod output;
pub use output::{batch_output_paths, save_output, write_audio, write_metadata};
