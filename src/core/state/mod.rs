pub mod settings;

pub use settings::{default_data_dir, staging_dir, Settings};
