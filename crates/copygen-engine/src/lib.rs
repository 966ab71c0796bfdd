pub mod config;
pub mod decode;
pub mod error;
pub mod generator;
pub mod http;
pub mod image;
pub mod mock;
pub mod prompt;
pub mod stream;
pub mod transport;
pub mod workbench;

pub use config::{GeneratorConfig, GeneratorMode, HttpConfig};
pub use error::{ErrorKind, GenerateError, ImageError};
pub use generator::Generator;
pub use image::{ImageAdapter, ImageOutcome};
pub use workbench::{Notice, Notifier, Workbench};
