pub mod capture;
pub mod resolver;
pub mod template;
pub mod types;

pub use capture::{Capture, CaptureSource};
pub use resolver::EnvResolver;
pub use template::{PathTemplate, RenderedPath, Template, TemplateError};
pub use types::{CaptureError, CapturedVariables};
