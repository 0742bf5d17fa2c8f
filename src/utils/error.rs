use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("could not initialize renderer: {0}")]
    RendererInit(String),

    #[error("could not render results page {page}: {message}")]
    Render { page: u32, message: String },

    #[error("item store is already running")]
    AlreadyRunning,

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn render(page: u32, message: impl Into<String>) -> Self {
        AppError::Render {
            page,
            message: message.into(),
        }
    }
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_error_display() {
        let err = AppError::render(2, "timed out waiting for page load");
        assert_eq!(
            err.to_string(),
            "could not render results page 2: timed out waiting for page load"
        );
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
    }

    #[test]
    fn test_renderer_init_error_display() {
        let err = AppError::RendererInit("chrome binary not found".to_string());
        assert!(err.to_string().contains("chrome binary not found"));
    }
}
