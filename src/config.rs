//! Default locations for exported models.

use std::path::PathBuf;

use crate::export::MODEL_FILE_NAME;

/// Where models are written and read when no path is given.
pub const DEFAULT_MODEL_DIR: &str = "../public/models";

/// Overrides [`DEFAULT_MODEL_DIR`].
pub const MODEL_DIR_ENV: &str = "DOUBLE_VECTOR_MODEL_DIR";

pub fn model_dir() -> PathBuf {
    resolve_model_dir(std::env::var(MODEL_DIR_ENV).ok())
}

pub fn default_model_path() -> PathBuf {
    model_dir().join(MODEL_FILE_NAME)
}

fn resolve_model_dir(from_env: Option<String>) -> PathBuf {
    from_env
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_model_dir() {
        assert_eq!(resolve_model_dir(None), PathBuf::from("../public/models"));
        assert_eq!(resolve_model_dir(Some(String::new())), PathBuf::from("../public/models"));
        assert_eq!(resolve_model_dir(Some("/srv/models".into())), PathBuf::from("/srv/models"));
    }
}
