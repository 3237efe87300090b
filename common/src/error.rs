//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("Catalog is empty: no price items to match against")]
    EmptyCatalog,

    #[error("Config error: {0}")]
    Config(String),
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_empty_catalog() {
        let display = format!("{}", Error::EmptyCatalog);
        assert!(display.contains("Catalog is empty"));
    }

    #[test]
    fn test_error_display_config() {
        let error = Error::Config("重みの値が不正です".to_string());
        let display = format!("{}", error);
        assert_eq!(display, "Config error: 重みの値が不正です");
    }
}
