use thiserror::Error;

#[derive(Error, Debug)]
pub enum BoqMatchError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("{0} が設定されていません。`boq-match config --set-v1-key KEY` などで設定してください")]
    MissingApiKey(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("単価表が不正: {0}")]
    InvalidCatalog(String),

    #[error("埋め込みAPI呼び出しエラー: {0}")]
    EmbeddingApi(String),

    #[error("埋め込みAPIレスポンスのパースに失敗: {0}")]
    EmbeddingParse(String),

    #[error("タイムアウト: {0}秒以内に応答がありません")]
    Timeout(u64),

    #[error("HTTPエラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("Excel生成エラー: {0}")]
    ExcelGeneration(String),

    #[error(transparent)]
    Common(#[from] boq_matcher_common::Error),
}

pub type Result<T> = std::result::Result<T, BoqMatchError>;
