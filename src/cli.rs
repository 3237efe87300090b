use crate::export::ExportFormat;
use boq_matcher_common::{EmbeddingProvider, MatchMethod};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "boq-match")]
#[command(about = "BOQ明細と単価表の照合ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 1件の明細を照合
    Match {
        /// 明細の記述
        #[arg(required = true)]
        description: String,

        /// 単価表JSONファイル
        #[arg(short, long)]
        catalog: PathBuf,

        /// 照合方式 (local/v1/v2)
        #[arg(short, long, default_value = "local")]
        method: MatchMethod,

        /// 見出し（複数指定可）
        #[arg(long = "context")]
        context: Vec<String>,
    },

    /// BOQ明細JSONを一括照合して価格を付ける
    Batch {
        /// BOQ明細JSONファイル
        #[arg(required = true)]
        input: PathBuf,

        /// 単価表JSONファイル
        #[arg(short, long)]
        catalog: PathBuf,

        /// 照合方式 (local/v1/v2)
        #[arg(short, long, default_value = "local")]
        method: MatchMethod,

        /// 同時に照合する件数（省略時は設定値）
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// 採用する信頼度の下限（省略時は設定値）
        #[arg(short, long)]
        threshold: Option<f64>,

        /// 出力ファイル/ディレクトリ
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 出力形式 (json/excel/both)
        #[arg(short, long, default_value = "both")]
        format: ExportFormat,

        /// ドキュメントタイトル
        #[arg(long, default_value = "priced-boq")]
        title: String,
    },

    /// 単価表の品目に埋め込みを付ける
    Embed {
        /// 単価表JSONファイル
        #[arg(short, long)]
        catalog: PathBuf,

        /// プロバイダ (v1/v2)
        #[arg(short, long)]
        provider: ProviderArg,

        /// 出力先（省略時は上書き）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 設定を表示/編集
    Config {
        /// V1（OpenAI）のAPIキーを設定
        #[arg(long)]
        set_v1_key: Option<String>,

        /// V2（Cohere）のAPIキーを設定
        #[arg(long)]
        set_v2_key: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}

/// `--provider` 引数
#[derive(Clone, Copy, Debug)]
pub struct ProviderArg(pub EmbeddingProvider);

impl std::str::FromStr for ProviderArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<MatchMethod>()?.embedding_provider() {
            Some(provider) => Ok(ProviderArg(provider)),
            None => Err(format!("{} is not an embedding provider. Use v1 or v2", s)),
        }
    }
}
