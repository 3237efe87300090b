use boq_matcher::{cache, cli, config, error, export, matcher};
use boq_matcher_common::BoqLine;
use cache::JsonFileCatalog;
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use error::{BoqMatchError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use matcher::{match_lines, BatchOptions, MatchingService};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default = if verbose { "boq_matcher=debug,boq_matcher_common=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    // 不正な設定ファイルでも `config` コマンドでは直せるように検証しない
    let config = match cli.command {
        Commands::Config { .. } => Config::read()?,
        _ => Config::load()?,
    };

    match cli.command {
        Commands::Match { description, catalog, method, context } => {
            let service = MatchingService::from_config_with_catalog(&config, catalog)?;

            let result = service.match_item(&description, method, None, &context).await?;

            println!("明細: {}", description);
            println!("  品目: {} [{}]", result.matched_description, result.matched_code);
            println!("  単位: {}", if result.matched_unit.is_empty() { "-" } else { &result.matched_unit });
            println!("  単価: {:.2}", result.matched_rate);
            println!("  信頼度: {:.0}% ({})", result.confidence * 100.0, result.method);
            if cli.verbose {
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
        }

        Commands::Batch { input, catalog, method, batch_size, threshold, output, format, title } => {
            println!("📋 boq-match - 一括照合\n");

            if !input.exists() {
                return Err(BoqMatchError::FileNotFound(input.display().to_string()));
            }

            println!("[1/3] 入力を読み込み中...");
            let content = std::fs::read_to_string(&input)?;
            let lines: Vec<BoqLine> = serde_json::from_str(&content)?;
            let service = MatchingService::from_config_with_catalog(&config, catalog)?;
            let items = service.load_catalog().await?;
            println!("✔ 明細 {}件 / 品目 {}件\n", lines.len(), items.len());

            let options = BatchOptions {
                batch_size: batch_size.unwrap_or(config.default_batch_size),
                threshold: threshold.unwrap_or(config.acceptance_threshold),
            };
            if !(0.0..=1.0).contains(&options.threshold) {
                return Err(BoqMatchError::Config("threshold は0〜1の範囲で指定してください".into()));
            }

            println!("[2/3] 照合中... (方式: {}, 閾値: {})", method, options.threshold);
            let pb = ProgressBar::new(lines.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  {bar:40.cyan/blue} {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            let report = match_lines(&service, &lines, items.as_slice(), method, options, |done| {
                pb.set_position(done as u64)
            })
            .await?;
            pb.finish_and_clear();
            println!(
                "✔ {}/{}件を採用 (合計 {:.2})\n",
                report.summary.matched_lines, report.summary.total_lines, report.summary.total_value
            );

            println!("[3/3] 結果を保存中...");
            let output_dir = output.unwrap_or_else(|| std::path::PathBuf::from("."));
            export::export_report(&report, format, &output_dir, &title)?;

            println!("\n✅ 一括照合完了");
        }

        Commands::Embed { catalog, provider, output } => {
            let provider = provider.0;
            println!("🧮 boq-match - 埋め込み生成 ({})\n", provider);

            let source = JsonFileCatalog::new(&catalog);
            let mut items = source.load_all().await?;

            let service = MatchingService::from_config(&config)?;
            if !service.has_backend(provider) {
                return Err(BoqMatchError::MissingApiKey(provider.setting_key().to_string()));
            }

            let count = service.generate_catalog_embeddings(&mut items, provider).await?;
            println!("✔ {}件の品目に埋め込みを付けました", count);

            let output_path = output.unwrap_or(catalog);
            let json = serde_json::to_string_pretty(&items)?;
            std::fs::write(&output_path, json)?;
            println!("✔ 単価表を保存: {}", output_path.display());
        }

        Commands::Config { set_v1_key, set_v2_key, show } => {
            let mut config = config;

            if let Some(key) = set_v1_key {
                config.set_api_key(boq_matcher_common::EmbeddingProvider::V1, key)?;
                println!("✔ V1 APIキーを設定しました");
            }

            if let Some(key) = set_v2_key {
                config.set_api_key(boq_matcher_common::EmbeddingProvider::V2, key)?;
                println!("✔ V2 APIキーを設定しました");
            }

            if show {
                let key_state = |name: &str| {
                    if config.get_setting(name).is_some() { "設定済み" } else { "未設定" }
                };
                println!("設定: {}", Config::config_path()?.display());
                println!("  V1: {} ({})", config.v1_model, key_state(config::V1_API_KEY));
                println!("  V2: {} ({})", config.v2_model, key_state(config::V2_API_KEY));
                println!("  タイムアウト: {}秒 / リトライ: {}回", config.timeout_seconds, config.retry_attempts);
                println!("  バッチサイズ: {}", config.default_batch_size);
                println!("  採用閾値: {}", config.acceptance_threshold);
                println!("  キャッシュ: {}件 / {}秒", config.embedding_cache_capacity, config.embedding_cache_ttl_seconds);
                println!("  単価表キャッシュ: {}秒", config.catalog_cache_ttl_seconds);
                if let Err(e) = config.validate() {
                    println!("  ⚠ 設定値が不正です: {}", e);
                }
            }
        }
    }

    Ok(())
}
