mod commands;
mod project;

use clap::{Parser, Subcommand};
use stackflow_synth::OutputFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stackflow")]
#[command(about = "宣言したリソースグラフを、そのままCloudFormationへ。", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// スタックを合成してクラウドアセンブリを書き出す
    Synth {
        /// スタック名（省略時は全スタック）
        stack: Option<String>,
        /// 出力ディレクトリ（デフォルト: cdk.out）
        #[arg(short, long, env = "STACKFLOW_OUTDIR")]
        output: Option<PathBuf>,
        /// テンプレート形式 (json, yaml)
        #[arg(short, long)]
        format: Option<OutputFormat>,
    },
    /// 設定とリソースグラフを検証
    Validate {
        /// スタック名（省略時は全スタック）
        stack: Option<String>,
    },
    /// スタックの一覧を表示
    List,
    /// 依存グラフとプロビジョニング順序を表示
    Graph {
        /// スタック名（省略時は全スタック）
        stack: Option<String>,
    },
    /// 書き出し済みテンプレートとの差分を表示
    Diff {
        /// スタック名（省略時は全スタック）
        stack: Option<String>,
        /// 比較対象のアセンブリディレクトリ（デフォルト: cdk.out）
        #[arg(short, long, env = "STACKFLOW_OUTDIR")]
        output: Option<PathBuf>,
    },
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdoutはコマンド出力に使うので、ログはstderrへ
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Versionコマンドは設定ファイル不要
    if matches!(cli.command, Commands::Version) {
        println!("stackflow {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let settings = stackflow_config::Settings::load()?;

    match cli.command {
        Commands::Synth {
            stack,
            output,
            format,
        } => {
            let outdir = output.unwrap_or_else(|| settings.output_dir.clone());
            let format = match format {
                Some(format) => format,
                None => settings.format.parse().map_err(anyhow::Error::msg)?,
            };
            commands::synth::handle(&settings, stack.as_deref(), &outdir, format).await?;
        }
        Commands::Validate { stack } => {
            commands::validate::handle(&settings, stack.as_deref()).await?;
        }
        Commands::List => {
            commands::list::handle(&settings).await?;
        }
        Commands::Graph { stack } => {
            commands::graph::handle(&settings, stack.as_deref()).await?;
        }
        Commands::Diff { stack, output } => {
            let outdir = output.unwrap_or_else(|| settings.output_dir.clone());
            commands::diff::handle(&settings, stack.as_deref(), &outdir).await?;
        }
        Commands::Version => {
            unreachable!("Version is handled before config loading");
        }
    }

    Ok(())
}
