//! Neo 시세 세션 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # TCS 시세 스트림 + 추세 신호
//! neo stream --symbols "nse_cm|11536"
//!
//! # 여러 종목, 변동성 호가 엔진
//! neo stream --symbols "nse_cm|11536,nse_cm|1594" --engine volatility_quote
//!
//! # 주문/포지션 업데이트 (HSI 소켓)
//! neo updates
//!
//! # 백엔드 조회
//! neo funds
//! neo limits --seg CASH
//! neo search tcs
//! neo watchlist user-1 wl-1
//!
//! # 지정가 매수
//! neo order --symbol TCS-EQ --side buy --qty 1 --price 3500
//! ```

use clap::{Parser, Subcommand};
use neo_core::{init_logging, AppConfig, EngineKind, LogConfig};
use tracing::info;

mod commands;

use commands::backend::{self as backend_cmd, OrderArgs};
use commands::stream::{self as stream_cmd, StreamArgs};

#[derive(Parser)]
#[command(name = "neo")]
#[command(about = "Neo CLI - 실시간 시세 세션과 신호 엔진", long_about = None)]
#[command(version)]
struct Cli {
    /// 설정 파일
    #[arg(short, long, global = true, default_value = "config/default.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 시세 스트림 구독 및 신호 엔진 실행 (Ctrl-C로 종료)
    Stream {
        /// 스크립 키 목록 (쉼표 구분, 예: nse_cm|11536,bse_cm|500325)
        #[arg(short, long)]
        symbols: String,

        /// 구독 채널 번호
        #[arg(long, default_value = "1")]
        channel: u32,

        /// 엔진 종류 (trend_target, trend_window, volatility_quote)
        #[arg(short, long)]
        engine: Option<String>,
    },

    /// 주문/포지션 업데이트 수신 (Ctrl-C로 종료)
    Updates,

    /// 가용 자금 조회
    Funds,

    /// 한도 조회
    Limits {
        #[arg(long, default_value = "ALL")]
        seg: String,

        #[arg(long, default_value = "ALL")]
        exch: String,

        #[arg(long, default_value = "ALL")]
        prod: String,
    },

    /// 종목 검색
    Search {
        /// 검색어
        term: String,
    },

    /// 관심종목 조회
    Watchlist {
        /// 사용자 ID
        user_id: String,

        /// 관심종목 ID
        watchlist_id: String,
    },

    /// 일반 주문 제출
    Order {
        /// 거래 심볼 (예: TCS-EQ)
        #[arg(long)]
        symbol: String,

        /// 거래소 세그먼트
        #[arg(long, default_value = "nse_cm")]
        segment: String,

        /// 매수/매도 (buy, sell)
        #[arg(long)]
        side: String,

        /// 수량
        #[arg(long)]
        qty: u32,

        /// 지정가 (생략 시 시장가)
        #[arg(long)]
        price: Option<String>,

        /// 상품 유형 (cnc, mis, nrml)
        #[arg(long, default_value = "cnc")]
        product: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;

    // 로깅 초기화 (RUST_LOG 우선)
    init_logging(LogConfig::from_settings(&config.logging))
        .map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {}", e))?;
    info!(config = %cli.config, "설정 로드 완료");

    match cli.command {
        Commands::Stream {
            symbols,
            channel,
            engine,
        } => {
            let engine = engine
                .map(|e| e.parse::<EngineKind>())
                .transpose()
                .map_err(anyhow::Error::msg)?;
            stream_cmd::run_stream(
                &config,
                StreamArgs {
                    symbols,
                    channel,
                    engine,
                },
            )
            .await?;
        }

        Commands::Updates => stream_cmd::run_updates(&config).await?,

        Commands::Funds => backend_cmd::funds(&config).await?,

        Commands::Limits { seg, exch, prod } => {
            backend_cmd::limits(&config, seg, exch, prod).await?
        }

        Commands::Search { term } => backend_cmd::search(&config, &term).await?,

        Commands::Watchlist {
            user_id,
            watchlist_id,
        } => backend_cmd::watchlist(&config, &user_id, &watchlist_id).await?,

        Commands::Order {
            symbol,
            segment,
            side,
            qty,
            price,
            product,
        } => {
            backend_cmd::order(
                &config,
                OrderArgs {
                    symbol,
                    segment,
                    side,
                    qty,
                    price,
                    product,
                },
            )
            .await?
        }
    }

    Ok(())
}
