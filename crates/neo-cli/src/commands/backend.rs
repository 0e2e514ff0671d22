//! 백엔드 REST 조회/주문 명령.

use std::str::FromStr;

use anyhow::{bail, Context};
use neo_core::AppConfig;
use neo_exchange::backend::{LimitsQuery, OrderRequest, OrderSide, ProductType};
use neo_exchange::{BackendClient, FundsService, OrderService, WatchlistService};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::info;

/// `neo order` 인자.
pub struct OrderArgs {
    pub symbol: String,
    pub segment: String,
    pub side: String,
    pub qty: u32,
    pub price: Option<String>,
    pub product: String,
}

fn client(config: &AppConfig) -> anyhow::Result<BackendClient> {
    BackendClient::new(&config.backend).context("백엔드 클라이언트 생성 실패")
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// 가용 자금 조회.
pub async fn funds(config: &AppConfig) -> anyhow::Result<()> {
    let value = client(config)?.funds().await?;
    print_json(&value)
}

/// 한도 조회.
pub async fn limits(
    config: &AppConfig,
    seg: String,
    exch: String,
    prod: String,
) -> anyhow::Result<()> {
    let query = LimitsQuery { seg, exch, prod };
    let value = client(config)?.limits(&query).await?;
    print_json(&value)
}

/// 종목 검색.
pub async fn search(config: &AppConfig, term: &str) -> anyhow::Result<()> {
    let value = client(config)?.search_stocks(term).await?;
    print_json(&value)
}

/// 관심종목 조회.
pub async fn watchlist(config: &AppConfig, user_id: &str, watchlist_id: &str) -> anyhow::Result<()> {
    let value = client(config)?
        .watchlist(user_id, watchlist_id)
        .await?;
    print_json(&value)
}

/// 주문 제출.
pub async fn order(config: &AppConfig, args: OrderArgs) -> anyhow::Result<()> {
    let request = build_order(args)?;
    info!(
        symbol = %request.symbol,
        side = %request.side,
        quantity = request.quantity,
        price = %request.price,
        "주문 제출"
    );
    let value = client(config)?.place_order(&request).await?;
    print_json(&value)
}

fn parse_side(side: &str) -> anyhow::Result<OrderSide> {
    match side.to_lowercase().as_str() {
        "buy" | "b" => Ok(OrderSide::Buy),
        "sell" | "s" => Ok(OrderSide::Sell),
        other => bail!("알 수 없는 주문 방향: {}", other),
    }
}

fn parse_product(product: &str) -> anyhow::Result<ProductType> {
    match product.to_lowercase().as_str() {
        "cnc" | "cash" => Ok(ProductType::Cash),
        "mis" | "intraday" => Ok(ProductType::Intraday),
        "nrml" | "normal" => Ok(ProductType::Normal),
        other => bail!("알 수 없는 상품 유형: {}", other),
    }
}

fn build_order(args: OrderArgs) -> anyhow::Result<OrderRequest> {
    if args.qty == 0 {
        bail!("주문 수량은 0보다 커야 합니다");
    }
    let side = parse_side(&args.side)?;
    let product = parse_product(&args.product)?;

    let request = match args.price {
        Some(price) => {
            let price = Decimal::from_str(&price)
                .with_context(|| format!("잘못된 가격: {}", price))?;
            OrderRequest::limit(args.symbol, args.segment, side, args.qty, price)
        }
        None => OrderRequest::market(args.symbol, args.segment, side, args.qty),
    };
    Ok(request.with_product(product))
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo_exchange::backend::PriceType;
    use rust_decimal_macros::dec;

    fn args(price: Option<&str>) -> OrderArgs {
        OrderArgs {
            symbol: "TCS-EQ".to_string(),
            segment: "nse_cm".to_string(),
            side: "buy".to_string(),
            qty: 2,
            price: price.map(str::to_string),
            product: "mis".to_string(),
        }
    }

    #[test]
    fn test_limit_order_from_args() {
        let order = build_order(args(Some("3500.5"))).unwrap();
        assert_eq!(order.price_type, PriceType::Limit);
        assert_eq!(order.price, dec!(3500.5));
        assert_eq!(order.side, OrderSide::Buy);
        assert_eq!(order.product, ProductType::Intraday);
        assert_eq!(order.segment.code(), "nse_cm");
    }

    #[test]
    fn test_market_order_without_price() {
        let order = build_order(args(None)).unwrap();
        assert_eq!(order.price_type, PriceType::Market);
        assert_eq!(order.price, Decimal::ZERO);
    }

    #[test]
    fn test_invalid_order_args_rejected() {
        assert!(build_order(args(Some("abc"))).is_err());

        let mut zero = args(None);
        zero.qty = 0;
        assert!(build_order(zero).is_err());

        let mut side = args(None);
        side.side = "hold".to_string();
        assert!(build_order(side).is_err());
    }
}
