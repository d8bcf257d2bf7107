use analytics::{LeaderboardPeriod, Outcome, TradeFilter};
use chrono::{DateTime, Duration, Utc};
use core_types::{
    AssetClass, CloseReason, Error, Instrument, Leverage, Order, PositionId, ProtectiveLevels, Quote, RejectReason,
    Side, StrategyConfig, Symbol,
};
use engine::{Session, SessionConfig, SessionTask};
use execution::Placement;
use risk::MarginLevel;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn start() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH + Duration::days(20_000)
}

fn eurusd() -> Symbol {
    Symbol::from("EURUSD")
}

/// A session with a spreadless EUR/USD so fills land exactly on the mid.
fn session() -> Session {
    let catalog = vec![
        Instrument::new("EURUSD", "Euro / US Dollar", AssetClass::Forex, dec!(0.0001), dec!(1.0850))
            .with_spread(Decimal::ZERO),
        Instrument::new("BTCUSD", "Bitcoin / US Dollar", AssetClass::Crypto, dec!(0.01), dec!(64_000)),
    ];
    let mut session = Session::new(
        catalog,
        SessionConfig {
            seed: Some(3),
            start: start(),
            ..SessionConfig::default()
        },
    );
    session.select_instrument(&eurusd()).unwrap();
    session
}

fn quote(price: Decimal, secs: i64) -> Quote {
    Quote::new(eurusd(), price, Decimal::ZERO, start() + Duration::seconds(secs))
}

fn buy_eurusd(session: &mut Session) -> PositionId {
    let order = Order::market("EURUSD", Side::Buy, dec!(1000), Leverage(10));
    match session.place_order(order).unwrap() {
        Placement::Filled(position) => {
            assert_eq!(position.open_price, dec!(1.0850));
            position.id
        }
        other => panic!("expected a fill, got {:?}", other),
    }
}

#[test]
fn test_margin_mark_to_market_and_stop_loss() {
    let mut session = session();
    let id = buy_eurusd(&mut session);

    let snapshot = session.portfolio_snapshot();
    assert_eq!(snapshot.used_margin, dec!(108.50));
    assert_eq!(snapshot.free_margin, dec!(9891.50));

    session.ingest_quote(quote(dec!(1.0860), 1)).unwrap();
    let snapshot = session.portfolio_snapshot();
    assert_eq!(snapshot.unrealized_pnl, dec!(1.00));
    assert_eq!(snapshot.equity, dec!(10001.00));
    assert_eq!(snapshot, session.portfolio_snapshot());

    let levels = ProtectiveLevels {
        stop_loss: Some(dec!(1.0820)),
        take_profit: None,
    };
    session.modify_position(id, levels).unwrap();

    let report = session.ingest_quote(quote(dec!(1.0815), 2)).unwrap();
    assert_eq!(report.closed.len(), 1);
    let closed = &report.closed[0];
    assert_eq!(closed.close_price, Some(dec!(1.0815)));
    assert_eq!(closed.close_reason, Some(CloseReason::StopLoss));
    assert_eq!(closed.realized_pnl, Some(dec!(-3.50)));

    assert!(session.open_positions().is_empty());
    let snapshot = session.portfolio_snapshot();
    assert_eq!(snapshot.balance, dec!(9996.50));
    assert_eq!(snapshot.margin_level, MarginLevel::Unbounded);

    let history = session.trade_history(&TradeFilter::all());
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].pips, dec!(-35));

    let report = session.performance(&TradeFilter::all());
    assert_eq!(report.total_trades, 1);
    assert_eq!(report.losing_trades, 1);
    assert_eq!(report.net_profit, dec!(-3.50));
    assert_eq!(report.profit_factor, Some(0.0));
    assert!(session.performance(&TradeFilter::all().with_outcome(Outcome::Win)).profit_factor.is_none());
}

#[test]
fn test_zero_quantity_is_rejected_without_side_effects() {
    let mut session = session();
    let before = session.portfolio_snapshot();

    let order = Order::market("EURUSD", Side::Buy, Decimal::ZERO, Leverage(10));
    let err = session.place_order(order).unwrap_err();
    assert_eq!(err.reason(), Some(RejectReason::InvalidQuantity));

    assert!(session.open_positions().is_empty());
    assert_eq!(session.portfolio_snapshot(), before);
    assert_eq!(before.used_margin, Decimal::ZERO);
}

#[test]
fn test_close_is_idempotent() {
    let mut session = session();
    let id = buy_eurusd(&mut session);
    session.ingest_quote(quote(dec!(1.0870), 1)).unwrap();

    let first = session.close_position(id).unwrap().unwrap();
    assert_eq!(first.realized_pnl, Some(dec!(2.00)));
    let balance = session.portfolio_snapshot().balance;

    let second = session.close_position(id).unwrap().unwrap();
    assert_eq!(first, second);
    assert_eq!(session.portfolio_snapshot().balance, balance);
    assert_eq!(session.close_position(PositionId(999)), Ok(None));

    let levels = ProtectiveLevels::default();
    assert!(matches!(session.modify_position(id, levels), Err(Error::InvariantViolation(_))));
    assert_eq!(session.modify_position(PositionId(999), levels), Err(Error::NotFound(PositionId(999))));
}

#[test]
fn test_pending_order_lifecycle() {
    let mut session = session();
    let limit = Order::limit("EURUSD", Side::Buy, dec!(1000), dec!(1.0800), Leverage(10));
    let Placement::Pending(pending) = session.place_order(limit).unwrap() else {
        panic!("limit order should rest in the book");
    };
    assert_eq!(session.pending_orders().len(), 1);

    let cancelled = session.cancel_order(pending.id).unwrap();
    assert_eq!(cancelled.id, pending.id);
    assert!(session.pending_orders().is_empty());
    assert_eq!(session.cancel_order(pending.id), Err(Error::NotFound(pending.id)));

    // A second limit fills once the ask reaches it.
    let limit = Order::limit("EURUSD", Side::Buy, dec!(1000), dec!(1.0800), Leverage(10));
    session.place_order(limit).unwrap();
    assert!(session.ingest_quote(quote(dec!(1.0810), 1)).unwrap().filled.is_empty());
    let report = session.ingest_quote(quote(dec!(1.0795), 2)).unwrap();
    assert_eq!(report.filled.len(), 1);
    assert_eq!(report.filled[0].open_price, dec!(1.0795));
    assert_ne!(report.filled[0].id, pending.id);
}

#[test]
fn test_positions_keep_their_instrument_ticking() {
    let mut session = session();
    buy_eurusd(&mut session);
    let btc = Symbol::from("BTCUSD");
    session.select_instrument(&btc).unwrap();

    let summary = session.tick(start() + Duration::seconds(1));
    let symbols: Vec<&Symbol> = summary.quotes.iter().map(|q| &q.symbol).collect();
    assert_eq!(symbols, vec![&btc, &eurusd()]);
}

#[test]
fn test_leaderboard_ranks_own_results() {
    let mut session = session();
    let id = buy_eurusd(&mut session);
    session.ingest_quote(quote(dec!(1.0950), 1)).unwrap();
    session.close_position(id).unwrap();

    let board = session.leaderboard(LeaderboardPeriod::Day);
    assert_eq!(board.len(), 1);
    assert!(board[0].is_self);
    assert_eq!(board[0].trades, 1);
    assert_eq!(board[0].win_rate, 100.0);
    assert!((board[0].profit_pct - 0.1).abs() < 1e-9);
}

#[tokio::test]
async fn test_backtest_leaves_live_ledger_untouched() {
    let mut session = session();
    buy_eurusd(&mut session);
    let positions = session.open_positions();
    let snapshot = session.portfolio_snapshot();

    let request = session
        .backtest_request(StrategyConfig::new("ma_crossover"), &Symbol::from("BTCUSD"))
        .unwrap();
    let result = session.run_backtest(request).unwrap().join().await.unwrap();
    assert_eq!(result.ticks_processed, 500);

    assert_eq!(session.open_positions(), positions);
    assert_eq!(session.portfolio_snapshot(), snapshot);
    assert_eq!(session.trade_history(&TradeFilter::all()).len(), 0);
}

#[tokio::test]
async fn test_handle_serializes_commands_and_manual_ticks() {
    let (task, handle) = SessionTask::new(session(), None);
    let join = task.spawn();

    let mut quotes = handle.subscribe_quotes(eurusd()).await.unwrap();
    let mut events = handle.events();

    let placement = handle
        .place_order(Order::market("EURUSD", Side::Buy, dec!(1000), Leverage(10)))
        .await
        .unwrap();
    assert!(matches!(placement, Placement::Filled(_)));

    let summary = handle.advance(start() + Duration::seconds(1)).await.unwrap();
    assert_eq!(summary.quotes.len(), 1);
    assert_eq!(quotes.recv().await, Some(summary.quotes[0].clone()));
    assert!(matches!(events.recv().await, Ok(events::SessionEvent::PositionOpened(_))));

    let err = handle
        .place_order(Order::market("EURUSD", Side::Buy, dec!(1000), Leverage(3)))
        .await
        .unwrap_err();
    assert!(matches!(err, engine::Error::Rejected(Error::Validation { reason: RejectReason::InvalidLeverage, .. })));

    assert_eq!(handle.open_positions().await.unwrap().len(), 1);

    drop(quotes);
    drop(handle);
    let session = join.await.unwrap();
    assert_eq!(session.open_positions().len(), 1);
}
