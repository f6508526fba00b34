//! Quote cycle integration tests.
//!
//! Drives the controller and the supervisor against `MockExchange`:
//! - Asks before bids, tier pricing against the live book
//! - Shallow and full dispatch, band cancellation
//! - Failure triage and restart from INIT

mod integration;
use integration::common::fixtures::*;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use midspread_bot::{Application, CycleState, DispatchMode, FailureKind, QuoteController};
use midspread_core::{OrderBook, OrderSide, Price, Size};
use midspread_executor::MockCall;
use rust_decimal_macros::dec;

async fn bootstrap(
    config: &midspread_bot::AppConfig,
    mock: &std::sync::Arc<midspread_executor::MockExchange>,
    feed: &std::sync::Arc<midspread_bot::FixedLeanFeed>,
) -> QuoteController {
    QuoteController::bootstrap(config, pool(mock), as_source(feed))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_static_cycle_posts_ask_then_bid() {
    let mock = mock_venue();
    let server_time = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    mock.set_server_time(server_time);
    let feed = lean_feed(dec!(0.002));
    let config = config("");

    let mut controller = bootstrap(&config, &mock, &feed).await;
    assert_eq!(controller.state(), CycleState::Init);
    assert_eq!(controller.stack().len(), 1);
    assert_eq!(controller.guard().len(), 1);

    let report = controller.run_cycle().await.unwrap();
    assert_eq!(report.mode, DispatchMode::Shallow);
    assert_eq!(report.reference, Price::new(dec!(100)));
    assert_eq!(report.ratio, dec!(1));
    assert_eq!(report.posted, 2);
    assert_eq!(controller.state(), CycleState::Sleep);

    let added = mock.added_orders();
    assert_eq!(added.len(), 2);
    // 100 * (1 + 0.002 + 0.001) and 100 * (1 - 0.002 - 0.001)
    assert_eq!(added[0].side, OrderSide::Sell);
    assert_eq!(added[0].price, Price::new(dec!(100.30)));
    assert_eq!(added[1].side, OrderSide::Buy);
    assert_eq!(added[1].price, Price::new(dec!(99.70)));

    for order in &added {
        assert_eq!(order.pair, "XETHZEUR");
        assert_eq!(order.volume, Size::new(dec!(1.0)));
        assert!(order.post_only);
        assert_eq!(order.expire_at, server_time + ChronoDuration::seconds(60));
    }
}

#[tokio::test]
async fn test_second_cycle_replaces_orders_in_band() {
    let mock = mock_venue();
    let feed = lean_feed(dec!(0.002));
    let mut controller = bootstrap(&config(""), &mock, &feed).await;

    controller.run_cycle().await.unwrap();
    let first: Vec<_> = mock.open_orders().into_iter().map(|o| o.id).collect();
    assert_eq!(first.len(), 2);

    let report = controller.run_cycle().await.unwrap();
    assert_eq!(report.cancelled, 2);
    assert_eq!(report.cancel_failures, 0);
    assert_eq!(report.posted, 2);

    let cancelled = mock.cancelled_orders();
    for id in &first {
        assert!(cancelled.contains(id));
    }
    let open = mock.open_orders();
    assert_eq!(open.len(), 2);
    assert!(open.iter().all(|o| !first.contains(&o.id)));
}

#[tokio::test]
async fn test_failed_cancel_does_not_block_post() {
    let mock = mock_venue();
    let feed = lean_feed(dec!(0.002));
    let mut controller = bootstrap(&config(""), &mock, &feed).await;

    controller.run_cycle().await.unwrap();
    let stuck = mock
        .open_orders()
        .into_iter()
        .find(|o| o.side == OrderSide::Sell)
        .unwrap();
    mock.fail_cancel_of(stuck.id.clone());

    let report = controller.run_cycle().await.unwrap();
    assert_eq!(report.cancelled, 1);
    assert_eq!(report.cancel_failures, 1);
    assert_eq!(report.posted, 2);
    assert!(mock.open_orders().iter().any(|o| o.id == stuck.id));
}

#[tokio::test]
async fn test_tier_price_steps_past_competing_levels() {
    let mock = mock_venue();
    mock.set_book(OrderBook::new(
        vec![
            level(dec!(100.20), dec!(5)),
            level(dec!(100.25), dec!(0.05)),
            level(dec!(101), dec!(10)),
        ],
        vec![
            level(dec!(99.80), dec!(5)),
            level(dec!(99.75), dec!(0.05)),
            level(dec!(99), dec!(10)),
        ],
    ));
    let feed = lean_feed(dec!(0.002));
    let mut controller = bootstrap(&config(""), &mock, &feed).await;

    let report = controller.run_cycle().await.unwrap();
    assert_eq!(report.reference, Price::new(dec!(100)));

    // Dust levels (0.05 < 0.1 * 1.0) are ignored.
    let added = mock.added_orders();
    assert_eq!(added[0].price, Price::new(dec!(100.19)));
    assert_eq!(added[1].price, Price::new(dec!(99.81)));
}

#[tokio::test]
async fn test_shallow_then_full_dispatch() {
    let mock = mock_venue();
    mock.set_balances(balanced("XXBT", "ZEUR"));
    let server_time = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    mock.set_server_time(server_time);
    let file = temp_file(DISTRIBUTION);
    let config = distribution_config(&file, "XXBT", 1);
    let feed = lean_feed(dec!(0.002));

    let mut controller = bootstrap(&config, &mock, &feed).await;
    assert_eq!(controller.stack().len(), 3);

    let shallow = controller.run_cycle().await.unwrap();
    assert_eq!(shallow.mode, DispatchMode::Shallow);
    assert_eq!(shallow.tiers, 1);
    assert_eq!(shallow.posted, 2);
    assert!(mock
        .added_orders()
        .iter()
        .all(|o| o.volume == Size::new(dec!(0.2))));

    mock.clear_records();
    let full = controller.run_cycle().await.unwrap();
    assert_eq!(full.mode, DispatchMode::Full);
    assert_eq!(full.tiers, 3);
    assert_eq!(full.posted, 6);
    // Only the 0.2 band had resting orders.
    assert_eq!(full.cancelled, 2);

    let added = mock.added_orders();
    let sides: Vec<_> = added.iter().map(|o| o.side).collect();
    assert_eq!(
        sides,
        vec![
            OrderSide::Sell,
            OrderSide::Sell,
            OrderSide::Sell,
            OrderSide::Buy,
            OrderSide::Buy,
            OrderSide::Buy,
        ]
    );

    // Expiry scales with volume relative to the smallest tier: 0.5 / 0.2.
    let largest = added
        .iter()
        .find(|o| o.side == OrderSide::Sell && o.volume == Size::new(dec!(0.5)))
        .unwrap();
    assert_eq!(largest.expire_at, server_time + ChronoDuration::seconds(150));
    // 100 * (1 + 0.004 + 0.001)
    assert_eq!(largest.price, Price::new(dec!(100.50)));

    let next = controller.run_cycle().await.unwrap();
    assert_eq!(next.mode, DispatchMode::Shallow);
}

#[tokio::test]
async fn test_distribution_volumes_converted_through_cross_pair() {
    let mock = mock_venue();
    mock.set_pair_book("XETHXXBT", book(dec!(0.049), dec!(0.051)));
    let file = temp_file(DISTRIBUTION);
    let config = distribution_config(&file, "XETH", 0);
    let feed = lean_feed(dec!(0.002));

    let mut controller = bootstrap(&config, &mock, &feed).await;

    // XETH is the quote leg of XETHXXBT, so volumes scale by 1 / 0.05.
    let volumes: Vec<_> = controller.stack().tiers().iter().map(|t| t.volume).collect();
    assert_eq!(
        volumes,
        vec![
            Size::new(dec!(4)),
            Size::new(dec!(6)),
            Size::new(dec!(10)),
        ]
    );
    let requested: Vec<_> = mock.book_requests().into_iter().map(|(p, _)| p).collect();
    assert_eq!(requested[0], "XETHXXBT");
    assert_eq!(requested[1], "XETHZEUR");

    let report = controller.run_cycle().await.unwrap();
    assert_eq!(report.mode, DispatchMode::Full);
    assert_eq!(report.posted, 6);
}

#[tokio::test]
async fn test_guard_breach_aborts_before_balances() {
    let mock = mock_venue();
    let feed = lean_feed(dec!(0.002));
    let mut controller = bootstrap(&config(""), &mock, &feed).await;
    mock.clear_records();

    mock.set_book(book(dec!(119), dec!(121)));
    let err = controller.run_cycle().await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::PriceSanity);
    assert_eq!(controller.state(), CycleState::FetchMarketState);
    assert!(!mock.calls().contains(&MockCall::Balance));
    assert!(mock.added_orders().is_empty());

    controller.reset_after_failure();
    assert_eq!(controller.state(), CycleState::Init);
}

#[tokio::test]
async fn test_post_failure_skips_tier() {
    let mock = mock_venue();
    let feed = lean_feed(dec!(0.002));
    let mut controller = bootstrap(&config(""), &mock, &feed).await;

    mock.set_failing(MockCall::AddOrder, true);
    let report = controller.run_cycle().await.unwrap();
    assert_eq!(report.posted, 0);
    assert_eq!(report.post_failures, 2);

    mock.set_failing(MockCall::AddOrder, false);
    let report = controller.run_cycle().await.unwrap();
    assert_eq!(report.posted, 2);
}

#[tokio::test]
async fn test_static_tier_rekeyed_after_reload() {
    let mock = mock_venue();
    let feed = lean_feed(dec!(0.002));
    let mut controller = bootstrap(&config(""), &mock, &feed).await;
    controller.run_cycle().await.unwrap();

    // Not due yet: a failing cycle does not pick up the new value.
    feed.set(lean(dec!(0.004)));
    mock.set_failing(MockCall::OrderBook, true);
    let err = controller.run_cycle().await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::VenueCall);
    assert_eq!(controller.lean().displacement, dec!(0.002));

    // A restart forces a reload.
    controller.reset_after_failure();
    mock.set_failing(MockCall::OrderBook, false);
    mock.clear_records();
    controller.run_cycle().await.unwrap();

    assert_eq!(controller.lean().displacement, dec!(0.004));
    assert_eq!(controller.stack().tiers()[0].displacement, dec!(0.004));
    let sell = &mock.added_orders()[0];
    assert_eq!(sell.side, OrderSide::Sell);
    assert_eq!(sell.price, Price::new(dec!(100.50)));
}

#[tokio::test]
async fn test_supervisor_runs_bounded_cycles() {
    let mock = mock_venue();
    let feed = lean_feed(dec!(0.002));
    let app = Application::new(config(""), pool(&mock), as_source(&feed));

    let stats = app.supervise(Some(3)).await.unwrap();
    assert_eq!(stats.cycles_completed, 3);
    assert_eq!(stats.restarts, 0);
    assert_eq!(stats.last_report.unwrap().posted, 2);
    assert_eq!(mock.added_orders().len(), 6);
    assert_eq!(mock.open_orders().len(), 2);
}

#[tokio::test]
async fn test_supervisor_restarts_on_empty_book() {
    let mock = mock_venue();
    mock.set_book(OrderBook::default());
    let feed = lean_feed(dec!(0.002));
    let app = Application::new(config(""), pool(&mock), as_source(&feed));

    let stats = app.supervise(Some(3)).await.unwrap();
    assert_eq!(stats.cycles_completed, 0);
    assert_eq!(stats.restarts, 3);
    assert!(mock.added_orders().is_empty());
}

#[tokio::test]
async fn test_distribution_mismatch_is_fatal_before_any_call() {
    let mock = mock_venue();
    let file = temp_file(r#"{"volume_distortion": 1, "bp_distortion": 1, "0.001": 0.4, "0.002": 0.5}"#);
    let config = distribution_config(&file, "XETH", 5);
    let feed = lean_feed(dec!(0.002));
    let app = Application::new(config, pool(&mock), as_source(&feed));

    let err = app.supervise(Some(3)).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Config);
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_shallow_expiry_scales_against_whole_stack() {
    let mock = mock_venue();
    mock.set_balances(balanced("XXBT", "ZEUR"));
    let server_time = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    mock.set_server_time(server_time);
    let file = temp_file(
        r#"{"volume_distortion": 1, "bp_distortion": 1, "0.001": 0.6, "0.004": 0.4}"#,
    );
    let config = distribution_config(&file, "XXBT", 5);
    let feed = lean_feed(dec!(0.002));
    let mut controller = bootstrap(&config, &mock, &feed).await;

    let report = controller.run_cycle().await.unwrap();
    assert_eq!(report.mode, DispatchMode::Shallow);
    assert_eq!(report.tiers, 1);

    // Smallest tier in the stack is 0.4, outside the shallow slice: 60 * 0.6 / 0.4.
    for order in mock.added_orders() {
        assert_eq!(order.volume, Size::new(dec!(0.6)));
        assert_eq!(order.expire_at, server_time + ChronoDuration::seconds(90));
    }
}

#[tokio::test]
async fn test_server_time_outage_is_market_data_failure() {
    let mock = mock_venue();
    let feed = lean_feed(dec!(0.002));
    let mut controller = bootstrap(&config(""), &mock, &feed).await;

    mock.set_failing(MockCall::ServerTime, true);
    let err = controller.run_cycle().await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::MarketData);
    assert!(mock.added_orders().is_empty());
}

#[tokio::test]
async fn test_extreme_inventory_fails_cycle_without_panic() {
    let mock = mock_venue();
    // 10 XETH at 100 against 15 ZEUR: R = 66.67.
    mock.set_balances(
        [
            ("XETH".to_string(), Size::new(dec!(10))),
            ("ZEUR".to_string(), Size::new(dec!(15))),
        ]
        .into_iter()
        .collect(),
    );
    let feed = lean_feed(dec!(0.002));
    let app = Application::new(config(""), pool(&mock), as_source(&feed));

    let stats = app.supervise(Some(2)).await.unwrap();
    assert_eq!(stats.cycles_completed, 0);
    assert_eq!(stats.restarts, 2);

    // Asks are unaffected by a heavy base position and still go out first.
    assert!(mock
        .added_orders()
        .iter()
        .all(|o| o.side == OrderSide::Sell));
}
