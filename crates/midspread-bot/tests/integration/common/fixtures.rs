//! Shared fixtures: a mock venue, configs and lean parameters.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use midspread_bot::{AppConfig, FixedLeanFeed, LeanSource};
use midspread_core::{Balances, BookLevel, OrderBook, Price, Size};
use midspread_executor::{ConnectionPool, DynExchangeClient, MockExchange};
use midspread_quoting::LeanState;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::NamedTempFile;

/// Required keys for an XETH/ZEUR market with a static stack.
pub const BASE_CONFIG: &str = r#"
Ex_Market1 = "XETH"
Ex_Market2 = "ZEUR"
min_increment = "0.01"
dust = "0.1"
volume = "1.0"
odepth = 10
starttmAdd = 0
expiretmAdd = 60
price_change = "0.05"
local_defense = "10"
reload_time = 300
deep_reload_counter = 5
shallow_depth = 1
cycle_sleep_ms = 1
restart_delay_ms = 1
call_timeout_ms = 1000
"#;

/// Tiers summing to 1.0 with increasing volumes.
pub const DISTRIBUTION: &str = r#"{
    "_comment": "three tiers",
    "volume_distortion": 1,
    "bp_distortion": 1,
    "0.001": 0.2,
    "0.002": 0.3,
    "0.004": 0.5
}"#;

pub fn level(price: Decimal, volume: Decimal) -> BookLevel {
    BookLevel::new(Price::new(price), Size::new(volume))
}

/// Book with bid 99 and ask 101, mid 100.
pub fn book_around_100() -> OrderBook {
    book(dec!(99), dec!(101))
}

pub fn book(bid: Decimal, ask: Decimal) -> OrderBook {
    OrderBook::new(vec![level(ask, dec!(10))], vec![level(bid, dec!(10))])
}

/// Balances giving a ratio of exactly 1 at price 100.
pub fn balanced(base: &str, quote: &str) -> Balances {
    [
        (base.to_string(), Size::new(dec!(10))),
        (quote.to_string(), Size::new(dec!(1000))),
    ]
    .into_iter()
    .collect()
}

pub fn lean(displacement: Decimal) -> LeanState {
    LeanState {
        lean: 1.0,
        tier_width: dec!(0.001),
        displacement,
    }
}

pub fn lean_feed(displacement: Decimal) -> Arc<FixedLeanFeed> {
    Arc::new(FixedLeanFeed::new(lean(displacement)))
}

pub fn as_source(feed: &Arc<FixedLeanFeed>) -> Arc<dyn LeanSource> {
    feed.clone()
}

/// Mock venue for XETH/ZEUR around 100 with a balanced account.
pub fn mock_venue() -> Arc<MockExchange> {
    let mock = Arc::new(MockExchange::new());
    mock.set_book(book_around_100());
    mock.set_balances(balanced("XETH", "ZEUR"));
    mock
}

pub fn pool(mock: &Arc<MockExchange>) -> Arc<ConnectionPool> {
    let client: DynExchangeClient = mock.clone();
    Arc::new(ConnectionPool::new(vec![client], Duration::from_secs(1)).unwrap())
}

pub fn config(extra: &str) -> AppConfig {
    AppConfig::from_toml_str(&format!("{BASE_CONFIG}\n{extra}\n")).unwrap()
}

/// Base config with one key's line replaced.
pub fn config_replacing(from: &str, to: &str) -> AppConfig {
    assert!(BASE_CONFIG.contains(from), "no such line: {from}");
    AppConfig::from_toml_str(&BASE_CONFIG.replace(from, to)).unwrap()
}

/// Write `content` to a temp file that lives as long as the handle.
pub fn temp_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

/// Config for `base`/ZEUR using `file` as the distribution.
pub fn distribution_config(file: &NamedTempFile, base: &str, deep_reload_counter: u32) -> AppConfig {
    let content = BASE_CONFIG
        .replace(
            r#"Ex_Market1 = "XETH""#,
            &format!(r#"Ex_Market1 = "{base}""#),
        )
        .replace(
            "deep_reload_counter = 5",
            &format!("deep_reload_counter = {deep_reload_counter}"),
        );
    AppConfig::from_toml_str(&format!(
        "{content}\nVolumeStacking = '{}'\n",
        file.path().display()
    ))
    .unwrap()
}
