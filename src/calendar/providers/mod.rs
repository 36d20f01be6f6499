// src/calendar/providers/mod.rs
pub mod memory;
pub mod trading_economics;

pub use memory::StaticSource;
pub use trading_economics::TradingEconomicsProvider;
