//! Domain types for PaperTrader

pub mod bar;
pub mod equity;
pub mod error;
pub mod fill;
pub mod ids;
pub mod order;
pub mod position;
pub mod trade;

pub use bar::{Bar, BarSeries};
pub use equity::EquityPoint;
pub use error::InputError;
pub use fill::Fill;
pub use ids::{OcoGroupId, OrderId};
pub use order::{IntentKind, Order, OrderIntent, OrderRole, OrderSide, OrderStatus, OrderType};
pub use position::Position;
pub use trade::{ExitReason, TradeRecord};

/// Symbol type alias
pub type Symbol = String;
