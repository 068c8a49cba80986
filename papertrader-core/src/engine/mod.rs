//! Engine: broker simulation and the per-instrument bar loop.

pub mod account;
pub mod broker;
pub mod cancel;
pub mod cost_model;
pub mod path_policy;
pub mod simulation;

pub use account::Account;
pub use broker::{BarReport, BrokerError, BrokerSimulator, OrderEvent};
pub use cancel::CancelToken;
pub use cost_model::CostModel;
pub use path_policy::{resolve_bracket, BracketOutcome, TieBreak};
pub use simulation::{run_instrument, InstrumentRun, SimulationConfig, SimulationError};
