// Order execution module
pub mod broker;
pub mod order_manager;
pub mod position_manager;
pub mod simulated;

pub use broker::{Account, Broker, BrokerError, OrderStatus, OrderTicket};
pub use order_manager::{FlattenReport, LifecycleEvent, LifecycleState, OrderManager, PositionState};
pub use position_manager::{ClosedTrade, NetPosition, PositionBook};
pub use simulated::SimulatedBroker;
