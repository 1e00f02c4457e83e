pub mod ws;

pub use ws::{PushTransport, ReconnectPolicy, TransportEvent};
