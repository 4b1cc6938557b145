//! Client side of the event stream.
//!
//! A [`Multiplexer`] opens one stream per URL and fans parsed frames out to
//! any number of local subscribers. An [`EchoCache`] lets a subscriber skip
//! broadcasts that echo its own optimistic changes.

pub mod echo;
pub mod multiplexer;
pub mod transport;

pub use echo::{new_tx_id, EchoCache};
pub use multiplexer::{Message, Multiplexer, Subscription};
pub use transport::{EventSourceTransport, Inbound, Transport};
