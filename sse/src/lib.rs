//! Server-Sent Events (SSE) infrastructure for real-time updates.
//!
//! This crate pushes server-generated events (new posts, edits, deletions,
//! per-user notifications) to connected clients without polling.
//!
//! # Architecture
//!
//! - **Broadcast Registry**: every anonymous stream connection in the process;
//!   a broadcast reaches all of them.
//! - **User Notification Hub**: connections keyed by the owning user; an emit
//!   reaches only that user's connections.
//! - **Self-healing**: a connection whose write fails is evicted inside the
//!   same broadcast/emit call and never written to again.
//! - **Ephemeral messages**: there is no backlog or replay. An offline user
//!   misses the event and sees fresh data on the next fetch.
//! - **Process-local**: registries live in one server process. Running several
//!   instances needs an external fan-out bus feeding each instance's Manager.
//!
//! # Message Flow
//!
//! 1. Client opens `/stream` (anonymous) or `/notifications/stream` (per user)
//! 2. `StreamEndpoint::open` registers a new `Connection`, writes `: connected`
//!    and starts the `: ping` heartbeat
//! 3. A mutation handler completes its durable write and publishes a
//!    `DomainEvent`
//! 4. `SseDomainEventHandler` maps it to `FeedEvent`s (broadcast) or a
//!    `Notification` (emit)
//! 5. `Manager` serializes the payload once and writes the frame to each
//!    target connection
//! 6. When the client disconnects, the response stream is dropped and the
//!    connection is torn down
//!
//! # Example: Sending an event
//!
//! ```rust,ignore
//! use sse::message::FeedEvent;
//!
//! // In a mutation handler, after the post was stored
//! app_state.sse_manager.broadcast(&FeedEvent::NewPost {
//!     tx_id,
//!     post_id: post_id.clone(),
//!     post: stored_post,
//! });
//! ```
//!
//! # Modules
//!
//! - `connection`: `Connection` handle and type-safe `ConnectionId`
//! - `broadcast`: Broadcast Registry
//! - `hub`: User Notification Hub with dual indices
//! - `manager`: Owner of both registries and payload serialization
//! - `stream`: Stream Endpoint lifecycle (handshake, heartbeat, teardown)
//! - `frame`: Wire frames
//! - `message`: Typed payloads
//! - `domain_event_handler`: Bridge from domain events to payloads

pub mod broadcast;
pub mod connection;
pub mod domain_event_handler;
pub mod error;
pub mod frame;
pub mod hub;
pub mod manager;
pub mod message;
pub mod stream;

pub use manager::Manager;
