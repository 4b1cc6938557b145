// Testing Tools Library
//
// This crate provides testing utilities and tools for the realtime platform.
// Currently includes:
// - stream-test-client: end-to-end check of the SSE streams against a running server

pub mod api_client;
pub mod output;
pub mod scenarios;
pub mod sse_client;
