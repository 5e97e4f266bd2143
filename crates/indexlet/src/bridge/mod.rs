//! Wire bridge between indexlet and the index-store worker.
//!
//! This module provides the wire protocol and codec for the line-delimited
//! JSON exchange with the worker process.
//!
//! - **protocol**: Message types (WireRequest, WireResponse, RequestId)
//! - **codec**: newline-framed JSON codec for AsyncRead/AsyncWrite

pub mod codec;
pub mod protocol;
