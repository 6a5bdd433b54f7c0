//! Mock provider servers for integration tests
//!
//! - WebSocket: the Edge read-aloud synthesis endpoint
//! - HTTP: the voice catalog is mocked per test with `wiremock`

// Allow dead code in test infrastructure - not every test binary uses every helper
#![allow(dead_code)]

pub mod websocket_mock;

pub use websocket_mock::{
    EdgeMockServer, EdgeMockState, RecordedConnection, ScriptedFrame, SubprotocolReply, simple_turn,
};
