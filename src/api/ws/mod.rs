// WebSocket Module
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

pub mod stream;

pub use stream::{handle_websocket, StreamQuery};
