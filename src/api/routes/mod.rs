// API Routes Module
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

pub mod health;
pub mod history;
pub mod stats;
