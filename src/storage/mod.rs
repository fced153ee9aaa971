// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Store backends.
//!
//! - [`traits::StoreClient`]: the store boundary every backend implements
//! - [`redis::RedisStore`]: Redis over a multiplexed connection manager
//! - [`memory::InMemoryStore`]: in-process store with call recording

pub mod traits;
pub mod memory;
pub mod redis;
