// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence seam: checkpointing control-plane state and archiving
//! samples to an external store, both behind narrow async traits.

pub mod store;
pub mod tsdb;

pub use store::{Checkpoint, JsonFileStore, Store};
pub use tsdb::{spawn_tsdb_writer, LoggingTsdbWriter, TsdbWriter};
