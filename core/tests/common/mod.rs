// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Common test utilities for integration tests.
//!
//! This module provides shared test infrastructure including:
//! - A scripted remote store with failure injection and a call trace
//! - A scripted conflict resolver and a recording observer
//! - A harness wiring them into a cached calendar
//! - Temporary state directories with auto-cleanup

#![allow(dead_code)]

mod fixtures;
mod remote;

#[allow(unused_imports)]
pub use fixtures::{CALENDAR_ID, Harness, item, ts};
#[allow(unused_imports)]
pub use observer::RecordingObserver;
#[allow(unused_imports)]
pub use remote::{ScriptedChangeLog, ScriptedRemote};
#[allow(unused_imports)]
pub use resolver::ScriptedResolver;
#[allow(unused_imports)]
pub use temp_dir::TempState;
