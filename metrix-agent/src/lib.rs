/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

pub mod config;
pub mod dispatch;
pub mod opts;
pub mod probe;
pub mod run;
pub mod state;
pub mod transport;
