/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

pub mod backend;
pub mod config;
pub mod http;
pub mod opts;
pub mod serve;
