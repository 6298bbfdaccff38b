/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod net;
mod primary;
mod retry;
mod time;

pub use net::as_ip_network;
pub use primary::{as_bool, as_f64, as_list, as_nonzero_usize, as_string, as_usize};
pub use retry::as_backoff_policy;
pub use time::as_duration;
