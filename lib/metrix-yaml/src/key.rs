/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

/// Config keys match case-insensitively, with `-` and `_` treated alike.
pub fn normalize(raw: &str) -> String {
    raw.to_lowercase().replace('-', "_")
}
