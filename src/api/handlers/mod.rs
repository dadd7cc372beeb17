// Copyright (c) Sabq Platform Team
// SPDX-License-Identifier: Apache-2.0

pub mod health;
pub mod interactions;
pub mod stats;
