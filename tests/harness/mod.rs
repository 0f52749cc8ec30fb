// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test harness for attack simulation against the contact gate.
//!
//! This module provides utilities for simulating forgery and flood patterns
//! against the CSRF service and rate limiter.

pub mod attacks;
pub mod generators;
pub mod metrics;
