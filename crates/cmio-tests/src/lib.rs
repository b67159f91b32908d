// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # cmio-tests
//!
//! Shared mocks and end-to-end scenario tests for the CMIO gateway. The
//! library half holds the scripted bus ([`common::mocks::FakeBus`]); the
//! `tests/` directory exercises the manager, the batcher, the safe-state
//! engine, and the TCP push server against it.

#![deny(unsafe_code)]

pub mod common;
