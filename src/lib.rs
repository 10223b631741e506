// SPDX-License-Identifier: Apache-2.0
pub mod auth;
pub mod config;
pub mod cookies;
pub mod error;
pub mod headers;
pub mod logging;
pub mod middleware;
pub mod proxy;
pub mod rate_limit;
pub mod session;
