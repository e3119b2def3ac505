// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

mod otel;

pub mod admin;
pub mod binding;
pub mod configs;
pub mod errors;
pub mod exchange;
pub mod queue;
pub mod schema;
pub mod topology;
