// Copyright 2025 micronet Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # micronet CLI
//!
//! Command-line front end for micronet.
//!
//! - **Publisher**: serves subscriptions and publishes each stdin line
//! - **Subscriber**: subscribes to a publisher and prints every update
//! - **Ping / Call**: one-shot calls against any micronet server
//!
//! The binary parses arguments with `argh`; the long-running loops live in
//! [`observe`] so they can be driven from tests.

pub mod observe;

use micronet_common::Address;

/// Names an address parsed from the command line, keeping `protocol://host:port`.
pub fn named(address: &Address, name: &str) -> Address {
    if address.name().is_empty() {
        address.with_name(name)
    } else {
        address.clone()
    }
}
