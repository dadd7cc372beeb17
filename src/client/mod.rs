// Copyright (c) Sabq Platform Team
// SPDX-License-Identifier: Apache-2.0

//! Client-resident interaction cache: per-article liked/saved/shared flags
//! with optimistic toggles, revert-on-failure, bounded retries and a
//! persisted snapshot that survives restarts. The network transport is
//! injected so the store can be exercised without a server.

pub mod persist;
pub mod store;
pub mod transport;

pub use persist::{JsonFilePersistence, StorePersistence, StoreSnapshot};
pub use store::{InteractionStore, ResyncTrigger, StoreError};
pub use transport::{HttpTransport, Identity, InteractionTransport, ToggleResponse, TransportError};
