// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Domain services: the algorithms and ports of the upload pipeline
//! (`spec.md` §4). CPU-bound services (`chunk_planner`, `config_advisor`,
//! `retry_controller`, `network_observer`, `hash_engine`'s digest core) are
//! synchronous. I/O-bound ports (`host_adapter`, `resume_ledger`) are async
//! infrastructure ports that happen to live in this crate, matching the
//! teacher's treatment of `FileIOService`.

pub mod chunk_planner;
pub mod config_advisor;
pub mod hash_engine;
pub mod host_adapter;
pub mod network_observer;
pub mod resume_ledger;
pub mod retry_controller;

pub use chunk_planner::ChunkPlanner;
pub use config_advisor::{CapabilityGrade, ConfigAdvisor, EnvironmentCapabilities, EnvironmentKind, UploadPriority};
pub use hash_engine::{HashRequest, StreamingHasher};
pub use host_adapter::{AbortToken, AdapterCapabilities, ByteProgressSink, HostAdapter, HttpMethod, HttpRequest, HttpResponse, ScheduleHandle};
pub use network_observer::NetworkObserverState;
pub use resume_ledger::ResumeLedger;
pub use retry_controller::RetryController;
