// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

pub mod batch;
pub mod pipeline;

pub use batch::{Batch, BatchResult, MutationToken};
pub use pipeline::{BatchPipeline, PipelineStats};
