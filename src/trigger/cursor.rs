use indexmap::IndexMap;
use log::debug;

use crate::providers::gitlab::types::JobId;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct LogCursor {
    /// Bytes of the job log already written out.
    offset: usize,
    /// The log was fetched after the job had finished, so it cannot grow.
    settled: bool,
}

/// Per-job record of how much of each log has been emitted.
///
/// Jobs iterate in the order they were first tracked.
#[derive(Debug, Default)]
pub struct LogCursorTracker {
    cursors: IndexMap<JobId, LogCursor>,
}

impl LogCursorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a job at offset 0. Already tracked jobs are left as is.
    pub fn track(&mut self, job_id: JobId) {
        self.cursors.entry(job_id).or_default();
    }

    /// Returns the part of `content` not emitted yet and moves the cursor to
    /// its end.
    ///
    /// A log shorter than the cursor yields nothing and leaves the cursor
    /// where it is.
    pub fn advance<'a>(&mut self, job_id: JobId, content: &'a [u8]) -> &'a [u8] {
        let cursor = self.cursors.entry(job_id).or_default();

        let Some(fresh) = content.get(cursor.offset..) else {
            debug!(
                "Log of job {job_id} shrank to {} bytes (cursor at {}), skipping",
                content.len(),
                cursor.offset
            );
            return &[];
        };

        cursor.offset += fresh.len();
        fresh
    }

    pub fn offset(&self, job_id: JobId) -> usize {
        self.cursors.get(&job_id).map_or(0, |cursor| cursor.offset)
    }

    pub fn settle(&mut self, job_id: JobId) {
        self.cursors.entry(job_id).or_default().settled = true;
    }

    pub fn is_settled(&self, job_id: JobId) -> bool {
        self.cursors.get(&job_id).is_some_and(|cursor| cursor.settled)
    }

    pub fn is_tracked(&self, job_id: JobId) -> bool {
        self.cursors.contains_key(&job_id)
    }

    /// Tracked job ids in first-seen order.
    pub fn job_ids(&self) -> impl Iterator<Item = JobId> + '_ {
        self.cursors.keys().copied()
    }
}
