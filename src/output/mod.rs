mod progress;
mod styling;
mod summary;

use std::io::{self, Write};

pub use progress::WaitProgress;
pub use summary::{print_job_summary, JobRow};

use styling::{highlight, link, muted, title};

use crate::providers::gitlab::types::{Job, Pipeline};

/// Prints the banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        title("⏵ gitlab-trigger"),
        muted(env!("CARGO_PKG_VERSION")),
        muted("Downstream pipeline runner")
    );
}

/// Announces the triggered pipeline before its logs start streaming.
pub fn write_pipeline_header(out: &mut impl Write, pipeline: &Pipeline) -> io::Result<()> {
    writeln!(
        out,
        "{} {}",
        highlight("Outputting logs of downstream pipeline"),
        link(&pipeline.web_url)
    )?;
    writeln!(out, "{}", muted("---"))?;
    out.flush()
}

/// Marks the start of a job's output, so interleaved logs stay attributable.
pub fn write_job_header(out: &mut impl Write, job: &Job) -> io::Result<()> {
    writeln!(
        out,
        "{} {} {}",
        link("▶"),
        highlight(&job.name),
        muted(&job.web_url)
    )
}

pub fn write_pipeline_footer(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{}", muted("---"))?;
    out.flush()
}
