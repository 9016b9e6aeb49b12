use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::providers::gitlab::types::{Job, Status};

/// One line of the end-of-run job table.
pub struct JobRow<'a> {
    pub job: &'a Job,
    /// Bytes of the job log streamed during the run.
    pub log_bytes: usize,
}

pub fn render_job_summary(rows: &[JobRow<'_>]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Job", "Stage", "Status", "Duration", "Log", "URL"]);

    for row in rows {
        table.add_row(vec![
            Cell::new(&row.job.name),
            Cell::new(row.job.stage.as_deref().unwrap_or("-")),
            status_cell(&row.job.status),
            Cell::new(format_duration(row.job.duration)),
            Cell::new(format_bytes(row.log_bytes)),
            Cell::new(&row.job.web_url),
        ]);
    }

    table
}

pub fn print_job_summary(rows: &[JobRow<'_>]) {
    eprintln!("{}", render_job_summary(rows));
}

fn status_cell(status: &Status) -> Cell {
    let color = match status {
        Status::Success => TableColor::Green,
        Status::Failed => TableColor::Red,
        Status::Canceled | Status::Skipped | Status::Manual => TableColor::DarkGrey,
        _ => TableColor::Yellow,
    };
    Cell::new(status).fg(color)
}

fn format_duration(seconds: Option<f64>) -> String {
    let Some(seconds) = seconds else {
        return "-".to_string();
    };

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total = seconds.max(0.0).round() as u64;
    if total < 60 {
        format!("{total}s")
    } else {
        format!("{}m {:02}s", total / 60, total % 60)
    }
}

#[allow(clippy::cast_precision_loss)]
fn format_bytes(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    let value = bytes as f64;
    if value < KIB {
        format!("{bytes} B")
    } else if value < KIB * KIB {
        format!("{:.1} KiB", value / KIB)
    } else {
        format!("{:.1} MiB", value / (KIB * KIB))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: u64, name: &str, status: Status, duration: Option<f64>) -> Job {
        Job {
            id,
            name: name.to_string(),
            web_url: format!("https://gitlab.example.com/g/p/-/jobs/{id}"),
            status,
            stage: Some("test".to_string()),
            started_at: None,
            finished_at: None,
            duration,
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(None), "-");
        assert_eq!(format_duration(Some(4.4)), "4s");
        assert_eq!(format_duration(Some(59.6)), "1m 00s");
        assert_eq!(format_duration(Some(185.0)), "3m 05s");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MiB");
    }

    #[test]
    fn test_render_job_summary_lists_every_job() {
        let build = job(7, "build", Status::Success, Some(65.0));
        let deploy = job(8, "deploy", Status::Failed, None);
        let rows = [
            JobRow {
                job: &build,
                log_bytes: 120,
            },
            JobRow {
                job: &deploy,
                log_bytes: 0,
            },
        ];

        let mut table = render_job_summary(&rows);
        table.set_width(250);
        let rendered = table.to_string();
        assert!(rendered.contains("build"));
        assert!(rendered.contains("deploy"));
        assert!(rendered.contains("1m 05s"));
        assert!(rendered.contains("120 B"));
        assert!(rendered.contains("https://gitlab.example.com/g/p/-/jobs/8"));
    }
}
