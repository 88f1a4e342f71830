use std::io::{self, IsTerminal, Write};

use chrono::DateTime;
use chrono_tz::Tz;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::DueBucket;
use crate::project::ProjectRegistry;
use crate::stats::Stats;
use crate::task::{Priority, Task};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?;
        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, tasks, registry, now))]
    pub fn print_task_table(
        &mut self,
        tasks: &[Task],
        registry: &dyn ProjectRegistry,
        now: &DateTime<Tz>,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let headers = ["", "ID", "Due", "Pri", "Category", "Project", "Title"]
            .into_iter()
            .map(String::from)
            .collect();

        let rows = tasks
            .iter()
            .map(|task| self.task_row(task, registry, now))
            .collect();

        write_table(&mut out, headers, rows)
    }

    fn task_row(&self, task: &Task, registry: &dyn ProjectRegistry, now: &DateTime<Tz>) -> Vec<String> {
        let mark = if task.completed { "[x]" } else { "[ ]" };
        let due_text = task
            .due_date
            .with_timezone(&now.timezone())
            .format("%Y-%m-%d")
            .to_string();
        let due = match (task.completed, DueBucket::classify(task.due_date, now)) {
            (true, _) | (false, DueBucket::Later) => due_text,
            (false, DueBucket::Overdue) => self.paint(&due_text, "31"),
            (false, DueBucket::Today) => self.paint(&due_text, "33"),
            (false, DueBucket::Tomorrow) => self.paint(&due_text, "93"),
        };
        let priority = match task.priority {
            Priority::High => self.paint("high", "31"),
            Priority::Medium => self.paint("medium", "33"),
            Priority::Low => self.paint("low", "32"),
        };

        vec![
            mark.to_string(),
            self.paint(&short_id(&task.id), "36"),
            due,
            priority,
            task.category.to_string(),
            registry.get_project(&task.project_id).name,
            task.title.clone(),
        ]
    }

    #[tracing::instrument(skip(self, task, registry, tz))]
    pub fn print_task_info(
        &mut self,
        task: &Task,
        registry: &dyn ProjectRegistry,
        tz: &Tz,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let project = registry.get_project(&task.project_id);

        writeln!(out, "id        {}", task.id)?;
        writeln!(out, "title     {}", task.title)?;
        writeln!(out, "status    {}", if task.completed { "completed" } else { "active" })?;
        writeln!(out, "priority  {}", task.priority)?;
        writeln!(out, "category  {}", task.category)?;
        writeln!(out, "project   {} ({})", project.name, task.project_id)?;
        writeln!(out, "due       {}", task.due_date.with_timezone(tz).format("%Y-%m-%d %H:%M"))?;
        writeln!(out, "created   {}", task.created_at.with_timezone(tz).format("%Y-%m-%d %H:%M"))?;

        Ok(())
    }

    pub fn print_stats(&mut self, stats: &Stats) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "total      {}", stats.total)?;
        writeln!(out, "completed  {}", self.paint(&stats.completed.to_string(), "32"))?;
        writeln!(out, "active     {}", stats.active())?;
        writeln!(out, "progress   {}%", stats.percentage)?;
        Ok(())
    }

    pub fn print_projects(&mut self, registry: &dyn ProjectRegistry, tasks: &[Task]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let headers = ["ID", "Name", "Color", "Tasks"]
            .into_iter()
            .map(String::from)
            .collect();
        let rows = registry
            .list_projects()
            .into_iter()
            .map(|project| {
                let count = tasks.iter().filter(|t| t.project_id == project.id).count();
                vec![project.id, project.name, project.color, count.to_string()]
            })
            .collect();

        write_table(&mut out, headers, rows)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// Long generated ids are shown by their last eight characters.
fn short_id(id: &str) -> String {
    let count = id.chars().count();
    if count <= 8 {
        return id.to_string();
    }
    id.chars().skip(count - 8).collect()
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_pads_by_visible_width() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["ID".to_string(), "Title".to_string()],
            vec![
                vec!["\x1b[36m1\x1b[0m".to_string(), "café".to_string()],
                vec!["22".to_string(), "x".to_string()],
            ],
        )
        .expect("write table");

        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ID Title ");
        assert_eq!(lines[1], "-- ----- ");
        assert_eq!(strip_ansi(lines[2]), "1  café  ");
        assert_eq!(lines[3], "22 x     ");
    }

    #[test]
    fn short_id_keeps_the_tail_of_long_ids() {
        assert_eq!(short_id("3"), "3");
        assert_eq!(short_id("0190a1b2-c3d4-7e5f-8a9b-0c1d2e3f4a5b"), "2e3f4a5b");
    }

    #[test]
    fn color_setting_comes_from_config() {
        let mut cfg = Config::default();
        assert!(Renderer::new(&cfg).expect("default").color);

        cfg.apply_overrides(vec![("color".to_string(), "no".to_string())])
            .expect("override");
        assert!(!Renderer::new(&cfg).expect("off").color);
    }
}
