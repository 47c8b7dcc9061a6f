use anyhow::Context;
use chrono::Local;
use log::info;
use std::fs;
use std::path::PathBuf;

use crate::registry::SensorRegistry;
use crate::transform::to_display;

/// Shown before a sensor delivered its first reading.
pub const NO_VALUE: &str = "--";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelRow {
    pub label: String,
    pub value: String,
}

/// Presentation collaborator: the display and the status page both consume
/// the same rows.
pub trait Panel {
    fn present(&mut self, rows: &[PanelRow]) -> anyhow::Result<()>;
}

impl<T: Panel + ?Sized> Panel for Box<T> {
    fn present(&mut self, rows: &[PanelRow]) -> anyhow::Result<()> {
        (**self).present(rows)
    }
}

/// Rows shown for the registry, in registry order.
pub fn rows(registry: &SensorRegistry) -> Vec<PanelRow> {
    registry
        .iter()
        .map(|sensor| PanelRow {
            label: sensor.label().to_string(),
            value: sensor
                .value
                .map(|raw| to_display(raw, &sensor.config))
                .unwrap_or_else(|| NO_VALUE.to_string()),
        })
        .collect()
}

/// Render rows as aligned `label: value` lines.
pub fn render_text(rows: &[PanelRow]) -> String {
    let width = rows.iter().map(|r| r.label.chars().count()).max().unwrap_or(0);
    rows.iter()
        .map(|r| format!("{:<width$}  {}\n", r.label, r.value, width = width))
        .collect()
}

#[derive(Debug, Default)]
pub struct LogPanel;

impl Panel for LogPanel {
    fn present(&mut self, rows: &[PanelRow]) -> anyhow::Result<()> {
        if rows.is_empty() {
            info!("No sensors to display");
        }
        for row in rows {
            info!("{}: {}", row.label, row.value);
        }
        Ok(())
    }
}

/// Writes the panel to a text file, headed by the time of the refresh.
#[derive(Debug)]
pub struct FilePanel {
    file: PathBuf,
}

impl FilePanel {
    pub fn new<P: Into<PathBuf>>(file: P) -> Self {
        Self { file: file.into() }
    }
}

impl Panel for FilePanel {
    fn present(&mut self, rows: &[PanelRow]) -> anyhow::Result<()> {
        let content = format!(
            "Sensors {}\n{}",
            Local::now().format("%H:%M:%S"),
            render_text(rows)
        );
        fs::write(&self.file, content)
            .context(format!("Failed to save panel to {}", self.file.display()))
    }
}
