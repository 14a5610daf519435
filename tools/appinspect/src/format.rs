//! Report Formatter

use colored::Colorize;

use crate::report::Report;

pub struct Formatter {
    json: bool,
}

impl Formatter {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn render(&self, report: &Report) -> Result<String, serde_json::Error> {
        if self.json {
            serde_json::to_string_pretty(report)
        } else {
            Ok(self.text(report))
        }
    }

    fn text(&self, report: &Report) -> String {
        let mut lines = Vec::new();
        lines.push(format!(
            "{} {} ({} bytes)",
            report.name.bold(),
            format!("by {}", report.company).dimmed(),
            report.file_size
        ));
        lines.push(field("source", &report.source));
        lines.push(field("uuid", &report.uuid));
        lines.push(field(
            "versions",
            &format!(
                "header {} sdk {} app {}",
                report.header_version, report.sdk_version, report.app_version
            ),
        ));
        lines.push(field(
            "sizes",
            &format!("app {} virtual {}", report.app_size, report.virtual_size),
        ));
        lines.push(field("entry", &format!("{:#x}", report.entry_offset)));
        lines.push(field("symbols", &format!("{:#x}", report.sym_table_addr)));
        lines.push(field("relocations", &report.reloc_entries.to_string()));
        lines.push(field("crc", &format!("{:#010x}", report.crc)));
        if !report.flags.is_empty() {
            lines.push(field("flags", &report.flags.join(" ")));
        }

        match &report.load {
            Ok(load) => {
                lines.push(format!("{}", "load ok".bright_green().bold()));
                lines.push(field("base", &format!("{:#010x}", load.base)));
                lines.push(field("entry", &format!("{:#010x}", load.entry)));
                lines.push(field("patched", &load.relocations.to_string()));
                lines.push(field(
                    "bss",
                    &format!("{:#x}..{:#x}", load.bss_start, load.bss_end),
                ));
                lines.push(field("arena", &format!("{} bytes used", load.arena_used)));
            }
            Err(err) => {
                lines.push(format!("{} {}", "load failed:".bright_red().bold(), err));
            }
        }
        lines.join("\n")
    }
}

fn field(name: &str, value: &str) -> String {
    format!("  {:12} {}", name.bright_blue(), value)
}
