use crate::aggregate::Aggregation;
use crate::config::AppConfig;
use anyhow::{anyhow, Context, Result};
use std::fs::{self, File};
use std::io::Write;
use tracing::info;

pub const REPORT_TITLE: &str = "Beneficiarios por comuna y barrio";

// Printers start a new sheet on form feed.
const PAGE_BREAK: char = '\u{c}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Title,
    District,
    Barrio,
    Total,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub kind: LineKind,
    pub text: String,
}

impl ReportLine {
    fn new(kind: LineKind, text: String) -> Self {
        Self { kind, text }
    }
}

/// Report body in display order: one header per district with its total,
/// then its neighborhoods in first-seen order, then the grand total.
pub fn report_lines(agg: &Aggregation) -> Vec<ReportLine> {
    let mut lines = vec![ReportLine::new(LineKind::Title, REPORT_TITLE.to_string())];
    for district in agg.ordered() {
        lines.push(ReportLine::new(
            LineKind::District,
            format!("{} ({})", district.comuna, district.total),
        ));
        for barrio in district.barrios {
            lines.push(ReportLine::new(
                LineKind::Barrio,
                format!("    {}: {}", barrio.barrio, barrio.count),
            ));
        }
    }
    lines.push(ReportLine::new(LineKind::Total, format!("Total: {}", agg.total())));
    lines
}

/// Splits the body into pages of at most `lines_per_page` lines.
///
/// A district header that would end a page moves to the next one so it
/// always sits above at least one of its neighborhoods.
pub fn paginate(lines: &[ReportLine], lines_per_page: usize) -> Result<Vec<Vec<&ReportLine>>> {
    if lines_per_page < 2 {
        return Err(anyhow!("lines_per_page must be at least 2, got {}", lines_per_page));
    }

    let mut pages = Vec::new();
    let mut current: Vec<&ReportLine> = Vec::with_capacity(lines_per_page);
    for (i, line) in lines.iter().enumerate() {
        current.push(line);
        if current.len() < lines_per_page {
            continue;
        }
        let orphan = line.kind == LineKind::District && i + 1 < lines.len();
        if orphan {
            current.pop();
            pages.push(std::mem::replace(&mut current, vec![line]));
        } else {
            pages.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        pages.push(current);
    }
    Ok(pages)
}

pub fn render_pages(pages: &[Vec<&ReportLine>]) -> String {
    let count = pages.len();
    let mut out = String::new();
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            out.push(PAGE_BREAK);
        }
        out.push_str(&format!("Página {} de {}\n\n", i + 1, count));
        for line in page {
            out.push_str(&line.text);
            out.push('\n');
        }
    }
    out
}

pub fn write_report(config: &AppConfig, agg: &Aggregation) -> Result<()> {
    let lines = report_lines(agg);
    let pages = paginate(&lines, config.output.lines_per_page)?;
    let text = render_pages(&pages);

    fs::create_dir_all(&config.output.dir).context("Failed to create output directory")?;
    let path = config.report_path();
    fs::write(&path, text).with_context(|| format!("Failed to write report {:?}", path))?;
    info!("Wrote {} report pages to {:?}", pages.len(), path);
    Ok(())
}

/// Grouped counts as `comuna,barrio,cantidad` rows, in display order.
pub fn write_export<W: Write>(agg: &Aggregation, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["comuna", "barrio", "cantidad"])?;
    for district in agg.ordered() {
        for barrio in district.barrios {
            let count = barrio.count.to_string();
            wtr.write_record([district.comuna, barrio.barrio.as_str(), count.as_str()])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_export_file(config: &AppConfig, agg: &Aggregation) -> Result<()> {
    fs::create_dir_all(&config.output.dir).context("Failed to create output directory")?;
    let path = config.export_path();
    let file = File::create(&path).with_context(|| format!("Failed to create export {:?}", path))?;
    write_export(agg, file)?;
    info!("Wrote grouped counts to {:?}", path);
    Ok(())
}
