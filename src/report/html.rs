//! Self-contained HTML assembly. Charts arrive as `data:` URIs, so the
//! written file has no external references.

use std::fmt::Write as FmtWrite;

/// A chart in the sequential layout.
#[derive(Debug, Clone)]
pub struct Panel {
    /// Caption lines, first one bold.
    pub caption: Vec<String>,
    pub image: String,
}

/// One run heading with its average and charts.
#[derive(Debug, Clone)]
pub struct RunSection {
    pub run: String,
    /// `Run 12 average std radius: 0.0123`
    pub average: Option<String>,
    pub panels: Vec<Panel>,
}

#[derive(Debug, Clone)]
pub enum GridCell {
    Chart(String),
    NoData,
}

#[derive(Debug, Clone)]
pub struct GridRow {
    pub label: String,
    pub cells: Vec<GridCell>,
}

#[derive(Debug, Clone)]
pub enum Body {
    Grid {
        runs: Vec<String>,
        rows: Vec<GridRow>,
    },
    Sequential(Vec<RunSection>),
}

#[derive(Debug, Clone)]
pub struct Document {
    pub title: String,
    pub heading: String,
    pub filter_summary: Option<String>,
    /// `Spot`, `Row`, ...
    pub legend_label: String,
    pub density_label: String,
    pub tolerance_radius: f64,
    /// (key, hex colour) in assignment order.
    pub legend: Vec<(String, String)>,
    pub body: Body,
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub fn render(doc: &Document) -> Result<String, std::fmt::Error> {
    let mut html = String::with_capacity(64 * 1024);

    writeln!(html, "<!DOCTYPE html>")?;
    writeln!(html, "<html lang=\"en\">")?;
    writeln!(html, "<head>")?;
    writeln!(html, "<meta charset=\"utf-8\"/>")?;
    writeln!(html, "<title>{}</title>", html_escape(&doc.title))?;
    writeln!(html, "<style>")?;
    writeln!(
        html,
        "body{{font-family:Arial,Helvetica,sans-serif;margin:20px;color:#222;background:#fff;}}"
    )?;
    writeln!(
        html,
        ".circles{{margin-bottom:15px;padding:10px;background:#f9f9f9;border:1px solid #ddd;}}"
    )?;
    writeln!(
        html,
        ".swatch{{display:inline-block;width:16px;height:16px;margin-right:4px;vertical-align:middle;}}"
    )?;
    writeln!(html, ".panel{{display:inline-block;margin:5px;vertical-align:top;text-align:center;font-size:12px;}}")?;
    writeln!(html, ".grid{{border-collapse:collapse;}}")?;
    writeln!(html, ".grid th,.grid td{{border:1px solid #999;padding:2px;text-align:center;}}")?;
    writeln!(html, ".nodata{{color:#888;font-size:12px;}}")?;
    writeln!(html, "</style>")?;
    writeln!(html, "</head>")?;
    writeln!(html, "<body>")?;

    if let Some(summary) = &doc.filter_summary {
        writeln!(
            html,
            "<div class=\"filters\" style=\"margin-bottom:10px;font-weight:bold;\">Filters applied: {}</div>",
            html_escape(summary)
        )?;
    }

    write_circle_legend(&mut html, doc)?;
    write_color_legend(&mut html, doc)?;

    writeln!(html, "<h1>{}</h1>", html_escape(&doc.heading))?;
    match &doc.body {
        Body::Grid { runs, rows } => write_grid(&mut html, runs, rows)?,
        Body::Sequential(sections) => write_sections(&mut html, sections)?,
    }

    writeln!(html, "</body>")?;
    writeln!(html, "</html>")?;
    Ok(html)
}

fn write_circle_legend(html: &mut String, doc: &Document) -> std::fmt::Result {
    writeln!(html, "<div class=\"circles\">")?;
    writeln!(
        html,
        "<div style=\"margin-bottom:5px;\"><span style=\"display:inline-block;width:20px;height:3px;background:black;margin-right:8px;vertical-align:middle;\"></span><b>Black circle:</b> Density area (2 × {})</div>",
        html_escape(&doc.density_label)
    )?;
    writeln!(
        html,
        "<div><span style=\"display:inline-block;width:20px;height:0;border-top:2px dotted blue;margin-right:8px;vertical-align:middle;\"></span><b>Blue dotted line:</b> Tolerance area (radius {})</div>",
        doc.tolerance_radius
    )?;
    writeln!(html, "</div>")
}

fn write_color_legend(html: &mut String, doc: &Document) -> std::fmt::Result {
    writeln!(
        html,
        "<div class=\"legend\" style=\"margin-bottom:10px;\"><b>{} Color Legend:</b><br/>",
        html_escape(&doc.legend_label)
    )?;
    for (key, color) in &doc.legend {
        writeln!(
            html,
            "<span class=\"swatch\" style=\"background:{color};\"></span> {} ",
            html_escape(key)
        )?;
    }
    writeln!(html, "</div>")
}

fn write_grid(html: &mut String, runs: &[String], rows: &[GridRow]) -> std::fmt::Result {
    writeln!(html, "<table class=\"grid\">")?;
    write!(html, "<tr><th></th>")?;
    for run in runs {
        write!(html, "<th>Run {}</th>", html_escape(run))?;
    }
    writeln!(html, "</tr>")?;
    for row in rows {
        write!(html, "<tr><td>{}</td>", html_escape(&row.label))?;
        for cell in &row.cells {
            match cell {
                GridCell::Chart(uri) => write!(html, "<td><img src=\"{uri}\"/></td>")?,
                GridCell::NoData => write!(html, "<td class=\"nodata\">No data</td>")?,
            }
        }
        writeln!(html, "</tr>")?;
    }
    writeln!(html, "</table>")
}

fn write_sections(html: &mut String, sections: &[RunSection]) -> std::fmt::Result {
    for section in sections {
        writeln!(html, "<h2>Run {}</h2>", html_escape(&section.run))?;
        if let Some(avg) = &section.average {
            writeln!(html, "<div class=\"average\"><b>{}</b></div>", html_escape(avg))?;
        }
        for panel in &section.panels {
            write!(html, "<div class=\"panel\">")?;
            for (i, line) in panel.caption.iter().enumerate() {
                if i == 0 {
                    write!(html, "<b>{}</b><br/>", html_escape(line))?;
                } else {
                    write!(html, "{}<br/>", html_escape(line))?;
                }
            }
            writeln!(html, "<img src=\"{}\"/></div>", panel.image)?;
        }
        writeln!(html, "<hr/>")?;
    }
    Ok(())
}
