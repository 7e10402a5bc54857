use std::borrow::Cow;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use ojol_core::config::AppConfig;
use ojol_core::report::{escape_html, ReportDocument};
use printpdf::{
    BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point,
};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{info, warn};

const PAGE_WIDTH_MM: f32 = 297.0;
const PAGE_HEIGHT_MM: f32 = 210.0;
const MARGIN_MM: f32 = 15.0;
const TITLE_SIZE_PT: f32 = 14.0;
const TEXT_SIZE_PT: f32 = 9.0;
const LINE_HEIGHT_MM: f32 = 4.0;
const CELL_PADDING_MM: f32 = 1.5;
const BASELINE_RAISE_MM: f32 = 1.0;
const BORDER_THICKNESS_PT: f32 = 0.5;
const TITLE_BLOCK_MM: f32 = 12.0;
const FOOTER_BLOCK_MM: f32 = 8.0;
const MM_PER_PT: f32 = 25.4 / 72.0;
const REPLACEMENT_CHAR: char = '?';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Pdf,
    Html,
    Csv,
    Json,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(Self::Pdf),
            "html" | "htm" => Ok(Self::Html),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(ExportError::UnsupportedFormat { extension }),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unsupported export format `{extension}`; use pdf, html, csv or json")]
    UnsupportedFormat { extension: String },
    #[error("failed to write export file at {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize JSON export: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read PDF font at {path}: {source}")]
    Font {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to render PDF: {0}")]
    Pdf(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    // Without a TrueType font the built-in Helvetica is used, which only
    // covers Latin-1.
    pub pdf_font: Option<PathBuf>,
}

impl ExportOptions {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            pdf_font: config.pdf_font.clone(),
        }
    }
}

pub fn export_document(
    path: &Path,
    document: &ReportDocument,
    options: &ExportOptions,
) -> Result<usize, ExportError> {
    let format = ExportFormat::from_path(path)?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| write_error(parent, source))?;
    }

    match format {
        ExportFormat::Pdf => write_pdf(path, document, options)?,
        ExportFormat::Html => write_file(path, render_html_page(document))?,
        ExportFormat::Csv => write_file(path, render_csv(document))?,
        ExportFormat::Json => write_file(path, render_json(document)?)?,
    }

    info!(
        report = %document.title,
        path = %path.display(),
        rows = document.rows.len(),
        ?format,
        "report exported"
    );
    Ok(document.rows.len())
}

fn write_error(path: &Path, source: std::io::Error) -> ExportError {
    ExportError::Write {
        path: path.display().to_string(),
        source,
    }
}

fn write_file(path: &Path, content: String) -> Result<(), ExportError> {
    fs::write(path, content).map_err(|source| write_error(path, source))
}

fn render_html_page(document: &ReportDocument) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n\
         </head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(&document.title),
        document.to_html()
    )
}

fn render_csv(document: &ReportDocument) -> String {
    let mut content = String::new();
    content.push_str(
        &document
            .headers
            .iter()
            .map(|header| csv_escape(header))
            .collect::<Vec<_>>()
            .join(","),
    );
    content.push('\n');

    for row in &document.rows {
        let values = (0..document.headers.len())
            .map(|column_index| csv_escape(cell(row, column_index)))
            .collect::<Vec<_>>();
        content.push_str(&values.join(","));
        content.push('\n');
    }
    content
}

fn render_json(document: &ReportDocument) -> Result<String, ExportError> {
    let records = document
        .rows
        .iter()
        .map(|row| {
            let object = document
                .headers
                .iter()
                .enumerate()
                .map(|(column_index, header)| {
                    let value = row
                        .get(column_index)
                        .map_or(Value::Null, |value| json!(value));
                    (header.clone(), value)
                })
                .collect::<Map<_, _>>();
            Value::Object(object)
        })
        .collect::<Vec<_>>();

    Ok(serde_json::to_string_pretty(&records)?)
}

fn cell(row: &[String], column_index: usize) -> &str {
    row.get(column_index).map_or("", String::as_str)
}

fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn column_width(columns: usize) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let columns = columns.max(1) as f32;
    (PAGE_WIDTH_MM - 2.0 * MARGIN_MM) / columns
}

fn glyph_em(ch: char) -> f32 {
    match ch {
        'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '\'' | '!' | '|' | ' ' => 0.28,
        'f' | 't' | 'r' | 'I' | '(' | ')' | '[' | ']' | '-' | '/' => 0.34,
        'W' | '@' => 1.02,
        'm' | 'w' | 'M' | '%' => 0.89,
        'A'..='Z' => 0.78,
        ch if u32::from(ch) > 0xFF => 1.0,
        _ => 0.56,
    }
}

fn text_width_mm(text: &str, size_pt: f32) -> f32 {
    text.chars().map(glyph_em).sum::<f32>() * size_pt * MM_PER_PT
}

fn wrap_text(text: &str, width_mm: f32, size_pt: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{line} {word}")
            };
            if text_width_mm(&candidate, size_pt) <= width_mm {
                line = candidate;
                continue;
            }

            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            for ch in word.chars() {
                line.push(ch);
                if line.chars().count() > 1 && text_width_mm(&line, size_pt) > width_mm {
                    line.pop();
                    lines.push(std::mem::take(&mut line));
                    line.push(ch);
                }
            }
        }
        lines.push(line);
    }
    lines
}

fn latin1_text(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_latin1_printable) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .map(|ch| {
                if is_latin1_printable(ch) || ch == '\n' {
                    ch
                } else {
                    REPLACEMENT_CHAR
                }
            })
            .collect(),
    )
}

fn is_latin1_printable(ch: char) -> bool {
    matches!(ch, ' '..='~' | '\u{A0}'..='\u{FF}')
}

#[derive(Debug, Clone, PartialEq)]
struct RowLayout {
    cells: Vec<Vec<String>>,
    height: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct TableLayout {
    column_width: f32,
    header: RowLayout,
    pages: Vec<Vec<RowLayout>>,
    replaced_chars: usize,
}

fn layout_row(
    cells: &[String],
    columns: usize,
    column_width: f32,
    latin1_only: bool,
    replaced_chars: &mut usize,
) -> RowLayout {
    let text_width = column_width - 2.0 * CELL_PADDING_MM;
    let cells = (0..columns)
        .map(|column_index| {
            let raw = cell(cells, column_index);
            let text = if latin1_only {
                let text = latin1_text(raw);
                if matches!(text, Cow::Owned(_)) {
                    *replaced_chars += raw
                        .chars()
                        .filter(|ch| !is_latin1_printable(*ch) && *ch != '\n')
                        .count();
                }
                text
            } else {
                Cow::Borrowed(raw)
            };
            wrap_text(&text, text_width, TEXT_SIZE_PT)
        })
        .collect::<Vec<_>>();

    let line_count = cells.iter().map(Vec::len).max().unwrap_or(1).max(1);
    #[allow(clippy::cast_precision_loss)]
    let height = line_count as f32 * LINE_HEIGHT_MM + 2.0 * CELL_PADDING_MM;
    RowLayout { cells, height }
}

// Rows are never split across pages.
fn layout_table(document: &ReportDocument, latin1_only: bool) -> TableLayout {
    let columns = document.headers.len().max(1);
    let column_width = column_width(columns);
    let mut replaced_chars = 0;
    let header = layout_row(
        &document.headers,
        columns,
        column_width,
        latin1_only,
        &mut replaced_chars,
    );

    let available =
        PAGE_HEIGHT_MM - 2.0 * MARGIN_MM - TITLE_BLOCK_MM - FOOTER_BLOCK_MM - header.height;
    let mut pages = vec![Vec::new()];
    let mut used = 0.0;
    for row in &document.rows {
        let row = layout_row(row, columns, column_width, latin1_only, &mut replaced_chars);
        let page_is_empty = pages.last().map_or(true, Vec::is_empty);
        if !page_is_empty && used + row.height > available {
            pages.push(Vec::new());
            used = 0.0;
        }
        used += row.height;
        if let Some(page) = pages.last_mut() {
            page.push(row);
        }
    }

    TableLayout {
        column_width,
        header,
        pages,
        replaced_chars,
    }
}

struct PdfFonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    embedded: bool,
}

fn load_fonts(
    pdf: &PdfDocumentReference,
    options: &ExportOptions,
) -> Result<PdfFonts, ExportError> {
    if let Some(path) = &options.pdf_font {
        let file = File::open(path).map_err(|source| ExportError::Font {
            path: path.display().to_string(),
            source,
        })?;
        let font = pdf
            .add_external_font(file)
            .map_err(|error| ExportError::Pdf(error.to_string()))?;
        return Ok(PdfFonts {
            regular: font.clone(),
            bold: font,
            embedded: true,
        });
    }

    Ok(PdfFonts {
        regular: pdf
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|error| ExportError::Pdf(error.to_string()))?,
        bold: pdf
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|error| ExportError::Pdf(error.to_string()))?,
        embedded: false,
    })
}

fn write_pdf(
    path: &Path,
    document: &ReportDocument,
    options: &ExportOptions,
) -> Result<(), ExportError> {
    let (pdf, first_page, first_layer) = PdfDocument::new(
        document.title.as_str(),
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );
    let fonts = load_fonts(&pdf, options)?;
    let layout = layout_table(document, !fonts.embedded);
    if layout.replaced_chars > 0 {
        warn!(
            report = %document.title,
            replaced = layout.replaced_chars,
            "characters outside Latin-1 were replaced; set pdf_font to embed a TrueType font"
        );
    }

    let title = if fonts.embedded {
        Cow::Borrowed(document.title.as_str())
    } else {
        latin1_text(&document.title)
    };
    let page_count = layout.pages.len();
    for (page_index, rows) in layout.pages.iter().enumerate() {
        let layer = if page_index == 0 {
            pdf.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = pdf.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            pdf.get_page(page).get_layer(layer)
        };
        layer.set_outline_thickness(BORDER_THICKNESS_PT);

        let mut top = PAGE_HEIGHT_MM - MARGIN_MM;
        layer.use_text(title.as_ref(), TITLE_SIZE_PT, Mm(MARGIN_MM), Mm(top), &fonts.bold);
        top -= TITLE_BLOCK_MM;

        draw_row(&layer, &fonts.bold, &layout.header, layout.column_width, top);
        top -= layout.header.height;
        for row in rows {
            draw_row(&layer, &fonts.regular, row, layout.column_width, top);
            top -= row.height;
        }

        layer.use_text(
            format!("Page {} of {page_count}", page_index + 1),
            TEXT_SIZE_PT,
            Mm(MARGIN_MM),
            Mm(MARGIN_MM),
            &fonts.regular,
        );
    }

    let file = File::create(path).map_err(|source| write_error(path, source))?;
    pdf.save(&mut BufWriter::new(file))
        .map_err(|error| ExportError::Pdf(error.to_string()))
}

fn draw_row(
    layer: &PdfLayerReference,
    font: &IndirectFontRef,
    row: &RowLayout,
    column_width: f32,
    top: f32,
) {
    let mut left = MARGIN_MM;
    for lines in &row.cells {
        let mut baseline = top - CELL_PADDING_MM - LINE_HEIGHT_MM + BASELINE_RAISE_MM;
        for line in lines {
            layer.use_text(
                line.as_str(),
                TEXT_SIZE_PT,
                Mm(left + CELL_PADDING_MM),
                Mm(baseline),
                font,
            );
            baseline -= LINE_HEIGHT_MM;
        }
        draw_cell_border(layer, left, top - row.height, column_width, row.height);
        left += column_width;
    }
}

fn draw_cell_border(layer: &PdfLayerReference, left: f32, bottom: f32, width: f32, height: f32) {
    let corners = [
        (left, bottom),
        (left + width, bottom),
        (left + width, bottom + height),
        (left, bottom + height),
    ];
    layer.add_line(Line {
        points: corners
            .iter()
            .map(|(x, y)| (Point::new(Mm(*x), Mm(*y)), false))
            .collect(),
        is_closed: true,
    });
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use ojol_core::report::ReportDocument;
    use tempfile::TempDir;

    use super::{
        column_width, export_document, layout_table, render_csv, text_width_mm, wrap_text,
        ExportError, ExportFormat, ExportOptions, RowLayout, CELL_PADDING_MM, FOOTER_BLOCK_MM,
        MARGIN_MM, PAGE_HEIGHT_MM, TEXT_SIZE_PT, TITLE_BLOCK_MM,
    };

    fn document(rows: usize) -> ReportDocument {
        ReportDocument {
            title: "5. Data Pembayaran".to_string(),
            headers: vec![
                "payment_id".to_string(),
                "metode".to_string(),
                "jumlah".to_string(),
            ],
            rows: (1..=rows)
                .map(|id| vec![id.to_string(), "e-wallet".to_string(), "25000.00".to_string()])
                .collect(),
        }
    }

    fn order_details(rows: usize) -> ReportDocument {
        ReportDocument {
            title: "6. Detail Pesanan".to_string(),
            headers: [
                "pesanan_id",
                "pelanggan",
                "email_pelanggan",
                "driver",
                "titik_awal",
                "titik_tujuan",
                "biaya",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            rows: (1..=rows)
                .map(|id| {
                    vec![
                        id.to_string(),
                        "Andi Pratama Wijayakusuma".to_string(),
                        "andi.pratama@example.co.id".to_string(),
                        "Çağlar Øster".to_string(),
                        "Jl. Jenderal Sudirman Kav. 52-53, Jakarta Selatan".to_string(),
                        "Ωmega Tower № 7".to_string(),
                        "125000.00".to_string(),
                    ]
                })
                .collect(),
        }
    }

    fn squeeze(text: &str) -> String {
        text.chars().filter(|ch| !ch.is_whitespace()).collect()
    }

    fn cell_text(lines: &[String]) -> String {
        squeeze(&lines.concat())
    }

    fn text_width(columns: usize) -> f32 {
        column_width(columns) - 2.0 * CELL_PADDING_MM
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            ExportFormat::from_path(Path::new("out/report.PDF")).expect("pdf"),
            ExportFormat::Pdf
        );
        assert_eq!(
            ExportFormat::from_path(Path::new("report.htm")).expect("html"),
            ExportFormat::Html
        );
        assert!(matches!(
            ExportFormat::from_path(Path::new("report.xlsx")),
            Err(ExportError::UnsupportedFormat { extension }) if extension == "xlsx"
        ));
        assert!(ExportFormat::from_path(Path::new("report")).is_err());
    }

    #[test]
    fn csv_escapes_and_pads_short_rows() {
        let mut document = document(1);
        document.rows.push(vec!["2".to_string(), "quote \"cash\", ok".to_string()]);

        let csv = render_csv(&document);

        assert!(csv.starts_with("payment_id,metode,jumlah\n"));
        assert!(csv.contains("1,e-wallet,25000.00\n"));
        assert!(csv.contains("2,\"quote \"\"cash\"\", ok\",\n"));
    }

    #[test]
    fn json_export_keys_values_by_header() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("payments.json");

        let written = export_document(&path, &document(2), &ExportOptions::default())
            .expect("json export failed");

        assert_eq!(written, 2);
        let output = fs::read_to_string(path).expect("failed to read json output");
        let parsed: serde_json::Value = serde_json::from_str(&output).expect("invalid json");
        assert_eq!(parsed[1]["payment_id"], "2");
        assert_eq!(parsed[1]["metode"], "e-wallet");
    }

    #[test]
    fn html_export_wraps_escaped_table() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("nested").join("report.html");
        let mut document = document(1);
        document.rows[0][1] = "<cash>".to_string();

        export_document(&path, &document, &ExportOptions::default()).expect("html export failed");

        let output = fs::read_to_string(path).expect("failed to read html output");
        assert!(output.contains("<title>5. Data Pembayaran</title>"));
        assert!(output.contains("<td>&lt;cash&gt;</td>"));
    }

    #[test]
    fn long_words_wrap_inside_their_column() {
        let width = text_width(7);

        let lines = wrap_text("andi.pratama@example.co.id", width, TEXT_SIZE_PT);

        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), "andi.pratama@example.co.id");
        assert!(lines
            .iter()
            .all(|line| text_width_mm(line, TEXT_SIZE_PT) <= width));
    }

    #[test]
    fn sentences_wrap_at_spaces() {
        let address = "Jl. Jenderal Sudirman Kav. 52-53, Jakarta Selatan";

        let lines = wrap_text(address, text_width(7), TEXT_SIZE_PT);

        assert!(lines.len() > 1);
        assert_eq!(lines.join(" "), address);
        assert_eq!(wrap_text("cash", 40.0, TEXT_SIZE_PT), vec!["cash"]);
        assert_eq!(wrap_text("", 40.0, TEXT_SIZE_PT), vec![String::new()]);
    }

    #[test]
    fn pdf_layout_keeps_every_header_and_cell() {
        let document = order_details(3);

        let layout = layout_table(&document, false);

        assert_eq!(layout.pages.len(), 1);
        let header = layout
            .header
            .cells
            .iter()
            .map(|lines| cell_text(lines))
            .collect::<Vec<_>>();
        assert_eq!(
            header,
            document.headers.iter().map(|h| squeeze(h)).collect::<Vec<_>>()
        );
        let rows = layout.pages.concat();
        assert_eq!(rows.len(), document.rows.len());
        for (laid_out, source) in rows.iter().zip(&document.rows) {
            let texts = laid_out.cells.iter().map(|lines| cell_text(lines));
            assert!(texts.eq(source.iter().map(|value| squeeze(value))));
            assert!(laid_out
                .cells
                .iter()
                .flatten()
                .all(|line| text_width_mm(line, TEXT_SIZE_PT) <= text_width(7)));
        }
        assert_eq!(layout.replaced_chars, 0);
    }

    #[test]
    fn builtin_font_layout_replaces_only_characters_outside_latin1() {
        let layout = layout_table(&order_details(1), true);

        let row: &RowLayout = &layout.pages[0][0];
        assert_eq!(cell_text(&row.cells[3]), "Ça?larØster");
        assert_eq!(cell_text(&row.cells[5]), "?megaTower?7");
        assert_eq!(layout.replaced_chars, 3);
    }

    #[test]
    fn tall_rows_push_pagination_forward() {
        let document = order_details(40);

        let layout = layout_table(&document, false);

        assert!(layout.pages.len() > 1);
        let available = PAGE_HEIGHT_MM
            - 2.0 * MARGIN_MM
            - TITLE_BLOCK_MM
            - FOOTER_BLOCK_MM
            - layout.header.height;
        for page in &layout.pages {
            assert!(!page.is_empty());
            assert!(page.iter().map(|row| row.height).sum::<f32>() <= available);
        }
        assert_eq!(layout.pages.concat().len(), 40);
    }

    #[test]
    fn pdf_export_writes_wrapped_multi_page_report() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("6. Detail Pesanan.pdf");

        let written = export_document(&path, &order_details(40), &ExportOptions::default())
            .expect("pdf export failed");

        assert_eq!(written, 40);
        let bytes = fs::read(path).expect("failed to read pdf output");
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn missing_pdf_font_is_reported() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let options = ExportOptions {
            pdf_font: Some(PathBuf::from("/nonexistent/ojol-font.ttf")),
        };

        let err = export_document(&temp_dir.path().join("report.pdf"), &document(1), &options)
            .expect_err("font is missing");

        assert!(matches!(err, ExportError::Font { .. }));
    }
}
