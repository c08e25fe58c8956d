use std::ops::Range;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use super::{ReportDocument, ReportError};

// A4, 30pt margins
const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 10.6;

const TITLE_SIZE: f32 = 24.0;
const SUBTITLE_SIZE: f32 = 18.0;
const CELL_SIZE: f32 = 10.0;
const ROW_HEIGHT: f32 = 7.0;
const CELL_PADDING: f32 = 1.5;
const TITLE_GAP: f32 = 20.0;
const SUBTITLE_GAP: f32 = 10.0;

const MM_PER_PT: f32 = 0.3528;
// Rough average Helvetica glyph width as a fraction of the font size.
const AVG_GLYPH_WIDTH: f32 = 0.5;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

struct Cursor {
    layer: PdfLayerReference,
    y: f32,
}

/// Renders the report onto A4 pages; rows that overflow a page continue on
/// the next one under a repeated header row.
pub fn write_pdf(document: &ReportDocument) -> Result<Vec<u8>, ReportError> {
    let (doc, page, layer) = PdfDocument::new(
        document.title.as_str(),
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "Layer 1",
    );
    let fonts = Fonts {
        regular: doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?,
        bold: doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_error)?,
    };
    let mut cursor = Cursor {
        layer: doc.get_page(page).get_layer(layer),
        y: PAGE_HEIGHT - MARGIN,
    };

    cursor.y -= TITLE_SIZE * MM_PER_PT;
    let title = printable(&document.title);
    let title_x = (PAGE_WIDTH - text_width(&title, TITLE_SIZE)) / 2.0;
    cursor.layer.use_text(
        title,
        TITLE_SIZE,
        Mm(title_x.max(MARGIN)),
        Mm(cursor.y),
        &fonts.bold,
    );
    cursor.y -= TITLE_GAP * MM_PER_PT;

    for subtitle in &document.subtitles {
        cursor.y -= SUBTITLE_SIZE * MM_PER_PT;
        cursor.layer.use_text(printable(subtitle), SUBTITLE_SIZE, Mm(MARGIN), Mm(cursor.y), &fonts.regular);
        cursor.y -= SUBTITLE_GAP * MM_PER_PT;
    }

    let column_width = (PAGE_WIDTH - 2.0 * MARGIN) / document.columns.len().max(1) as f32;
    for (index, rows) in paginate(document).into_iter().enumerate() {
        if index > 0 {
            cursor = next_page(&doc);
        }
        draw_row(&cursor, &document.columns, column_width, &fonts.bold);
        cursor.y -= ROW_HEIGHT;
        for row in &document.rows[rows] {
            draw_row(&cursor, row, column_width, &fonts.regular);
            cursor.y -= ROW_HEIGHT;
        }
    }

    doc.save_to_bytes().map_err(pdf_error)
}

/// Row ranges per page. The first page starts below the title block, every
/// page below its header row. An empty report is one page.
pub fn paginate(document: &ReportDocument) -> Vec<Range<usize>> {
    let title_block = (TITLE_SIZE + TITLE_GAP) * MM_PER_PT
        + document.subtitles.len() as f32 * (SUBTITLE_SIZE + SUBTITLE_GAP) * MM_PER_PT;
    let mut y = PAGE_HEIGHT - MARGIN - title_block - ROW_HEIGHT;

    let mut pages = Vec::new();
    let mut start = 0;
    for i in 0..document.rows.len() {
        if y - ROW_HEIGHT < MARGIN {
            pages.push(start..i);
            start = i;
            y = PAGE_HEIGHT - MARGIN - ROW_HEIGHT;
        }
        y -= ROW_HEIGHT;
    }
    pages.push(start..document.rows.len());
    pages
}

fn next_page(doc: &PdfDocumentReference) -> Cursor {
    let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    Cursor {
        layer: doc.get_page(page).get_layer(layer),
        y: PAGE_HEIGHT - MARGIN,
    }
}

fn draw_row(cursor: &Cursor, cells: &[String], column_width: f32, font: &IndirectFontRef) {
    let baseline = cursor.y - ROW_HEIGHT + CELL_PADDING * 2.0;
    for (i, cell) in cells.iter().enumerate() {
        let x = MARGIN + i as f32 * column_width + CELL_PADDING;
        let text = fit_to_width(&printable(cell), column_width - 2.0 * CELL_PADDING, CELL_SIZE);
        cursor.layer.use_text(text, CELL_SIZE, Mm(x), Mm(baseline), font);
    }
}

/// The built-in fonts only cover Latin-1 printable characters; anything
/// else is shown as "?".
fn printable(text: &str) -> String {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c,
            _ => '?',
        })
        .collect()
}

fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * AVG_GLYPH_WIDTH * MM_PER_PT
}

/// Truncates `text` with a trailing "..." so it fits `width` millimetres.
fn fit_to_width(text: &str, width: f32, size: f32) -> String {
    let max_chars = (width / (size * AVG_GLYPH_WIDTH * MM_PER_PT)).floor() as usize;
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str("...");
    truncated
}

fn pdf_error(error: printpdf::Error) -> ReportError {
    ReportError::Pdf(format!("{:?}", error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::render_report;
    use crate::ward::census::tests::patient;
    use crate::ward::{PatientStatus, Specialty};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pdf_bytes_are_a_pdf() {
        let patients: Vec<_> = (0..3)
            .map(|i| patient(&format!("N{}", i), 1, Specialty::Neurology, PatientStatus::Active))
            .collect();
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let bytes = write_pdf(&render_report(&patients, day, Some(Specialty::Neurology))).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_overflowing_rows_span_pages() {
        let patients: Vec<_> = (0..120)
            .map(|i| patient(&format!("P{:03}", i), 1, Specialty::Hematology, PatientStatus::Active))
            .collect();
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let document = render_report(&patients, day, None);

        // 34 rows under the title block, 38 on each continuation page.
        assert_eq!(paginate(&document), vec![0..34, 34..72, 72..110, 110..120]);

        let bytes = write_pdf(&document).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_page_break_after_first_page_capacity() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let patients: Vec<_> = (0..35)
            .map(|i| patient(&format!("P{:03}", i), 1, Specialty::Hematology, PatientStatus::Active))
            .collect();

        assert_eq!(paginate(&render_report(&patients[..34], day, None)), vec![0..34]);
        assert_eq!(paginate(&render_report(&patients, day, None)), vec![0..34, 34..35]);
        assert_eq!(paginate(&render_report(&[], day, None)), vec![0..0]);
    }

    #[test]
    fn test_characters_outside_builtin_fonts_are_replaced() {
        assert_eq!(printable("Zoë Brontë"), "Zoë Brontë");
        assert_eq!(printable("李 Wei"), "? Wei");
        assert_eq!(printable("Иван\tPetrov"), "?????Petrov");

        let mut named = patient("A100", 1, Specialty::Neurology, PatientStatus::Active);
        named.patient_name = "王小明".to_string();
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(write_pdf(&render_report(&[named], day, None)).unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn test_long_cells_are_truncated() {
        let fitted = fit_to_width("Community acquired pneumonia with sepsis", 34.8, CELL_SIZE);
        assert!(fitted.ends_with("..."));
        assert!(text_width(&fitted, CELL_SIZE) <= 34.8);

        assert_eq!(fit_to_width("Migraine", 34.8, CELL_SIZE), "Migraine");
    }
}
