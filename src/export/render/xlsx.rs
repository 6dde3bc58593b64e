use std::collections::HashSet;
use std::io::{Cursor, Write};

use anyhow::{Context, Result};
use serde_json::Value;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::constants::MAX_SHEET_NAME_LEN;
use crate::models::TableData;

const CONTENT_TYPES_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const SHEET_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
const SHEET_REL_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";

/// Escape text for use inside XML content or attribute values.
pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // control characters are not allowed in XML 1.0
            c if (c as u32) < 0x20 && c != '\t' && c != '\n' && c != '\r' => {}
            c => out.push(c),
        }
    }
    out
}

/// Column letters for a zero-based index: 0 -> A, 25 -> Z, 26 -> AA.
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// A worksheet name that is legal and unique within `used`.
pub fn sheet_name(table: &str, used: &mut HashSet<String>) -> String {
    let cleaned: String = table
        .chars()
        .map(|c| if matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\') { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches('\'').to_string();
    let base: String = if cleaned.is_empty() { "sheet".to_string() } else { cleaned };

    let mut candidate: String = base.chars().take(MAX_SHEET_NAME_LEN).collect();
    let mut counter = 1;
    while used.contains(&candidate.to_lowercase()) {
        counter += 1;
        let suffix = format!("~{}", counter);
        let keep = MAX_SHEET_NAME_LEN - suffix.chars().count();
        candidate = format!("{}{}", base.chars().take(keep).collect::<String>(), suffix);
    }

    used.insert(candidate.to_lowercase());
    candidate
}

fn cell_xml(reference: &str, value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => format!(r#"<c r="{}" t="b"><v>{}</v></c>"#, reference, u8::from(*b)),
        Value::Number(n) => format!(r#"<c r="{}"><v>{}</v></c>"#, reference, n),
        Value::String(s) => inline_string(reference, s),
        Value::Array(_) | Value::Object(_) => inline_string(reference, &value.to_string()),
    }
}

fn inline_string(reference: &str, text: &str) -> String {
    format!(
        r#"<c r="{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
        reference,
        xml_escape(text)
    )
}

fn sheet_xml(table: &TableData) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );

    if !table.columns.is_empty() {
        xml.push_str(r#"<row r="1">"#);
        for (i, column) in table.columns.iter().enumerate() {
            xml.push_str(&inline_string(&format!("{}1", column_letter(i)), column));
        }
        xml.push_str("</row>");
    }

    for (row_idx, row) in table.rows.iter().enumerate() {
        let row_number = row_idx + 2;
        xml.push_str(&format!(r#"<row r="{}">"#, row_number));
        for (col_idx, value) in row.iter().enumerate().take(table.columns.len()) {
            let reference = format!("{}{}", column_letter(col_idx), row_number);
            xml.push_str(&cell_xml(&reference, value));
        }
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Minimal SpreadsheetML workbook with one worksheet per table.
///
/// Cells use inline strings, so no shared-string table is written. An
/// export without tables still gets one empty sheet, since a workbook
/// must contain at least one.
pub fn render_xlsx(tables: &[TableData]) -> Result<Vec<u8>> {
    let placeholder = [TableData {
        name: "empty".to_string(),
        ..TableData::default()
    }];
    let tables: &[TableData] = if tables.is_empty() { &placeholder } else { tables };

    let mut used = HashSet::new();
    let names: Vec<String> = tables.iter().map(|t| sheet_name(&t.name, &mut used)).collect();

    let mut content_types = String::from(CONTENT_TYPES_HEAD);
    let mut workbook = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    let mut workbook_rels = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );

    for (i, name) in names.iter().enumerate() {
        let n = i + 1;
        content_types.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="{}"/>"#,
            n, SHEET_CONTENT_TYPE
        ));
        workbook.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            xml_escape(name),
            n,
            n
        ));
        workbook_rels.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="{}" Target="worksheets/sheet{}.xml"/>"#,
            n, SHEET_REL_TYPE, n
        ));
    }

    content_types.push_str("</Types>");
    workbook.push_str("</sheets></workbook>");
    workbook_rels.push_str("</Relationships>");

    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    let add = |zip: &mut ZipWriter<Cursor<Vec<u8>>>, path: &str, body: &str| -> Result<()> {
        zip.start_file(path, options)
            .context(format!("Failed to start workbook part {}", path))?;
        zip.write_all(body.as_bytes())
            .context(format!("Failed to write workbook part {}", path))?;
        Ok(())
    };

    add(&mut zip, "[Content_Types].xml", &content_types)?;
    add(&mut zip, "_rels/.rels", ROOT_RELS)?;
    add(&mut zip, "xl/workbook.xml", &workbook)?;
    add(&mut zip, "xl/_rels/workbook.xml.rels", &workbook_rels)?;
    for (i, table) in tables.iter().enumerate() {
        add(&mut zip, &format!("xl/worksheets/sheet{}.xml", i + 1), &sheet_xml(table))?;
    }

    let cursor = zip.finish().context("Failed to finish workbook archive")?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Read;
    use zip::ZipArchive;

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn test_sheet_names_are_legal_and_unique() {
        let mut used = HashSet::new();
        assert_eq!(sheet_name("orders", &mut used), "orders");
        assert_eq!(sheet_name("ORDERS", &mut used), "ORDERS~2");
        assert_eq!(sheet_name("a/b:c", &mut used), "a_b_c");

        let long = "x".repeat(40);
        let first = sheet_name(&long, &mut used);
        let second = sheet_name(&long, &mut used);
        assert_eq!(first.chars().count(), 31);
        assert_eq!(second.chars().count(), 31);
        assert!(second.ends_with("~2"));
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
        assert_eq!(xml_escape("bell\u{7}"), "bell");
    }

    #[test]
    fn test_workbook_structure() {
        let tables = vec![
            TableData {
                name: "users".to_string(),
                columns: vec!["id".to_string(), "name".to_string(), "active".to_string()],
                rows: vec![vec![json!(1), json!("Ann & Co"), json!(true)]],
            },
            TableData {
                name: "empty_table".to_string(),
                columns: vec!["id".to_string()],
                rows: Vec::new(),
            },
        ];

        let bytes = render_xlsx(&tables).unwrap();
        assert_eq!(&bytes[..2], b"PK");

        let workbook = read_part(&bytes, "xl/workbook.xml");
        assert!(workbook.contains(r#"<sheet name="users" sheetId="1" r:id="rId1"/>"#));
        assert!(workbook.contains(r#"<sheet name="empty_table" sheetId="2" r:id="rId2"/>"#));

        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains(r#"<c r="A2"><v>1</v></c>"#));
        assert!(sheet.contains("Ann &amp; Co"));
        assert!(sheet.contains(r#"<c r="C2" t="b"><v>1</v></c>"#));

        let types = read_part(&bytes, "[Content_Types].xml");
        assert!(types.contains("/xl/worksheets/sheet2.xml"));
    }

    #[test]
    fn test_no_tables_still_has_a_sheet() {
        let bytes = render_xlsx(&[]).unwrap();
        let workbook = read_part(&bytes, "xl/workbook.xml");
        assert!(workbook.contains(r#"<sheet name="empty""#));
        read_part(&bytes, "xl/worksheets/sheet1.xml");
    }
}
