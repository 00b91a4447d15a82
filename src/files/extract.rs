use crate::error_handler::CustomError;
use calamine::{open_workbook_auto, Data, Reader};
use serde_json::{Map, Number, Value};
use std::fs;
use std::path::Path;

/// One extracted row: original field name -> scalar value, in source order.
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Xml,
    Json,
    Xlsx,
    Xls,
    Txt,
}

impl FileFormat {
    pub fn from_extension(extension: &str) -> Result<FileFormat, CustomError> {
        match extension.to_lowercase().as_str() {
            "csv" => Ok(FileFormat::Csv),
            "xml" => Ok(FileFormat::Xml),
            "json" => Ok(FileFormat::Json),
            "xlsx" => Ok(FileFormat::Xlsx),
            "xls" => Ok(FileFormat::Xls),
            "txt" => Ok(FileFormat::Txt),
            other => Err(CustomError::unsupported_format(format!(
                "Unsupported file extension '{}'",
                other
            ))),
        }
    }

    pub fn from_path(path: &Path) -> Result<FileFormat, CustomError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(extension) => FileFormat::from_extension(extension),
            None => Err(CustomError::unsupported_format(
                "File has no extension".to_string(),
            )),
        }
    }
}

/// Converts an uploaded file into homogeneous records. Malformed input
/// propagates the underlying parser's error; there is no partial recovery.
pub fn extract_records(path: &Path, format: FileFormat) -> Result<Vec<Record>, CustomError> {
    match format {
        FileFormat::Csv => extract_csv(path),
        FileFormat::Txt => extract_txt(path),
        FileFormat::Xml => extract_xml(path),
        FileFormat::Json => extract_json(path),
        FileFormat::Xlsx | FileFormat::Xls => extract_excel(path),
    }
}

fn extract_csv(path: &Path) -> Result<Vec<Record>, CustomError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let mut record = Record::new();
        for (header, cell) in headers.iter().zip(row.iter()) {
            record.insert(header.to_string(), coerce_scalar(cell));
        }
        records.push(record);
    }
    Ok(records)
}

fn extract_txt(path: &Path) -> Result<Vec<Record>, CustomError> {
    let text = fs::read_to_string(path)?;
    let mut lines = text.lines();
    let headers: Vec<&str> = match lines.next() {
        Some(line) => line.split_whitespace().collect(),
        None => return Ok(Vec::new()),
    };
    let mut records = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let mut record = Record::new();
        for (header, cell) in headers.iter().zip(line.split_whitespace()) {
            record.insert(header.to_string(), coerce_scalar(cell));
        }
        records.push(record);
    }
    Ok(records)
}

fn extract_xml(path: &Path) -> Result<Vec<Record>, CustomError> {
    let text = fs::read_to_string(path)?;
    let document = roxmltree::Document::parse(&text)?;
    let mut records = Vec::new();
    for child in document.root_element().children().filter(|n| n.is_element()) {
        let mut record = Record::new();
        for element in child.children().filter(|n| n.is_element()) {
            record.insert(
                element.tag_name().name().to_string(),
                coerce_scalar(element.text().unwrap_or("")),
            );
        }
        records.push(record);
    }
    Ok(records)
}

fn extract_json(path: &Path) -> Result<Vec<Record>, CustomError> {
    let text = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text)?;
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(record) => Ok(record),
                _ => Err(CustomError::validation(
                    "JSON file must contain an array of objects",
                )),
            })
            .collect(),
        Value::Object(record) => Ok(vec![record]),
        _ => Err(CustomError::validation(
            "JSON file must contain an array of objects",
        )),
    }
}

fn extract_excel(path: &Path) -> Result<Vec<Record>, CustomError> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| CustomError::validation("Excel file has no sheets"))??;
    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(row) => row.iter().map(|cell| cell.to_string()).collect(),
        None => return Ok(Vec::new()),
    };
    let mut records = Vec::new();
    for row in rows {
        let mut record = Record::new();
        for (header, cell) in headers.iter().zip(row.iter()) {
            record.insert(header.clone(), cell_to_value(cell));
        }
        records.push(record);
    }
    Ok(records)
}

/// Text cells are parsed numerically so the inferred column type reflects
/// the data, not the carrier format: i64 first, then f64, else string.
/// Empty cells become null.
fn coerce_scalar(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::Number(int.into());
    }
    if let Ok(float) = trimmed.parse::<f64>() {
        if let Some(number) = Number::from_f64(float) {
            return Value::Number(number);
        }
    }
    Value::String(trimmed.to_string())
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => coerce_scalar(s),
        Data::Int(i) => Value::Number((*i).into()),
        // Excel stores integers as floats
        Data::Float(f)
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 =>
        {
            Value::Number((*f as i64).into())
        }
        Data::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        Data::Bool(b) => Value::String(b.to_string()),
        Data::DateTime(_) => Value::String(cell.to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::Error(_) => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn fixture(extension: &str, contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(&format!(".{}", extension))
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn extension_gate() {
        assert_eq!(FileFormat::from_extension("CSV").unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_extension("xlsx").unwrap(), FileFormat::Xlsx);
        assert!(FileFormat::from_extension("pdf").is_err());
        assert!(FileFormat::from_path(Path::new("noextension")).is_err());
        assert_eq!(
            FileFormat::from_path(Path::new("data.Json")).unwrap(),
            FileFormat::Json
        );
    }

    #[test]
    fn csv_rows_become_typed_records() {
        let file = fixture("csv", "Name,Age\nAlice,30\nBob,41\n");
        let records = extract_records(file.path(), FileFormat::Csv).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["Name"], json!("Alice"));
        assert_eq!(records[0]["Age"], json!(30));
        let keys: Vec<&str> = records[0].keys().map(String::as_str).collect();
        assert_eq!(keys, ["Name", "Age"]);
    }

    #[test]
    fn txt_zips_first_line_headers() {
        let file = fixture("txt", "city population\nParis 2100000\nNantes 320000\n");
        let records = extract_records(file.path(), FileFormat::Txt).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["city"], json!("Nantes"));
        assert_eq!(records[1]["population"], json!(320000));
    }

    #[test]
    fn xml_children_become_records() {
        let file = fixture(
            "xml",
            "<rows><row><name>Alice</name><age>30</age></row>\
             <row><name>Bob</name><age>41</age></row></rows>",
        );
        let records = extract_records(file.path(), FileFormat::Xml).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["name"], json!("Alice"));
        assert_eq!(records[0]["age"], json!(30));
    }

    #[test]
    fn json_array_passes_through() {
        let file = fixture("json", r#"[{"name": "Alice", "score": 1.5}]"#);
        let records = extract_records(file.path(), FileFormat::Json).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["score"], json!(1.5));
    }

    #[test]
    fn json_scalar_is_rejected() {
        let file = fixture("json", "42");
        assert!(extract_records(file.path(), FileFormat::Json).is_err());
    }

    #[test]
    fn malformed_csv_fails_fast() {
        let file = fixture("csv", "a,b\n1,2,3,4,5\n");
        assert!(extract_records(file.path(), FileFormat::Csv).is_err());
    }

    #[test]
    fn scalar_coercion() {
        assert_eq!(coerce_scalar("30"), json!(30));
        assert_eq!(coerce_scalar(" 2.5 "), json!(2.5));
        assert_eq!(coerce_scalar("Alice"), json!("Alice"));
        assert_eq!(coerce_scalar(""), Value::Null);
        assert_eq!(coerce_scalar("  "), Value::Null);
    }

    #[test]
    fn excel_cells_map_to_scalars() {
        assert_eq!(cell_to_value(&Data::Empty), Value::Null);
        assert_eq!(cell_to_value(&Data::Float(30.0)), json!(30));
        assert_eq!(cell_to_value(&Data::Float(2.5)), json!(2.5));
        assert_eq!(cell_to_value(&Data::Int(7)), json!(7));
        assert_eq!(cell_to_value(&Data::String("Alice".into())), json!("Alice"));
        assert_eq!(cell_to_value(&Data::Bool(true)), json!("true"));
    }

    #[test]
    fn first_record_keys_match_inferred_columns_for_every_format() {
        use crate::tables::infer::infer_schema;
        let fixtures = [
            ("csv", "Name,Age\nAlice,30\n", FileFormat::Csv),
            ("txt", "Name Age\nAlice 30\n", FileFormat::Txt),
            (
                "xml",
                "<r><p><Name>Alice</Name><Age>30</Age></p></r>",
                FileFormat::Xml,
            ),
            ("json", r#"[{"Name": "Alice", "Age": 30}]"#, FileFormat::Json),
        ];
        for (extension, contents, format) in fixtures {
            let file = fixture(extension, contents);
            let records = extract_records(file.path(), format).unwrap();
            let schema = infer_schema(&records[0]);
            let names: Vec<&str> = schema.iter().map(|c| c.name.as_str()).collect();
            assert_eq!(names, ["NAME", "AGE"], "format {:?}", format);
        }
    }
}
