//! Supplier feed decoding.
//!
//! YAML and JSON documents are mappings with an optional `shop` (a mapping
//! with `name`, or a bare string) and a `products` sequence. The first sheet
//! of an XLSX workbook is read as a table: the header row names the fields,
//! `param:<name>` columns become parameters and a `shop` column names the
//! shop. Each record is coerced on its own so one bad row never sinks the
//! rest of the feed.

use calamine::{Data, Reader, Xlsx};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::aggregates::{ProductInfo, MAX_STOCK};
use crate::domain::value_objects::Price;
use crate::{Result, ShopError};

const PARAM_PREFIX: &str = "param:";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedFormat {
    Yaml,
    Json,
    Xlsx,
}

impl FeedFormat {
    /// Picks the format from the file extension, case-insensitively.
    pub fn from_filename(filename: &str) -> Result<Self> {
        let ext = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            "xlsx" => Ok(Self::Xlsx),
            _ => Err(ShopError::UnsupportedFormat(filename.to_string())),
        }
    }
}

/// A decoded feed before per-record coercion.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Feed {
    pub shop: Option<String>,
    pub records: Vec<Value>,
}

pub fn parse(filename: &str, raw: &[u8]) -> Result<Feed> {
    match FeedFormat::from_filename(filename)? {
        FeedFormat::Yaml => {
            let doc: Value = serde_yaml::from_slice(raw).map_err(|e| ShopError::validation(format!("invalid YAML: {e}")))?;
            document_to_feed(doc)
        }
        FeedFormat::Json => {
            let doc: Value = serde_json::from_slice(raw).map_err(|e| ShopError::validation(format!("invalid JSON: {e}")))?;
            document_to_feed(doc)
        }
        FeedFormat::Xlsx => workbook_to_feed(raw),
    }
}

fn document_to_feed(doc: Value) -> Result<Feed> {
    let Value::Object(mut doc) = doc else {
        return Err(ShopError::validation("feed must be a mapping"));
    };
    let shop = match doc.remove("shop") {
        None | Some(Value::Null) => None,
        Some(Value::String(name)) => non_blank(&name),
        Some(Value::Object(shop)) => match shop.get("name") {
            None | Some(Value::Null) => None,
            Some(Value::String(name)) => non_blank(name),
            Some(_) => return Err(ShopError::validation("shop name must be a string")),
        },
        Some(_) => return Err(ShopError::validation("shop must be a mapping")),
    };
    let records = match doc.remove("products") {
        None | Some(Value::Null) => vec![],
        Some(Value::Array(records)) => records,
        Some(_) => return Err(ShopError::validation("products must be a sequence")),
    };
    Ok(Feed { shop, records })
}

fn workbook_to_feed(raw: &[u8]) -> Result<Feed> {
    let mut workbook: Xlsx<_> =
        Xlsx::new(Cursor::new(raw)).map_err(|e| ShopError::validation(format!("unreadable workbook: {e}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ShopError::validation("workbook has no sheets"))?
        .map_err(|e| ShopError::validation(format!("unreadable sheet: {e}")))?;
    let rows: Vec<&[Data]> = range.rows().collect();
    Ok(table_to_feed(&rows))
}

/// Turns a header row plus data rows into feed records. Blank rows are dropped.
pub(crate) fn table_to_feed(rows: &[&[Data]]) -> Feed {
    let Some((header, body)) = rows.split_first() else {
        return Feed::default();
    };
    let columns: Vec<Option<String>> = header
        .iter()
        .map(|cell| cell_value(cell).and_then(|v| v.as_str().map(str::to_string)))
        .collect();

    let mut feed = Feed::default();
    for row in body {
        let mut record = Map::new();
        let mut parameters = Map::new();
        for (column, cell) in columns.iter().zip(row.iter()) {
            let (Some(column), Some(value)) = (column, cell_value(cell)) else { continue };
            if let Some(name) = column.strip_prefix(PARAM_PREFIX) {
                let name = name.trim();
                if !name.is_empty() {
                    parameters.insert(name.to_string(), value);
                }
            } else if column == "shop" {
                if feed.shop.is_none() {
                    feed.shop = value.as_str().and_then(non_blank);
                }
            } else {
                record.insert(column.clone(), value);
            }
        }
        if record.is_empty() && parameters.is_empty() {
            continue;
        }
        if !parameters.is_empty() {
            record.insert("parameters".to_string(), Value::Object(parameters));
        }
        feed.records.push(Value::Object(record));
    }
    feed
}

fn cell_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Int(i) => Some(Value::from(*i)),
        Data::Float(f) => serde_json::Number::from_f64(*f).map(Value::Number),
        Data::String(s) => non_blank(s).map(Value::String),
        Data::Bool(b) => Some(Value::Bool(*b)),
        Data::DateTimeIso(s) | Data::DurationIso(s) => non_blank(s).map(Value::String),
        _ => None,
    }
}

fn non_blank(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// One product line of a feed after coercion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductRecord {
    pub name: String,
    pub category: Option<String>,
    pub name_in_shop: Option<String>,
    pub quantity: Option<u32>,
    pub price: Option<Price>,
    pub price_rrc: Option<Price>,
    pub parameters: BTreeMap<String, String>,
}

impl ProductRecord {
    /// Coerces a raw record; the error is the skip reason.
    pub fn from_value(raw: &Value) -> std::result::Result<Self, String> {
        let fields = raw.as_object().ok_or("record is not a mapping")?;
        let field = |key: &str| fields.get(key).filter(|v| !v.is_null());

        let name = field("name")
            .map(|v| text(v, "name"))
            .transpose()?
            .flatten()
            .ok_or("missing product name")?;
        let category = field("category").map(|v| text(v, "category")).transpose()?.flatten();
        let name_in_shop = field("name_in_shop").map(|v| text(v, "name_in_shop")).transpose()?.flatten();
        let quantity = field("quantity").map(stock).transpose()?;
        let price = field("price").map(|v| amount(v, "price")).transpose()?;
        let price_rrc = field("price_rrc").map(|v| amount(v, "price_rrc")).transpose()?;

        let mut parameters = BTreeMap::new();
        match field("parameters") {
            None => {}
            Some(Value::Object(params)) => {
                for (key, value) in params {
                    let key = key.trim();
                    if key.is_empty() {
                        return Err("parameter name is empty".to_string());
                    }
                    let value = match value {
                        Value::String(s) => s.trim().to_string(),
                        Value::Number(n) => n.to_string(),
                        Value::Bool(b) => b.to_string(),
                        Value::Null => String::new(),
                        _ => return Err(format!("parameter '{key}' must be a scalar")),
                    };
                    parameters.insert(key.to_string(), value);
                }
            }
            Some(_) => return Err("parameters must be a mapping".to_string()),
        }

        Ok(Self { name, category, name_in_shop, quantity, price, price_rrc, parameters })
    }

    /// A fresh listing; missing stock and prices start at zero.
    pub fn new_listing(&self, product_id: Uuid, shop_id: Uuid) -> ProductInfo {
        ProductInfo {
            id: Uuid::now_v7(),
            product_id,
            shop_id,
            name: self.name_in_shop.clone().unwrap_or_else(|| self.name.clone()),
            quantity: self.quantity.unwrap_or(0),
            price: self.price.unwrap_or_default(),
            price_rrc: self.price_rrc.unwrap_or_default(),
        }
    }

    /// Overwrites the fields this record carries.
    pub fn apply_to(&self, info: &mut ProductInfo) {
        if let Some(name) = &self.name_in_shop {
            info.name = name.clone();
        }
        if let Some(quantity) = self.quantity {
            info.quantity = quantity;
        }
        if let Some(price) = self.price {
            info.price = price;
        }
        if let Some(price_rrc) = self.price_rrc {
            info.price_rrc = price_rrc;
        }
    }
}

fn text(v: &Value, field: &str) -> std::result::Result<Option<String>, String> {
    match v {
        Value::String(s) => Ok(non_blank(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        _ => Err(format!("{field} must be text")),
    }
}

fn stock(v: &Value) -> std::result::Result<u32, String> {
    let invalid = || "quantity must be a non-negative integer".to_string();
    let whole = match v {
        Value::Number(n) => match (n.as_u64(), n.as_f64()) {
            (Some(u), _) => u,
            (None, Some(f)) if f >= 0.0 && f.fract() == 0.0 && f <= f64::from(MAX_STOCK) => f as u64,
            _ => return Err(invalid()),
        },
        Value::String(s) => s.trim().parse::<u64>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };
    u32::try_from(whole)
        .ok()
        .filter(|q| *q <= MAX_STOCK)
        .ok_or_else(|| format!("quantity must not exceed {MAX_STOCK}"))
}

fn amount(v: &Value, field: &str) -> std::result::Result<Price, String> {
    let invalid = || format!("{field} must be a decimal number");
    let raw = match v {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return Err(invalid()),
    };
    let amount = Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|_| invalid())?;
    Price::new(amount).map_err(|e| format!("{field}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dec(s: &str) -> Price {
        Price::new(Decimal::from_str(s).unwrap()).unwrap()
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(FeedFormat::from_filename("shop.YAML").unwrap(), FeedFormat::Yaml);
        assert_eq!(FeedFormat::from_filename("shop.yml").unwrap(), FeedFormat::Yaml);
        assert_eq!(FeedFormat::from_filename("a.b.json").unwrap(), FeedFormat::Json);
        assert_eq!(FeedFormat::from_filename("price.xlsx").unwrap(), FeedFormat::Xlsx);
        assert_eq!(FeedFormat::from_filename("price.csv").unwrap_err().kind(), "unsupported_format");
        assert_eq!(FeedFormat::from_filename("noext").unwrap_err().kind(), "unsupported_format");
    }

    #[test]
    fn test_yaml_document() {
        let raw = b"shop:\n  name: Svyaznoy\nproducts:\n  - name: iPhone 15\n    category: Phones\n    quantity: 3\n    price: 999.90\n";
        let feed = parse("feed.yaml", raw).unwrap();
        assert_eq!(feed.shop.as_deref(), Some("Svyaznoy"));
        assert_eq!(feed.records.len(), 1);
        let record = ProductRecord::from_value(&feed.records[0]).unwrap();
        assert_eq!(record.name, "iPhone 15");
        assert_eq!(record.quantity, Some(3));
        assert_eq!(record.price, Some(dec("999.90")));
    }

    #[test]
    fn test_document_shape_errors() {
        assert_eq!(parse("f.json", b"[1, 2]").unwrap_err().kind(), "validation_error");
        assert_eq!(parse("f.json", b"{\"products\": 5}").unwrap_err().kind(), "validation_error");
        assert_eq!(parse("f.json", b"{not json").unwrap_err().kind(), "validation_error");
        assert_eq!(parse("f.yaml", b"").unwrap_err().kind(), "validation_error");
        let empty = parse("f.json", b"{}").unwrap();
        assert_eq!(empty, Feed::default());
    }

    #[test]
    fn test_record_coercions() {
        let record = ProductRecord::from_value(&json!({
            "name": "  Laptop ",
            "quantity": "7",
            "price": "1200.50",
            "price_rrc": 1300,
            "parameters": {"RAM": 16, "Color": "black", "Touch": false}
        }))
        .unwrap();
        assert_eq!(record.name, "Laptop");
        assert_eq!(record.category, None);
        assert_eq!(record.quantity, Some(7));
        assert_eq!(record.price, Some(dec("1200.50")));
        assert_eq!(record.price_rrc, Some(dec("1300")));
        assert_eq!(record.parameters["RAM"], "16");
        assert_eq!(record.parameters["Touch"], "false");
    }

    #[test]
    fn test_record_rejections() {
        assert!(ProductRecord::from_value(&json!("Laptop")).is_err());
        assert!(ProductRecord::from_value(&json!({"category": "Phones"})).is_err());
        assert!(ProductRecord::from_value(&json!({"name": "   "})).is_err());
        assert!(ProductRecord::from_value(&json!({"name": "X", "quantity": -1})).is_err());
        assert!(ProductRecord::from_value(&json!({"name": "X", "quantity": 1.5})).is_err());
        assert!(ProductRecord::from_value(&json!({"name": "X", "quantity": 3_000_000_000u64})).is_err());
        assert!(ProductRecord::from_value(&json!({"name": "X", "quantity": "3000000000"})).is_err());
        assert_eq!(ProductRecord::from_value(&json!({"name": "X", "quantity": 2147483647})).unwrap().quantity, Some(MAX_STOCK));
        assert!(ProductRecord::from_value(&json!({"name": "X", "price": -3})).is_err());
        assert!(ProductRecord::from_value(&json!({"name": "X", "price": "cheap"})).is_err());
        assert!(ProductRecord::from_value(&json!({"name": "X", "parameters": {"a": [1]}})).is_err());
        assert!(ProductRecord::from_value(&json!({"name": "X", "parameters": ["a"]})).is_err());
    }

    #[test]
    fn test_apply_keeps_absent_fields() {
        let record = ProductRecord::from_value(&json!({"name": "Laptop", "price": 10})).unwrap();
        let mut info = ProductRecord::from_value(&json!({"name": "Laptop", "quantity": 4, "price_rrc": 12}))
            .unwrap()
            .new_listing(Uuid::now_v7(), Uuid::now_v7());
        record.apply_to(&mut info);
        assert_eq!(info.name, "Laptop");
        assert_eq!(info.quantity, 4);
        assert_eq!(info.price, dec("10"));
        assert_eq!(info.price_rrc, dec("12"));
    }

    #[test]
    fn test_table_rows() {
        let header = [
            Data::String("name".into()),
            Data::String("quantity".into()),
            Data::String("price".into()),
            Data::String("param:Color".into()),
            Data::String("shop".into()),
        ];
        let first = [
            Data::String("Mouse".into()),
            Data::Float(5.0),
            Data::Float(19.5),
            Data::String("white".into()),
            Data::String("Gadgets".into()),
        ];
        let blank = [Data::Empty, Data::Empty, Data::Empty, Data::Empty, Data::Empty];
        let second = [Data::String("Pad".into()), Data::Int(2), Data::Empty];
        let rows: Vec<&[Data]> = vec![&header[..], &first[..], &blank[..], &second[..]];

        let feed = table_to_feed(&rows);
        assert_eq!(feed.shop.as_deref(), Some("Gadgets"));
        assert_eq!(feed.records.len(), 2);

        let mouse = ProductRecord::from_value(&feed.records[0]).unwrap();
        assert_eq!(mouse.quantity, Some(5));
        assert_eq!(mouse.price, Some(dec("19.5")));
        assert_eq!(mouse.parameters["Color"], "white");

        let pad = ProductRecord::from_value(&feed.records[1]).unwrap();
        assert_eq!(pad.quantity, Some(2));
        assert_eq!(pad.price, None);
    }

    #[test]
    fn test_garbage_workbook_is_rejected() {
        assert_eq!(parse("price.xlsx", b"not a zip").unwrap_err().kind(), "validation_error");
    }
}
