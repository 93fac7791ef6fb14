use serde_json::Value;
use tabled::{builder::Builder, Table};

/// Format output as a table using the tabled crate.
///
/// A full report prints as a KPI table followed by the DPD summary and
/// any metadata exclusions; everything else falls back to a flat
/// field/value or array rendering.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(kpis) = map.get("kpis") {
                print_report_tables(kpis, map);
            } else {
                print_flat_object(value);
            }
        }
        Value::Array(arr) => {
            print_array_table(arr);
        }
        _ => {
            println!("{}", value);
        }
    }
}

fn print_report_tables(kpis: &Value, envelope: &serde_json::Map<String, Value>) {
    if let Value::Object(kpi_map) = kpis {
        let mut builder = Builder::default();
        builder.push_record(["KPI", "Value"]);
        for (key, val) in kpi_map {
            // The big per-bucket and per-customer tables print separately.
            if matches!(val, Value::Array(_)) {
                continue;
            }
            builder.push_record([key.as_str(), &format_value(val)]);
        }
        println!("{}", Table::from(builder));

        if let Some(Value::Array(summary)) = kpi_map.get("dpd_summary") {
            println!("\nDPD summary:");
            print_array_table(summary);
        }
        if let Some(Value::Array(exposures)) = kpi_map.get("top_exposures") {
            println!("\nTop exposures:");
            print_array_table(exposures);
        }
    } else {
        print_flat_object(kpis);
    }

    if let Some(Value::Object(meta)) = envelope.get("metadata") {
        if let Some(Value::Array(excluded)) = meta.get("excluded") {
            if !excluded.is_empty() {
                println!("\nExcluded records:");
                print_array_table(excluded);
            }
        }
        if let Some(Value::Array(failures)) = meta.get("pricing_failures") {
            if !failures.is_empty() {
                println!("\nPricing failures:");
                print_array_table(failures);
            }
        }
    }
}

fn print_flat_object(value: &Value) {
    if let Value::Object(map) = value {
        let mut builder = Builder::default();
        builder.push_record(["Field", "Value"]);
        for (key, val) in map {
            builder.push_record([key.as_str(), &format_value(val)]);
        }
        println!("{}", Table::from(builder));
    }
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut builder = Builder::default();
        builder.push_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| {
                        map.get(h.as_str())
                            .map(format_value)
                            .unwrap_or_default()
                    })
                    .collect();
                builder.push_record(row);
            }
        }

        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
