use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// One row of the inventory CSV. Field names mirror the CSV header exactly;
/// the table is read-only for the lifetime of the process.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct InventoryRow {
    #[serde(rename = "ItemName")]
    pub item_name: String,
    #[serde(rename = "ItemID")]
    pub item_id: String,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "ItemType")]
    pub item_type: String,
    #[serde(rename = "QuantityInStock")]
    pub quantity_in_stock: f64,
    #[serde(rename = "Unit")]
    pub unit: String,
    #[serde(rename = "Cost")]
    pub cost: f64,
    #[serde(rename = "ReorderPoint")]
    pub reorder_point: f64,
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "LeadTimeDays")]
    pub lead_time_days: u32,
    #[serde(rename = "LastReceived")]
    pub last_received: String,
}

/// Load the inventory table. A missing or malformed file is fatal: the
/// assistant has nothing to ground its answers on without it.
pub fn load_inventory(path: &Path) -> Result<Vec<InventoryRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open inventory file at {}", path.display()))?;

    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: InventoryRow =
            record.with_context(|| format!("Malformed inventory row in {}", path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Render the whole table into the grounding-context blob: one fixed-format
/// block per row, in table order, each terminated by a blank line.
///
/// `max_rows` caps how many rows make it into the blob; `None` means no cap,
/// so a large table produces a large blob.
pub fn build_context(rows: &[InventoryRow], max_rows: Option<usize>) -> String {
    let limit = max_rows.unwrap_or(rows.len());
    let mut summary = String::new();
    for row in rows.iter().take(limit) {
        summary.push_str(&format!(
            "- Item: {}\n  ID: {}\n  Category: {}\n  Type: {}\n  Quantity in Stock: {} {}\n  Cost per Unit: {}\n  Reorder Point: {}\n  Location: {}\n  Lead Time: {} days\n  Last Received: {}\n\n",
            row.item_name,
            row.item_id,
            row.category,
            row.item_type,
            row.quantity_in_stock,
            row.unit,
            row.cost,
            row.reorder_point,
            row.location,
            row.lead_time_days,
            row.last_received,
        ));
    }
    summary
}

/// Wrap the context blob in the assistant's persona instruction. Computed once
/// at startup and frozen for the life of the process.
pub fn persona_instruction(context: &str) -> String {
    format!(
        "You are a helpful office inventory assistant. Use the following data to answer questions:\n\n{}\n",
        context
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_rows() -> Vec<InventoryRow> {
        vec![
            InventoryRow {
                item_name: "Chair".to_string(),
                item_id: "CH-001".to_string(),
                category: "Furniture".to_string(),
                item_type: "Seating".to_string(),
                quantity_in_stock: 12.0,
                unit: "pcs".to_string(),
                cost: 45.5,
                reorder_point: 5.0,
                location: "Aisle 3".to_string(),
                lead_time_days: 7,
                last_received: "2024-11-02".to_string(),
            },
            InventoryRow {
                item_name: "Stapler".to_string(),
                item_id: "ST-014".to_string(),
                category: "Office Supplies".to_string(),
                item_type: "Tool".to_string(),
                quantity_in_stock: 40.0,
                unit: "pcs".to_string(),
                cost: 6.25,
                reorder_point: 10.0,
                location: "Bin 12".to_string(),
                lead_time_days: 3,
                last_received: "2024-12-18".to_string(),
            },
        ]
    }

    #[test]
    fn test_build_context_one_block_per_row_in_order() {
        let rows = sample_rows();
        let context = build_context(&rows, None);

        assert_eq!(context.matches("- Item: ").count(), rows.len());
        let chair_pos = context.find("- Item: Chair").unwrap();
        let stapler_pos = context.find("- Item: Stapler").unwrap();
        assert!(chair_pos < stapler_pos);
    }

    #[test]
    fn test_build_context_contains_every_attribute_label() {
        let context = build_context(&sample_rows(), None);
        for label in [
            "- Item: ",
            "  ID: ",
            "  Category: ",
            "  Type: ",
            "  Quantity in Stock: ",
            "  Cost per Unit: ",
            "  Reorder Point: ",
            "  Location: ",
            "  Lead Time: ",
            "  Last Received: ",
        ] {
            assert!(context.contains(label), "missing label {:?}", label);
        }
    }

    #[test]
    fn test_build_context_renders_whole_quantities_without_decimal() {
        let context = build_context(&sample_rows(), None);
        assert!(context.contains("Quantity in Stock: 12 pcs"));
        assert!(context.contains("Cost per Unit: 45.5"));
        assert!(context.contains("Lead Time: 7 days"));
    }

    #[test]
    fn test_build_context_is_idempotent() {
        let rows = sample_rows();
        assert_eq!(build_context(&rows, None), build_context(&rows, None));
    }

    #[test]
    fn test_build_context_blocks_end_with_blank_line() {
        let context = build_context(&sample_rows(), None);
        assert!(context.ends_with("\n\n"));
    }

    #[test]
    fn test_build_context_empty_table() {
        assert_eq!(build_context(&[], None), "");
    }

    #[test]
    fn test_build_context_respects_row_cap() {
        let rows = sample_rows();
        let context = build_context(&rows, Some(1));
        assert!(context.contains("- Item: Chair"));
        assert!(!context.contains("- Item: Stapler"));
    }

    #[test]
    fn test_persona_instruction_embeds_context() {
        let persona = persona_instruction("- Item: Chair\n");
        assert!(persona.contains("office inventory assistant"));
        assert!(persona.contains("- Item: Chair"));
    }

    #[test]
    fn test_load_inventory_parses_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "ItemName,ItemID,Category,ItemType,QuantityInStock,Unit,Cost,ReorderPoint,Location,LeadTimeDays,LastReceived"
        )
        .unwrap();
        writeln!(file, "Chair,CH-001,Furniture,Seating,12,pcs,45.50,5,Aisle 3,7,2024-11-02")
            .unwrap();

        let rows = load_inventory(file.path()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].item_name, "Chair");
        assert_eq!(rows[0].quantity_in_stock, 12.0);
        assert_eq!(rows[0].lead_time_days, 7);
    }

    #[test]
    fn test_load_inventory_missing_file_is_an_error() {
        let result = load_inventory(Path::new("does-not-exist.csv"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_inventory_malformed_row_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "ItemName,ItemID,Category,ItemType,QuantityInStock,Unit,Cost,ReorderPoint,Location,LeadTimeDays,LastReceived"
        )
        .unwrap();
        writeln!(file, "Chair,CH-001,Furniture,Seating,not-a-number,pcs,45.50,5,Aisle 3,7,2024-11-02")
            .unwrap();

        assert!(load_inventory(file.path()).is_err());
    }
}
