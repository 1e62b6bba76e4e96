//! Persisted record shapes: the sheet payload, its metadata blocks and the
//! record envelope returned by the store.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::config::{DEFAULT_TITLE, NUM_ROWS};
use crate::grid::Grid;
use crate::view::SheetView;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComprehensiveData {
    pub sales_order_number: String,
    pub customer_name: String,
    pub contact_person: String,
    pub due_date: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutsourcingData {
    pub counterpart_name: String,
    pub counterpart_contact: String,
    pub outsource_order_number: String,
    pub dispatch_date: String,
    pub return_date: String,
    pub order_amount: String,
    pub our_company: String,
    pub our_address: String,
    pub our_contact: String,
    pub remarks: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingData {
    pub customer_name: String,
    pub customer_contact: String,
    pub contact_phone: String,
    pub production_order_number: String,
    pub contract_number: String,
    pub delivery_date: String,
    pub total_product_count: String,
    pub our_company: String,
    pub our_contact: String,
    pub remarks: String,
}

/// Metadata block names as they appear in payloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetadataBlock {
    Comprehensive,
    Outsourcing,
    Shipping,
}

impl std::str::FromStr for MetadataBlock {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "comprehensive" | "comprehensiveData" => Ok(MetadataBlock::Comprehensive),
            "outsourcing" | "outsourcingData" => Ok(MetadataBlock::Outsourcing),
            "shipping" | "shippingData" => Ok(MetadataBlock::Shipping),
            other => Err(format!("unknown metadata block: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown field `{field}` in {block:?} metadata")]
pub struct UnknownField {
    pub block: MetadataBlock,
    pub field: String,
}

/// The `data` payload of a record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SheetData {
    pub active_sheet: SheetView,
    pub master_data: Grid,
    pub comprehensive_data: ComprehensiveData,
    pub outsourcing_data: OutsourcingData,
    pub shipping_data: ShippingData,
}

impl Default for SheetData {
    fn default() -> Self {
        SheetData::blank(NUM_ROWS)
    }
}

fn field_or_default<T: for<'de> Deserialize<'de> + Default>(obj: Option<&Value>) -> T {
    obj.and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

impl SheetData {
    pub fn blank(rows: usize) -> Self {
        SheetData {
            active_sheet: SheetView::default(),
            master_data: Grid::blank(rows),
            comprehensive_data: ComprehensiveData::default(),
            outsourcing_data: OutsourcingData::default(),
            shipping_data: ShippingData::default(),
        }
    }

    /// Decodes a stored payload, replacing missing or malformed parts with
    /// their blank shape instead of failing.
    pub fn from_value(value: &Value, rows: usize) -> Self {
        let get = |key: &str| value.as_object().and_then(|m| m.get(key));
        SheetData {
            active_sheet: field_or_default(get("activeSheet")),
            master_data: Grid::from_value(get("masterData"), rows),
            comprehensive_data: field_or_default(get("comprehensiveData")),
            outsourcing_data: field_or_default(get("outsourcingData")),
            shipping_data: field_or_default(get("shippingData")),
        }
    }

    /// True once any grid cell carries content. Metadata alone never counts.
    pub fn has_content(&self) -> bool {
        self.master_data.has_content()
    }

    pub fn set_metadata(
        &mut self,
        block: MetadataBlock,
        field: &str,
        value: String,
    ) -> Result<(), UnknownField> {
        let slot = match block {
            MetadataBlock::Comprehensive => {
                let d = &mut self.comprehensive_data;
                match field {
                    "salesOrderNumber" => &mut d.sales_order_number,
                    "customerName" => &mut d.customer_name,
                    "contactPerson" => &mut d.contact_person,
                    "dueDate" => &mut d.due_date,
                    _ => return Err(UnknownField { block, field: field.to_string() }),
                }
            }
            MetadataBlock::Outsourcing => {
                let d = &mut self.outsourcing_data;
                match field {
                    "counterpartName" => &mut d.counterpart_name,
                    "counterpartContact" => &mut d.counterpart_contact,
                    "outsourceOrderNumber" => &mut d.outsource_order_number,
                    "dispatchDate" => &mut d.dispatch_date,
                    "returnDate" => &mut d.return_date,
                    "orderAmount" => &mut d.order_amount,
                    "ourCompany" => &mut d.our_company,
                    "ourAddress" => &mut d.our_address,
                    "ourContact" => &mut d.our_contact,
                    "remarks" => &mut d.remarks,
                    _ => return Err(UnknownField { block, field: field.to_string() }),
                }
            }
            MetadataBlock::Shipping => {
                let d = &mut self.shipping_data;
                match field {
                    "customerName" => &mut d.customer_name,
                    "customerContact" => &mut d.customer_contact,
                    "contactPhone" => &mut d.contact_phone,
                    "productionOrderNumber" => &mut d.production_order_number,
                    "contractNumber" => &mut d.contract_number,
                    "deliveryDate" => &mut d.delivery_date,
                    "totalProductCount" => &mut d.total_product_count,
                    "ourCompany" => &mut d.our_company,
                    "ourContact" => &mut d.our_contact,
                    "remarks" => &mut d.remarks,
                    _ => return Err(UnknownField { block, field: field.to_string() }),
                }
            }
        };
        *slot = value;
        Ok(())
    }
}

/// Identity of a persisted record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId(s.to_string())
    }
}

/// Whether the sheet being edited exists remotely yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordState {
    /// Only local; no create call has succeeded.
    Draft,
    Persisted(RecordId),
}

impl RecordState {
    pub fn id(&self) -> Option<&RecordId> {
        match self {
            RecordState::Draft => None,
            RecordState::Persisted(id) => Some(id),
        }
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, RecordState::Draft)
    }
}

/// A stored sheet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SheetRecord {
    pub id: RecordId,
    pub title: String,
    pub data: SheetData,
    pub created_at: String,
    pub updated_at: String,
}

/// Listing entry without the payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetSummary {
    pub id: RecordId,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Partial update; `None` fields keep their stored value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SheetData>,
}

impl SheetPatch {
    pub fn title(title: impl Into<String>) -> Self {
        SheetPatch { title: Some(title.into()), data: None }
    }

    pub fn data(data: SheetData) -> Self {
        SheetPatch { title: None, data: Some(data) }
    }
}

/// Trims a title, falling back to the default for empty input.
pub fn normalize_title(title: &str) -> String {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellValue;
    use crate::view::PRODUCT_NAME;

    #[test]
    fn malformed_payload_defaults() {
        let value = serde_json::json!({
            "activeSheet": "bogus",
            "masterData": "not rows",
            "outsourcingData": {"counterpartName": "Acme"},
            "shippingData": 12
        });
        let data = SheetData::from_value(&value, NUM_ROWS);
        assert_eq!(data.active_sheet, SheetView::Comprehensive);
        assert_eq!(data.master_data.row_count(), NUM_ROWS);
        assert_eq!(data.outsourcing_data.counterpart_name, "Acme");
        assert_eq!(data.outsourcing_data.remarks, "");
        assert_eq!(data.shipping_data, ShippingData::default());
    }

    #[test]
    fn payload_uses_wire_names() {
        let mut data = SheetData::blank(2);
        data.active_sheet = SheetView::Outsourcing;
        data.master_data = data
            .master_data
            .set(0, &PRODUCT_NAME, CellValue::text("gear"))
            .unwrap();
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["activeSheet"], "外协");
        assert_eq!(json["masterData"][0]["productName"], "gear");
        assert_eq!(json["masterData"][1]["isOutsourced"], false);
        assert!(json["comprehensiveData"]["salesOrderNumber"].is_string());
    }

    #[test]
    fn metadata_fields_by_name() {
        let mut data = SheetData::blank(1);
        data.set_metadata(MetadataBlock::Shipping, "contactPhone", "123".into())
            .unwrap();
        assert_eq!(data.shipping_data.contact_phone, "123");
        let err = data
            .set_metadata(MetadataBlock::Comprehensive, "nope", "x".into())
            .unwrap_err();
        assert_eq!(err.field, "nope");
        assert!(!data.has_content());
    }

    #[test]
    fn titles_normalize() {
        assert_eq!(normalize_title("  Order 7 "), "Order 7");
        assert_eq!(normalize_title("   "), "Untitled");
    }
}
