use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::grid::GridError;

/// How a column's cells are stored and edited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    /// Free text, edited through the edit buffer.
    Text,
    /// Boolean checkbox, toggled rather than edited.
    Flag,
}

/// A column of the order grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Column {
    pub key: &'static str,
    pub header: &'static str,
    pub kind: ColumnKind,
}

impl Column {
    const fn text(key: &'static str, header: &'static str) -> Self {
        Column { key, header, kind: ColumnKind::Text }
    }

    const fn flag(key: &'static str, header: &'static str) -> Self {
        Column { key, header, kind: ColumnKind::Flag }
    }

    pub fn is_flag(&self) -> bool {
        self.kind == ColumnKind::Flag
    }
}

pub const PRODUCT_IMAGE: Column = Column::text("productImage", "产品图片");
pub const PRODUCT_NUMBER: Column = Column::text("productNumber", "产品编号");
pub const PRODUCT_NAME: Column = Column::text("productName", "产品名称");
pub const MATERIAL: Column = Column::text("material", "材质");
pub const SURFACE_FINISH: Column = Column::text("surfaceFinish", "表面处理");
pub const QUANTITY: Column = Column::text("quantity", "数量");
pub const REMARKS: Column = Column::text("remarks", "备注");
pub const IS_OUTSOURCED: Column = Column::flag("isOutsourced", "外协");

const BASE_COLUMNS: [Column; 7] = [
    PRODUCT_IMAGE,
    PRODUCT_NUMBER,
    PRODUCT_NAME,
    MATERIAL,
    SURFACE_FINISH,
    QUANTITY,
    REMARKS,
];

const OUTSOURCING_COLUMNS: [Column; 8] = [
    PRODUCT_IMAGE,
    PRODUCT_NUMBER,
    PRODUCT_NAME,
    MATERIAL,
    SURFACE_FINISH,
    QUANTITY,
    REMARKS,
    IS_OUTSOURCED,
];

/// Every column any view can show, used to build blank rows.
pub const ALL_COLUMNS: [Column; 8] = OUTSOURCING_COLUMNS;

/// Named sheet variant selecting which columns are visible.
///
/// Serialized with the names stored in record payloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SheetView {
    #[default]
    #[serde(rename = "综合")]
    Comprehensive,
    #[serde(rename = "外协")]
    Outsourcing,
    #[serde(rename = "出货")]
    Shipping,
}

impl SheetView {
    pub const ALL: [SheetView; 3] =
        [SheetView::Comprehensive, SheetView::Outsourcing, SheetView::Shipping];

    pub fn columns(&self) -> &'static [Column] {
        match self {
            SheetView::Outsourcing => &OUTSOURCING_COLUMNS,
            SheetView::Comprehensive | SheetView::Shipping => &BASE_COLUMNS,
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns().len()
    }

    /// Resolves a column index against this view's schema.
    pub fn column(&self, col: usize) -> Result<&'static Column, GridError> {
        let columns = self.columns();
        columns.get(col).ok_or(GridError::ColumnOutOfRange {
            col,
            cols: columns.len(),
        })
    }

    pub fn wire_name(&self) -> &'static str {
        match self {
            SheetView::Comprehensive => "综合",
            SheetView::Outsourcing => "外协",
            SheetView::Shipping => "出货",
        }
    }
}

impl fmt::Display for SheetView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for SheetView {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "综合" | "comprehensive" => Ok(SheetView::Comprehensive),
            "外协" | "outsourcing" => Ok(SheetView::Outsourcing),
            "出货" | "shipping" => Ok(SheetView::Shipping),
            other => Err(format!("unknown sheet view: {}", other)),
        }
    }
}
