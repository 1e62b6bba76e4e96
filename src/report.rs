#![cfg(not(tarpaulin_include))]

//! Printable outsourcing and shipping documents built from a sheet.

use std::fmt;
use std::str::FromStr;

use crate::record::SheetData;
use crate::view::{IS_OUTSOURCED, MATERIAL, PRODUCT_NAME, PRODUCT_NUMBER, QUANTITY, REMARKS};

pub const DEFAULT_COMPANY: &str = "杭州越侬模型科技有限公司";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrintMode {
    Outsourcing,
    Shipping,
}

impl PrintMode {
    pub fn title(&self) -> &'static str {
        match self {
            PrintMode::Outsourcing => "外协单",
            PrintMode::Shipping => "送货单",
        }
    }

    fn quantity_header(&self) -> &'static str {
        match self {
            PrintMode::Outsourcing => "数量",
            PrintMode::Shipping => "交货数量",
        }
    }
}

impl FromStr for PrintMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "outsourcing" => Ok(PrintMode::Outsourcing),
            "shipping" => Ok(PrintMode::Shipping),
            other => Err(format!("unknown print mode: {}", other)),
        }
    }
}

impl fmt::Display for PrintMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PrintMode::Outsourcing => "outsourcing",
            PrintMode::Shipping => "shipping",
        })
    }
}

/// A rendered-ready document: company heading, labelled header fields and
/// the item table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrintReport {
    pub company: String,
    pub title: &'static str,
    pub fields: Vec<(&'static str, String)>,
    pub columns: [&'static str; 6],
    pub rows: Vec<[String; 6]>,
}

/// Collects the rows worth printing. A row is kept when any of product
/// name, number, material, quantity or remarks is filled; outsourcing
/// documents additionally keep only rows flagged as outsourced.
pub fn build_report(data: &SheetData, mode: PrintMode) -> PrintReport {
    let rows = data
        .master_data
        .rows()
        .filter(|row| {
            let has_content = [&PRODUCT_NAME, &PRODUCT_NUMBER, &MATERIAL, &QUANTITY, &REMARKS]
                .iter()
                .any(|c| !row.get(c).is_blank());
            let selected = match mode {
                PrintMode::Outsourcing => row.get(&IS_OUTSOURCED).as_flag(),
                PrintMode::Shipping => true,
            };
            has_content && selected
        })
        .enumerate()
        .map(|(i, row)| {
            [
                (i + 1).to_string(),
                row.get(&PRODUCT_NUMBER).to_string(),
                row.get(&PRODUCT_NAME).to_string(),
                row.get(&MATERIAL).to_string(),
                row.get(&QUANTITY).to_string(),
                row.get(&REMARKS).to_string(),
            ]
        })
        .collect();

    let (our_company, fields) = match mode {
        PrintMode::Outsourcing => {
            let d = &data.outsourcing_data;
            (
                d.our_company.clone(),
                vec![
                    ("对方名称", d.counterpart_name.clone()),
                    ("对方联系人", d.counterpart_contact.clone()),
                    ("外协单号", d.outsource_order_number.clone()),
                    ("寄出时间", d.dispatch_date.clone()),
                    ("寄回时间", d.return_date.clone()),
                    ("订单金额", d.order_amount.clone()),
                    ("我方", d.our_company.clone()),
                    ("我方收件地址", d.our_address.clone()),
                    ("我方联系人", d.our_contact.clone()),
                    ("备注", d.remarks.clone()),
                ],
            )
        }
        PrintMode::Shipping => {
            let d = &data.shipping_data;
            (
                d.our_company.clone(),
                vec![
                    ("客户名称", d.customer_name.clone()),
                    ("客户联系人", d.customer_contact.clone()),
                    ("联系方式", d.contact_phone.clone()),
                    ("生产单号", d.production_order_number.clone()),
                    ("合同编号", d.contract_number.clone()),
                    ("送货日期", d.delivery_date.clone()),
                    ("货品总数", d.total_product_count.clone()),
                    ("我方", d.our_company.clone()),
                    ("我方联系人", d.our_contact.clone()),
                    ("备注", d.remarks.clone()),
                ],
            )
        }
    };

    PrintReport {
        company: if our_company.trim().is_empty() { DEFAULT_COMPANY.to_string() } else { our_company },
        title: mode.title(),
        fields,
        columns: ["序号", "产品编号", "产品名称", "材料", mode.quantity_header(), "备注"],
        rows,
    }
}

fn push_csv_field(out: &mut String, value: &str) {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        out.push('"');
        out.push_str(&value.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(value);
    }
}

fn push_csv_line<'a>(out: &mut String, values: impl IntoIterator<Item = &'a str>) {
    for (i, v) in values.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_csv_field(out, v);
    }
    out.push('\n');
}

/// Convert a report to CSV
///
/// Layout, top to bottom:
/// - the company name and document title, one per line
/// - one `label,value` line per header field
/// - a blank line
/// - the item table with its header row
///
/// Fields containing commas, quotes or newlines are quoted.
pub fn to_csv(report: &PrintReport) -> String {
    let mut out = String::new();
    push_csv_line(&mut out, [report.company.as_str()]);
    push_csv_line(&mut out, [report.title]);
    for (label, value) in &report.fields {
        push_csv_line(&mut out, [*label, value.as_str()]);
    }
    out.push('\n');
    push_csv_line(&mut out, report.columns);
    for row in &report.rows {
        push_csv_line(&mut out, row.iter().map(String::as_str));
    }
    out
}

/// Convert a report to XLSX
///
/// Same layout as [`to_csv`], written to a single worksheet named after the
/// document title with a bold heading and table header.
///
/// # Returns
/// * `Result<Vec<u8>, XlsxError>` - workbook bytes or the writer's error
#[cfg(feature = "web")]
pub fn to_xlsx(report: &PrintReport) -> Result<Vec<u8>, rust_xlsxwriter::XlsxError> {
    use rust_xlsxwriter::{Format, Workbook, Worksheet};

    let bold = Format::new().set_bold();
    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name(report.title)?;

    worksheet.write_string_with_format(0, 0, &report.company, &bold)?;
    worksheet.write_string_with_format(1, 0, report.title, &bold)?;

    let mut row: u32 = 2;
    for (label, value) in &report.fields {
        worksheet.write_string(row, 0, *label)?;
        worksheet.write_string(row, 1, value)?;
        row += 1;
    }

    row += 1;
    for (col, header) in report.columns.iter().enumerate() {
        worksheet.write_string_with_format(row, col as u16, *header, &bold)?;
    }
    for item in &report.rows {
        row += 1;
        for (col, value) in item.iter().enumerate() {
            worksheet.write_string(row, col as u16, value)?;
        }
    }

    workbook.push_worksheet(worksheet);
    workbook.save_to_buffer()
}
