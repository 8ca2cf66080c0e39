/// Lookup formulas for the computed columns G (assign type), H (supplier)
/// and I (PIC), keyed on the vendor in E and the country in F.

const ASSIGN_TYPES: &str = "assign_types";
const SUPPLIERS: &str = "'[Auto] Supplier'";

/// First data row; row 1 is the header.
pub const FIRST_DATA_ROW: usize = 2;

pub fn assign_type(row: usize) -> String {
    format!(
        "=IFNA(IF(F{row}=\"US\",IFNA(XLOOKUP(E{row},{t}!D:D,{t}!E:E),XLOOKUP(E{row},{t}!A:A,{t}!B:B)),XLOOKUP(E{row},{t}!A:A,{t}!B:B)),\"\")",
        t = ASSIGN_TYPES
    )
}

pub fn supplier(row: usize) -> String {
    format!("=IFNA(XLOOKUP(E{row},{s}!A:A,{s}!B:B),\"\")", s = SUPPLIERS)
}

pub fn pic(row: usize) -> String {
    format!(
        "=IFNA(IF(F{row}=\"US\",IFNA(XLOOKUP(E{row},{t}!D:D,{t}!F:F),XLOOKUP(E{row},{t}!A:A,{t}!C:C)),XLOOKUP(E{row},{t}!A:A,{t}!C:C)),\"\")",
        t = ASSIGN_TYPES
    )
}

/// G:I cells for every data row up to and including `last_row` (1-based).
pub fn rows(last_row: usize) -> Vec<Vec<String>> {
    (FIRST_DATA_ROW..=last_row)
        .map(|r| vec![assign_type(r), supplier(r), pic(r)])
        .collect()
}
