//! ESC/POS ticket rendering.
//!
//! Produces the raw byte stream for 58 mm or 80 mm thermal paper; sending
//! the bytes to a printer is the shell's job.

use rust_decimal::Decimal;

use crate::domain::{BusinessProfile, Sale, SaleItem};
use crate::tax::{TaxBreakdown, TaxRate};

const ESC_INIT: &[u8] = &[0x1B, 0x40];
const ALIGN_LEFT: &[u8] = &[0x1B, 0x61, 0x00];
const ALIGN_CENTER: &[u8] = &[0x1B, 0x61, 0x01];
const BOLD_ON: &[u8] = &[0x1B, 0x45, 0x01];
const BOLD_OFF: &[u8] = &[0x1B, 0x45, 0x00];
/// Feed and partial cut.
const CUT: &[u8] = &[0x1D, 0x56, 0x42, 0x00];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperWidth {
    Mm58,
    Mm80,
}

impl PaperWidth {
    fn columns(&self) -> usize {
        match self {
            Self::Mm58 => 32,
            Self::Mm80 => 48,
        }
    }
}

/// Format colones with thousands separators: `12,345.00`.
pub fn format_amount(value: Decimal) -> String {
    let fixed = format!("{:.2}", value);
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", int_part),
    };
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{}{}.{}", sign, grouped, frac_part)
}

fn line_two_cols(width: usize, left: &str, right: &str) -> String {
    let right_len = right.chars().count();
    let left_max = width.saturating_sub(right_len + 1);
    let left_trimmed: String = left.chars().take(left_max).collect();
    let pad = width.saturating_sub(left_trimmed.chars().count() + right_len);
    format!("{}{}{}\n", left_trimmed, " ".repeat(pad), right)
}

fn rate_label(rate: TaxRate) -> &'static str {
    match rate {
        TaxRate::General => "IVA 13%",
        TaxRate::Reduced4 => "IVA 4%",
        TaxRate::Reduced2 => "IVA 2%",
        TaxRate::Reduced1 => "IVA 1%",
        TaxRate::Exempt => "Exento",
    }
}

/// Render one completed sale as an ESC/POS byte stream.
pub fn render_sale(
    profile: &BusinessProfile,
    sale: &Sale,
    items: &[SaleItem],
    breakdown: &TaxBreakdown,
    width: PaperWidth,
) -> Vec<u8> {
    let cols = width.columns();
    let sep = format!("{}\n", "-".repeat(cols));
    let mut out = Vec::new();

    out.extend_from_slice(ESC_INIT);
    out.extend_from_slice(ALIGN_CENTER);
    out.extend_from_slice(BOLD_ON);
    out.extend_from_slice(format!("{}\n", profile.name).as_bytes());
    out.extend_from_slice(BOLD_OFF);
    out.extend_from_slice(format!("Ced: {}\n", profile.legal_id).as_bytes());
    out.extend_from_slice(format!("Tel: {}\n", profile.phone).as_bytes());
    out.extend_from_slice(format!("{}\n", profile.address).as_bytes());
    out.extend_from_slice(ALIGN_LEFT);
    out.extend_from_slice(sep.as_bytes());
    out.extend_from_slice(format!("Tiquete: {}\n", sale.id).as_bytes());
    out.extend_from_slice(format!("Fecha: {}\n", sale.created_at).as_bytes());
    out.extend_from_slice(sep.as_bytes());

    for item in items {
        let line_total = item.unit_price * item.quantity;
        out.extend_from_slice(
            line_two_cols(cols, &item.description, &format_amount(line_total)).as_bytes(),
        );
        if item.quantity != Decimal::ONE {
            out.extend_from_slice(
                format!(
                    "  {} x {}\n",
                    item.quantity,
                    format_amount(item.unit_price)
                )
                .as_bytes(),
            );
        }
    }

    out.extend_from_slice(sep.as_bytes());
    out.extend_from_slice(
        line_two_cols(cols, "Subtotal", &format_amount(breakdown.subtotal)).as_bytes(),
    );
    for totals in &breakdown.per_rate {
        if totals.rate == TaxRate::Exempt {
            continue;
        }
        out.extend_from_slice(
            line_two_cols(cols, rate_label(totals.rate), &format_amount(totals.tax)).as_bytes(),
        );
    }
    out.extend_from_slice(BOLD_ON);
    out.extend_from_slice(line_two_cols(cols, "TOTAL", &format_amount(sale.total)).as_bytes());
    out.extend_from_slice(BOLD_OFF);

    if let (Some(paid), Some(change)) = (sale.amount_paid, sale.change_due) {
        out.extend_from_slice(line_two_cols(cols, "Efectivo", &format_amount(paid)).as_bytes());
        out.extend_from_slice(line_two_cols(cols, "Cambio", &format_amount(change)).as_bytes());
    }

    if let Some(footer) = &profile.footer_message {
        out.extend_from_slice(ALIGN_CENTER);
        out.extend_from_slice(format!("\n{}\n", footer).as_bytes());
        out.extend_from_slice(ALIGN_LEFT);
    }

    out.extend_from_slice(b"\n\n");
    out.extend_from_slice(CUT);
    out
}
