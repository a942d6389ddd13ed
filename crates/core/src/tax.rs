//! IVA breakdown arithmetic.
//!
//! Shelf prices are tax-inclusive; the breakdown recovers the taxable base
//! and tax per rate the way the electronic-invoice math expects: two-decimal
//! half-up rounding applied per line, then summed.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Costa Rican IVA rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxRate {
    /// Tarifa general, 13 %.
    General,
    /// Tarifa reducida, 4 %.
    Reduced4,
    /// Tarifa reducida, 2 %.
    Reduced2,
    /// Canasta básica, 1 %.
    Reduced1,
    Exempt,
}

impl TaxRate {
    pub fn rate(&self) -> Decimal {
        match self {
            Self::General => dec!(0.13),
            Self::Reduced4 => dec!(0.04),
            Self::Reduced2 => dec!(0.02),
            Self::Reduced1 => dec!(0.01),
            Self::Exempt => Decimal::ZERO,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Reduced4 => "reduced_4",
            Self::Reduced2 => "reduced_2",
            Self::Reduced1 => "reduced_1",
            Self::Exempt => "exempt",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "general" => Some(Self::General),
            "reduced_4" => Some(Self::Reduced4),
            "reduced_2" => Some(Self::Reduced2),
            "reduced_1" => Some(Self::Reduced1),
            "exempt" => Some(Self::Exempt),
            _ => None,
        }
    }
}

/// One sale line as the tax math sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxableLine {
    /// Tax-inclusive unit price.
    pub unit_price: Decimal,
    pub quantity: Decimal,
    pub rate: TaxRate,
}

/// Base/tax totals for one rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateTotals {
    pub rate: TaxRate,
    pub taxable_base: Decimal,
    pub tax: Decimal,
    pub gross: Decimal,
}

/// Per-rate IVA breakdown plus sale totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBreakdown {
    pub per_rate: Vec<RateTotals>,
    pub subtotal: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
}

fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

impl TaxBreakdown {
    pub fn for_lines(lines: &[TaxableLine]) -> Self {
        // Fixed rate order keeps receipt/report output stable.
        const RATE_ORDER: [TaxRate; 5] = [
            TaxRate::General,
            TaxRate::Reduced4,
            TaxRate::Reduced2,
            TaxRate::Reduced1,
            TaxRate::Exempt,
        ];

        let mut per_rate = Vec::new();
        for rate in RATE_ORDER {
            let mut base_sum = Decimal::ZERO;
            let mut tax_sum = Decimal::ZERO;
            let mut gross_sum = Decimal::ZERO;
            let mut any = false;
            for line in lines.iter().filter(|l| l.rate == rate) {
                any = true;
                let gross = round_money(line.unit_price * line.quantity);
                let base = round_money(gross / (Decimal::ONE + rate.rate()));
                base_sum += base;
                tax_sum += gross - base;
                gross_sum += gross;
            }
            if any {
                per_rate.push(RateTotals {
                    rate,
                    taxable_base: base_sum,
                    tax: tax_sum,
                    gross: gross_sum,
                });
            }
        }

        let subtotal = per_rate.iter().map(|r| r.taxable_base).sum();
        let tax_total = per_rate.iter().map(|r| r.tax).sum();
        let total = per_rate.iter().map(|r| r.gross).sum();
        Self {
            per_rate,
            subtotal,
            tax_total,
            total,
        }
    }
}
