//! Money and date parsing/formatting helpers.
//!
//! Amounts and dates are accepted both in machine form (`1234.56`,
//! `2026-01-15`) and in the Brazilian display form the tracker uses
//! (`R$ 1.234,56`, `15/01/2026`).

use chrono::NaiveDate;

use crate::error::{Error, Result};

/// Parse a monetary amount.
///
/// A comma marks the Brazilian decimal form, where `.` is a thousands
/// separator; otherwise the input is taken as a plain decimal.
pub fn parse_money(input: &str) -> Result<f64> {
  let trimmed = input.trim();
  let trimmed = trimmed.strip_prefix("R$").unwrap_or(trimmed).trim();

  let normalized = if trimmed.contains(',') {
    trimmed.replace('.', "").replace(',', ".")
  } else {
    trimmed.to_string()
  };

  normalized
    .parse::<f64>()
    .map_err(|_| Error::InvalidInput(format!("not a monetary amount: {input}")))
}

/// Format an amount as Brazilian currency, e.g. `R$ 1.234,56`.
pub fn format_money(value: f64) -> String {
  let negative = value < 0.0;
  let cents = (value.abs() * 100.0).round() as i64;
  let whole = cents / 100;
  let frac = cents % 100;

  let digits = whole.to_string();
  let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
  for (i, c) in digits.chars().enumerate() {
    if i > 0 && (digits.len() - i) % 3 == 0 {
      grouped.push('.');
    }
    grouped.push(c);
  }

  if negative {
    format!("-R$ {grouped},{frac:02}")
  } else {
    format!("R$ {grouped},{frac:02}")
  }
}

/// Parse a date given as ISO (`YYYY-MM-DD`) or `DD/MM/YYYY`.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
  let trimmed = input.trim();
  if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
    return Ok(date);
  }
  NaiveDate::parse_from_str(trimmed, "%d/%m/%Y")
    .map_err(|_| Error::InvalidInput(format!("not a date: {input}")))
}

/// Format a date as `DD/MM/YYYY`.
pub fn format_date(date: NaiveDate) -> String {
  date.format("%d/%m/%Y").to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_money_plain() {
    assert_eq!(parse_money("1234.56").unwrap(), 1234.56);
    assert_eq!(parse_money("42").unwrap(), 42.0);
  }

  #[test]
  fn test_parse_money_brazilian() {
    assert_eq!(parse_money("R$ 1.234,56").unwrap(), 1234.56);
    assert_eq!(parse_money("12,50").unwrap(), 12.5);
  }

  #[test]
  fn test_parse_money_rejects_garbage() {
    assert!(parse_money("abc").is_err());
    assert!(parse_money("").is_err());
  }

  #[test]
  fn test_format_money() {
    assert_eq!(format_money(1234.56), "R$ 1.234,56");
    assert_eq!(format_money(0.5), "R$ 0,50");
    assert_eq!(format_money(-42.0), "-R$ 42,00");
    assert_eq!(format_money(1_000_000.0), "R$ 1.000.000,00");
  }

  #[test]
  fn test_parse_date_both_forms() {
    let expected = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
    assert_eq!(parse_date("2026-01-15").unwrap(), expected);
    assert_eq!(parse_date("15/01/2026").unwrap(), expected);
  }

  #[test]
  fn test_parse_date_rejects_garbage() {
    assert!(parse_date("15-01-2026").is_err());
    assert!(parse_date("soon").is_err());
  }

  #[test]
  fn test_format_date() {
    let date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
    assert_eq!(format_date(date), "15/01/2026");
  }
}
